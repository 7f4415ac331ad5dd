//! Authenticated session credential types.

use serde::{Deserialize, Serialize};

use super::id::UserId;

/// Seconds of slack before nominal expiry at which a token is treated as
/// expired, so a request never departs with a token about to lapse.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user's unique ID.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Whether the user has administrative privileges.
    #[serde(default)]
    pub is_admin: bool,
}

/// One authenticated session.
///
/// Access and refresh tokens are always present together; a session without
/// a refresh token is represented by the absence of a `Credential`, never by
/// a partially filled one. Replaced wholesale on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token for API requests.
    pub access_token: String,
    /// Opaque token used to obtain a new access token.
    pub refresh_token: String,
    /// Token type tag (e.g., "bearer").
    pub token_type: String,
    /// The authenticated user.
    pub user: User,
    /// Unix timestamp when the access token was issued.
    pub issued_at: i64,
    /// Access token lifetime in seconds, if the server reported one.
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl Credential {
    /// Check if the access token is expired (with a 60s buffer).
    ///
    /// Tokens without a reported lifetime never count as expired; the
    /// reactive refresh-on-401 path covers them.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_within(now, 0)
    }

    /// Check if the access token expires within `seconds` from `now`
    /// (on top of the 60s buffer).
    #[must_use]
    pub fn expires_within(&self, now: i64, seconds: i64) -> bool {
        self.expires_in.is_some_and(|expires_in| {
            let expires_at = self.issued_at + expires_in;
            now >= expires_at - EXPIRY_BUFFER_SECS - seconds
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(issued_at: i64, expires_in: Option<i64>) -> Credential {
        Credential {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
            token_type: "bearer".to_string(),
            user: User {
                id: UserId::new("u-1"),
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
                is_admin: false,
            },
            issued_at,
            expires_in,
        }
    }

    #[test]
    fn test_is_expired() {
        let now = 1_700_000_000;

        // Expired an hour ago.
        assert!(credential(now - 7200, Some(3600)).is_expired(now));

        // Valid for another hour.
        assert!(!credential(now, Some(3600)).is_expired(now));

        // 30 seconds remaining: inside the 60s buffer, treated as expired.
        assert!(credential(now - 3570, Some(3600)).is_expired(now));
    }

    #[test]
    fn test_unknown_lifetime_never_expires() {
        let now = 1_700_000_000;
        assert!(!credential(0, None).is_expired(now));
    }

    #[test]
    fn test_expires_within() {
        let now = 1_700_000_000;
        let cred = credential(now, Some(300));

        assert!(cred.expires_within(now, 300));
        assert!(!cred.expires_within(now, 100));
    }
}
