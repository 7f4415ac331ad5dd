//! HTTP client for the Velvet backend API.
//!
//! A thin, typed wrapper over `reqwest`: one method per backend operation,
//! with status codes mapped into the [`ApiError`] taxonomy and response
//! shapes normalized into `velvet-core` types at this boundary.
//!
//! The client itself is stateless; bearer tokens are passed in per call so
//! the session manager can attach the freshest token at send time.

mod types;

pub use types::NewUser;
pub(crate) use types::RefreshResponse;

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::instrument;

use velvet_core::{CartLine, Credential, ProductId, User};

use crate::config::Config;
use crate::error::ApiError;
use types::{
    CartEnvelope, CartItemOut, CartSyncRequest, ErrorBody, LineUpdateRequest, SignInResponse,
    UserWire,
};

/// Client for the Velvet backend API.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.as_str().trim_end_matches('/').to_owned(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in with username and password.
    ///
    /// The backend takes an OAuth2-style password form. On success the full
    /// credential (access token, refresh token, user identity) is returned.
    ///
    /// # Errors
    ///
    /// [`ApiError::AuthRejected`] for wrong credentials,
    /// [`ApiError::Network`] if the server is unreachable.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn sign_in(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Credential, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/users/signin"))
            .form(&[("username", username), ("password", password.expose_secret())])
            .send()
            .await?;

        let grant: SignInResponse = parse_json(response).await?;

        Ok(Credential {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            token_type: grant.token_type,
            user: grant.user.into(),
            issued_at: chrono::Utc::now().timestamp(),
            expires_in: grant.expires_in,
        })
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] with the server's message if the account
    /// cannot be created (e.g., username taken).
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    pub async fn sign_up(&self, new_user: &NewUser) -> Result<User, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/users/signup"))
            .json(new_user)
            .send()
            .await?;

        let user: UserWire = parse_json(response).await?;
        Ok(user.into())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// [`ApiError::AuthRejected`] if the refresh token was rejected;
    /// [`ApiError::Network`] if the server is unreachable.
    #[instrument(skip_all)]
    pub(crate) async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/users/refresh"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        parse_json(response).await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cart
    // ─────────────────────────────────────────────────────────────────────

    /// Fetch the authoritative cart for the current user.
    ///
    /// Lines with zero quantity or malformed prices are dropped during
    /// normalization rather than surfaced as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response cannot be
    /// parsed.
    #[instrument(skip_all)]
    pub async fn fetch_cart(&self, access_token: &str) -> Result<Vec<CartLine>, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url("/cart/"))
            .bearer_auth(access_token)
            .send()
            .await?;

        let envelope: CartEnvelope = parse_json(response).await?;
        Ok(envelope
            .items
            .into_iter()
            .filter_map(types::CartItemWire::into_line)
            .collect())
    }

    /// Replace the server-held cart with the full local line list.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip_all, fields(lines = lines.len()))]
    pub async fn sync_cart(&self, access_token: &str, lines: &[CartLine]) -> Result<(), ApiError> {
        let body = CartSyncRequest {
            items: lines.iter().map(CartItemOut::from).collect(),
        };

        let response = self
            .inner
            .client
            .post(self.url("/cart/"))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Update one line's quantity (and size) on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, access_token))]
    pub async fn update_line(
        &self,
        access_token: &str,
        product_id: &ProductId,
        quantity: u32,
        size: Option<&str>,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .put(self.url(&format!("/cart/{product_id}")))
            .bearer_auth(access_token)
            .json(&LineUpdateRequest { quantity, size })
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Delete one line from the server-held cart.
    ///
    /// A 404 counts as success: removal is idempotent and the line being
    /// gone is the desired end state.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, access_token))]
    pub async fn delete_line(
        &self,
        access_token: &str,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .delete(self.url(&format!("/cart/{product_id}")))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }
}

/// Map a non-success response into the error taxonomy, extracting the
/// backend's `{"detail": ...}` message when present.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthRejected(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(detail),
        _ => ApiError::Api {
            status: status.as_u16(),
            message: detail,
        },
    })
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config::new(url::Url::parse("http://localhost:8000/").expect("url"))
    }

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client = ApiClient::new(&test_config()).expect("client");
        assert_eq!(
            client.url("/users/signin"),
            "http://localhost:8000/users/signin"
        );
    }

    #[test]
    fn test_api_client_is_clone_send_sync() {
        fn assert_clone<T: Clone>() {}
        fn assert_send_sync<T: Send + Sync>() {}
        assert_clone::<ApiClient>();
        assert_send_sync::<ApiClient>();
    }
}
