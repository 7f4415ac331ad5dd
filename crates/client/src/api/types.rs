//! Wire types for the Velvet backend API.
//!
//! The server's response shapes are looser than our domain model: a cart
//! item's name and price sometimes arrive top-level, sometimes nested in a
//! `product` sub-object, and user records vary between `id` and `_id`.
//! Everything is normalized here, at the API-client boundary, so the rest
//! of the crate never branches on response shape.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use velvet_core::{CartLine, Price, ProductId, User, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

/// Response from the sign-in endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: UserWire,
}

/// Response from the token refresh endpoint. The refresh token is only
/// present when the server chose to reissue it.
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// User record as the server sends it.
#[derive(Debug, Deserialize)]
pub(crate) struct UserWire {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

impl From<UserWire> for User {
    fn from(wire: UserWire) -> Self {
        Self {
            id: UserId::new(wire.id),
            username: wire.username,
            email: wire.email,
            is_admin: wire.is_admin,
        }
    }
}

/// Request body for creating an account.
#[derive(Debug, Serialize)]
pub struct NewUser {
    /// Desired login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plain-text password; only ever sent over the signup call.
    pub password: String,
}

/// Error body shape used by the backend (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Cart
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope around the fetched cart.
#[derive(Debug, Deserialize)]
pub(crate) struct CartEnvelope {
    #[serde(default)]
    pub items: Vec<CartItemWire>,
}

/// A cart item as the server sends it. `name`/`price`/`image_url` may be
/// top-level or nested under `product`.
#[derive(Debug, Deserialize)]
pub(crate) struct CartItemWire {
    pub product_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub product: Option<ProductWire>,
}

/// Nested product sub-object some responses use.
#[derive(Debug, Deserialize)]
pub(crate) struct ProductWire {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default, alias = "image")]
    pub image_url: Option<String>,
}

impl CartItemWire {
    /// Normalize into a canonical [`CartLine`], preferring top-level fields
    /// over the nested product sub-object. Returns `None` for lines that
    /// cannot exist in a cart (zero quantity, negative price).
    pub fn into_line(self) -> Option<CartLine> {
        if self.quantity == 0 {
            return None;
        }

        let product = self.product;
        let name = self
            .name
            .or_else(|| product.as_ref().and_then(|p| p.name.clone()))
            .unwrap_or_default();
        let price = Price::new(
            self.price
                .or_else(|| product.as_ref().and_then(|p| p.price))
                .unwrap_or_default(),
        );
        if price.is_negative() {
            return None;
        }
        let image_url = self.image_url.or_else(|| product.and_then(|p| p.image_url));

        Some(CartLine {
            product_id: ProductId::new(self.product_id),
            name,
            unit_price: price,
            quantity: self.quantity,
            size: self.size,
            image_url,
        })
    }
}

/// Request body for the full-cart sync endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct CartSyncRequest {
    pub items: Vec<CartItemOut>,
}

/// Outgoing cart item.
#[derive(Debug, Serialize)]
pub(crate) struct CartItemOut {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&CartLine> for CartItemOut {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.as_str().to_owned(),
            name: line.name.clone(),
            price: line.unit_price.amount(),
            quantity: line.quantity,
            size: line.size.clone(),
            image_url: line.image_url.clone(),
        }
    }
}

/// Request body for a single-line quantity update.
#[derive(Debug, Serialize)]
pub(crate) struct LineUpdateRequest<'a> {
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<&'a str>,
}
