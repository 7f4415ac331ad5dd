//! Shared type definitions.

pub mod cart;
pub mod credential;
pub mod id;
pub mod price;

pub use cart::{Cart, CartLine, SyncState};
pub use credential::{Credential, User};
pub use id::{ProductId, UserId};
pub use price::Price;
