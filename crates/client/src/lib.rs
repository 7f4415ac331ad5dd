//! Velvet client runtime.
//!
//! This crate owns the two stateful cores of the Velvet storefront:
//!
//! - [`SessionManager`] - the authentication credential lifecycle: sign-in,
//!   sign-out, transparent single-flight token refresh, and the
//!   refresh-and-replay path for calls rejected with 401/403.
//! - [`CartSynchronizer`] - the shopping cart: instantaneous local
//!   mutations (optimistic updates), durable persistence, and debounced
//!   reconciliation with the server.
//!
//! Everything else - rendering, routing, the backend itself - is an
//! external collaborator.
//!
//! # Example
//!
//! ```rust,ignore
//! use velvet_client::{ClientContext, Config};
//!
//! let config = Config::from_env()?;
//! let ctx = ClientContext::new(config)?;
//!
//! ctx.session().sign_in("ada", &password).await?;
//! ctx.cart().fetch().await?;
//! ctx.cart().add_line(line);          // instant, debounced push follows
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod config;
pub mod context;
pub mod error;
pub mod session;
pub mod storage;

pub use api::ApiClient;
pub use cart::CartSynchronizer;
pub use config::Config;
pub use context::ClientContext;
pub use error::ApiError;
pub use session::SessionManager;
pub use storage::{JsonFileStore, MemoryStore, StateStore};
