//! Velvet Core - Shared types library.
//!
//! This crate provides common types used across all Velvet components:
//! - `client` - Session manager, cart synchronizer, and API client
//! - `cli` - Command-line tool driving the client library
//!
//! # Architecture
//!
//! The core crate contains only types and pure state transitions - no I/O,
//! no HTTP clients, no storage. This keeps it lightweight and allows it to
//! be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, cart and credential types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
