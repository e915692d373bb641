//! Upstream streaming catalog integration
//!
//! Production implementation of [`crate::catalog::CatalogProvider`] and
//! [`crate::catalog::Transport`].
//!
//! ## Architecture
//!
//! - `dto.rs` - Data Transfer Objects matching the API responses
//! - `adapter.rs` - Converts DTOs to domain types (ONLY place this happens)
//! - `client.rs` - HTTP client, authentication and request signing

mod adapter;
mod client;
pub mod dto;

pub use client::Client;
