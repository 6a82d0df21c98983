//! REST API client module for the gates service.
//!
//! This module provides the `ApiClient` for fetching the authoritative gate
//! catalog and single gate records, and the `CatalogSource` trait through
//! which the sync layer consumes it.
//!
//! Requests authenticate with a static API key sent in the `x-api-key` header.

pub mod client;
pub mod error;

pub use client::{ApiClient, CatalogSource};
pub use error::ApiError;
