//! Data models for the gate catalog.
//!
//! - `Gate`, `Link`: network nodes and their directed, weighted edges
//! - `CatalogSnapshot`: the whole catalog as captured at one instant
//! - `FavoriteSet`: gate codes the user has marked

pub mod catalog;
pub mod gate;

pub use catalog::{age_display, filter_gates, CatalogSnapshot, FavoriteSet};
pub use gate::{Gate, Link};
