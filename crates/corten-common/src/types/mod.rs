//! Type definitions shared across Corten crates.

mod ids;

pub use ids::PageId;
