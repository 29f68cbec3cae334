//! # corten-common
//!
//! Common types and constants for the Corten storage engine.
//!
//! This crate provides the foundational definitions used across all Corten
//! components:
//!
//! - **Types**: core identifiers (`PageId`)
//! - **Constants**: page-size and buffer-pool defaults
//!
//! ## Example
//!
//! ```rust
//! use corten_common::types::PageId;
//!
//! let page_id = PageId::new(42);
//! assert!(page_id.is_valid());
//! assert_eq!(page_id.next(), PageId::new(43));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constants;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
