//! # corten-storage
//!
//! Storage layer for the Corten engine: a fixed-size in-memory page cache
//! (the buffer pool) over a pluggable disk provider.
//!
//! The buffer pool mediates between fixed-size on-disk pages and the access
//! methods above it. It owns a fixed number of frames, fetches pages from a
//! [`disk::DiskManager`] on demand, evicts cold frames with an LRU-K policy,
//! and hands out scoped page guards that encode pin lifetimes and
//! read/write latching.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use corten_storage::buffer::{BufferPool, BufferPoolConfig};
//! use corten_storage::disk::MemDiskManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BufferPoolConfig::new(16).with_page_size(4096);
//! let disk = Arc::new(MemDiskManager::new(4096));
//! let pool = BufferPool::new(disk, config)?;
//!
//! let mut guard = pool.new_page_guarded()?;
//! let page_id = guard.page_id();
//! guard.data_mut()[0] = 42;
//! drop(guard); // unpins, leaves the page dirty
//!
//! let guard = pool.fetch_page_read(page_id)?;
//! assert_eq!(guard.data()[0], 42);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod disk;
