//! System-wide constants for Corten.

// =============================================================================
// Page and Memory Constants
// =============================================================================

/// Default page size in bytes (4 KB).
///
/// Matches the typical OS page size. All frames and disk I/O of a pool use
/// one page size, fixed at construction.
pub const DEFAULT_PAGE_SIZE: usize = 4 * 1024;

// =============================================================================
// Buffer Pool Constants
// =============================================================================

/// Default number of frames in the buffer pool (4 MB at the default page size).
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Default K for the LRU-K replacement policy.
///
/// LRU-2 is the classic choice: it distinguishes pages accessed twice from
/// pages touched once by a scan.
pub const DEFAULT_REPLACER_K: usize = 2;
