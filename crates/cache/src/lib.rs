//! Folio page-image cache
//!
//! Size-bounded in-memory cache of decoded page images with LRU eviction.
//! Entries are bounded by decoded payload bytes, not entry count.

pub mod image;
pub mod sized;

pub use image::{ImageHandle, PageImage};
pub use sized::{CacheStats, EvictionHook, PageKey, SizedCache};
