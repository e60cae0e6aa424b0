//! Decoded image handles
//!
//! A [`PageImage`] owns one decoded pixel buffer together with a flag that
//! tracks whether the image is currently reachable from a cache table. The
//! flag matters because a handle may still be held by the UI after eviction:
//! reclamation logic (pixel-buffer pooling and the like) consults it to decide
//! whether the buffer can be recycled immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Buffer reclamation callback, invoked with the pixel buffer when the last
/// handle to an uncached image drops.
pub type ReclaimFn = Box<dyn FnOnce(Vec<u8>) + Send + Sync>;

/// An owned decoded page image.
///
/// Constructed once per successful decode and shared through [`ImageHandle`]
/// clones. Neither the cache nor the UI destroys the buffer unilaterally;
/// it is freed (or handed to the reclaim callback) only when no holder
/// remains.
pub struct PageImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    cached: AtomicBool,
    reclaim: Option<ReclaimFn>,
}

impl PageImage {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            cached: AtomicBool::new(false),
            reclaim: None,
        }
    }

    /// Attach a reclamation callback that receives the pixel buffer once the
    /// final handle drops while the image is not cached.
    pub fn with_reclaim(mut self, reclaim: ReclaimFn) -> Self {
        self.reclaim = Some(reclaim);
        self
    }
}

impl Drop for PageImage {
    fn drop(&mut self) {
        // The cache always holds a handle while an entry is in its table, so
        // reaching refcount zero with the flag still set cannot happen; the
        // check mirrors what pooling code does before touching the buffer.
        if self.cached.load(Ordering::Acquire) {
            return;
        }
        if let Some(reclaim) = self.reclaim.take() {
            reclaim(std::mem::take(&mut self.pixels));
        }
    }
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .field("cached", &self.cached.load(Ordering::Relaxed))
            .finish()
    }
}

/// Shared, ref-counted handle to a decoded page image.
///
/// The cache owns one handle per table entry; consumers hold non-owning
/// clones. Cloning is cheap (an `Arc` bump).
#[derive(Clone, Debug)]
pub struct ImageHandle {
    inner: Arc<PageImage>,
}

impl ImageHandle {
    pub fn new(image: PageImage) -> Self {
        Self {
            inner: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.inner.pixels
    }

    /// Byte count of the decoded buffer; this is the unit of cache accounting.
    pub fn byte_size(&self) -> usize {
        self.inner.pixels.len()
    }

    /// Whether this image is currently reachable from a cache table.
    pub fn is_cached(&self) -> bool {
        self.inner.cached.load(Ordering::Acquire)
    }

    /// True when `other` refers to the same underlying image.
    pub fn same_image(&self, other: &ImageHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_cached(&self, cached: bool) {
        self.inner.cached.store(cached, Ordering::Release);
    }
}
