//! Traits implemented by the host: the decode backend and the screen
//! classifier that supplies width classes.

use crate::bitmap::{PageBitmap, RenderError};

/// Decode backend for page images.
///
/// Implementations are invoked from worker threads and may take tens to
/// hundreds of milliseconds per call; they must never be called on the
/// orchestrating (UI) thread.
pub trait PageRenderer: Send + Sync {
    /// Render one page at the given width class.
    ///
    /// `Ok(None)` means no image is available (page out of range or the
    /// backend declined). `Err(RenderError::OutOfMemory)` signals an
    /// allocation failure that the caller must not silently absorb.
    fn render(&self, width_class: &str, page: u32) -> Result<Option<PageBitmap>, RenderError>;
}

/// Screen classification supplied by the host.
///
/// Width classes are opaque tokens; the cache core never inspects them beyond
/// equality checks when selecting the large-format fallback class.
pub trait ScreenProfile: Send + Sync {
    /// Whether the host is a large-format (tablet-class) device, which
    /// unlocks the alternate-width retry on decode failure.
    fn is_large_format(&self) -> bool;

    /// The default width class for this screen.
    fn default_width_class(&self) -> String;

    /// The width class used for large-format rendering.
    fn large_format_width_class(&self) -> String;
}
