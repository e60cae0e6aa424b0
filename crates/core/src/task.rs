//! Decode task: one page, one width class, one attempt (plus the
//! large-format fallback).

use std::sync::Arc;

use log::warn;

use folio_cache::{ImageHandle, PageImage, PageKey, SizedCache};
use folio_render::{PageBitmap, PageRenderer, RenderError, ScreenProfile};

/// Terminal state of a decode task.
#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    /// A buffer was decoded and inserted into the cache.
    Decoded(ImageHandle),

    /// No image available (page out of range or backend declined); non-fatal.
    Unavailable,

    /// An allocation failure occurred and no buffer was ever produced. The
    /// service re-raises this; it must not be swallowed.
    OutOfMemory,
}

/// Completion record sent back to the orchestrating thread.
#[derive(Debug)]
pub struct DecodeCompletion {
    pub page: u32,
    pub width_class: String,
    pub outcome: DecodeOutcome,
}

/// An asynchronous unit of decode work.
///
/// Runs on a worker thread. On a failed primary decode on a large-format
/// host, one alternate width class is tried; whatever buffer results is
/// cached under the *original* requested key so future lookups for that class
/// reuse the fallback result.
pub struct DecodeTask {
    page: u32,
    width_class: String,
    renderer: Arc<dyn PageRenderer>,
    screen: Arc<dyn ScreenProfile>,
    cache: Arc<SizedCache>,
}

impl DecodeTask {
    pub fn new(
        page: u32,
        width_class: String,
        renderer: Arc<dyn PageRenderer>,
        screen: Arc<dyn ScreenProfile>,
        cache: Arc<SizedCache>,
    ) -> Self {
        Self {
            page,
            width_class,
            renderer,
            screen,
            cache,
        }
    }

    /// Execute the decode, returning the completion for the inbox.
    pub fn run(self) -> DecodeCompletion {
        let mut allocation_failed = false;

        let mut bitmap = self.attempt(&self.width_class, &mut allocation_failed);

        if bitmap.is_none() {
            let stats = self.cache.stats();
            warn!(
                "no image for page {} at width class {} (cache: {} of {} bytes)",
                self.page, self.width_class, stats.bytes_used, stats.budget
            );

            if self.screen.is_large_format() {
                let mut alternate = self.screen.default_width_class();
                if alternate == self.width_class {
                    alternate = self.screen.large_format_width_class();
                }
                warn!(
                    "large-format host, retrying page {} with width class {}",
                    self.page, alternate
                );
                bitmap = self.attempt(&alternate, &mut allocation_failed);
            }
        }

        let outcome = match bitmap {
            Some(bitmap) => {
                let (pixels, width, height, _format) = bitmap.into_parts();
                let handle = ImageHandle::new(PageImage::new(pixels, width, height));
                // Keyed by the requested width class even when the alternate
                // produced the pixels: future lookups for the original class
                // should hit this result.
                let key = PageKey::new(self.page, &self.width_class);
                self.cache.put(key, handle.clone());
                DecodeOutcome::Decoded(handle)
            }
            None if allocation_failed => DecodeOutcome::OutOfMemory,
            None => DecodeOutcome::Unavailable,
        };

        DecodeCompletion {
            page: self.page,
            width_class: self.width_class,
            outcome,
        }
    }

    /// One render attempt. An allocation failure is recorded, never retried
    /// with the same parameters.
    fn attempt(&self, width_class: &str, allocation_failed: &mut bool) -> Option<PageBitmap> {
        match self.renderer.render(width_class, self.page) {
            Ok(bitmap) => bitmap,
            Err(RenderError::OutOfMemory { page, width_class }) => {
                warn!(
                    "out of memory decoding page {} at width class {}",
                    page, width_class
                );
                *allocation_failed = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use folio_render::PixelFormat;

    /// Scripted renderer: each (width_class, page) maps to a fixed response.
    struct ScriptedRenderer {
        responses: Mutex<HashMap<(String, u32), Result<Option<PageBitmap>, RenderError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedRenderer {
        fn new() -> Self {
            Self {
                responses: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn respond(
            &self,
            width_class: &str,
            page: u32,
            response: Result<Option<PageBitmap>, RenderError>,
        ) {
            self.responses
                .lock()
                .unwrap()
                .insert((width_class.to_string(), page), response);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl PageRenderer for ScriptedRenderer {
        fn render(
            &self,
            width_class: &str,
            page: u32,
        ) -> Result<Option<PageBitmap>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .get(&(width_class.to_string(), page))
                .cloned()
                .unwrap_or(Ok(None))
        }
    }

    struct FixedScreen {
        large_format: bool,
        default_class: &'static str,
        large_class: &'static str,
    }

    impl ScreenProfile for FixedScreen {
        fn is_large_format(&self) -> bool {
            self.large_format
        }

        fn default_width_class(&self) -> String {
            self.default_class.to_string()
        }

        fn large_format_width_class(&self) -> String {
            self.large_class.to_string()
        }
    }

    fn phone_screen() -> Arc<FixedScreen> {
        Arc::new(FixedScreen {
            large_format: false,
            default_class: "w1",
            large_class: "w2",
        })
    }

    fn tablet_screen() -> Arc<FixedScreen> {
        Arc::new(FixedScreen {
            large_format: true,
            default_class: "w1",
            large_class: "w2",
        })
    }

    fn bitmap(bytes: usize) -> PageBitmap {
        PageBitmap::new(vec![0u8; bytes], bytes as u32, 1, PixelFormat::Gray8).unwrap()
    }

    fn task(
        page: u32,
        width_class: &str,
        renderer: &Arc<ScriptedRenderer>,
        screen: Arc<FixedScreen>,
        cache: &Arc<SizedCache>,
    ) -> DecodeTask {
        let renderer: Arc<dyn PageRenderer> = renderer.clone();
        let screen: Arc<dyn ScreenProfile> = screen;
        DecodeTask::new(page, width_class.to_string(), renderer, screen, Arc::clone(cache))
    }

    #[test]
    fn successful_decode_is_cached_and_reported() {
        let renderer = Arc::new(ScriptedRenderer::new());
        renderer.respond("w1", 5, Ok(Some(bitmap(400))));
        let cache = Arc::new(SizedCache::new(10_000));

        let completion = task(5, "w1", &renderer, phone_screen(), &cache).run();

        let DecodeOutcome::Decoded(handle) = completion.outcome else {
            panic!("expected a decoded outcome");
        };
        assert_eq!(handle.byte_size(), 400);
        assert!(handle.is_cached());

        let cached = cache.get(&PageKey::new(5, "w1")).unwrap();
        assert!(cached.same_image(&handle));
        assert_eq!(renderer.calls(), 1);
    }

    #[test]
    fn unavailable_page_is_not_fatal_and_not_cached() {
        let renderer = Arc::new(ScriptedRenderer::new());
        let cache = Arc::new(SizedCache::new(10_000));

        let completion = task(9, "w1", &renderer, phone_screen(), &cache).run();

        assert!(matches!(completion.outcome, DecodeOutcome::Unavailable));
        assert!(cache.is_empty());
        // No large-format fallback on a phone profile.
        assert_eq!(renderer.calls(), 1);
    }

    #[test]
    fn large_format_fallback_caches_under_original_key() {
        let renderer = Arc::new(ScriptedRenderer::new());
        // Primary class declines; the alternate (large-format class, since
        // the default equals the requested class) succeeds.
        renderer.respond("w1", 5, Ok(None));
        renderer.respond("w2", 5, Ok(Some(bitmap(300))));
        let cache = Arc::new(SizedCache::new(10_000));

        let completion = task(5, "w1", &renderer, tablet_screen(), &cache).run();

        assert!(matches!(completion.outcome, DecodeOutcome::Decoded(_)));
        assert!(cache.contains(&PageKey::new(5, "w1")));
        assert!(!cache.contains(&PageKey::new(5, "w2")));
        assert_eq!(renderer.calls(), 2);
    }

    #[test]
    fn fallback_uses_default_class_when_request_differs() {
        let renderer = Arc::new(ScriptedRenderer::new());
        // Requested class is not the screen default, so the fallback goes to
        // the default class, not the large-format class.
        renderer.respond("w9", 3, Ok(None));
        renderer.respond("w1", 3, Ok(Some(bitmap(100))));
        let cache = Arc::new(SizedCache::new(10_000));

        let completion = task(3, "w9", &renderer, tablet_screen(), &cache).run();

        assert!(matches!(completion.outcome, DecodeOutcome::Decoded(_)));
        assert!(cache.contains(&PageKey::new(3, "w9")));
        assert_eq!(renderer.calls(), 2);
    }

    #[test]
    fn allocation_failure_without_fallback_is_fatal() {
        let renderer = Arc::new(ScriptedRenderer::new());
        renderer.respond(
            "w1",
            7,
            Err(RenderError::OutOfMemory {
                page: 7,
                width_class: "w1".to_string(),
            }),
        );
        let cache = Arc::new(SizedCache::new(10_000));

        let completion = task(7, "w1", &renderer, phone_screen(), &cache).run();

        assert!(matches!(completion.outcome, DecodeOutcome::OutOfMemory));
        assert!(cache.is_empty());
        assert_eq!(renderer.calls(), 1);
    }

    #[test]
    fn allocation_failure_recovered_by_fallback_is_not_fatal() {
        let renderer = Arc::new(ScriptedRenderer::new());
        renderer.respond(
            "w1",
            7,
            Err(RenderError::OutOfMemory {
                page: 7,
                width_class: "w1".to_string(),
            }),
        );
        renderer.respond("w2", 7, Ok(Some(bitmap(200))));
        let cache = Arc::new(SizedCache::new(10_000));

        let completion = task(7, "w1", &renderer, tablet_screen(), &cache).run();

        assert!(matches!(completion.outcome, DecodeOutcome::Decoded(_)));
        assert!(cache.contains(&PageKey::new(7, "w1")));
    }

    #[test]
    fn racing_duplicate_insert_still_reports_its_own_handle() {
        let renderer = Arc::new(ScriptedRenderer::new());
        renderer.respond("w1", 2, Ok(Some(bitmap(100))));
        let cache = Arc::new(SizedCache::new(10_000));

        // Another decode for the same key already landed.
        let winner = ImageHandle::new(PageImage::new(vec![1u8; 50], 50, 1));
        cache.put(PageKey::new(2, "w1"), winner.clone());

        let completion = task(2, "w1", &renderer, phone_screen(), &cache).run();

        let DecodeOutcome::Decoded(handle) = completion.outcome else {
            panic!("expected a decoded outcome");
        };
        // The task delivers the buffer it decoded; the cache keeps the first
        // writer's entry.
        assert!(!handle.same_image(&winner));
        let cached = cache.get(&PageKey::new(2, "w1")).unwrap();
        assert!(cached.same_image(&winner));
    }
}
