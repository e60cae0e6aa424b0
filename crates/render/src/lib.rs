//! Folio render contracts
//!
//! Interface types between the page cache core and the decode backend:
//! the decoded bitmap type, the renderer trait, and the screen profile
//! that supplies width classes.

pub mod bitmap;
pub mod profile;

pub use bitmap::{PageBitmap, PixelFormat, RenderError};
pub use profile::{PageRenderer, ScreenProfile};
