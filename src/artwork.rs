//! Artwork loading and colour normalization.
//!
//! Everything downstream of this module sees a single concrete image
//! representation, [`image::RgbImage`]. Sources of any colour mode are
//! flattened onto an opaque white background by [`flatten_on_white`] at
//! load time.

pub mod convert;
pub mod normalize;
pub mod source;

// Re-export commonly used types
pub use convert::{ConversionSummary, convert_directory};
pub use normalize::{composite_channel, flatten_on_white};
pub use source::{FileImageSource, ImageSource};
