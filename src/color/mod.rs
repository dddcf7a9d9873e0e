//! Color primitives shared by the engine and the adapter.
//!
//! Every RGB → HSB and RGB → Lab conversion in the crate goes through the
//! functions in this module so the reference swatch and the image pixels are
//! always expressed in the same convention.

pub mod hsb;
pub mod lab;
pub mod reference;

pub use hsb::{Hsb, HsbMean, HUE_RANGE};
pub use lab::{lab_from_rgb, DeltaEFormula};
pub use reference::ReferenceColor;
