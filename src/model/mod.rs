//! The unified data model served by the backend
//!
//! Everything here is plain data: the backend builds these values from the
//! backing packages on every read and takes them apart again on write.

pub mod axes;
pub mod font;
pub mod glyph;
pub mod path;
pub mod transform;

pub use axes::{
    Axes, AxisHeader, AxisValueLabel, ContinuousAxis, CrossAxisMapping, DiscreteAxis, FontAxis,
};
pub use font::{
    FontInfo, FontSource, ImageData, ImageType, Kerning, LineMetric, OpenTypeFeatures,
};
pub use glyph::{
    Anchor, BackgroundImage, Component, GlyphAxis, GlyphSource, Guideline, Layer, RgbaColor,
    StaticGlyph, VariableGlyph, GLYPH_NOTE_KEY,
};
pub use path::{ContourData, OutlineData, PointData, PointTypeData};
pub use transform::DecomposedTransform;

/// Free-form JSON-compatible data attached to glyphs, layers and sources
pub type CustomData = serde_json::Map<String, serde_json::Value>;

/// Glyph name -> Unicode code points
pub type GlyphMap = std::collections::BTreeMap<String, Vec<u32>>;
