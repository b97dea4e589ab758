//! Outline data carried by a static glyph
//!
//! The backend does not interpret outlines; it only moves them between
//! .glif files and the glyph model. These types mirror the point structure
//! of a UFO contour closely enough to round-trip it losslessly.

use serde::{Deserialize, Serialize};

/// All contours of one glyph layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlineData {
    pub contours: Vec<ContourData>,
}

impl OutlineData {
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContourData {
    pub points: Vec<PointData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointData {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub point_type: PointTypeData,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub smooth: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointTypeData {
    Move,
    Line,
    OffCurve,
    Curve,
    QCurve,
}
