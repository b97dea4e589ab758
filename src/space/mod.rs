//! Axis and location algebra
//!
//! Translates between global axis locations, per-glyph local axis
//! overrides, and the dense/sparse/canonical location encodings.

mod axis_space;
mod location;

pub use axis_space::{map_forward, unpack_axis, AxisSpace};
pub use location::{
    make_dense, make_sparse, merge, piecewise_linear_map, split_by_pole, Location, LocationKey,
};
