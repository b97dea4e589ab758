//! Decomposed affine transforms
//!
//! Components and background images expose their placement as separate
//! translate/rotate/scale/skew parameters around an optional centre, the
//! way designers edit them. Storage uses plain 2x3 affine matrices, so this
//! type converts in both directions through [`kurbo::Affine`].

use kurbo::Affine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DecomposedTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    /// Degrees, counter-clockwise
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Degrees
    pub skew_x: f64,
    /// Degrees
    pub skew_y: f64,
    pub t_center_x: f64,
    pub t_center_y: f64,
}

impl Default for DecomposedTransform {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            skew_x: 0.0,
            skew_y: 0.0,
            t_center_x: 0.0,
            t_center_y: 0.0,
        }
    }
}

impl DecomposedTransform {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_center(&self) -> bool {
        self.t_center_x != 0.0 || self.t_center_y != 0.0
    }

    /// Compose into a single affine matrix.
    pub fn to_affine(&self) -> Affine {
        let skew = Affine::new([
            1.0,
            self.skew_y.to_radians().tan(),
            (-self.skew_x.to_radians()).tan(),
            1.0,
            0.0,
            0.0,
        ]);
        Affine::translate((
            self.translate_x + self.t_center_x,
            self.translate_y + self.t_center_y,
        )) * Affine::rotate(self.rotation.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * skew
            * Affine::translate((-self.t_center_x, -self.t_center_y))
    }

    /// Decompose an affine matrix. The result never carries a centre.
    pub fn from_affine(affine: Affine) -> Self {
        let [mut a, mut b, c, d, x, y] = affine.as_coeffs();
        let sign = if a < 0.0 { -1.0 } else { 1.0 };
        if sign < 0.0 {
            a *= sign;
            b *= sign;
        }
        let delta = a * d - b * c;

        let (mut rotation, mut scale_x, mut scale_y, mut skew_x, mut skew_y) =
            (0.0, 0.0, 0.0, 0.0, 0.0);
        if a != 0.0 || b != 0.0 {
            let r = (a * a + b * b).sqrt();
            rotation = if b >= 0.0 {
                (a / r).acos()
            } else {
                -(a / r).acos()
            };
            scale_x = r;
            scale_y = delta / r;
            skew_x = ((a * c + b * d) / (r * r)).atan();
        } else if c != 0.0 || d != 0.0 {
            let s = (c * c + d * d).sqrt();
            rotation = std::f64::consts::FRAC_PI_2
                - if d >= 0.0 {
                    (-c / s).acos()
                } else {
                    -(c / s).acos()
                };
            scale_x = delta / s;
            scale_y = s;
            skew_y = ((a * c + b * d) / (s * s)).atan();
        }

        Self {
            translate_x: x,
            translate_y: y,
            rotation: rotation.to_degrees(),
            scale_x: scale_x * sign,
            scale_y,
            skew_x: skew_x.to_degrees() * sign,
            skew_y: skew_y.to_degrees(),
            t_center_x: 0.0,
            t_center_y: 0.0,
        }
    }
}
