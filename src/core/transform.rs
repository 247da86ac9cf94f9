//! Spatial Transforms
//!
//! 4x4 column-major transforms as produced by the AR collaborator.
//! Only the handful of operations the synchronization core needs are
//! provided; rendering math lives elsewhere.

use serde::{Serialize, Deserialize};

/// A 3-component vector (x, y, z) in meters.
pub type Vec3 = [f32; 3];

/// 4x4 transform stored column-major (`columns[c][r]` flattened).
///
/// Column 3 holds the translation, columns 0-2 the (possibly scaled) basis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f32; 16]);

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Transform = Transform([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Pure translation.
    pub fn from_translation(t: Vec3) -> Self {
        let mut m = Self::IDENTITY;
        m.0[12] = t[0];
        m.0[13] = t[1];
        m.0[14] = t[2];
        m
    }

    /// Get column `index` (0..4) as xyz.
    #[inline]
    pub fn column(&self, index: usize) -> Vec3 {
        let base = index * 4;
        [self.0[base], self.0[base + 1], self.0[base + 2]]
    }

    /// Translation component.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.column(3)
    }

    /// Uniform scale read from the length of the x basis column.
    pub fn scale_x(&self) -> f32 {
        length(self.column(0))
    }

    /// Copy with the basis scaled uniformly by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        let mut m = *self;
        for c in 0..3 {
            for r in 0..3 {
                m.0[c * 4 + r] *= factor;
            }
        }
        m
    }

    /// Copy with unit-length basis columns (scale removed).
    ///
    /// Degenerate (zero-length) columns are left untouched.
    pub fn normalized(&self) -> Self {
        let mut m = *self;
        for c in 0..3 {
            let len = length(self.column(c));
            if len > f32::EPSILON {
                for r in 0..3 {
                    m.0[c * 4 + r] /= len;
                }
            }
        }
        m
    }

    /// Check every element is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Physical board extent in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoardSize {
    /// Width (x extent).
    pub width: f32,
    /// Height (z extent on the table).
    pub height: f32,
}

impl BoardSize {
    /// Create a size.
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Both dimensions finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Euclidean length.
#[inline]
pub fn length(v: Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Inclusive axis-aligned bounds check.
#[inline]
pub fn within_bounds(p: Vec3, min: Vec3, max: Vec3) -> bool {
    (0..3).all(|i| p[i] >= min[i] && p[i] <= max[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_roundtrip() {
        let t = Transform::from_translation([1.0, -2.0, 3.5]);
        assert_eq!(t.translation(), [1.0, -2.0, 3.5]);
        assert_eq!(t.scale_x(), 1.0);
    }

    #[test]
    fn test_normalize_removes_scale() {
        let t = Transform::from_translation([0.5, 0.0, 0.5]).scaled(2.5);
        assert!((t.scale_x() - 2.5).abs() < 1e-6);

        let n = t.normalized();
        assert!((n.scale_x() - 1.0).abs() < 1e-6);
        // Translation is not part of the basis and survives.
        assert_eq!(n.translation(), [0.5, 0.0, 0.5]);
    }

    #[test]
    fn test_bounds() {
        let min = [-80.0, -10.0, -80.0];
        let max = [80.0, 1000.0, 80.0];
        assert!(within_bounds([0.0, 0.0, 0.0], min, max));
        assert!(!within_bounds([0.0, -10.5, 0.0], min, max));
        assert!(!within_bounds([81.0, 0.0, 0.0], min, max));
    }

    #[test]
    fn test_board_size_validity() {
        assert!(BoardSize::new(1.0, 1.5).is_valid());
        assert!(!BoardSize::new(0.0, 1.0).is_valid());
        assert!(!BoardSize::new(f32::NAN, 1.0).is_valid());
    }
}
