//! User-facing tessellation parameters.

use serde::{Deserialize, Serialize};

/// Global parameters of a Body tessellation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TessParams {
    /// Maximum triangle side length; 0 disables the size criterion.
    pub max_side: f64,
    /// Maximum chord-height (sag) deviation; 0 disables.
    pub chord: f64,
    /// Dihedral / turning angle criterion in degrees; 0 disables the
    /// angle phases. Clamped to [0.5, 30.0] before use.
    pub angle_deg: f64,
}

impl TessParams {
    /// Construct from the `(max_side, chord, angle_deg)` triple.
    pub fn new(max_side: f64, chord: f64, angle_deg: f64) -> Self {
        Self {
            max_side,
            chord,
            angle_deg,
        }
    }

    /// The angle criterion as a dot-product threshold, after clamping
    /// the angle to [0.5, 30.0] degrees.
    pub fn dot_threshold(&self) -> f64 {
        let deg = self.angle_deg.abs().clamp(0.5, 30.0);
        (std::f64::consts::PI * deg / 180.0).cos()
    }

    /// Whether the angle phases are active at all.
    pub fn angle_active(&self) -> bool {
        self.angle_deg != 0.0
    }
}

impl Default for TessParams {
    fn default() -> Self {
        Self {
            max_side: 0.0,
            chord: 0.0,
            angle_deg: 15.0,
        }
    }
}

/// Parameters of the quad patcher.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuadParams {
    /// Tangent-alignment tolerance for merging adjacent Edges into one
    /// patch side; accepted range 0.001–0.5, anything else falls back
    /// to the default 0.05.
    pub edge_tol: f64,
}

impl QuadParams {
    /// The effective merge tolerance.
    pub fn effective_edge_tol(&self) -> f64 {
        if (0.001..=0.5).contains(&self.edge_tol) {
            self.edge_tol
        } else {
            0.05
        }
    }
}

impl Default for QuadParams {
    fn default() -> Self {
        Self { edge_tol: 0.05 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angle_clamp() {
        let lo = TessParams::new(0.0, 0.0, 0.1);
        let hi = TessParams::new(0.0, 0.0, 90.0);
        assert_eq!(lo.dot_threshold(), (std::f64::consts::PI * 0.5 / 180.0).cos());
        assert_eq!(hi.dot_threshold(), (std::f64::consts::PI * 30.0 / 180.0).cos());
        assert!(!TessParams::new(0.0, 0.0, 0.0).angle_active());
    }

    #[test]
    fn test_quad_tol_fallback() {
        assert_eq!(QuadParams { edge_tol: 0.9 }.effective_edge_tol(), 0.05);
        assert_eq!(QuadParams { edge_tol: 0.01 }.effective_edge_tol(), 0.01);
    }
}
