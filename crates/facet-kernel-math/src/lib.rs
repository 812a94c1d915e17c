#![warn(missing_docs)]

//! Math types for the facet tessellation kernel.
//!
//! Thin wrappers around nalgebra providing the domain types used across
//! the kernel: 3D points and vectors, 2D parameter-space points, and
//! tolerance constants for geometric comparisons.

use nalgebra::{Unit, Vector2, Vector3};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D parameter space.
pub type Vec2 = Vector2<f64>;

/// Twice the signed area of the parameter-plane triangle `(a, b, c)`.
///
/// Positive for counter-clockwise order.
pub fn area2d(a: Point2, b: Point2, c: Point2) -> f64 {
    (a.x - c.x) * (b.y - c.y) - (a.y - c.y) * (b.x - c.x)
}

/// Squared distance between two 3D points.
pub fn dist2(a: &Point3, b: &Point3) -> f64 {
    (a - b).norm_squared()
}

/// Squared distance between two 2D points.
pub fn dist2_2d(a: Point2, b: Point2) -> f64 {
    (a - b).norm_squared()
}

/// Unit normal of the facet `(p0, p1, p2)`, or `None` if degenerate.
pub fn facet_normal(p0: &Point3, p1: &Point3, p2: &Point3) -> Option<Vec3> {
    let n = (p1 - p0).cross(&(p2 - p0));
    let len2 = n.norm_squared();
    if len2 == 0.0 {
        return None;
    }
    Some(n / len2.sqrt())
}

/// Dot product of the normals of facets `(p0, p1, p2)` and `(p3, p2, p1)`.
///
/// The two facets share the edge `p1`–`p2`; 1.0 means coplanar with
/// agreeing orientation. Degenerate facets count as flat.
pub fn dot_normals(p0: &Point3, p1: &Point3, p2: &Point3, p3: &Point3) -> f64 {
    let n1 = (p1 - p0).cross(&(p2 - p0));
    let d1 = n1.norm_squared();
    if d1 == 0.0 {
        return 1.0;
    }
    let n2 = (p2 - p3).cross(&(p1 - p3));
    let d2 = n2.norm_squared();
    if d2 == 0.0 {
        return 1.0;
    }
    n1.dot(&n2) / (d1.sqrt() * d2.sqrt())
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default kernel tolerances (1e-8 linear, 1e-10 rad angular).
    pub const DEFAULT: Self = Self {
        linear: 1e-8,
        angular: 1e-10,
    };

    /// Check if two points are coincident within tolerance.
    pub fn points_equal(&self, a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < self.linear
    }

    /// Check if a scalar distance is effectively zero.
    pub fn is_zero(&self, d: f64) -> bool {
        d.abs() < self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area2d_ccw_positive() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        assert!(area2d(a, b, c) > 0.0);
        assert!(area2d(a, c, b) < 0.0);
        assert_eq!(area2d(a, b, c), 1.0);
    }

    #[test]
    fn test_facet_normal() {
        let n = facet_normal(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        assert!((n - Vec3::z()).norm() < 1e-12);

        // collinear
        assert!(facet_normal(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(2.0, 0.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn test_dot_normals_flat_quad() {
        // planar quad split along the diagonal: both facets coplanar
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 1.0, 0.0);
        let p3 = Point3::new(1.0, 1.0, 0.0);
        assert!((dot_normals(&p0, &p1, &p2, &p3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_dot_normals_folded() {
        // fold the second facet back over the first
        let p0 = Point3::new(0.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, 0.0, 0.0);
        let p2 = Point3::new(0.0, 1.0, 0.0);
        let p3 = Point3::new(0.1, 0.1, 0.0);
        assert!(dot_normals(&p0, &p1, &p2, &p3) < 0.0);
    }

    #[test]
    fn test_tolerance() {
        let tol = Tolerance::DEFAULT;
        let a = Point3::new(1.0, 2.0, 3.0);
        let b = Point3::new(1.0 + 1e-9, 2.0, 3.0);
        assert!(tol.points_equal(&a, &b));
        assert!(!tol.points_equal(&a, &Point3::new(1.001, 2.0, 3.0)));
        assert!(tol.is_zero(1e-9));
    }
}
