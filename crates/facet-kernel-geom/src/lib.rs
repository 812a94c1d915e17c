#![warn(missing_docs)]

//! Parametric curve and surface types for the facet kernel.
//!
//! Trait-based abstractions over the analytic geometry the tessellator
//! consumes: evaluation with first and second derivatives, inverse
//! evaluation, and parameter ranges with periodicity. Concrete types
//! cover the common B-rep carriers: lines, circles, planes, cylinders,
//! spheres, cones, and tori, plus 2-D pcurves in a Face's parameter
//! plane.

use std::any::Any;
use std::f64::consts::PI;
use facet_kernel_math::{Dir3, Point2, Point3, Vec2, Vec3};

// =============================================================================
// Evaluation bundles
// =============================================================================

/// Result of evaluating a curve at a parameter value.
#[derive(Debug, Clone, Copy)]
pub struct CurveEval {
    /// Position on the curve.
    pub point: Point3,
    /// First derivative with respect to t.
    pub d1: Vec3,
    /// Second derivative with respect to t.
    pub d2: Vec3,
}

impl CurveEval {
    /// Normalized tangent, or `None` for a stationary point.
    pub fn tangent(&self) -> Option<Vec3> {
        let len = self.d1.norm();
        if len == 0.0 {
            return None;
        }
        Some(self.d1 / len)
    }
}

/// Result of evaluating a surface at a (u, v) parameter pair.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceEval {
    /// Position on the surface.
    pub point: Point3,
    /// First partial with respect to u.
    pub du: Vec3,
    /// First partial with respect to v.
    pub dv: Vec3,
    /// Second partial with respect to u twice.
    pub duu: Vec3,
    /// Mixed second partial.
    pub duv: Vec3,
    /// Second partial with respect to v twice.
    pub dvv: Vec3,
}

impl SurfaceEval {
    /// Unit normal `du × dv`, or `None` at a parametric singularity.
    pub fn normal(&self) -> Option<Vec3> {
        let n = self.du.cross(&self.dv);
        let len2 = n.norm_squared();
        if len2 == 0.0 {
            return None;
        }
        Some(n / len2.sqrt())
    }
}

// =============================================================================
// Traits
// =============================================================================

/// The kind of a curve (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle (or circular arc via the owning Edge's range).
    Circle,
}

/// A parametric curve in 3D space.
pub trait Curve: Send + Sync + std::fmt::Debug {
    /// Evaluate position and derivatives at `t`.
    fn evaluate(&self, t: f64) -> CurveEval;

    /// Natural parameter range `(lo, hi)`.
    fn param_range(&self) -> (f64, f64);

    /// Whether the curve closes onto itself over its range.
    fn periodic(&self) -> bool {
        false
    }

    /// Nearest parameter and point to `p`.
    fn inverse_evaluate(&self, p: &Point3) -> (f64, Point3);

    /// The kind of this curve.
    fn kind(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Curve> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface.
    Cylinder,
    /// Spherical surface.
    Sphere,
    /// Conical surface.
    Cone,
    /// Toroidal surface.
    Torus,
}

/// Relaxation sweeps applied by the default interior quad fill.
const QUAD_FILL_SWEEPS: usize = 50;

/// A parametric surface in 3D space.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate position and first/second partials at `uv`.
    fn evaluate(&self, uv: Point2) -> SurfaceEval;

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    fn param_range(&self) -> ((f64, f64), (f64, f64));

    /// Whether the surface closes in u over its domain.
    fn periodic_u(&self) -> bool {
        false
    }

    /// Whether the surface closes in v over its domain.
    fn periodic_v(&self) -> bool {
        false
    }

    /// Nearest `(uv, point)` to `p`.
    fn inverse_evaluate(&self, p: &Point3) -> (Point2, Point3);

    /// Fill the interior of a structured `nu × nv` parameter grid whose
    /// boundary ring is already set; `grid` is row-major and only the
    /// interior entries are written.
    ///
    /// The default is a transfinite (Coons) map relaxed by Laplacian
    /// sweeps, which suits the analytic surfaces here; a surface with a
    /// strongly anisotropic parameterization can substitute its own
    /// elliptic fill.
    fn interior_quad_fill(&self, nu: usize, nv: usize, grid: &mut [Point2]) {
        if nu < 3 || nv < 3 {
            return;
        }
        for j in 1..nv - 1 {
            let fv = j as f64 / (nv - 1) as f64;
            for i in 1..nu - 1 {
                let fu = i as f64 / (nu - 1) as f64;
                let bottom = grid[i];
                let top = grid[(nv - 1) * nu + i];
                let left = grid[j * nu];
                let right = grid[j * nu + nu - 1];
                let c00 = grid[0];
                let c10 = grid[nu - 1];
                let c01 = grid[(nv - 1) * nu];
                let c11 = grid[(nv - 1) * nu + nu - 1];
                let p = (1.0 - fv) * bottom.coords + fv * top.coords
                    + (1.0 - fu) * left.coords
                    + fu * right.coords
                    - (1.0 - fu) * (1.0 - fv) * c00.coords
                    - fu * (1.0 - fv) * c10.coords
                    - (1.0 - fu) * fv * c01.coords
                    - fu * fv * c11.coords;
                grid[j * nu + i] = Point2::from(p);
            }
        }
        for _ in 0..QUAD_FILL_SWEEPS {
            for j in 1..nv - 1 {
                for i in 1..nu - 1 {
                    let p = 0.25
                        * (grid[j * nu + i - 1].coords
                            + grid[j * nu + i + 1].coords
                            + grid[(j - 1) * nu + i].coords
                            + grid[(j + 1) * nu + i].coords);
                    grid[j * nu + i] = Point2::from(p);
                }
            }
        }
    }

    /// The kind of this surface.
    fn kind(&self) -> SurfaceKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A 2-D curve in a Face's (u, v) parameter plane, sharing the parameter
/// of the 3-D Edge curve it accompanies.
pub trait Pcurve: Send + Sync + std::fmt::Debug {
    /// Face-plane coordinates at curve parameter `t`.
    fn evaluate(&self, t: f64) -> Point2;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Pcurve>;
}

impl Clone for Box<dyn Pcurve> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// =============================================================================
// Curves
// =============================================================================

/// A straight line `P(t) = origin + t * dir`.
#[derive(Debug, Clone)]
pub struct Line3 {
    /// Point at t = 0.
    pub origin: Point3,
    /// Direction (not necessarily unit; scales the parameter).
    pub dir: Vec3,
}

impl Line3 {
    /// Line through two points, parameterized so `t = 0` is `a` and
    /// `t = 1` is `b`.
    pub fn through(a: Point3, b: Point3) -> Self {
        Self {
            origin: a,
            dir: b - a,
        }
    }
}

impl Curve for Line3 {
    fn evaluate(&self, t: f64) -> CurveEval {
        CurveEval {
            point: self.origin + t * self.dir,
            d1: self.dir,
            d2: Vec3::zeros(),
        }
    }

    fn param_range(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn inverse_evaluate(&self, p: &Point3) -> (f64, Point3) {
        let len2 = self.dir.norm_squared();
        let t = if len2 == 0.0 {
            0.0
        } else {
            (p - self.origin).dot(&self.dir) / len2
        };
        (t, self.origin + t * self.dir)
    }

    fn kind(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A circle `P(t) = center + r (cos t · x_dir + sin t · y_dir)`.
///
/// Arcs are expressed by restricting the owning Edge's t range.
#[derive(Debug, Clone)]
pub struct Circle3 {
    /// Center of the circle.
    pub center: Point3,
    /// Unit direction at t = 0.
    pub x_dir: Dir3,
    /// Unit direction at t = π/2.
    pub y_dir: Dir3,
    /// Radius.
    pub radius: f64,
}

impl Circle3 {
    /// Circle in the plane spanned by `x_dir`/`y_dir`.
    pub fn new(center: Point3, x_dir: Vec3, y_dir: Vec3, radius: f64) -> Self {
        Self {
            center,
            x_dir: Dir3::new_normalize(x_dir),
            y_dir: Dir3::new_normalize(y_dir),
            radius,
        }
    }
}

impl Curve for Circle3 {
    fn evaluate(&self, t: f64) -> CurveEval {
        let (s, c) = t.sin_cos();
        let x = self.x_dir.as_ref();
        let y = self.y_dir.as_ref();
        CurveEval {
            point: self.center + self.radius * (c * x + s * y),
            d1: self.radius * (-s * x + c * y),
            d2: self.radius * (-c * x - s * y),
        }
    }

    fn param_range(&self) -> (f64, f64) {
        (0.0, 2.0 * PI)
    }

    fn periodic(&self) -> bool {
        true
    }

    fn inverse_evaluate(&self, p: &Point3) -> (f64, Point3) {
        let d = p - self.center;
        let t = d
            .dot(self.y_dir.as_ref())
            .atan2(d.dot(self.x_dir.as_ref()))
            .rem_euclid(2.0 * PI);
        (t, self.evaluate(t).point)
    }

    fn kind(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn clone_box(&self) -> Box<dyn Curve> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Surfaces
// =============================================================================

fn pick_perpendicular(axis: &Vec3) -> Vec3 {
    let arbitrary = if axis.x.abs() < 0.9 {
        Vec3::x()
    } else {
        Vec3::y()
    };
    arbitrary - arbitrary.dot(axis) * axis
}

/// An infinite plane `P(u, v) = origin + u · x_dir + v · y_dir`.
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Plane from origin and two spanning directions (normalized here).
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        let x = Dir3::new_normalize(x_dir);
        let y = Dir3::new_normalize(y_dir);
        let n = Dir3::new_normalize(x_dir.cross(&y_dir));
        Self {
            origin,
            x_dir: x,
            y_dir: y,
            normal_dir: n,
        }
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> SurfaceEval {
        SurfaceEval {
            point: self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref(),
            du: *self.x_dir.as_ref(),
            dv: *self.y_dir.as_ref(),
            duu: Vec3::zeros(),
            duv: Vec3::zeros(),
            dvv: Vec3::zeros(),
        }
    }

    fn param_range(&self) -> ((f64, f64), (f64, f64)) {
        ((-1e10, 1e10), (-1e10, 1e10))
    }

    fn inverse_evaluate(&self, p: &Point3) -> (Point2, Point3) {
        let d = p - self.origin;
        let uv = Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()));
        (uv, self.evaluate(uv).point)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A cylinder `P(u, v) = center + r (cos u · x + sin u · y) + v · axis`.
#[derive(Debug, Clone)]
pub struct CylinderSurface {
    /// Base point of the axis.
    pub center: Point3,
    /// Unit axis direction.
    pub axis: Dir3,
    /// Unit reference direction at u = 0, perpendicular to the axis.
    pub ref_dir: Dir3,
    /// Radius.
    pub radius: f64,
}

impl CylinderSurface {
    /// Cylinder around an arbitrary axis.
    pub fn new(center: Point3, axis: Vec3, radius: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let ref_dir = Dir3::new_normalize(pick_perpendicular(a.as_ref()));
        Self {
            center,
            axis: a,
            ref_dir,
            radius,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for CylinderSurface {
    fn evaluate(&self, uv: Point2) -> SurfaceEval {
        let (s, c) = uv.x.sin_cos();
        let x = self.ref_dir.as_ref();
        let y = self.y_dir();
        let radial = c * x + s * y;
        let dradial = -s * x + c * y;
        SurfaceEval {
            point: self.center + self.radius * radial + uv.y * self.axis.as_ref(),
            du: self.radius * dradial,
            dv: *self.axis.as_ref(),
            duu: -self.radius * radial,
            duv: Vec3::zeros(),
            dvv: Vec3::zeros(),
        }
    }

    fn param_range(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-1e10, 1e10))
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn inverse_evaluate(&self, p: &Point3) -> (Point2, Point3) {
        let d = p - self.center;
        let u = d
            .dot(&self.y_dir())
            .atan2(d.dot(self.ref_dir.as_ref()))
            .rem_euclid(2.0 * PI);
        let v = d.dot(self.axis.as_ref());
        let uv = Point2::new(u, v);
        (uv, self.evaluate(uv).point)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A sphere with longitude u ∈ [0, 2π) and latitude v ∈ [-π/2, π/2]:
/// `P(u, v) = center + r cos v (cos u · x + sin u · y) + r sin v · z`.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    /// Center of the sphere.
    pub center: Point3,
    /// Unit pole axis (v = π/2 pole).
    pub axis: Dir3,
    /// Unit reference direction at (u, v) = (0, 0).
    pub ref_dir: Dir3,
    /// Radius.
    pub radius: f64,
}

impl SphereSurface {
    /// Sphere with the pole axis along +Z.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self {
            center,
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            radius,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for SphereSurface {
    fn evaluate(&self, uv: Point2) -> SurfaceEval {
        let (su, cu) = uv.x.sin_cos();
        let (sv, cv) = uv.y.sin_cos();
        let x = self.ref_dir.as_ref();
        let y = self.y_dir();
        let z = self.axis.as_ref();
        let radial = cu * x + su * y;
        let dradial = -su * x + cu * y;
        let r = self.radius;
        SurfaceEval {
            point: self.center + r * cv * radial + r * sv * z,
            du: r * cv * dradial,
            dv: -r * sv * radial + r * cv * z,
            duu: -r * cv * radial,
            duv: -r * sv * dradial,
            dvv: -r * cv * radial - r * sv * z,
        }
    }

    fn param_range(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0))
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn inverse_evaluate(&self, p: &Point3) -> (Point2, Point3) {
        let d = p - self.center;
        let z = d.dot(self.axis.as_ref());
        let px = d.dot(self.ref_dir.as_ref());
        let py = d.dot(&self.y_dir());
        let rad = (px * px + py * py).sqrt();
        let u = py.atan2(px).rem_euclid(2.0 * PI);
        let v = z.atan2(rad);
        let uv = Point2::new(u, v);
        (uv, self.evaluate(uv).point)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A cone `P(u, v) = apex + v (cos α · axis + sin α (cos u · x + sin u · y))`
/// with half-angle α and v the distance from the apex along a generator.
#[derive(Debug, Clone)]
pub struct ConeSurface {
    /// Apex (tip) of the cone.
    pub apex: Point3,
    /// Unit axis direction, apex toward base.
    pub axis: Dir3,
    /// Unit reference direction at u = 0.
    pub ref_dir: Dir3,
    /// Half-angle in radians.
    pub half_angle: f64,
}

impl ConeSurface {
    /// Cone with its axis along an arbitrary direction.
    pub fn new(apex: Point3, axis: Vec3, half_angle: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let ref_dir = Dir3::new_normalize(pick_perpendicular(a.as_ref()));
        Self {
            apex,
            axis: a,
            ref_dir,
            half_angle,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for ConeSurface {
    fn evaluate(&self, uv: Point2) -> SurfaceEval {
        let (su, cu) = uv.x.sin_cos();
        let (sa, ca) = self.half_angle.sin_cos();
        let x = self.ref_dir.as_ref();
        let y = self.y_dir();
        let z = self.axis.as_ref();
        let radial = cu * x + su * y;
        let dradial = -su * x + cu * y;
        let gen = ca * z + sa * radial;
        SurfaceEval {
            point: self.apex + uv.y * gen,
            du: uv.y * sa * dradial,
            dv: gen,
            duu: -uv.y * sa * radial,
            duv: sa * dradial,
            dvv: Vec3::zeros(),
        }
    }

    fn param_range(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (0.0, 1e10))
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn inverse_evaluate(&self, p: &Point3) -> (Point2, Point3) {
        let d = p - self.apex;
        let z = d.dot(self.axis.as_ref());
        let px = d.dot(self.ref_dir.as_ref());
        let py = d.dot(&self.y_dir());
        let rad = (px * px + py * py).sqrt();
        let (sa, ca) = self.half_angle.sin_cos();
        let u = py.atan2(px).rem_euclid(2.0 * PI);
        let v = (z * ca + rad * sa).max(0.0);
        let uv = Point2::new(u, v);
        (uv, self.evaluate(uv).point)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Cone
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A torus with major radius R and minor radius r:
/// `P(u, v) = center + (R + r cos v)(cos u · x + sin u · y) + r sin v · z`.
#[derive(Debug, Clone)]
pub struct TorusSurface {
    /// Center of the torus.
    pub center: Point3,
    /// Unit axis direction.
    pub axis: Dir3,
    /// Unit reference direction at u = 0.
    pub ref_dir: Dir3,
    /// Major (ring) radius.
    pub major: f64,
    /// Minor (tube) radius.
    pub minor: f64,
}

impl TorusSurface {
    /// Torus around an arbitrary axis.
    pub fn new(center: Point3, axis: Vec3, major: f64, minor: f64) -> Self {
        let a = Dir3::new_normalize(axis);
        let ref_dir = Dir3::new_normalize(pick_perpendicular(a.as_ref()));
        Self {
            center,
            axis: a,
            ref_dir,
            major,
            minor,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for TorusSurface {
    fn evaluate(&self, uv: Point2) -> SurfaceEval {
        let (su, cu) = uv.x.sin_cos();
        let (sv, cv) = uv.y.sin_cos();
        let x = self.ref_dir.as_ref();
        let y = self.y_dir();
        let z = self.axis.as_ref();
        let radial = cu * x + su * y;
        let dradial = -su * x + cu * y;
        let ring = self.major + self.minor * cv;
        SurfaceEval {
            point: self.center + ring * radial + self.minor * sv * z,
            du: ring * dradial,
            dv: -self.minor * sv * radial + self.minor * cv * z,
            duu: -ring * radial,
            duv: -self.minor * sv * dradial,
            dvv: -self.minor * cv * radial - self.minor * sv * z,
        }
    }

    fn param_range(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (0.0, 2.0 * PI))
    }

    fn periodic_u(&self) -> bool {
        true
    }

    fn periodic_v(&self) -> bool {
        true
    }

    fn inverse_evaluate(&self, p: &Point3) -> (Point2, Point3) {
        let d = p - self.center;
        let z = d.dot(self.axis.as_ref());
        let px = d.dot(self.ref_dir.as_ref());
        let py = d.dot(&self.y_dir());
        let rad = (px * px + py * py).sqrt();
        let u = py.atan2(px).rem_euclid(2.0 * PI);
        let v = z.atan2(rad - self.major).rem_euclid(2.0 * PI);
        let uv = Point2::new(u, v);
        (uv, self.evaluate(uv).point)
    }

    fn kind(&self) -> SurfaceKind {
        SurfaceKind::Torus
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Pcurves
// =============================================================================

/// An affine pcurve `uv(t) = origin + t * dir`.
///
/// Covers every Edge of the analytic surfaces here: boundary lines of
/// planar faces, iso-parameter circles and seams of the rotational
/// surfaces all trace straight lines in the parameter plane.
#[derive(Debug, Clone)]
pub struct LinePcurve {
    /// Parameter-plane point at t = 0.
    pub origin: Point2,
    /// Parameter-plane velocity.
    pub dir: Vec2,
}

impl LinePcurve {
    /// Pcurve through `(t0, uv0)` and `(t1, uv1)`.
    pub fn through(t0: f64, uv0: Point2, t1: f64, uv1: Point2) -> Self {
        let dir = (uv1 - uv0) / (t1 - t0);
        Self {
            origin: uv0 - t0 * dir,
            dir,
        }
    }
}

impl Pcurve for LinePcurve {
    fn evaluate(&self, t: f64) -> Point2 {
        self.origin + t * self.dir
    }

    fn clone_box(&self) -> Box<dyn Pcurve> {
        Box::new(self.clone())
    }
}

/// A circular pcurve `uv(t) = center + cos t · x_vec + sin t · y_vec`.
///
/// Used where a circular Edge lies on a planar Face: the circle traces a
/// circle (or ellipse, for skewed frames) in the parameter plane.
#[derive(Debug, Clone)]
pub struct CirclePcurve {
    /// Parameter-plane center.
    pub center: Point2,
    /// Parameter-plane direction at t = 0, radius folded in.
    pub x_vec: Vec2,
    /// Parameter-plane direction at t = π/2, radius folded in.
    pub y_vec: Vec2,
}

impl Pcurve for CirclePcurve {
    fn evaluate(&self, t: f64) -> Point2 {
        let (s, c) = t.sin_cos();
        self.center + c * self.x_vec + s * self.y_vec
    }

    fn clone_box(&self) -> Box<dyn Pcurve> {
        Box::new(self.clone())
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Owning store for the geometry referenced by a topology.
#[derive(Debug, Clone, Default)]
pub struct GeometryStore {
    /// Surfaces indexed by Face records.
    pub surfaces: Vec<Box<dyn Surface>>,
    /// Curves indexed by Edge records.
    pub curves: Vec<Box<dyn Curve>>,
    /// Pcurves indexed by Loop entries.
    pub pcurves: Vec<Box<dyn Pcurve>>,
}

impl GeometryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface, returning its index.
    pub fn add_surface(&mut self, s: Box<dyn Surface>) -> usize {
        self.surfaces.push(s);
        self.surfaces.len() - 1
    }

    /// Add a curve, returning its index.
    pub fn add_curve(&mut self, c: Box<dyn Curve>) -> usize {
        self.curves.push(c);
        self.curves.len() - 1
    }

    /// Add a pcurve, returning its index.
    pub fn add_pcurve(&mut self, p: Box<dyn Pcurve>) -> usize {
        self.pcurves.push(p);
        self.pcurves.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn check_surface_derivs(surf: &dyn Surface, uv: Point2) {
        let h = 1e-6;
        let e = surf.evaluate(uv);
        let eu = surf.evaluate(Point2::new(uv.x + h, uv.y));
        let ev = surf.evaluate(Point2::new(uv.x, uv.y + h));
        let du_fd = (eu.point - e.point) / h;
        let dv_fd = (ev.point - e.point) / h;
        assert_relative_eq!(e.du.x, du_fd.x, epsilon = 1e-4);
        assert_relative_eq!(e.du.y, du_fd.y, epsilon = 1e-4);
        assert_relative_eq!(e.du.z, du_fd.z, epsilon = 1e-4);
        assert_relative_eq!(e.dv.x, dv_fd.x, epsilon = 1e-4);
        assert_relative_eq!(e.dv.y, dv_fd.y, epsilon = 1e-4);
        assert_relative_eq!(e.dv.z, dv_fd.z, epsilon = 1e-4);
        let duu_fd = (eu.du - e.du) / h;
        let dvv_fd = (ev.dv - e.dv) / h;
        assert_relative_eq!(e.duu.x, duu_fd.x, epsilon = 1e-4);
        assert_relative_eq!(e.dvv.x, dvv_fd.x, epsilon = 1e-4);
    }

    #[test]
    fn test_line_eval_and_inverse() {
        let line = Line3::through(Point3::new(1.0, 0.0, 0.0), Point3::new(3.0, 0.0, 0.0));
        let e = line.evaluate(0.5);
        assert_relative_eq!(e.point.x, 2.0);
        assert_eq!(e.d2.norm(), 0.0);
        let (t, p) = line.inverse_evaluate(&Point3::new(2.5, 7.0, 0.0));
        assert_relative_eq!(t, 0.75);
        assert_relative_eq!(p.x, 2.5);
        assert_relative_eq!(p.y, 0.0);
    }

    #[test]
    fn test_circle_eval_and_inverse() {
        let circ = Circle3::new(Point3::origin(), Vec3::x(), Vec3::y(), 2.0);
        let e = circ.evaluate(PI / 2.0);
        assert_relative_eq!(e.point.y, 2.0, epsilon = 1e-12);
        // tangent perpendicular to radius
        assert_relative_eq!(e.d1.dot(&(e.point - Point3::origin())), 0.0, epsilon = 1e-12);
        let (t, _) = circ.inverse_evaluate(&Point3::new(-2.0, 0.0, 0.0));
        assert_relative_eq!(t, PI, epsilon = 1e-12);
        assert!(circ.periodic());
    }

    #[test]
    fn test_plane_inverse_round_trip() {
        let plane = Plane::new(Point3::new(1.0, 2.0, 3.0), Vec3::x(), Vec3::z());
        let (uv, p) = plane.inverse_evaluate(&Point3::new(4.0, 2.0, 5.0));
        assert_relative_eq!(uv.x, 3.0);
        assert_relative_eq!(uv.y, 2.0);
        assert_relative_eq!((p - Point3::new(4.0, 2.0, 5.0)).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cylinder_derivatives() {
        let cyl = CylinderSurface::new(Point3::origin(), Vec3::z(), 1.5);
        check_surface_derivs(&cyl, Point2::new(0.7, 0.3));
        let (uv, p) = cyl.inverse_evaluate(&Point3::new(0.0, 1.5, 2.0));
        assert_relative_eq!(uv.x, PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(uv.y, 2.0);
        assert_relative_eq!((p - Point3::new(0.0, 1.5, 2.0)).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sphere_derivatives_and_normal() {
        let sph = SphereSurface::new(Point3::origin(), 1.0);
        check_surface_derivs(&sph, Point2::new(1.0, 0.4));
        let e = sph.evaluate(Point2::new(1.0, 0.4));
        let n = e.normal().unwrap();
        // outward normal is the unit position for a unit sphere at origin
        assert_relative_eq!((n - (e.point - Point3::origin())).norm(), 0.0, epsilon = 1e-10);
        // the pole parameterization degenerates but the limit holds
        let pole = sph.evaluate(Point2::new(0.0, PI / 2.0));
        assert!(pole.normal().unwrap().dot(&Vec3::z()) > 0.99);
    }

    #[test]
    fn test_sphere_inverse_round_trip() {
        let sph = SphereSurface::new(Point3::new(1.0, 0.0, 0.0), 2.0);
        let uv0 = Point2::new(2.2, -0.6);
        let p = sph.evaluate(uv0).point;
        let (uv, q) = sph.inverse_evaluate(&p);
        assert_relative_eq!(uv.x, uv0.x, epsilon = 1e-10);
        assert_relative_eq!(uv.y, uv0.y, epsilon = 1e-10);
        assert_relative_eq!((q - p).norm(), 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_cone_derivatives() {
        let cone = ConeSurface::new(Point3::origin(), Vec3::z(), 0.5);
        check_surface_derivs(&cone, Point2::new(0.9, 2.0));
    }

    #[test]
    fn test_torus_derivatives_and_inverse() {
        let tor = TorusSurface::new(Point3::origin(), Vec3::z(), 3.0, 1.0);
        check_surface_derivs(&tor, Point2::new(0.8, 1.1));
        let uv0 = Point2::new(0.8, 1.1);
        let p = tor.evaluate(uv0).point;
        let (uv, _) = tor.inverse_evaluate(&p);
        assert_relative_eq!(uv.x, uv0.x, epsilon = 1e-10);
        assert_relative_eq!(uv.y, uv0.y, epsilon = 1e-10);
    }

    #[test]
    fn test_interior_quad_fill_uniform_square() {
        let plane = Plane::new(Point3::origin(), Vec3::x(), Vec3::y());
        let (nu, nv) = (4usize, 5usize);
        let mut grid = vec![Point2::new(0.0, 0.0); nu * nv];
        for i in 0..nu {
            let u = i as f64 / (nu - 1) as f64;
            grid[i] = Point2::new(u, 0.0);
            grid[(nv - 1) * nu + i] = Point2::new(u, 1.0);
        }
        for j in 0..nv {
            let v = j as f64 / (nv - 1) as f64;
            grid[j * nu] = Point2::new(0.0, v);
            grid[j * nu + nu - 1] = Point2::new(1.0, v);
        }
        let boundary = grid.clone();
        plane.interior_quad_fill(nu, nv, &mut grid);
        for j in 0..nv {
            for i in 0..nu {
                if i == 0 || i == nu - 1 || j == 0 || j == nv - 1 {
                    // boundary ring untouched
                    assert_eq!(grid[j * nu + i], boundary[j * nu + i]);
                } else {
                    // a uniform frame relaxes to the uniform grid
                    assert_relative_eq!(
                        grid[j * nu + i].x,
                        i as f64 / (nu - 1) as f64,
                        epsilon = 1e-9
                    );
                    assert_relative_eq!(
                        grid[j * nu + i].y,
                        j as f64 / (nv - 1) as f64,
                        epsilon = 1e-9
                    );
                }
            }
        }
    }

    #[test]
    fn test_line_pcurve() {
        let pc = LinePcurve::through(0.0, Point2::new(0.0, 1.0), 2.0, Point2::new(4.0, 1.0));
        let uv = pc.evaluate(1.0);
        assert_relative_eq!(uv.x, 2.0);
        assert_relative_eq!(uv.y, 1.0);
    }
}
