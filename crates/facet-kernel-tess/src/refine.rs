//! Surface refinement engine.
//!
//! Operates on the per-Face working mesh: 1-based vertex / triangle /
//! boundary-segment arenas with signed neighbor ids (positive =
//! triangle, negative = boundary segment). Refinement alternates swap
//! sweeps driven by pluggable pair tests with point-insertion phases
//! driven by size, deviation and facet-normal predicates, using the
//! midpoint hash to avoid re-evaluating the surface.

use facet_kernel_geom::Surface;
use facet_kernel_math::{area2d, dist2, dot_normals, Point2, Point3};

use crate::hash::MidpointHash;

pub(crate) const NOTFILLED: i8 = -1;
pub(crate) const TOBEFILLED: i8 = -2;
const ANGTOL: f64 = 1.0e-6;
const DEVANG: f64 = 2.85;
const CUTANG: f64 = 3.10;
const MAXANG: f64 = 3.13;
const FLOOD_DEPTH: i32 = 6;

/// Reference triangle side definition: side s is opposite vertex s.
pub(crate) const SIDES: [[usize; 2]; 3] = [[1, 2], [2, 0], [0, 1]];

/// Classification of a working-mesh vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum VertKind {
    /// A topological Node; `degen` marks Nodes reached through a
    /// degenerate Edge (parametric singularities).
    Node { node: i32, degen: bool },
    /// Sample `index` (1-based) of body Edge `edge`.
    Edge { edge: i32, index: i32 },
    /// Interior Face vertex.
    Face,
}

impl VertKind {
    pub(crate) fn is_degen_node(&self) -> bool {
        matches!(self, VertKind::Node { degen: true, .. })
    }

    pub(crate) fn is_face(&self) -> bool {
        matches!(self, VertKind::Face)
    }
}

/// A working-mesh vertex.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TriVert {
    pub kind: VertKind,
    pub xyz: Point3,
    pub uv: Point2,
}

/// A working-mesh triangle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TriTri {
    /// 1-based vertex ids.
    pub verts: [i32; 3],
    /// Signed neighbor ids: >0 triangle, <0 boundary segment, 0 open.
    pub nbrs: [i32; 3],
    /// Cached surface midpoint (centroid image).
    pub mid: Point3,
    /// Squared 3D area measure used by the break phase.
    pub area: f64,
    /// Bit s set when side s is a swap candidate.
    pub mark: u8,
    /// Midpoint state: TOBEFILLED, NOTFILLED, 0 ok, 1 close-to-Edge.
    pub close: i8,
    pub hit: bool,
    pub count: u32,
}

/// A boundary segment of the Face.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TriSeg {
    /// 1-based vertex ids.
    pub verts: [i32; 2],
    /// Triangle adjacent to this segment (filled by stitching).
    pub neighbor: i32,
    /// Owning body Edge index, sign carrying the traversal sense.
    pub edge: i32,
    /// Edge sample index (1-based) at the segment start.
    pub index: i32,
}

/// Working mesh and refinement state for one Face.
pub(crate) struct WorkMesh<'a> {
    pub face_index: usize,
    pub surf: &'a dyn Surface,
    /// Required sign of parameter-plane areas (+1 forward, -1 reversed).
    pub or_uv: f64,
    pub planar: bool,
    pub phase: i32,
    /// dv/du scale applied to v when measuring UV angles.
    pub v_over_u: f64,
    pub maxlen: f64,
    pub chord: f64,
    pub dotnrm: f64,
    pub accum: f64,
    /// Half the largest boundary segment length², for close tests.
    pub edist2: f64,
    /// A quarter of the smallest boundary segment length².
    pub eps2: f64,
    /// Largest Edge deviation² / 256.
    pub devia2: f64,
    pub verts: Vec<TriVert>,
    pub tris: Vec<TriTri>,
    pub segs: Vec<TriSeg>,
    pub hash: Option<MidpointHash>,
    /// Neighbor-graph probe depth for the refine close test.
    pub refine_depth: i32,
    /// Neighbor-graph probe depth for the split close test.
    pub split_depth: i32,
}

/// A swap pair test: `(t1, side, t2)` with 0-based triangle slots.
type SwapTest<'a> = fn(&mut WorkMesh<'a>, usize, usize, usize) -> bool;

/// Squared distance from `pt2` to the segment `pt0`–`pt1`, or a huge
/// value when the projection falls outside the (slightly padded) span.
fn seg_intersect2(pt0: &Point3, pt1: &Point3, pt2: &Point3) -> f64 {
    let x0 = pt0 - pt2;
    let x1 = pt1 - pt2;
    let n2 = x0.cross(&x1);
    if n2.norm_squared() == 0.0 {
        return 1.0e20;
    }
    let d = x1.norm_squared();
    if d == 0.0 {
        return 1.0e20;
    }
    let n2 = n2 / n2.norm();
    let n0 = x1 / d.sqrt();
    let n1 = n0.cross(&n2);

    let px = |p: &Point3| (n0.dot(&p.coords), n1.dot(&p.coords));
    let (x0u, x0v) = px(pt0);
    let (x1u, x1v) = px(pt1);
    let (x2u, x2v) = px(pt2);

    let angle = (x1v - x0v).atan2(x1u - x0u);
    let (sinan, cosan) = angle.sin_cos();
    let len = ((x1v - x0v).powi(2) + (x1u - x0u).powi(2)).sqrt();
    let t = ((x2v - x0v) * cosan - (x2u - x0u) * sinan) / len;
    if !(-0.01..=1.01).contains(&t) {
        return 1.0e40;
    }
    let p = pt0 + t * (pt1 - pt0);
    dist2(&p, pt2)
}

/// Normalized distance from `pt2` to its projection on the ray
/// `pt0`→`pt1`, in units of the segment length.
fn ray_intersect(pt0: &Point3, pt1: &Point3, pt2: &Point3) -> f64 {
    let dx = pt1 - pt0;
    let d = dx.norm();
    if d == 0.0 {
        tracing::warn!("zero-length boundary segment in ray probe");
        return 100.0;
    }
    let dxn = dx / d;
    let dp = pt2 - pt0;
    let mut dist = dp.norm();
    let dpn = if dist != 0.0 { dp / dist } else { dp };
    dist *= dxn.dot(&dpn) / d;
    let px = pt0 + dist * (pt1 - pt0) - pt2;
    px.norm() / d
}

impl<'a> WorkMesh<'a> {
    pub(crate) fn new(
        face_index: usize,
        surf: &'a dyn Surface,
        or_uv: f64,
        planar: bool,
        maxlen: f64,
        chord: f64,
        dotnrm: f64,
        refine_depth: i32,
        split_depth: i32,
    ) -> Self {
        Self {
            face_index,
            surf,
            or_uv,
            planar,
            phase: 0,
            v_over_u: 1.0,
            maxlen,
            chord,
            dotnrm,
            accum: 0.0,
            edist2: 0.0,
            eps2: f64::MAX,
            devia2: 0.0,
            verts: Vec::new(),
            tris: Vec::new(),
            segs: Vec::new(),
            hash: None,
            refine_depth,
            split_depth,
        }
    }

    #[inline]
    pub(crate) fn vert(&self, id: i32) -> &TriVert {
        &self.verts[(id - 1) as usize]
    }

    pub(crate) fn add_vert(&mut self, kind: VertKind, xyz: Point3, uv: Point2) -> i32 {
        self.verts.push(TriVert { kind, xyz, uv });
        self.verts.len() as i32
    }

    // --- close-to-boundary probes -------------------------------------

    fn rec_close2edge(&self, t0: usize, xyz: &Point3, depth: i32) -> bool {
        if depth <= 0 {
            return false;
        }
        let tri = self.tris[t0];
        for side in 0..3 {
            let tn = tri.nbrs[side];
            if tn <= 0 {
                let a = self.vert(tri.verts[SIDES[side][0]]).xyz;
                let b = self.vert(tri.verts[SIDES[side][1]]).xyz;
                if seg_intersect2(&a, &b, xyz) < self.edist2 {
                    return true;
                }
            } else if self.rec_close2edge((tn - 1) as usize, xyz, depth - 1) {
                return true;
            }
        }
        false
    }

    /// Deep probe used by the refinement predicates.
    pub(crate) fn close2edge(&self, t0: usize, xyz: &Point3) -> bool {
        self.rec_close2edge(t0, xyz, self.refine_depth)
    }

    fn rec_close_edge(&self, t0: usize, xyz: &Point3, depth: i32) -> bool {
        if depth <= 0 {
            return false;
        }
        let tri = self.tris[t0];
        for side in 0..3 {
            let tn = tri.nbrs[side];
            if tn <= 0 {
                let a = self.vert(tri.verts[SIDES[side][0]]).xyz;
                let b = self.vert(tri.verts[SIDES[side][1]]).xyz;
                if ray_intersect(&a, &b, xyz) < 0.125 {
                    return true;
                }
            } else if self.rec_close_edge((tn - 1) as usize, xyz, depth - 1) {
                return true;
            }
        }
        false
    }

    /// Shallow probe used when seeding midpoints after splits.
    pub(crate) fn close_edge(&self, t0: usize, xyz: &Point3) -> bool {
        self.rec_close_edge(t0, xyz, self.split_depth)
    }

    // --- geometric pair measures --------------------------------------

    /// True when the point is NOT strictly interior to the triangle
    /// under projection onto its plane (fuzz in barycentric units).
    fn out_of_tri(&self, t1: usize, xyz: &Point3, fuzz: f64) -> bool {
        let tri = self.tris[t1];
        let p0 = self.vert(tri.verts[0]).xyz;
        let p1 = self.vert(tri.verts[1]).xyz;
        let p2 = self.vert(tri.verts[2]).xyz;
        let x1 = p1 - p0;
        let x2 = p2 - p0;
        let n2 = x1.cross(&x2);
        if n2.norm_squared() == 0.0 {
            return true;
        }
        let n2 = n2 / n2.norm();
        let d = x2.norm_squared();
        if d == 0.0 {
            return true;
        }
        let n0 = x2 / d.sqrt();
        let n1 = n0.cross(&n2);

        let px = |p: &Point3| (n0.dot(&p.coords), n1.dot(&p.coords));
        let (x0u, x0v) = px(&p0);
        let (x1u, x1v) = px(&p1);
        let (x2u, x2v) = px(&p2);
        let (xpu, xpv) = px(xyz);

        let dx1 = x0u - x2u;
        let dy1 = x0v - x2v;
        let dx2 = x1u - x2u;
        let dy2 = x1v - x2v;
        let det = dx1 * dy2 - dy1 * dx2;
        if det == 0.0 {
            return true;
        }
        let dxx = xpu - x2u;
        let dyy = xpv - x2v;
        let w0 = (dxx * dy2 - dyy * dx2) / det;
        let w1 = -(dxx * dy1 - dyy * dx1) / det;
        let w2 = 1.0 - w0 - w1;
        w0 <= fuzz || w1 <= fuzz || w2 <= fuzz
    }

    /// Would swapping the shared side of `(t1, t2)` leave both new
    /// triangles with the correct parameter-plane orientation?
    fn check_or(&self, t1: usize, side: usize, t2: usize) -> bool {
        let a = self.tris[t1];
        let b = self.tris[t2];
        let i0 = a.verts[side];
        let i1 = a.verts[SIDES[side][0]];
        let i2 = a.verts[SIDES[side][1]];
        let i3 = b.verts[0] + b.verts[1] + b.verts[2] - i1 - i2;

        let a1 = area2d(self.vert(i0).uv, self.vert(i1).uv, self.vert(i3).uv);
        let a2 = area2d(self.vert(i0).uv, self.vert(i3).uv, self.vert(i2).uv);
        if a1 * a2 <= 0.0 {
            return false;
        }
        if a1 * self.or_uv > 0.0 {
            return true;
        }
        tracing::warn!(
            face = self.face_index,
            phase = self.phase,
            "swapped pair would have wrong orientation"
        );
        false
    }

    fn max_xyz_angle(&self, i1: i32, i2: i32, i3: i32) -> f64 {
        let p1 = self.vert(i1).xyz;
        let p2 = self.vert(i2).xyz;
        let p3 = self.vert(i3).xyz;
        let v1 = p2 - p1;
        let v2 = p3 - p1;
        let ang0 = v1.cross(&v2).norm().atan2(v1.dot(&v2));
        let v1 = -v1;
        let v2 = p3 - p2;
        let ang1 = v1.cross(&v2).norm().atan2(v1.dot(&v2));
        let ang2 = std::f64::consts::PI - ang1 - ang0;
        ang0.max(ang1).max(ang2)
    }

    fn max_uv_angle(&self, i1: i32, i2: i32, i3: i32) -> f64 {
        let s = self.v_over_u;
        let q1 = self.vert(i1).uv;
        let q2 = self.vert(i2).uv;
        let q3 = self.vert(i3).uv;
        let v1 = [q2.x - q1.x, (q2.y - q1.y) * s];
        let v2 = [q3.x - q1.x, (q3.y - q1.y) * s];
        let sina = (v1[0] * v2[1] - v1[1] * v2[0]).abs();
        let ang0 = sina.atan2(v1[0] * v2[0] + v1[1] * v2[1]);
        let v1 = [-v1[0], -v1[1]];
        let v2 = [q3.x - q2.x, (q3.y - q2.y) * s];
        let sina = (v1[0] * v2[1] - v1[1] * v2[0]).abs();
        let ang1 = sina.atan2(v1[0] * v2[0] + v1[1] * v2[1]);
        let ang2 = std::f64::consts::PI - ang1 - ang0;
        ang0.max(ang1).max(ang2)
    }

    fn pair_ids(&self, t1: usize, iedg: usize, t2: usize) -> (i32, i32, i32, i32) {
        let a = self.tris[t1];
        let b = self.tris[t2];
        let i0 = a.verts[iedg];
        let i1 = a.verts[SIDES[iedg][0]];
        let i2 = a.verts[SIDES[iedg][1]];
        let i3 = b.verts[0] + b.verts[1] + b.verts[2] - i1 - i2;
        (i0, i1, i2, i3)
    }

    // --- swap pair tests ----------------------------------------------

    fn ang_xyz_test(ts: &mut WorkMesh, t1: usize, iedg: usize, t2: usize) -> bool {
        let (i0, i1, i2, i3) = ts.pair_ids(t1, iedg, t2);
        let angle_now = ts
            .max_xyz_angle(i0, i1, i2)
            .max(ts.max_xyz_angle(i1, i3, i2));

        // proposed orientations sane?
        if ts.phase != -3 {
            let p0 = ts.vert(i0).xyz;
            let p1 = ts.vert(i1).xyz;
            let p2 = ts.vert(i2).xyz;
            let p3 = ts.vert(i3).xyz;
            let n1 = (p1 - p0).cross(&(p3 - p0));
            let n2 = (p2 - p3).cross(&(p0 - p3));
            if n1.norm_squared() == 0.0 || n2.norm_squared() == 0.0 {
                ts.accum = ts.accum.max(angle_now);
                return false;
            }
            let dot = n1.dot(&n2) / (n1.norm() * n2.norm());
            if dot < ts.dotnrm {
                ts.accum = ts.accum.max(angle_now);
                return false;
            }
        }

        let angle_swap = ts
            .max_xyz_angle(i0, i1, i3)
            .max(ts.max_xyz_angle(i0, i3, i2));
        if angle_swap + ANGTOL >= angle_now {
            ts.accum = ts.accum.max(angle_now);
            return false;
        }
        ts.accum = ts.accum.max(angle_swap);
        true
    }

    fn ang_uv_test(ts: &mut WorkMesh, t1: usize, iedg: usize, t2: usize) -> bool {
        let (i0, i1, i2, i3) = ts.pair_ids(t1, iedg, t2);
        let angle_now = ts.max_uv_angle(i0, i1, i2).max(ts.max_uv_angle(i1, i3, i2));
        let angle_swap = ts.max_uv_angle(i0, i1, i3).max(ts.max_uv_angle(i0, i3, i2));
        if angle_swap + ANGTOL < angle_now {
            ts.accum = ts.accum.max(angle_swap);
            true
        } else {
            ts.accum = ts.accum.max(angle_now);
            false
        }
    }

    fn area_test(ts: &mut WorkMesh, t1: usize, iedg: usize, t2: usize) -> bool {
        let (i0, i1, i2, i3) = ts.pair_ids(t1, iedg, t2);
        let a1 = area2d(ts.vert(i0).uv, ts.vert(i1).uv, ts.vert(i2).uv);
        let a2 = area2d(ts.vert(i1).uv, ts.vert(i3).uv, ts.vert(i2).uv);
        if a1 * ts.or_uv > 0.0 && a2 * ts.or_uv > 0.0 {
            return false;
        }
        let a1 = area2d(ts.vert(i0).uv, ts.vert(i1).uv, ts.vert(i3).uv);
        let a2 = area2d(ts.vert(i0).uv, ts.vert(i3).uv, ts.vert(i2).uv);
        a1 * ts.or_uv > 0.0 && a2 * ts.or_uv > 0.0
    }

    fn diag_test(ts: &mut WorkMesh, t1: usize, iedg: usize, t2: usize) -> bool {
        let (i0, i1, i2, i3) = ts.pair_ids(t1, iedg, t2);
        let p0 = ts.vert(i0).xyz;
        let p1 = ts.vert(i1).xyz;
        let p2 = ts.vert(i2).xyz;
        let p3 = ts.vert(i3).xyz;

        // current configuration: diagonal i1-i2
        let mut old = -2.0;
        let n1 = (p1 - p0).cross(&(p2 - p0));
        if n1.norm_squared() != 0.0 {
            let n2 = (p2 - p3).cross(&(p1 - p3));
            if n2.norm_squared() != 0.0 {
                old = n1.dot(&n2) / (n1.norm() * n2.norm());
            }
        }

        // swapped configuration: diagonal i0-i3
        let n1 = (p3 - p1).cross(&(p0 - p1));
        if n1.norm_squared() == 0.0 {
            return false;
        }
        let n2 = (p0 - p2).cross(&(p3 - p2));
        if n2.norm_squared() == 0.0 {
            return false;
        }
        let new = n1.dot(&n2) / (n1.norm() * n2.norm());

        if new > old + ANGTOL {
            let angle = ts.max_uv_angle(i0, i1, i3).max(ts.max_uv_angle(i0, i3, i2));
            if angle > MAXANG {
                ts.accum = ts.accum.min(old);
                return false;
            }
            ts.accum = ts.accum.min(new);
            true
        } else {
            ts.accum = ts.accum.min(old);
            false
        }
    }

    // --- midpoint management ------------------------------------------

    /// Seed (or re-seed) the cached surface midpoint of a triangle.
    /// `close` of 0 marks the midpoint known-far; anything else forces
    /// the close probe to re-run.
    fn fill_mid(&mut self, t1: usize, close: i8) {
        self.tris[t1].close = TOBEFILLED;
        if self.phase < 1 || self.phase > 2 {
            return;
        }
        let tri = self.tris[t1];
        for &v in &tri.verts {
            if self.vert(v).kind.is_degen_node() {
                return;
            }
        }
        let (q0, q1, q2) = (
            self.vert(tri.verts[0]).uv,
            self.vert(tri.verts[1]).uv,
            self.vert(tri.verts[2]).uv,
        );
        let uv = Point2::new((q0.x + q1.x + q2.x) / 3.0, (q0.y + q1.y + q2.y) / 3.0);
        let mid = self.surf.evaluate(uv).point;
        self.tris[t1].mid = mid;
        self.tris[t1].close = close;
        if close != 0 {
            self.tris[t1].close = i8::from(self.close_edge(t1, &mid));
        }
    }

    /// Set or clear the mark bit of triangle `n` (1-based) on the side
    /// facing triangle `t` (0-based).
    fn mark_toward(&mut self, n: i32, t: usize, on: bool) {
        if n <= 0 {
            return;
        }
        let n = (n - 1) as usize;
        for j in 0..3 {
            if self.tris[n].nbrs[j] - 1 == t as i32 {
                if on {
                    self.tris[n].mark |= 1 << j;
                } else {
                    self.tris[n].mark &= !(1u8 << j);
                }
            }
        }
    }

    /// Re-derive the mark bits of a triangle against all its neighbors.
    fn remark(&mut self, t: usize) {
        for j in 0..3 {
            let n = self.tris[t].nbrs[j];
            if n <= 0 {
                continue;
            }
            if self.check_or(t, j, (n - 1) as usize) {
                self.tris[t].mark |= 1 << j;
                self.mark_toward(n, t, true);
            } else {
                self.mark_toward(n, t, false);
            }
        }
    }

    // --- swap sweep ---------------------------------------------------

    /// Sweep all marked sides with `test`, swapping accepted pairs,
    /// until a sweep performs no swap (or 200 sweeps). `start` seeds
    /// the accumulated measure.
    fn swap_tris(&mut self, test: SwapTest<'a>, start: f64) {
        for t in self.tris.iter_mut() {
            t.hit = false;
        }
        let mut count = 0;
        loop {
            self.accum = start;
            let mut swaps = 0;
            for t in self.tris.iter_mut() {
                t.count = 0;
            }

            for t1 in 0..self.tris.len() {
                for side in 0..3 {
                    if self.tris[t1].mark & (1 << side) == 0 {
                        continue;
                    }
                    let t2i = self.tris[t1].nbrs[side] - 1;
                    if t2i <= t1 as i32 {
                        continue;
                    }
                    let t2 = t2i as usize;
                    if self.tris[t1].hit && self.tris[t2].hit {
                        continue;
                    }
                    if !test(self, t1, side, t2) {
                        continue;
                    }
                    self.tris[t1].hit = false;
                    self.tris[t2].hit = false;
                    self.tris[t1].count += 1;
                    self.tris[t2].count += 1;

                    // keep hashed midpoints of the pair being retired
                    if self.phase == TOBEFILLED as i32 {
                        for &t in &[t1, t2] {
                            let tr = self.tris[t];
                            if tr.close != TOBEFILLED {
                                if let Some(h) = self.hash.as_mut() {
                                    h.insert(
                                        tr.verts[0],
                                        tr.verts[1],
                                        tr.verts[2],
                                        tr.close,
                                        tr.mid,
                                    );
                                }
                            }
                        }
                    }

                    let mut os = 0;
                    if self.tris[t2].nbrs[1] - 1 == t1 as i32 {
                        os = 1;
                    }
                    if self.tris[t2].nbrs[2] - 1 == t1 as i32 {
                        os = 2;
                    }
                    let i0 = self.tris[t1].verts[side];
                    let i1 = self.tris[t1].verts[SIDES[side][0]];
                    let i2 = self.tris[t1].verts[SIDES[side][1]];
                    let i3 = self.tris[t2].verts[os];

                    let n11 = self.tris[t1].nbrs[SIDES[side][0]];
                    let n12 = self.tris[t1].nbrs[SIDES[side][1]];
                    let (n21, n22) = if self.tris[t2].verts[SIDES[os][0]] == i1 {
                        (self.tris[t2].nbrs[SIDES[os][0]], self.tris[t2].nbrs[SIDES[os][1]])
                    } else {
                        (self.tris[t2].nbrs[SIDES[os][1]], self.tris[t2].nbrs[SIDES[os][0]])
                    };

                    self.tris[t1].verts = [i1, i3, i0];
                    self.tris[t1].nbrs = [t2 as i32 + 1, n12, n22];
                    self.tris[t1].mark = 1;
                    if n22 > 0 {
                        for i in 0..3 {
                            if self.tris[(n22 - 1) as usize].nbrs[i] == t2 as i32 + 1 {
                                self.tris[(n22 - 1) as usize].nbrs[i] = t1 as i32 + 1;
                            }
                        }
                    }
                    if n12 > 0 {
                        let on = self.check_or(t1, 1, (n12 - 1) as usize);
                        if on {
                            self.tris[t1].mark |= 2;
                        }
                        self.mark_toward(n12, t1, on);
                    }
                    if n22 > 0 {
                        let on = self.check_or(t1, 2, (n22 - 1) as usize);
                        if on {
                            self.tris[t1].mark |= 4;
                        }
                        self.mark_toward(n22, t1, on);
                    }

                    self.tris[t2].verts = [i2, i0, i3];
                    self.tris[t2].nbrs = [t1 as i32 + 1, n21, n11];
                    self.tris[t2].mark = 1;
                    if n11 > 0 {
                        for i in 0..3 {
                            if self.tris[(n11 - 1) as usize].nbrs[i] == t1 as i32 + 1 {
                                self.tris[(n11 - 1) as usize].nbrs[i] = t2 as i32 + 1;
                            }
                        }
                    }
                    if n21 > 0 {
                        let on = self.check_or(t2, 1, (n21 - 1) as usize);
                        if on {
                            self.tris[t2].mark |= 2;
                        }
                        self.mark_toward(n21, t2, on);
                    }
                    if n11 > 0 {
                        let on = self.check_or(t2, 2, (n11 - 1) as usize);
                        if on {
                            self.tris[t2].mark |= 4;
                        }
                        self.mark_toward(n11, t2, on);
                    }

                    let close = if self.tris[t1].close == 0 && self.tris[t2].close == 0 {
                        0
                    } else {
                        NOTFILLED
                    };
                    self.fill_mid(t1, close);
                    self.fill_mid(t2, close);
                    swaps += 1;
                }
            }

            for t in self.tris.iter_mut() {
                t.hit = t.count == 0;
            }
            count += 1;
            if swaps == 0 || count >= 200 {
                break;
            }
        }

        // one last sweep for the accumulated statistic
        self.accum = start;
        for t1 in 0..self.tris.len() {
            for side in 0..3 {
                if self.tris[t1].mark & (1 << side) == 0 {
                    continue;
                }
                let t2 = self.tris[t1].nbrs[side] - 1;
                if t2 > t1 as i32 {
                    test(self, t1, side, t2 as usize);
                }
            }
        }
    }

    // --- split / collapse ---------------------------------------------

    /// Collapse the interior vertex `node` onto `tnode`, removing the
    /// two triangles sharing the connecting edge.
    fn collapse_edge(&mut self, node: i32, tnode: i32) {
        if !self.vert(node).kind.is_face() {
            tracing::warn!("collapse target is not an interior vertex");
            return;
        }

        let mut tin: Vec<usize> = Vec::new();
        for (i, t) in self.tris.iter().enumerate() {
            if t.verts.contains(&node) {
                tin.push(i);
            }
        }

        let mut t = [0usize; 2];
        let mut inn = [[0usize; 2]; 2];
        let mut nn = 0;
        for &t1 in &tin {
            for j in 0..3 {
                if self.tris[t1].verts[j] == tnode {
                    if nn < 2 {
                        t[nn] = t1;
                        inn[nn][0] = j;
                        inn[nn][1] = 0;
                        if self.tris[t1].verts[1] == node {
                            inn[nn][1] = 1;
                        }
                        if self.tris[t1].verts[2] == node {
                            inn[nn][1] = 2;
                        }
                    }
                    nn += 1;
                }
            }
        }
        if nn != 2 {
            tracing::warn!(ntris = nn, "collapse side is not manifold");
            return;
        }
        tin.retain(|&i| i != t[0] && i != t[1]);

        let nverts = self.verts.len() as i32;
        let t1 = self.tris.len() - 2;
        let t2 = t1 + 1;

        // move the vertex to the end of the list
        if nverts != node {
            self.verts.swap((nverts - 1) as usize, (node - 1) as usize);
            for tr in self.tris.iter_mut() {
                for v in tr.verts.iter_mut() {
                    if *v == node {
                        *v = nverts;
                    } else if *v == nverts {
                        *v = node;
                    }
                }
            }
        }
        // substitute the removed vertex by the survivor
        let survivor = if nverts == tnode { node } else { tnode };
        for tr in self.tris.iter_mut() {
            for v in tr.verts.iter_mut() {
                if *v == nverts {
                    *v = survivor;
                }
            }
        }

        // shift the two dead triangles to the end of the list
        if t1 != t[0] {
            self.tris.swap(t1, t[0]);
            if t[1] == t1 {
                t[1] = t[0];
            }
            for tr in self.tris.iter_mut() {
                for n in tr.nbrs.iter_mut() {
                    if *n == t1 as i32 + 1 {
                        *n = t[0] as i32 + 1;
                    } else if *n == t[0] as i32 + 1 {
                        *n = t1 as i32 + 1;
                    }
                }
            }
        }
        t[0] = t1;
        if t2 != t[1] {
            self.tris.swap(t2, t[1]);
            for tr in self.tris.iter_mut() {
                for n in tr.nbrs.iter_mut() {
                    if *n == t2 as i32 + 1 {
                        *n = t[1] as i32 + 1;
                    } else if *n == t[1] as i32 + 1 {
                        *n = t2 as i32 + 1;
                    }
                }
            }
        }
        t[1] = t2;

        // wire the flanking neighbors of each dead triangle together
        for i in 0..2 {
            let n1 = self.tris[t[i]].nbrs[inn[i][0]];
            let n2 = self.tris[t[i]].nbrs[inn[i][1]];
            for j in 0..3 {
                if n1 > 0 && self.tris[(n1 - 1) as usize].nbrs[j] == t[i] as i32 + 1 {
                    self.tris[(n1 - 1) as usize].nbrs[j] = n2;
                }
                if n2 > 0 && self.tris[(n2 - 1) as usize].nbrs[j] == t[i] as i32 + 1 {
                    self.tris[(n2 - 1) as usize].nbrs[j] = n1;
                }
            }
        }

        self.verts.pop();
        self.tris.pop();
        self.tris.pop();

        // rebuild marks and midpoints around the hole
        for &i in &tin {
            self.tris[i].mark = 0;
        }
        for &i in &tin {
            self.remark(i);
            self.fill_mid(i, NOTFILLED);
        }
    }

    /// Split triangle `t0` at an interior point, producing two new
    /// triangles at the end of the list.
    pub(crate) fn split_tri(&mut self, t0: usize, uv: Point2, point: Point3) {
        let node = self.add_vert(VertKind::Face, point, uv);
        let tri = self.tris[t0];
        let indices = tri.verts;
        let neighbr = tri.nbrs;

        let t1 = self.tris.len();
        let t2 = t1 + 1;

        self.tris[t0].mark = 0;
        self.tris[t0].verts[2] = node;
        self.tris[t0].nbrs[0] = t1 as i32 + 1;
        self.tris[t0].nbrs[1] = t2 as i32 + 1;

        self.tris.push(TriTri {
            verts: [indices[1], indices[2], node],
            nbrs: [t2 as i32 + 1, t0 as i32 + 1, neighbr[0]],
            mid: Point3::origin(),
            area: 0.0,
            mark: 0,
            close: NOTFILLED,
            hit: false,
            count: 0,
        });
        if neighbr[0] > 0 {
            let nb = (neighbr[0] - 1) as usize;
            let mut j = 0;
            if self.tris[nb].nbrs[1] == t0 as i32 + 1 {
                j = 1;
            }
            if self.tris[nb].nbrs[2] == t0 as i32 + 1 {
                j = 2;
            }
            self.tris[nb].nbrs[j] = t1 as i32 + 1;
        }

        self.tris.push(TriTri {
            verts: [indices[2], indices[0], node],
            nbrs: [t0 as i32 + 1, t1 as i32 + 1, neighbr[1]],
            mid: Point3::origin(),
            area: 0.0,
            mark: 0,
            close: NOTFILLED,
            hit: false,
            count: 0,
        });
        if neighbr[1] > 0 {
            let nb = (neighbr[1] - 1) as usize;
            let mut j = 0;
            if self.tris[nb].nbrs[1] == t0 as i32 + 1 {
                j = 1;
            }
            if self.tris[nb].nbrs[2] == t0 as i32 + 1 {
                j = 2;
            }
            self.tris[nb].nbrs[j] = t2 as i32 + 1;
        }

        self.fill_mid(t0, NOTFILLED);
        self.fill_mid(t1, NOTFILLED);
        self.fill_mid(t2, NOTFILLED);
        for &t in &[t0, t1, t2] {
            self.remark(t);
        }
    }

    /// Split the shared side of `(t1, t2)` at the surface image of the
    /// side midpoint, producing two new triangles. With `side_mid` set,
    /// refuses splits whose halves collapse below an eighth of the span.
    fn split_side(&mut self, t1: usize, side: usize, t2: usize, side_mid: bool) -> bool {
        let mut os = 0;
        if self.tris[t2].nbrs[1] == t1 as i32 + 1 {
            os = 1;
        }
        if self.tris[t2].nbrs[2] == t1 as i32 + 1 {
            os = 2;
        }

        let i0 = self.tris[t1].verts[side];
        let i1 = self.tris[t1].verts[SIDES[side][0]];
        let i2 = self.tris[t1].verts[SIDES[side][1]];
        let i3 = self.tris[t2].verts[os];

        let (uv, point) = if self.vert(i1).kind.is_degen_node() || self.vert(i2).kind.is_degen_node()
        {
            let xyz = Point3::new(
                0.5 * (self.vert(i1).xyz.x + self.vert(i2).xyz.x),
                0.5 * (self.vert(i1).xyz.y + self.vert(i2).xyz.y),
                0.5 * (self.vert(i1).xyz.z + self.vert(i2).xyz.z),
            );
            let (uv, p) = self.surf.inverse_evaluate(&xyz);
            (uv, p)
        } else {
            let qa = self.vert(i1).uv;
            let qb = self.vert(i2).uv;
            let uv = Point2::new(0.5 * (qa.x + qb.x), 0.5 * (qa.y + qb.y));
            (uv, self.surf.evaluate(uv).point)
        };

        if side_mid {
            let d0 = dist2(&self.vert(i1).xyz, &self.vert(i2).xyz);
            let d1 = dist2(&point, &self.vert(i2).xyz);
            let d2 = dist2(&self.vert(i1).xyz, &point);
            if d1 / d0 < 0.125 || d2 / d0 < 0.125 {
                return false;
            }
        }

        let node = self.add_vert(VertKind::Face, point, uv);

        let n11 = self.tris[t1].nbrs[SIDES[side][0]];
        let n12 = self.tris[t1].nbrs[SIDES[side][1]];
        let (n21, n22) = if self.tris[t2].verts[SIDES[os][0]] == i1 {
            (self.tris[t2].nbrs[SIDES[os][0]], self.tris[t2].nbrs[SIDES[os][1]])
        } else {
            (self.tris[t2].nbrs[SIDES[os][1]], self.tris[t2].nbrs[SIDES[os][0]])
        };

        let t = [t1, t2, self.tris.len(), self.tris.len() + 1];
        let close = if self.tris[t1].close == 0 && self.tris[t2].close == 0 {
            0
        } else {
            NOTFILLED
        };

        self.tris[t[0]].mark = 0;
        self.tris[t[0]].verts = [i0, i1, node];
        self.tris[t[0]].nbrs = [t[1] as i32 + 1, t[2] as i32 + 1, n12];

        self.tris[t[1]].mark = 0;
        self.tris[t[1]].verts = [i1, i3, node];
        self.tris[t[1]].nbrs = [t[3] as i32 + 1, t[0] as i32 + 1, n22];

        self.tris.push(TriTri {
            verts: [i2, i0, node],
            nbrs: [t[0] as i32 + 1, t[3] as i32 + 1, n11],
            mid: Point3::origin(),
            area: 0.0,
            mark: 0,
            close: NOTFILLED,
            hit: false,
            count: 0,
        });
        if n11 > 0 {
            let nb = (n11 - 1) as usize;
            let mut j = 0;
            if self.tris[nb].nbrs[1] == t[0] as i32 + 1 {
                j = 1;
            }
            if self.tris[nb].nbrs[2] == t[0] as i32 + 1 {
                j = 2;
            }
            self.tris[nb].nbrs[j] = t[2] as i32 + 1;
        }

        self.tris.push(TriTri {
            verts: [i3, i2, node],
            nbrs: [t[2] as i32 + 1, t[1] as i32 + 1, n21],
            mid: Point3::origin(),
            area: 0.0,
            mark: 0,
            close: NOTFILLED,
            hit: false,
            count: 0,
        });
        if n21 > 0 {
            let nb = (n21 - 1) as usize;
            let mut j = 0;
            if self.tris[nb].nbrs[1] == t[1] as i32 + 1 {
                j = 1;
            }
            if self.tris[nb].nbrs[2] == t[1] as i32 + 1 {
                j = 2;
            }
            self.tris[nb].nbrs[j] = t[3] as i32 + 1;
        }

        for &ti in &t {
            self.fill_mid(ti, close);
        }
        for &ti in &t {
            self.remark(ti);
        }
        true
    }

    fn flood_tri_graph(&mut self, t: usize, depth: i32) {
        if depth <= 0 {
            return;
        }
        self.tris[t].hit = true;
        for side in 0..3 {
            let tn = self.tris[t].nbrs[side];
            if tn > 0 {
                self.flood_tri_graph((tn - 1) as usize, depth - 1);
            }
        }
    }

    // --- insertion phases ---------------------------------------------

    /// Split large triangles; `geom_mode` (Phase A) targets pairs with
    /// inverted or tiny neighbors, the hashed mode (Phase C) targets
    /// triangles whose centroid image escapes them.
    fn break_tri(&mut self, geom_mode: bool, stri: usize, split_carry: &mut usize) -> usize {
        let mut split = 0;

        for i in 0..self.tris.len() {
            self.tris[i].hit = true;
            let tri = self.tris[i];
            let i0 = tri.verts[0];
            let i1 = tri.verts[1];
            let i2 = tri.verts[2];
            if self.max_uv_angle(i0, i1, i2) > CUTANG {
                continue;
            }
            let p0 = self.vert(i0).xyz;
            let p1 = self.vert(i1).xyz;
            let p2 = self.vert(i2).xyz;
            let n = (p1 - p0).cross(&(p2 - p0));
            self.tris[i].area = n.norm_squared();
            if self.tris[i].area == 0.0 {
                continue;
            }

            let mut dot: f64 = 1.0;
            let mut mina = f64::MAX;
            let mut interior = 0;
            for side in 0..3 {
                if self.tris[i].nbrs[side] <= 0 {
                    continue;
                }
                interior += 1;
                if geom_mode {
                    let t2 = (self.tris[i].nbrs[side] - 1) as usize;
                    let (j0, j1, j2, j3) = self.pair_ids(i, side, t2);
                    dot = dot.min(dot_normals(
                        &self.vert(j0).xyz,
                        &self.vert(j1).xyz,
                        &self.vert(j2).xyz,
                        &self.vert(j3).xyz,
                    ));
                    let q1 = self.vert(j1).xyz - self.vert(j3).xyz;
                    let q2 = self.vert(j2).xyz - self.vert(j3).xyz;
                    mina = mina.min(q1.cross(&q2).norm_squared());
                }
            }
            if interior <= 1 {
                continue;
            }
            if geom_mode && dot > -0.9 && mina / self.tris[i].area > 0.001 {
                continue;
            }

            if dist2(&p1, &p2) <= self.eps2
                || dist2(&p1, &p0) <= self.eps2
                || dist2(&p0, &p2) <= self.eps2
            {
                continue;
            }
            self.tris[i].hit = false;
        }

        loop {
            // largest remaining candidate
            let mut t1 = None;
            let mut area = 0.0;
            for (i, t) in self.tris.iter().enumerate() {
                if !t.hit && t.area > area {
                    t1 = Some(i);
                    area = t.area;
                }
            }
            let Some(t1) = t1 else { break };
            self.tris[t1].hit = true;

            let tri = self.tris[t1];
            let i0 = tri.verts[0];
            let i1 = tri.verts[1];
            let i2 = tri.verts[2];
            let (q0, q1, q2) = (self.vert(i0).uv, self.vert(i1).uv, self.vert(i2).uv);
            let mut uv = Point2::new((q0.x + q1.x + q2.x) / 3.0, (q0.y + q1.y + q2.y) / 3.0);

            let degen = self.vert(i0).kind.is_degen_node()
                || self.vert(i1).kind.is_degen_node()
                || self.vert(i2).kind.is_degen_node();
            let xyz;
            if !geom_mode {
                if degen {
                    continue;
                }
                let cached = self.hash.as_ref().and_then(|h| h.find(i0 - 1, i1 - 1, i2 - 1));
                match cached {
                    Some((_, p)) => xyz = p,
                    None => {
                        let p = self.surf.evaluate(uv).point;
                        if let Some(h) = self.hash.as_mut() {
                            h.insert(i0 - 1, i1 - 1, i2 - 1, 0, p);
                        }
                        xyz = p;
                    }
                }
                // only break triangles whose centroid image escapes them
                if !self.out_of_tri(t1, &xyz, 0.0) {
                    continue;
                }
                let p0 = self.vert(i0).xyz;
                let p1 = self.vert(i1).xyz;
                let p2 = self.vert(i2).xyz;
                if dot_normals(&p0, &p1, &xyz, &p2) < -0.98 {
                    continue;
                }
                if dot_normals(&p1, &p2, &xyz, &p0) < -0.98 {
                    continue;
                }
                if dot_normals(&p2, &p0, &xyz, &p1) < -0.98 {
                    continue;
                }
            } else if degen {
                let p0 = self.vert(i0).xyz;
                let p1 = self.vert(i1).xyz;
                let p2 = self.vert(i2).xyz;
                let c = Point3::new(
                    (p0.x + p1.x + p2.x) / 3.0,
                    (p0.y + p1.y + p2.y) / 3.0,
                    (p0.z + p1.z + p2.z) / 3.0,
                );
                let (q, p) = self.surf.inverse_evaluate(&c);
                uv = q;
                xyz = p;
            } else {
                xyz = self.surf.evaluate(uv).point;
            }
            if self.close_edge(t1, &xyz) {
                continue;
            }

            self.split_tri(t1, uv, xyz);
            split += 1;
            *split_carry += 1;
            if *split_carry > stri {
                *split_carry = 0;
                break;
            }
            self.flood_tri_graph(t1, FLOOD_DEPTH);
        }

        split
    }

    /// Phase 1: split triangles whose cached midpoint deviates from all
    /// three corners while the local dihedral disagrees.
    fn add_facet_norm(&mut self) -> usize {
        let total = self.tris.len();
        let mut split = 0;
        for t1 in 0..total {
            if self.tris[t1].close != 0 {
                continue;
            }
            let interior = (0..3).filter(|&s| self.tris[t1].nbrs[s] > 0).count();
            if interior <= 1 {
                continue;
            }
            let tri = self.tris[t1];
            let i0 = tri.verts[0];
            let i1 = tri.verts[1];
            let i2 = tri.verts[2];
            if self.vert(i0).kind.is_degen_node()
                || self.vert(i1).kind.is_degen_node()
                || self.vert(i2).kind.is_degen_node()
            {
                continue;
            }
            if self.max_uv_angle(i0, i1, i2) > CUTANG {
                continue;
            }
            let mid = tri.mid;
            if dist2(&self.vert(i0).xyz, &mid) < self.devia2
                || dist2(&self.vert(i1).xyz, &mid) < self.devia2
                || dist2(&self.vert(i2).xyz, &mid) < self.devia2
            {
                continue;
            }

            let p0 = self.vert(i0).xyz;
            let p1 = self.vert(i1).xyz;
            let p2 = self.vert(i2).xyz;
            let area = (p1 - p0).cross(&(p2 - p0)).norm_squared();
            let (q0, q1, q2) = (self.vert(i0).uv, self.vert(i1).uv, self.vert(i2).uv);
            let uv = Point2::new((q0.x + q1.x + q2.x) / 3.0, (q0.y + q1.y + q2.y) / 3.0);

            let mut dot = 1.0;
            for side in 0..3 {
                let t2 = self.tris[t1].nbrs[side] - 1;
                if t2 < 0 {
                    continue;
                }
                let t2 = t2 as usize;
                let (j0, j1, j2, j3) = self.pair_ids(t1, side, t2);
                let w1 = self.vert(j1).xyz - self.vert(j3).xyz;
                let w2 = self.vert(j2).xyz - self.vert(j3).xyz;
                if w1.cross(&w2).norm_squared() > area && self.tris[t2].close == 0 {
                    continue;
                }
                let d = dot_normals(
                    &self.vert(j0).xyz,
                    &self.vert(j1).xyz,
                    &self.vert(j2).xyz,
                    &self.vert(j3).xyz,
                );
                if d < dot
                    && dot_normals(&mid, &self.vert(j1).xyz, &self.vert(j2).xyz, &self.vert(j3).xyz)
                        > d
                {
                    dot = d;
                }
            }
            if dot + ANGTOL > self.dotnrm {
                continue;
            }

            self.split_tri(t1, uv, mid);
            split += 1;
        }
        split
    }

    /// Phase 2: split triangles whose centroid strays from the cached
    /// surface midpoint by more than the sag allowance.
    fn add_facet_dist(&mut self) -> usize {
        let total = self.tris.len();
        let mut split = 0;
        let cmp = (self.chord * self.chord).max(self.devia2);
        for t1 in 0..total {
            if self.tris[t1].close != 0 {
                continue;
            }
            let tri = self.tris[t1];
            let i0 = tri.verts[0];
            let i1 = tri.verts[1];
            let i2 = tri.verts[2];
            let (q0, q1, q2) = (self.vert(i0).uv, self.vert(i1).uv, self.vert(i2).uv);
            let uv = Point2::new((q0.x + q1.x + q2.x) / 3.0, (q0.y + q1.y + q2.y) / 3.0);
            let p0 = self.vert(i0).xyz;
            let p1 = self.vert(i1).xyz;
            let p2 = self.vert(i2).xyz;
            let centroid = Point3::new(
                (p0.x + p1.x + p2.x) / 3.0,
                (p0.y + p1.y + p2.y) / 3.0,
                (p0.z + p1.z + p2.z) / 3.0,
            );

            if dist2(&centroid, &tri.mid) <= cmp {
                continue;
            }
            if self.max_uv_angle(i0, i1, i2) > DEVANG {
                continue;
            }
            let xyz = tri.mid;
            if self.out_of_tri(t1, &xyz, 0.10) {
                continue;
            }
            if dot_normals(&p0, &p1, &xyz, &p2) < 0.0 {
                continue;
            }
            if dot_normals(&p1, &p2, &xyz, &p0) < 0.0 {
                continue;
            }
            if dot_normals(&p2, &p0, &xyz, &p1) < 0.0 {
                continue;
            }
            let mut interior = 0;
            let mut short = 0;
            for side in 0..3 {
                let j1 = tri.verts[SIDES[side][0]];
                let j2 = tri.verts[SIDES[side][1]];
                if self.tris[t1].nbrs[side] > 0 {
                    interior += 1;
                }
                if dist2(&self.vert(j1).xyz, &self.vert(j2).xyz) <= cmp {
                    short += 1;
                }
            }
            if short != 0 || interior <= 1 {
                continue;
            }

            self.split_tri(t1, uv, xyz);
            split += 1;
        }
        split
    }

    /// Phase B: split the interior side of any triangle whose endpoints
    /// both lie on (different) boundary Edges.
    fn split_inter(&mut self, side_mid: bool) -> usize {
        let total = self.tris.len();
        for t in self.tris.iter_mut() {
            t.hit = false;
        }
        let mut split = 0;
        for t1 in 0..total {
            if self.tris[t1].hit {
                continue;
            }
            let mut side = None;
            let mut dist = 0.0;
            for j in 0..3 {
                let t2 = self.tris[t1].nbrs[j] - 1;
                if t2 < 0 {
                    continue;
                }
                if self.tris[t2 as usize].hit {
                    continue;
                }
                let i1 = self.tris[t1].verts[SIDES[j][0]];
                let i2 = self.tris[t1].verts[SIDES[j][1]];
                if self.vert(i1).kind.is_face() || self.vert(i2).kind.is_face() {
                    continue;
                }
                let d = dist2(&self.vert(i1).xyz, &self.vert(i2).xyz);
                if d > dist {
                    dist = d;
                    side = Some(j);
                }
            }
            let Some(side) = side else { continue };

            let t2 = (self.tris[t1].nbrs[side] - 1) as usize;
            let (i0, i1, i2, i3) = self.pair_ids(t1, side, t2);
            let d = dot_normals(
                &self.vert(i0).xyz,
                &self.vert(i1).xyz,
                &self.vert(i2).xyz,
                &self.vert(i3).xyz,
            );
            if dist2(&self.vert(i1).xyz, &self.vert(i2).xyz) < self.maxlen * self.maxlen
                && d > self.dotnrm
            {
                continue;
            }

            if self.split_side(t1, side, t2, side_mid) {
                self.flood_tri_graph(t1, FLOOD_DEPTH);
                self.flood_tri_graph(t2, FLOOD_DEPTH);
                split += 1;
            } else {
                self.tris[t1].hit = true;
                self.tris[t2].hit = true;
            }
        }
        split
    }

    /// Undo Phase-B slivers whose apex vertex folded against a boundary:
    /// collapse the apex onto its nearest interior neighbor.
    fn remove_phase_b(&mut self) -> usize {
        let mut count = 0;
        let mut t1 = 0;
        while t1 < self.tris.len() {
            let bnd: Vec<usize> = (0..3).filter(|&j| self.tris[t1].nbrs[j] < 0).collect();
            if bnd.len() != 1 {
                t1 += 1;
                continue;
            }
            let n = bnd[0];
            let vert = self.tris[t1].verts[n];
            let vxyz = self.vert(vert).xyz;
            if !self.close_edge(t1, &vxyz) {
                t1 += 1;
                continue;
            }

            // nearest interior vertex sharing a triangle with the apex
            let mut tnode = None;
            let mut dist = f64::MAX;
            for t2 in 0..self.tris.len() {
                if t1 == t2 || !self.tris[t2].verts.contains(&vert) {
                    continue;
                }
                for j in 0..3 {
                    let i = self.tris[t2].verts[j];
                    if i == vert || !self.vert(i).kind.is_face() {
                        continue;
                    }
                    let d = dist2(&vxyz, &self.vert(i).xyz);
                    if d < dist {
                        dist = d;
                        tnode = Some(i);
                    }
                }
            }
            let Some(tnode) = tnode else {
                t1 += 1;
                continue;
            };

            // both interior neighbors must fold away from this triangle
            let tri = self.tris[t1];
            let p0 = self.vert(tri.verts[0]).xyz;
            let p1 = self.vert(tri.verts[1]).xyz;
            let p2 = self.vert(tri.verts[2]).xyz;
            let n2 = (p1 - p0).cross(&(p2 - p0));
            if n2.norm_squared() == 0.0 {
                t1 += 1;
                continue;
            }
            let n2 = n2 / n2.norm();
            let mut dots = [1.0f64; 2];
            let mut k = 0;
            for j in 0..3 {
                let t2 = self.tris[t1].nbrs[j];
                if t2 < 0 {
                    continue;
                }
                let tb = self.tris[(t2 - 1) as usize];
                let q0 = self.vert(tb.verts[0]).xyz;
                let q1 = self.vert(tb.verts[1]).xyz;
                let q2 = self.vert(tb.verts[2]).xyz;
                let n1 = (q1 - q0).cross(&(q2 - q0));
                if n1.norm_squared() == 0.0 {
                    k += 1;
                    continue;
                }
                dots[k] = (n1 / n1.norm()).dot(&n2);
                k += 1;
            }
            if !(dots[0] < 0.866 && dots[1] < 0.866) {
                t1 += 1;
                continue;
            }

            self.collapse_edge(vert, tnode);
            count += 1;
            t1 += 1;
        }
        count
    }

    /// Phase D / planar length cap: split the longest interior side
    /// above the limit, largest first.
    fn add_side_dist(&mut self, iter: usize, maxlen2: f64, side_mid: bool) -> usize {
        for t in self.tris.iter_mut() {
            t.hit = false;
        }
        let mut split = 0;
        let mindist = maxlen2.max(self.devia2);
        let emndist = mindist.max(self.edist2).max(self.eps2);

        loop {
            let mut dist = 0.0;
            let mut found: Option<(usize, usize)> = None;
            for i in 0..self.tris.len() {
                if self.tris[i].hit {
                    continue;
                }
                let tri = self.tris[i];
                let all_face = tri
                    .verts
                    .iter()
                    .all(|&v| self.vert(v).kind.is_face());
                let cmp = if all_face { mindist } else { emndist };
                for j in 0..3 {
                    let t2 = tri.nbrs[j] - 1;
                    if t2 < i as i32 {
                        continue;
                    }
                    let i1 = tri.verts[SIDES[j][0]];
                    let i2 = tri.verts[SIDES[j][1]];
                    let d = dist2(&self.vert(i1).xyz, &self.vert(i2).xyz);
                    if d <= cmp {
                        continue;
                    }
                    if d > dist {
                        found = Some((i, j));
                        dist = d;
                    }
                }
            }
            let Some((t1, side)) = found else { break };

            if self.phase == 3 {
                let i1 = self.tris[t1].verts[SIDES[side][0]];
                let i2 = self.tris[t1].verts[SIDES[side][1]];
                let mid = Point3::new(
                    0.5 * (self.vert(i1).xyz.x + self.vert(i2).xyz.x),
                    0.5 * (self.vert(i1).xyz.y + self.vert(i2).xyz.y),
                    0.5 * (self.vert(i1).xyz.z + self.vert(i2).xyz.z),
                );
                if self.close2edge(t1, &mid) {
                    self.tris[t1].hit = true;
                    continue;
                }
            }
            let t2 = (self.tris[t1].nbrs[side] - 1) as usize;
            if self.split_side(t1, side, t2, side_mid) {
                split += 1;
                if 2 * split > iter {
                    break;
                }
                self.flood_tri_graph(t1, FLOOD_DEPTH);
                self.flood_tri_graph(t2, FLOOD_DEPTH);
            } else {
                self.tris[t1].hit = true;
            }
        }
        split
    }

    /// Re-derive the working-mesh statistics used by the close probes
    /// and split floors, then run the full refinement state machine.
    pub(crate) fn refine(&mut self) {
        self.edist2 = 0.0;
        self.eps2 = f64::MAX;
        self.devia2 = 0.0;
        let mut split_carry = 0usize;
        let mut side_mid = false;
        let stri = self.tris.len();

        // UV scaling and worst Edge deviation
        let mut du_sum = 0.0;
        let mut dv_sum = 0.0;
        for i in 0..self.verts.len() {
            let v = self.verts[i];
            let ev = self.surf.evaluate(v.uv);
            let d = dist2(&v.xyz, &ev.point);
            if d > self.devia2 {
                self.devia2 = d;
            }
            du_sum += ev.du.norm();
            dv_sum += ev.dv.norm();
        }
        self.v_over_u = if du_sum != 0.0 { dv_sum / du_sum } else { 1.0 };

        for s in &self.segs {
            let d = dist2(&self.vert(s.verts[0]).xyz, &self.vert(s.verts[1]).xyz);
            if d > self.edist2 {
                self.edist2 = d;
            }
            if d != 0.0 && d < self.eps2 {
                self.eps2 = d;
            }
        }
        for t in self.tris.iter_mut() {
            t.close = TOBEFILLED;
        }

        let maxlen2 = self.maxlen * self.maxlen;
        self.devia2 /= 256.0;
        self.eps2 /= 4.0;
        self.edist2 /= 2.0;
        if self.eps2 < self.devia2 {
            self.eps2 = self.devia2;
        }

        // restore orientation where the initial fill went negative
        self.phase = -1;
        for t in self.tris.iter_mut() {
            t.mark = 7;
        }
        self.swap_tris(Self::area_test, 0.0);

        // seed the mark bits
        let mut wrong = 0;
        for t in self.tris.iter_mut() {
            t.mark = 0;
        }
        for i in 0..self.tris.len() {
            let tri = self.tris[i];
            let a = self.or_uv
                * area2d(
                    self.vert(tri.verts[0]).uv,
                    self.vert(tri.verts[1]).uv,
                    self.vert(tri.verts[2]).uv,
                );
            if a <= 0.0 {
                tracing::warn!(
                    face = self.face_index,
                    tri = i,
                    area = a,
                    "triangle with reversed parameter-plane orientation"
                );
                wrong += 1;
                continue;
            }
            for j in 0..3 {
                let k = self.tris[i].nbrs[j] - 1;
                if k <= i as i32 {
                    continue;
                }
                if !self.check_or(i, j, k as usize) {
                    continue;
                }
                self.tris[i].mark |= 1 << j;
                self.mark_toward(k + 1, i, true);
            }
        }
        if wrong != 0 {
            return;
        }

        if !self.planar {
            self.phase = 0;

            self.swap_tris(Self::ang_uv_test, 0.0);
            self.swap_tris(Self::diag_test, 1.0);

            // A) break big triangles with inverted neighbors
            loop {
                let split = self.break_tri(true, stri, &mut split_carry);
                if split == 0 {
                    break;
                }
                self.swap_tris(Self::ang_uv_test, 0.0);
                self.swap_tris(Self::diag_test, 1.0);
                if self.accum > 0.866 || self.accum <= -1.0 {
                    break;
                }
            }

            // B) split interior sides bridging two boundary Edges
            let mut count = 0;
            loop {
                let split = self.split_inter(side_mid);
                if split == 0 {
                    break;
                }
                self.swap_tris(Self::ang_uv_test, 0.0);
                self.swap_tris(Self::diag_test, 1.0);
                count += split;
                if count > 3 * stri {
                    break;
                }
            }
            if count != 0 && self.remove_phase_b() > 0 {
                self.swap_tris(Self::ang_uv_test, 0.0);
                self.swap_tris(Self::diag_test, 1.0);
            }

            // C) add points where hashed midpoints escape their triangles
            self.hash = Some(MidpointHash::new(256));
            loop {
                let split = self.break_tri(false, stri, &mut split_carry);
                if split == 0 {
                    break;
                }
                self.swap_tris(Self::ang_uv_test, 0.0);
                self.swap_tris(Self::diag_test, 1.0);
                if self.accum > 0.866 || self.accum <= -1.0 {
                    break;
                }
            }
            self.hash = None;

            // D) cap side lengths
            side_mid = true;
            if self.maxlen > 0.0 {
                let mut iter = 0;
                loop {
                    let split = self.add_side_dist(iter, maxlen2, side_mid);
                    iter += 1;
                    if split == 0 {
                        break;
                    }
                    self.swap_tris(Self::ang_uv_test, 0.0);
                    let lang = self.accum;
                    self.swap_tris(Self::diag_test, 1.0);
                    if lang > MAXANG && self.accum < 0.0 {
                        break;
                    }
                }
            }

            // 1) chase the facet-normal criterion
            if self.accum < self.dotnrm {
                self.phase = 1;
                let mut stall = 0;
                let mut lsplit = 0;
                for i in 0..self.tris.len() {
                    self.fill_mid(i, NOTFILLED);
                }
                loop {
                    let split = self.add_facet_norm();
                    if split == 0 {
                        break;
                    }
                    let laccum = self.accum;
                    self.resweep_hashed(1);
                    if self.accum <= laccum && split > lsplit {
                        stall += 1;
                    }
                    lsplit = split;
                    if stall > 6 {
                        break;
                    }
                }
            }

            // 2) chase the mid-facet deviation criterion
            if self.chord > 0.0 {
                let last = self.phase;
                self.phase = 2;
                if last == 0 {
                    for i in 0..self.tris.len() {
                        self.fill_mid(i, NOTFILLED);
                    }
                }
                let mut stall = 0;
                let mut lsplit = 0;
                loop {
                    let split = self.add_facet_dist();
                    if split == 0 {
                        break;
                    }
                    let laccum = self.accum;
                    self.resweep_hashed(2);
                    if self.accum <= laccum && split > lsplit {
                        stall += 1;
                    }
                    lsplit = split;
                    if stall > 6 {
                        break;
                    }
                }
            }

            // 3) final consolidation
            self.phase = 3;
            self.swap_tris(Self::ang_uv_test, 0.0);
            let lang = self.accum;
            self.swap_tris(Self::diag_test, 1.0);
            if lang > MAXANG || self.accum < -0.1 {
                tracing::debug!(
                    face = self.face_index,
                    uv_angle = lang,
                    dot = self.accum,
                    "triangulation quality below target"
                );
            }

            // swaps in physical space if the mesh grew substantially
            if self.tris.len() > 2 * stri {
                self.swap_tris(Self::ang_xyz_test, 0.0);
            }
        } else {
            // planar surfaces: physical-angle swaps plus the length cap
            self.phase = -3;
            self.swap_tris(Self::ang_xyz_test, 0.0);
            if self.maxlen > 0.0 {
                let mut iter = 0;
                loop {
                    let split = self.add_side_dist(iter, maxlen2, side_mid);
                    iter += 1;
                    if split == 0 {
                        break;
                    }
                    self.swap_tris(Self::ang_xyz_test, 0.0);
                }
            }
        }
    }

    /// Swap sweep with the midpoint hash open, restoring cached
    /// midpoints afterwards (Phases 1 and 2).
    fn resweep_hashed(&mut self, phase: i32) {
        self.phase = TOBEFILLED as i32;
        self.hash = Some(MidpointHash::new(256));
        self.swap_tris(Self::ang_uv_test, 0.0);
        self.swap_tris(Self::diag_test, 1.0);
        self.phase = phase;
        for i in 0..self.tris.len() {
            if self.tris[i].close != TOBEFILLED {
                continue;
            }
            let tri = self.tris[i];
            let cached = self
                .hash
                .as_ref()
                .and_then(|h| h.find(tri.verts[0], tri.verts[1], tri.verts[2]));
            match cached {
                Some((close, mid)) => {
                    self.tris[i].mid = mid;
                    self.tris[i].close = close;
                }
                None => self.fill_mid(i, NOTFILLED),
            }
        }
        self.hash = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seg_intersect2_midpoint() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);
        let p = Point3::new(1.0, 0.5, 0.0);
        let d = seg_intersect2(&a, &b, &p);
        assert!((d - 0.25).abs() < 1e-12);
        // beyond the padded span
        let q = Point3::new(5.0, 0.5, 0.0);
        assert!(seg_intersect2(&a, &b, &q) > 1.0e30);
    }

    #[test]
    fn test_ray_intersect_units() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(2.0, 0.0, 0.0);
        let p = Point3::new(1.0, 0.5, 0.0);
        // distance 0.5 over length 2.0
        assert!((ray_intersect(&a, &b, &p) - 0.25).abs() < 1e-12);
    }
}
