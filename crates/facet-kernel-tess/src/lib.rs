#![warn(missing_docs)]

//! Boundary tessellation core for the facet kernel.
//!
//! Turns a B-rep Body into a watertight triangle mesh: every Edge is
//! sampled into a conforming point sequence, every Face is seeded by a
//! loop filler over its trimmed parameter-plane region and then refined
//! by swap/insert passes driven by size, sag, and dihedral-angle
//! criteria. Edge samples are shared verbatim between adjacent Faces,
//! and each Edge segment records the neighboring triangle on every
//! adjacent Face, so downstream consumers can walk across Face borders.
//!
//! Finished tessellations support local edits (insert / move / delete
//! of Edge samples with full Face repair) and optional structured quad
//! patches on four-sided Faces.
//!
//! # Example
//!
//! ```ignore
//! use facet_kernel_primitives::make_box;
//! use facet_kernel_tess::{tessellate_body, TessParams};
//!
//! let brep = make_box([0.0; 3].into(), 1.0, 1.0, 1.0);
//! let tess = tessellate_body(
//!     &brep.topology,
//!     &brep.geometry,
//!     brep.body,
//!     TessParams::new(0.25, 0.001, 15.0),
//! )?;
//! assert_eq!(tess.num_faces(), 6);
//! ```

pub mod error;
pub mod params;

mod edge;
mod edit;
mod fill;
mod hash;
mod quad;
mod refine;
mod stitch;

pub use error::{Result, TessError};
pub use params::{QuadParams, TessParams};

use facet_kernel_geom::{Curve, GeometryStore, Surface};
use facet_kernel_math::{Point2, Point3};
use facet_kernel_topo::{BodyId, BodyKind, EdgeSides, Topology};

use fill::FillScratch;
use refine::WorkMesh;

/// Faces on one side of an Edge together with the neighbor-triangle
/// table for every Edge segment.
#[derive(Debug, Clone, Default)]
pub struct FaceLink {
    /// 1-based body Face indices on this side (manifold: one entry).
    pub faces: Vec<usize>,
    /// `tric[k * faces.len() + slot]`: 1-based triangle id on Face
    /// `faces[slot]` adjacent to Edge segment `k` (0-based).
    pub tric: Vec<i32>,
}

/// The 1-D tessellation of a body Edge.
#[derive(Debug, Clone, Default)]
pub struct EdgeTess {
    /// Sample points.
    pub xyz: Vec<Point3>,
    /// Curve parameters of the samples.
    pub t: Vec<f64>,
    /// Body Node indices of the endpoints.
    pub nodes: [usize; 2],
    /// Face links for the negative (index 0) and positive (index 1)
    /// sides.
    pub links: [FaceLink; 2],
    /// Whether the Edge is degenerate (zero 3D extent).
    pub degenerate: bool,
}

impl EdgeTess {
    /// Number of samples.
    pub fn npts(&self) -> usize {
        self.xyz.len()
    }
}

/// The 2-D tessellation of a body Face.
#[derive(Debug, Clone, Default)]
pub struct FaceTess {
    /// Vertex positions.
    pub xyz: Vec<Point3>,
    /// Vertex parameter-plane coordinates.
    pub uv: Vec<Point2>,
    /// Vertex classification: -1 interior, 0 Node, k ≥ 1 Edge sample k.
    pub ptype: Vec<i32>,
    /// Companion index: Node index, Edge index, or -1.
    pub pindex: Vec<i32>,
    /// Triangles as 1-based vertex triples.
    pub tris: Vec<[i32; 3]>,
    /// Neighbor ids per triangle side: positive = triangle, negative =
    /// `-edge_index` boundary segment.
    pub tric: Vec<[i32; 3]>,
}

impl FaceTess {
    /// Number of vertices.
    pub fn npts(&self) -> usize {
        self.xyz.len()
    }

    /// Number of triangles.
    pub fn ntris(&self) -> usize {
        self.tris.len()
    }
}

/// One structured sub-grid of a quad patch set.
#[derive(Debug, Clone)]
pub struct Patch {
    /// Grid extent in u (points).
    pub nu: usize,
    /// Grid extent in v (points).
    pub nv: usize,
    /// 1-based vertex ids, row-major `nu × nv`.
    pub ipts: Vec<i32>,
    /// Per-boundary-quad cross references around the patch rim.
    pub bounds: Vec<i32>,
}

/// The quad tessellation of a Face (kept alongside its triangles).
#[derive(Debug, Clone, Default)]
pub struct QuadTess {
    /// Vertex positions.
    pub xyz: Vec<Point3>,
    /// Vertex parameter-plane coordinates.
    pub uv: Vec<Point2>,
    /// Vertex classification (see [`FaceTess::ptype`]).
    pub ptype: Vec<i32>,
    /// Companion index (see [`FaceTess::pindex`]).
    pub pindex: Vec<i32>,
    /// Structured patches.
    pub patches: Vec<Patch>,
}

/// A member of the retessellation subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetessTarget {
    /// A 1-based body Edge index.
    Edge(usize),
    /// A 1-based body Face index.
    Face(usize),
}

/// The tessellation of a Body.
///
/// Borrows the source topology and geometry for its whole lifetime,
/// so the Body cannot be dropped while tessellations of it exist.
#[derive(Debug)]
pub struct Tessellation<'m> {
    topo: &'m Topology,
    geom: &'m GeometryStore,
    body: BodyId,
    params: TessParams,
    edge_sides: Vec<EdgeSides>,
    edges: Vec<EdgeTess>,
    faces: Vec<FaceTess>,
    quads: Vec<Option<QuadTess>>,
    /// Neighbor-graph probe depth of the refinement close test.
    pub refine_probe_depth: i32,
    /// Neighbor-graph probe depth of the split close test.
    pub split_probe_depth: i32,
}

/// Build the full tessellation of a Body.
///
/// `angle_deg` is clamped to [0.5, 30.0]. A WireBody yields Edge
/// tessellations only. Per-Face fill failures leave that Face empty and
/// are reported as diagnostics; Edge discretization failures abort the
/// build.
pub fn tessellate_body<'m>(
    topo: &'m Topology,
    geom: &'m GeometryStore,
    body: BodyId,
    params: TessParams,
) -> Result<Tessellation<'m>> {
    if topo.bodies.get(body).is_none() {
        return Err(TessError::NotABody);
    }
    let edge_sides = topo.edge_sides(body);
    let mut tess = Tessellation {
        topo,
        geom,
        body,
        params,
        edge_sides,
        edges: Vec::new(),
        faces: Vec::new(),
        quads: Vec::new(),
        refine_probe_depth: 6,
        split_probe_depth: 4,
    };

    edge::discretize_edges(
        topo,
        geom,
        body,
        &tess.edge_sides,
        &params,
        None,
        &mut tess.edges,
    )?;

    if topo.bodies[body].kind == BodyKind::Wire {
        return Ok(tess);
    }

    let nface = topo.bodies[body].faces.len();
    tess.faces = vec![FaceTess::default(); nface];
    tess.quads = vec![None; nface];

    let mut scratch = FillScratch::default();
    for fidx in 1..=nface {
        if let Err(e) = tess.fill_one_face(fidx, &mut scratch, &params) {
            tracing::warn!(face = fidx, error = %e, "face tessellation failed; left empty");
            tess.faces[fidx - 1] = FaceTess::default();
        }
    }
    Ok(tess)
}

/// Open-form grid tessellation of a bare curve.
///
/// `n.abs()` points are placed uniformly over `(t_lo, t_hi)`; a
/// negative `n` reverses the axis.
pub fn tessellate_curve(curve: &dyn Curve, range: (f64, f64), n: i32) -> Result<GridTessellation> {
    let nu = n.unsigned_abs() as usize;
    if nu < 2 {
        return Err(TessError::IndexOutOfRange {
            index: n as i64,
            lo: 2,
            hi: i64::MAX,
        });
    }
    let (t_lo, t_hi) = range;
    let mut xyz = Vec::with_capacity(nu);
    for i in 0..nu {
        let frac = if n < 0 {
            (nu - i - 1) as f64 / (nu - 1) as f64
        } else {
            i as f64 / (nu - 1) as f64
        };
        xyz.push(curve.evaluate(t_lo + frac * (t_hi - t_lo)).point);
    }
    Ok(GridTessellation { nu, nv: 0, xyz })
}

/// Open-form grid tessellation of a bare surface.
///
/// `sizes` give the grid extents; a negative size reverses that axis.
pub fn tessellate_surface(
    surf: &dyn Surface,
    u_range: (f64, f64),
    v_range: (f64, f64),
    sizes: (i32, i32),
) -> Result<GridTessellation> {
    let nu = sizes.0.unsigned_abs() as usize;
    let nv = sizes.1.unsigned_abs() as usize;
    if nu < 2 || nv < 2 {
        return Err(TessError::IndexOutOfRange {
            index: nu.min(nv) as i64,
            lo: 2,
            hi: i64::MAX,
        });
    }
    let mut xyz = Vec::with_capacity(nu * nv);
    for j in 0..nv {
        let fv = if sizes.1 < 0 {
            (nv - j - 1) as f64 / (nv - 1) as f64
        } else {
            j as f64 / (nv - 1) as f64
        };
        let v = v_range.0 + fv * (v_range.1 - v_range.0);
        for i in 0..nu {
            let fu = if sizes.0 < 0 {
                (nu - i - 1) as f64 / (nu - 1) as f64
            } else {
                i as f64 / (nu - 1) as f64
            };
            let u = u_range.0 + fu * (u_range.1 - u_range.0);
            xyz.push(surf.evaluate(Point2::new(u, v)).point);
        }
    }
    Ok(GridTessellation { nu, nv, xyz })
}

/// Result of an open-form grid tessellation.
#[derive(Debug, Clone)]
pub struct GridTessellation {
    /// Grid extent in u.
    pub nu: usize,
    /// Grid extent in v (0 for a curve).
    pub nv: usize,
    /// Row-major grid points.
    pub xyz: Vec<Point3>,
}

impl<'m> Tessellation<'m> {
    /// The global parameters the tessellation was built with.
    pub fn params(&self) -> TessParams {
        self.params
    }

    /// Number of body Edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of body Faces.
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Read the tessellation of Edge `index` (1-based).
    pub fn edge(&self, index: usize) -> Result<&EdgeTess> {
        let e = self
            .edges
            .get(index.wrapping_sub(1))
            .ok_or(TessError::IndexOutOfRange {
                index: index as i64,
                lo: 1,
                hi: self.edges.len() as i64,
            })?;
        if e.xyz.is_empty() {
            return Err(TessError::NoDataYet);
        }
        Ok(e)
    }

    /// Read the tessellation of Face `index` (1-based).
    pub fn face(&self, index: usize) -> Result<&FaceTess> {
        self.faces
            .get(index.wrapping_sub(1))
            .ok_or(TessError::IndexOutOfRange {
                index: index as i64,
                lo: 1,
                hi: self.faces.len() as i64,
            })
    }

    /// Read the quad patches of Face `index`, if built.
    pub fn quads(&self, index: usize) -> Result<&QuadTess> {
        let q = self
            .quads
            .get(index.wrapping_sub(1))
            .ok_or(TessError::IndexOutOfRange {
                index: index as i64,
                lo: 1,
                hi: self.quads.len() as i64,
            })?;
        q.as_ref().ok_or(TessError::NoDataYet)
    }

    /// 1-based indices of the Faces currently carrying quad patches.
    pub fn quad_faces(&self) -> Vec<usize> {
        self.quads
            .iter()
            .enumerate()
            .filter_map(|(i, q)| q.as_ref().map(|_| i + 1))
            .collect()
    }

    /// Rebuild the listed Edges and Faces (plus every Face adjacent to
    /// a listed Edge) under new parameters, preserving the rest.
    pub fn retessellate(&mut self, targets: &[RetessTarget], params: TessParams) -> Result<()> {
        if targets.is_empty() {
            return Err(TessError::NoDataYet);
        }
        let nedge = self.edges.len();
        let nface = self.faces.len();
        let mut edge_marks = vec![false; nedge];
        let mut face_marks = vec![false; nface];
        for t in targets {
            match *t {
                RetessTarget::Edge(e) => {
                    if e < 1 || e > nedge {
                        return Err(TessError::IndexOutOfRange {
                            index: e as i64,
                            lo: 1,
                            hi: nedge as i64,
                        });
                    }
                    if self.edges[e - 1].degenerate {
                        return Err(TessError::DegenerateEdge(e));
                    }
                    edge_marks[e - 1] = true;
                    for link in &self.edges[e - 1].links {
                        for &f in &link.faces {
                            face_marks[f - 1] = true;
                        }
                    }
                }
                RetessTarget::Face(f) => {
                    if f < 1 || f > nface {
                        return Err(TessError::IndexOutOfRange {
                            index: f as i64,
                            lo: 1,
                            hi: nface as i64,
                        });
                    }
                    face_marks[f - 1] = true;
                }
            }
        }

        if edge_marks.iter().any(|&m| m) {
            edge::discretize_edges(
                self.topo,
                self.geom,
                self.body,
                &self.edge_sides,
                &params,
                Some(&edge_marks),
                &mut self.edges,
            )?;
        }

        let mut scratch = FillScratch::default();
        for fidx in 1..=nface {
            if !face_marks[fidx - 1] {
                continue;
            }
            self.quads[fidx - 1] = None;
            self.faces[fidx - 1] = FaceTess::default();
            if let Err(e) = self.fill_one_face(fidx, &mut scratch, &params) {
                tracing::warn!(face = fidx, error = %e, "face retessellation failed; left empty");
                self.faces[fidx - 1] = FaceTess::default();
            }
        }
        Ok(())
    }

    /// Fill (or refill) one Face: assemble its boundary loops, seed the
    /// triangulation, refine, and stitch the result into the Edge
    /// records.
    fn fill_one_face(
        &mut self,
        fidx: usize,
        scratch: &mut FillScratch,
        params: &TessParams,
    ) -> Result<()> {
        let fid = self.topo.bodies[self.body].faces[fidx - 1];
        let face = &self.topo.faces[fid];
        let surf = self.geom.surfaces[face.surface].as_ref();

        let mut ts = WorkMesh::new(
            fidx,
            surf,
            face.sense as f64,
            false,
            params.max_side,
            params.chord,
            params.dot_threshold(),
            self.refine_probe_depth,
            self.split_probe_depth,
        );
        stitch::fill_face(
            &mut ts,
            self.topo,
            self.geom,
            self.body,
            fid,
            &self.edges,
            scratch,
        )?;
        ts.refine();
        self.faces[fidx - 1] = stitch::update_tess(&ts, &mut self.edges, fidx);
        Ok(())
    }

    fn check_body_has_faces(&self) -> Result<()> {
        if self.topo.bodies[self.body].kind == BodyKind::Wire {
            return Err(TessError::WireBody);
        }
        Ok(())
    }

    fn edge_index_check(&self, eindex: usize) -> Result<()> {
        if eindex < 1 || eindex > self.edges.len() {
            return Err(TessError::IndexOutOfRange {
                index: eindex as i64,
                lo: 1,
                hi: self.edges.len() as i64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
