//! Structured quad patching of four-sided Faces.
//!
//! A Face with one Loop and at least four Edges is blocked into four
//! sides; extra Edges are merged greedily into their best-aligned
//! neighbor at shared Nodes. The four boundary sample sequences frame a
//! structured grid whose interior is delegated to the surface's
//! `interior_quad_fill` and evaluated back onto the surface. Rim
//! cross-references are built with the same edge-connect table used
//! for triangle stitching.

use facet_kernel_math::{Point2, Point3, Vec3};

use crate::error::{Result, TessError};
use crate::params::QuadParams;
use crate::stitch::Connect;
use crate::{Patch, QuadTess, Tessellation};

struct FramePoint {
    uv: Point2,
    xyz: Point3,
    ptype: i32,
    pindex: i32,
}

impl<'m> Tessellation<'m> {
    /// Build structured quad patches for Face `findex` (1-based).
    ///
    /// The Face must carry exactly one Loop of four or more
    /// non-degenerate Edges; opposite blocked sides must hold equal
    /// sample counts. The triangle tessellation remains available
    /// alongside the patches.
    pub fn make_quads(&mut self, findex: usize, params: QuadParams) -> Result<()> {
        self.check_body_has_faces()?;
        if findex < 1 || findex > self.faces.len() {
            return Err(TessError::IndexOutOfRange {
                index: findex as i64,
                lo: 1,
                hi: self.faces.len() as i64,
            });
        }
        let b = &self.topo.bodies[self.body];
        let fid = b.faces[findex - 1];
        let face = &self.topo.faces[fid];
        if face.loops.len() != 1 {
            return Err(TessError::TopologyMismatch(format!(
                "face {} has {} loops",
                findex,
                face.loops.len()
            )));
        }
        let uses = self.topo.loops[face.loops[0]].uses.clone();
        let nedge = uses.len();
        if nedge < 4 {
            return Err(TessError::IndexOutOfRange {
                index: nedge as i64,
                lo: 4,
                hi: i64::MAX,
            });
        }
        let mut eindex = Vec::with_capacity(nedge);
        for lu in &uses {
            let e = self.topo.edge_index(self.body, lu.edge);
            if e == 0 {
                return Err(TessError::NotFound(format!(
                    "edge of face {} not in body",
                    findex
                )));
            }
            if self.edges[e - 1].degenerate {
                return Err(TessError::DegenerateEdge(e));
            }
            if self.edges[e - 1].npts() == 0 {
                return Err(TessError::NoDataYet);
            }
            eindex.push(e);
        }

        // block the loop into 4 sides
        let mut lim = [0usize, 1, 2, 3];
        if nedge > 4 {
            self.quad_loop(&eindex, &uses, params, &mut lim)?;
        }

        // per-side segment counts, in face orientation
        let ftype = face.sense;
        let mut lens = [0usize; 4];
        let mut l = 0usize;
        for (i, &e) in eindex.iter().enumerate() {
            let segs = self.edges[e - 1].npts() - 1;
            if ftype == 1 {
                lens[l] += segs;
            } else {
                lens[3 - l] += segs;
            }
            if l < 3 && lim[l] == i {
                l += 1;
            }
        }
        if lens[0] != lens[2] || lens[1] != lens[3] {
            return Err(TessError::ConstraintViolation(format!(
                "opposite side counts differ: {} vs {}, {} vs {}",
                lens[0], lens[2], lens[1], lens[3]
            )));
        }
        let nu = lens[0] + 1;
        let nv = lens[1] + 1;

        // boundary frame in face orientation
        let mut frame: Vec<FramePoint> = Vec::new();
        for i in 0..nedge {
            let (ui, sense_flip) = if ftype == 1 {
                (i, 1)
            } else {
                (nedge - i - 1, -1)
            };
            let lu = uses[ui];
            let e = eindex[ui];
            let et = &self.edges[e - 1];
            let npts = et.npts();
            let pc = self
                .topo
                .pcurve_for(fid, lu.edge, lu.sense)
                .ok_or_else(|| {
                    TessError::GeometryError(format!(
                        "missing pcurve on face {} edge {}",
                        findex, e
                    ))
                })?;
            let sen = lu.sense * sense_flip;
            if sen == 1 {
                for k in 0..npts - 1 {
                    let (ptype, pindex) = if k == 0 {
                        (0, et.nodes[0] as i32)
                    } else {
                        (k as i32 + 1, e as i32)
                    };
                    frame.push(FramePoint {
                        uv: self.geom.pcurves[pc].evaluate(et.t[k]),
                        xyz: et.xyz[k],
                        ptype,
                        pindex,
                    });
                }
            } else {
                for k in (1..npts).rev() {
                    let (ptype, pindex) = if k == npts - 1 {
                        (0, et.nodes[1] as i32)
                    } else {
                        (k as i32 + 1, e as i32)
                    };
                    frame.push(FramePoint {
                        uv: self.geom.pcurves[pc].evaluate(et.t[k]),
                        xyz: et.xyz[k],
                        ptype,
                        pindex,
                    });
                }
            }
        }
        let npts = frame.len();
        debug_assert_eq!(npts, 2 * (nu - 1) + 2 * (nv - 1));

        // grid of parameter points: boundary from the frame, interior
        // delegated to the surface's quad fill
        let frame_at = |i: usize, j: usize| -> usize {
            if j == 0 {
                i
            } else if i == nu - 1 {
                (nu - 1) + j
            } else if j == nv - 1 {
                (nu - 1) + (nv - 1) + (nu - 1 - i)
            } else {
                (2 * (nu - 1) + (nv - 1) + (nv - 1 - j)) % npts
            }
        };
        let mut grid = vec![Point2::new(0.0, 0.0); nu * nv];
        for j in 0..nv {
            for i in 0..nu {
                if i == 0 || i == nu - 1 || j == 0 || j == nv - 1 {
                    grid[j * nu + i] = frame[frame_at(i, j)].uv;
                }
            }
        }
        let surf = self.geom.surfaces[face.surface].as_ref();
        surf.interior_quad_fill(nu, nv, &mut grid);

        // vertex arrays: frame first, interior after
        let mut out = QuadTess::default();
        for fp in &frame {
            out.xyz.push(fp.xyz);
            out.uv.push(fp.uv);
            out.ptype.push(fp.ptype);
            out.pindex.push(fp.pindex);
        }
        let mut ipts = vec![0i32; nu * nv];
        let mut interior = npts;
        for j in 0..nv {
            for i in 0..nu {
                if i == 0 || i == nu - 1 || j == 0 || j == nv - 1 {
                    ipts[j * nu + i] = frame_at(i, j) as i32 + 1;
                } else {
                    let uv = grid[j * nu + i];
                    out.xyz.push(surf.evaluate(uv).point);
                    out.uv.push(uv);
                    out.ptype.push(-1);
                    out.pindex.push(-1);
                    interior += 1;
                    ipts[j * nu + i] = interior as i32;
                }
            }
        }

        // rim cross-references via the shared connect table
        let nbound = 2 * (nu - 1) + 2 * (nv - 1);
        let mut values = vec![0i32; npts + nbound];
        for (j, v) in values.iter_mut().enumerate().take(npts) {
            *v = -(j as i32 + 1);
        }
        let mut conn = Connect::new(out.xyz.len());
        for j in 0..npts {
            let k1 = j as i32 + 1;
            let k2 = ((j + 1) % npts) as i32 + 1;
            conn.add(k1, k2, j, &mut values, findex);
        }
        // rim quads: bottom, right, top, left (quad q of the (nu-1)×(nv-1) grid)
        let mut k = npts;
        let quad_id = |i: usize, j: usize| (j * (nu - 1) + i) as i32 + 1;
        for i in 0..nu - 1 {
            values[k] = quad_id(i, 0);
            conn.add(ipts[i], ipts[i + 1], k, &mut values, findex);
            k += 1;
        }
        for j in 0..nv - 1 {
            values[k] = quad_id(nu - 2, j);
            conn.add(
                ipts[j * nu + nu - 1],
                ipts[(j + 1) * nu + nu - 1],
                k,
                &mut values,
                findex,
            );
            k += 1;
        }
        for i in 0..nu - 1 {
            values[k] = quad_id(nu - 2 - i, nv - 2);
            conn.add(
                ipts[(nv - 1) * nu + nu - 1 - i],
                ipts[(nv - 1) * nu + nu - 2 - i],
                k,
                &mut values,
                findex,
            );
            k += 1;
        }
        for j in 0..nv - 1 {
            values[k] = quad_id(0, nv - 2 - j);
            conn.add(
                ipts[(nv - 1 - j) * nu],
                ipts[(nv - 2 - j) * nu],
                k,
                &mut values,
                findex,
            );
            k += 1;
        }
        conn.finish(&mut values, findex);

        let bounds = values[npts..].to_vec();
        out.patches.push(Patch {
            nu,
            nv,
            ipts,
            bounds,
        });
        self.quads[findex - 1] = Some(out);
        Ok(())
    }

    /// Merge adjacent Edges into four sides by greatest tangent
    /// alignment at their shared Nodes. `lim` holds the last Edge
    /// position of each side.
    fn quad_loop(
        &self,
        eindex: &[usize],
        uses: &[facet_kernel_topo::LoopUse],
        params: QuadParams,
        lim: &mut [usize; 4],
    ) -> Result<()> {
        let edge_tol = params.effective_edge_tol();
        let mut nside = eindex.len();

        let end_tangent = |pos: usize| -> Vec3 {
            let e = eindex[pos];
            let et = &self.edges[e - 1];
            let n = et.npts();
            let t = if uses[pos].sense == 1 {
                et.xyz[n - 1] - et.xyz[n - 2]
            } else {
                et.xyz[0] - et.xyz[1]
            };
            let d = t.norm();
            if d != 0.0 {
                t / d
            } else {
                t
            }
        };
        let start_tangent = |pos: usize| -> Vec3 {
            let e = eindex[pos];
            let et = &self.edges[e - 1];
            let n = et.npts();
            let t = if uses[pos].sense == 1 {
                et.xyz[1] - et.xyz[0]
            } else {
                et.xyz[n - 2] - et.xyz[n - 1]
            };
            let d = t.norm();
            if d != 0.0 {
                t / d
            } else {
                t
            }
        };

        while nside > 4 {
            let mut dmax = -1.0;
            let mut imax = None;
            for i in 0..4 {
                let dot = end_tangent(lim[i]).dot(&start_tangent(lim[i] + 1));
                if dot > dmax {
                    dmax = dot;
                    imax = Some(i);
                }
            }
            let Some(imax) = imax else {
                return Err(TessError::ConstraintViolation(
                    "no mergeable side junction".into(),
                ));
            };
            if dmax < 1.0 - edge_tol {
                return Err(TessError::ConstraintViolation(format!(
                    "side tangents diverge (dot {:.4})",
                    dmax
                )));
            }
            for i in imax..3 {
                lim[i] = lim[i + 1];
            }
            lim[3] += 1;
            nside -= 1;
        }
        Ok(())
    }
}
