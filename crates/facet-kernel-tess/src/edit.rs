//! Edge-level edit operations on a finished tessellation.
//!
//! Each operation keeps every adjacent Face consistent with the Edge
//! record it touches: neighbor tables are rewired, vertex and triangle
//! arrays are renumbered and compressed, and quad patches on affected
//! Faces are dropped. Operations validate (and gather all new data)
//! before mutating, so a failure leaves the tessellation unchanged.

use facet_kernel_math::{Point2, Point3};

use crate::error::{Result, TessError};
use crate::{FaceTess, Tessellation};

/// The (ptype, pindex) pair identifying one end of an Edge segment,
/// with endpoint samples resolving to their Nodes.
fn segment_end(edge_tess: &crate::EdgeTess, eindex: usize, sample: usize, npts: usize) -> (i32, i32) {
    if sample == 1 {
        (0, edge_tess.nodes[0] as i32)
    } else if sample == npts {
        (0, edge_tess.nodes[1] as i32)
    } else {
        (sample as i32, eindex as i32)
    }
}

/// Find the side of triangle `it` (1-based) of `face` whose endpoints
/// carry the classifications `a` and `b` (in either order). Returns the
/// two neighbor entries flanking that side.
fn flanking_neighbors(
    face: &FaceTess,
    it: usize,
    a: (i32, i32),
    b: (i32, i32),
) -> Option<(i32, i32)> {
    let tri = face.tris[it - 1];
    let class = |v: i32| {
        let i = (v - 1) as usize;
        (face.ptype[i], face.pindex[i])
    };
    let c = [class(tri[0]), class(tri[1]), class(tri[2])];
    for side in 0..3 {
        let e0 = c[crate::refine::SIDES[side][0]];
        let e1 = c[crate::refine::SIDES[side][1]];
        if (e0 == a && e1 == b) || (e0 == b && e1 == a) {
            let others: Vec<i32> = (0..3)
                .filter(|&s| s != side)
                .map(|s| face.tric[it - 1][s])
                .collect();
            return Some((others[0], others[1]));
        }
    }
    None
}

impl<'m> Tessellation<'m> {
    /// Structural edits cannot repair a Face that sees the Edge from
    /// both sides (a seam): both copies of every sample share one
    /// classification, so the per-side repair would double-apply.
    fn reject_seam_faces(&self, eindex: usize) -> Result<()> {
        let et = &self.edges[eindex - 1];
        for f in &et.links[0].faces {
            if et.links[1].faces.contains(f) {
                return Err(TessError::ConstraintViolation(format!(
                    "edge {} is a seam of face {}",
                    eindex, f
                )));
            }
        }
        Ok(())
    }

    /// Move Edge sample `vindex` (1-based, interior samples only) to
    /// curve parameter `t`, keeping it strictly between its neighbors.
    pub fn move_edge_vert(&mut self, eindex: usize, vindex: usize, t: f64) -> Result<()> {
        self.check_body_has_faces()?;
        self.edge_index_check(eindex)?;
        let npts = self.edges[eindex - 1].npts();
        if npts == 0 {
            return Err(TessError::NoDataYet);
        }
        if vindex < 2 || vindex > npts - 1 {
            return Err(TessError::IndexOutOfRange {
                index: vindex as i64,
                lo: 2,
                hi: npts as i64 - 1,
            });
        }
        let (lo, hi) = (
            self.edges[eindex - 1].t[vindex - 2],
            self.edges[eindex - 1].t[vindex],
        );
        if t <= lo || t >= hi {
            return Err(TessError::ParameterOutOfRange { value: t, lo, hi });
        }

        let b = &self.topo.bodies[self.body];
        let eid = b.edges[eindex - 1];
        let xyz = self.geom.curves[self.topo.edges[eid].curve].evaluate(t).point;

        // resolve every Face-side UV before touching anything
        let mut updates: Vec<(usize, Point2, usize)> = Vec::new();
        for m in 0..2 {
            let sense = if m == 0 { -1 } else { 1 };
            let link = &self.edges[eindex - 1].links[m];
            let nf = link.faces.len();
            for (j, &iface) in link.faces.iter().enumerate() {
                let fid = b.faces[iface - 1];
                let pc = self
                    .topo
                    .pcurve_for(fid, eid, sense)
                    .ok_or_else(|| {
                        TessError::GeometryError(format!(
                            "missing pcurve on face {} edge {}",
                            iface, eindex
                        ))
                    })?;
                let uv = self.geom.pcurves[pc].evaluate(t);
                let itri = link.tric[(vindex - 1) * nf + j];
                updates.push((iface, uv, itri as usize));
            }
        }

        // commit
        self.edges[eindex - 1].xyz[vindex - 1] = xyz;
        self.edges[eindex - 1].t[vindex - 1] = t;
        for (iface, uv, itri) in updates {
            let face = &mut self.faces[iface - 1];
            if itri == 0 || itri > face.tris.len() {
                tracing::warn!(face = iface, edge = eindex, "stale neighbor record on move");
                continue;
            }
            let mut found = false;
            for &v in &face.tris[itri - 1] {
                let i = (v - 1) as usize;
                if face.pindex[i] == eindex as i32 && face.ptype[i] == vindex as i32 {
                    face.xyz[i] = xyz;
                    face.uv[i] = uv;
                    found = true;
                    break;
                }
            }
            if !found {
                tracing::warn!(
                    face = iface,
                    edge = eindex,
                    vertex = vindex,
                    "vertex not found in adjacent triangle"
                );
            }
            self.quads[iface - 1] = None;
        }
        Ok(())
    }

    /// Delete Edge sample `vindex`, collapsing it onto its neighbor in
    /// direction `dir` (±1) on every adjacent Face.
    pub fn delete_edge_vert(&mut self, eindex: usize, vindex: usize, dir: i32) -> Result<()> {
        if dir != -1 && dir != 1 {
            return Err(TessError::IndexOutOfRange {
                index: dir as i64,
                lo: -1,
                hi: 1,
            });
        }
        self.check_body_has_faces()?;
        self.edge_index_check(eindex)?;
        let npts = self.edges[eindex - 1].npts();
        if npts == 0 {
            return Err(TessError::NoDataYet);
        }
        if vindex < 2 || vindex > npts - 1 {
            return Err(TessError::IndexOutOfRange {
                index: vindex as i64,
                lo: 2,
                hi: npts as i64 - 1,
            });
        }

        self.reject_seam_faces(eindex)?;

        // collapsing segment: toward the survivor
        let row = if dir == -1 { vindex - 2 } else { vindex - 1 };
        let pt1 = (vindex as i32, eindex as i32);
        let survivor_sample = (vindex as i32 + dir) as usize;
        let pt2 = segment_end(&self.edges[eindex - 1], eindex, survivor_sample, npts);

        // validate every adjacent Face before mutating
        for m in 0..2 {
            let link = &self.edges[eindex - 1].links[m];
            let nf = link.faces.len();
            for (n, &iface) in link.faces.iter().enumerate() {
                let it = link.tric[row * nf + n];
                let face = &self.faces[iface - 1];
                if it <= 0 || it as usize > face.tris.len() {
                    return Err(TessError::TopologyMismatch(format!(
                        "edge {} segment has no triangle on face {}",
                        eindex, iface
                    )));
                }
                if flanking_neighbors(face, it as usize, pt1, pt2).is_none() {
                    return Err(TessError::TopologyMismatch(format!(
                        "collapse segment not found on face {}",
                        iface
                    )));
                }
            }
        }

        for m in 0..2 {
            let nf = self.edges[eindex - 1].links[m].faces.len();
            for n in 0..nf {
                let iface = self.edges[eindex - 1].links[m].faces[n];
                let it = self.edges[eindex - 1].links[m].tric[row * nf + n] as usize;
                let face = &self.faces[iface - 1];

                let find_vert = |pt: (i32, i32)| -> Option<i32> {
                    face.tris[it - 1].iter().copied().find(|&v| {
                        let i = (v - 1) as usize;
                        (face.ptype[i], face.pindex[i]) == pt
                    })
                };
                let Some(iv0) = find_vert(pt1) else {
                    return Err(TessError::GeometryError(
                        "vertex not found in adjacent edge".into(),
                    ));
                };
                let Some(iv1) = find_vert(pt2) else {
                    return Err(TessError::GeometryError(
                        "survivor vertex not found in adjacent edge".into(),
                    ));
                };
                let (n1, n2) = flanking_neighbors(face, it, pt1, pt2).ok_or_else(|| {
                    TessError::GeometryError("collapse segment vanished".into())
                })?;

                // wire the flanking neighbors to each other
                for (from, to) in [(n1, n2), (n2, n1)] {
                    if from > 0 {
                        let tric = &mut self.faces[iface - 1].tric[(from - 1) as usize];
                        for e in tric.iter_mut() {
                            if *e == it as i32 {
                                *e = to;
                                break;
                            }
                        }
                    } else if from < 0 {
                        let ie = (-from) as usize;
                        for link in self.edges[ie - 1].links.iter_mut() {
                            let nfr = link.faces.len();
                            if let Some(slot) = link.faces.iter().position(|&f| f == iface) {
                                for k in 0..link.tric.len() / nfr {
                                    if link.tric[k * nfr + slot] == it as i32 {
                                        link.tric[k * nfr + slot] = to;
                                    }
                                }
                            }
                        }
                    }
                }

                let face = &mut self.faces[iface - 1];

                // substitute the victim vertex and renumber Edge samples
                for tri in face.tris.iter_mut() {
                    for v in tri.iter_mut() {
                        if *v == iv0 {
                            *v = iv1;
                        }
                    }
                }
                for i in 0..face.npts() {
                    if face.pindex[i] == eindex as i32 && face.ptype[i] >= vindex as i32 {
                        face.ptype[i] -= 1;
                    }
                }

                // compress the vertex arrays
                let dead = (iv0 - 1) as usize;
                face.xyz.remove(dead);
                face.uv.remove(dead);
                face.ptype.remove(dead);
                face.pindex.remove(dead);
                for tri in face.tris.iter_mut() {
                    for v in tri.iter_mut() {
                        if *v > iv0 {
                            *v -= 1;
                        }
                    }
                }

                // compress the triangle arrays
                face.tris.remove(it - 1);
                face.tric.remove(it - 1);
                for tric in face.tric.iter_mut() {
                    for e in tric.iter_mut() {
                        if *e > it as i32 {
                            *e -= 1;
                        }
                    }
                }
                for et in self.edges.iter_mut() {
                    for link in et.links.iter_mut() {
                        let nfr = link.faces.len();
                        if nfr == 0 {
                            continue;
                        }
                        if let Some(slot) = link.faces.iter().position(|&f| f == iface) {
                            for k in 0..link.tric.len() / nfr {
                                if link.tric[k * nfr + slot] > it as i32 {
                                    link.tric[k * nfr + slot] -= 1;
                                }
                            }
                        }
                    }
                }

                self.quads[iface - 1] = None;
            }
        }

        // compress the Edge's own arrays: the sample goes, and the
        // collapsed segment's neighbor row goes with it
        let et = &mut self.edges[eindex - 1];
        et.xyz.remove(vindex - 1);
        et.t.remove(vindex - 1);
        for link in et.links.iter_mut() {
            let nf = link.faces.len();
            if nf == 0 {
                continue;
            }
            for _ in 0..nf {
                link.tric.remove(row * nf);
            }
        }
        Ok(())
    }

    /// Insert new samples into an Edge between samples `after` and
    /// `after + 1` (1-based), fanning the one affected triangle on each
    /// adjacent Face.
    pub fn insert_edge_verts(&mut self, eindex: usize, after: usize, ts: &[f64]) -> Result<()> {
        self.check_body_has_faces()?;
        self.edge_index_check(eindex)?;
        if ts.is_empty() {
            return Err(TessError::IndexOutOfRange {
                index: 0,
                lo: 1,
                hi: i64::MAX,
            });
        }
        for w in ts.windows(2) {
            if w[1] <= w[0] {
                return Err(TessError::ParameterOutOfRange {
                    value: w[1],
                    lo: w[0],
                    hi: f64::INFINITY,
                });
            }
        }
        let npts = self.edges[eindex - 1].npts();
        if npts == 0 {
            return Err(TessError::NoDataYet);
        }
        if after < 1 || after > npts - 1 {
            return Err(TessError::IndexOutOfRange {
                index: after as i64,
                lo: 1,
                hi: npts as i64 - 1,
            });
        }
        let (lo, hi) = (
            self.edges[eindex - 1].t[after - 1],
            self.edges[eindex - 1].t[after],
        );
        if ts[0] <= lo || *ts.last().unwrap() >= hi {
            return Err(TessError::ParameterOutOfRange {
                value: ts[0],
                lo,
                hi,
            });
        }
        self.reject_seam_faces(eindex)?;
        let nnew = ts.len();
        let b = &self.topo.bodies[self.body];
        let eid = b.edges[eindex - 1];

        // reject insertion along a segment whose host triangle has a
        // degenerate side (two Node vertices of the same Node), and
        // require the host side itself to be locatable before mutating
        let pre1 = segment_end(&self.edges[eindex - 1], eindex, after, npts);
        let pre2 = segment_end(&self.edges[eindex - 1], eindex, after + 1, npts);
        for m in 0..2 {
            let link = &self.edges[eindex - 1].links[m];
            let nf = link.faces.len();
            for (nx, &iface) in link.faces.iter().enumerate() {
                let it = link.tric[(after - 1) * nf + nx];
                let face = &self.faces[iface - 1];
                if it <= 0 || it as usize > face.tris.len() {
                    return Err(TessError::TopologyMismatch(format!(
                        "edge {} segment has no triangle on face {}",
                        eindex, iface
                    )));
                }
                let tri = face.tris[(it - 1) as usize];
                for s in 0..3 {
                    let a = (tri[crate::refine::SIDES[s][0]] - 1) as usize;
                    let c = (tri[crate::refine::SIDES[s][1]] - 1) as usize;
                    if face.pindex[a] == face.pindex[c]
                        && face.ptype[a] == 0
                        && face.ptype[c] == 0
                    {
                        return Err(TessError::TopologyMismatch(format!(
                            "degenerate segment on face {}",
                            iface
                        )));
                    }
                }
                if flanking_neighbors(face, it as usize, pre1, pre2).is_none() {
                    return Err(TessError::TopologyMismatch(format!(
                        "host segment not found on face {}",
                        iface
                    )));
                }
            }
        }

        // gather all new data before mutating
        let mut new_xyz: Vec<Point3> = Vec::with_capacity(nnew);
        for &t in ts {
            new_xyz.push(self.geom.curves[self.topo.edges[eid].curve].evaluate(t).point);
        }
        // per (side, slot): uv per new point
        let mut new_uv: [Vec<Vec<Point2>>; 2] = [Vec::new(), Vec::new()];
        for m in 0..2 {
            let sense = if m == 0 { -1 } else { 1 };
            let link = &self.edges[eindex - 1].links[m];
            for &iface in &link.faces {
                let fid = b.faces[iface - 1];
                let pc = self
                    .topo
                    .pcurve_for(fid, eid, sense)
                    .ok_or_else(|| {
                        TessError::GeometryError(format!(
                            "missing pcurve on face {} edge {}",
                            iface, eindex
                        ))
                    })?;
                let uvs: Vec<Point2> = ts
                    .iter()
                    .map(|&t| self.geom.pcurves[pc].evaluate(t))
                    .collect();
                new_uv[m].push(uvs);
            }
        }

        let pt1 = segment_end(&self.edges[eindex - 1], eindex, after, npts);
        let pt2 = segment_end(&self.edges[eindex - 1], eindex, after + 1, npts);

        // new Edge sample and neighbor-row arrays
        let et = &self.edges[eindex - 1];
        let mut xyzs = Vec::with_capacity(npts + nnew);
        let mut tvals = Vec::with_capacity(npts + nnew);
        xyzs.extend_from_slice(&et.xyz[..after]);
        tvals.extend_from_slice(&et.t[..after]);
        xyzs.extend_from_slice(&new_xyz);
        tvals.extend_from_slice(ts);
        xyzs.extend_from_slice(&et.xyz[after..]);
        tvals.extend_from_slice(&et.t[after..]);

        let mut new_links: [Vec<i32>; 2] = [Vec::new(), Vec::new()];
        for m in 0..2 {
            let link = &et.links[m];
            let nf = link.faces.len();
            if nf == 0 {
                continue;
            }
            let mut tric = Vec::with_capacity(nf * (npts + nnew - 1));
            tric.extend_from_slice(&link.tric[..after * nf]);
            tric.extend(std::iter::repeat(0).take(nnew * nf));
            tric.extend_from_slice(&link.tric[after * nf..]);
            new_links[m] = tric;
        }

        // fan the host triangle on every adjacent Face
        for m in 0..2 {
            let nf = self.edges[eindex - 1].links[m].faces.len();
            for nx in 0..nf {
                let iface = self.edges[eindex - 1].links[m].faces[nx];
                let itri =
                    self.edges[eindex - 1].links[m].tric[(after - 1) * nf + nx] as usize;
                let uvs = &new_uv[m][nx];
                let face = &mut self.faces[iface - 1];
                let old_npts = face.npts();
                let old_ntris = face.ntris();

                // grown vertex arrays; samples above the split shift up
                for i in 0..old_npts {
                    if face.pindex[i] == eindex as i32 && face.ptype[i] > after as i32 {
                        face.ptype[i] += nnew as i32;
                    }
                }
                for i in 0..nnew {
                    face.xyz.push(new_xyz[i]);
                    face.uv.push(uvs[i]);
                    face.ptype.push(after as i32 + i as i32 + 1);
                    face.pindex.push(eindex as i32);
                }

                // identify the host side and its flanking data
                let tri = face.tris[itri - 1];
                let class = |face: &FaceTess, v: i32| {
                    let i = (v - 1) as usize;
                    (face.ptype[i], face.pindex[i])
                };
                // the host side's endpoint classes, pre-renumber, are
                // pt1/pt2 unless shifted; recompute pt1/pt2 post-shift
                let pt1s = if pt1.0 > after as i32 && pt1.1 == eindex as i32 {
                    (pt1.0 + nnew as i32, pt1.1)
                } else {
                    pt1
                };
                let pt2s = if pt2.0 > after as i32 && pt2.1 == eindex as i32 {
                    (pt2.0 + nnew as i32, pt2.1)
                } else {
                    pt2
                };

                let mut vert = 0i32;
                let mut v0 = 0i32;
                let mut v1 = 0i32;
                let mut n0 = 0i32;
                let mut n1 = 0i32;
                let mut found = false;
                for side in 0..3 {
                    let a = tri[crate::refine::SIDES[side][0]];
                    let c = tri[crate::refine::SIDES[side][1]];
                    let ca = class(face, a);
                    let cc = class(face, c);
                    if (ca == pt1s && cc == pt2s) || (ca == pt2s && cc == pt1s) {
                        vert = tri[side];
                        v0 = a;
                        v1 = c;
                        // neighbors opposite each endpoint of the side
                        n0 = face.tric[itri - 1][crate::refine::SIDES[side][0]];
                        n1 = face.tric[itri - 1][crate::refine::SIDES[side][1]];
                        found = true;
                        break;
                    }
                }
                if !found {
                    return Err(TessError::GeometryError(format!(
                        "host segment not found on face {}",
                        iface
                    )));
                }
                // orient so v0 carries pt1 (the low-parameter end)
                let mut sense = 1;
                if class(face, v1) == pt1s {
                    std::mem::swap(&mut v0, &mut v1);
                    std::mem::swap(&mut n0, &mut n1);
                    sense = -1;
                }
                // n0 flanks v1's corner (it will neighbor the last fan
                // triangle); n1 flanks v0's corner (stays with the host)
                let _ = n1;

                // rewrite the host: v1 becomes the first new vertex,
                // and the side opposite v0 points at the first fan tri
                for s in 0..3 {
                    if face.tris[itri - 1][s] == v1 {
                        face.tris[itri - 1][s] = old_npts as i32 + 1;
                    }
                    if face.tris[itri - 1][s] == v0 {
                        face.tric[itri - 1][s] = old_ntris as i32 + 1;
                    }
                }

                // fan of nnew triangles sharing the apex
                let mut nl = itri as i32;
                for i in 0..nnew {
                    let j = old_ntris + i;
                    let va = old_npts as i32 + i as i32 + 1;
                    let (vn, nn) = if i == nnew - 1 {
                        (v1, n0)
                    } else {
                        (old_npts as i32 + i as i32 + 2, j as i32 + 2)
                    };
                    let (tris_row, tric_row) = if sense == 1 {
                        ([vert, va, vn], [-(eindex as i32), nn, nl])
                    } else {
                        ([vert, vn, va], [-(eindex as i32), nl, nn])
                    };
                    face.tris.push(tris_row);
                    face.tric.push(tric_row);
                    new_links[m][(after + i) * nf + nx] = j as i32 + 1;
                    nl = j as i32 + 1;
                }

                // re-point whatever bordered the host across the
                // retired side at the last fan triangle
                let last_fan = (old_ntris + nnew) as i32;
                if n0 > 0 {
                    for s in 0..3 {
                        if face.tric[(n0 - 1) as usize][s] == itri as i32 {
                            face.tric[(n0 - 1) as usize][s] = last_fan;
                        }
                    }
                } else if n0 < 0 {
                    let ie = (-n0) as usize;
                    if ie == eindex {
                        let link = &mut new_links[m];
                        let rows = link.len() / nf;
                        let matches = (0..rows)
                            .filter(|&k| link[k * nf + nx] == itri as i32)
                            .count();
                        for k in 0..rows {
                            if matches > 1 && k >= after - 1 && k < after + nnew - 1 {
                                continue;
                            }
                            if link[k * nf + nx] == itri as i32 {
                                link[k * nf + nx] = last_fan;
                            }
                        }
                    } else {
                        for link in self.edges[ie - 1].links.iter_mut() {
                            let nfr = link.faces.len();
                            if let Some(slot) = link.faces.iter().position(|&f| f == iface) {
                                for k in 0..link.tric.len() / nfr {
                                    if link.tric[k * nfr + slot] == itri as i32 {
                                        link.tric[k * nfr + slot] = last_fan;
                                    }
                                }
                            }
                        }
                    }
                }

                self.quads[iface - 1] = None;
            }
        }

        // commit the Edge record
        let et = &mut self.edges[eindex - 1];
        et.xyz = xyzs;
        et.t = tvals;
        for m in 0..2 {
            if !et.links[m].faces.is_empty() {
                et.links[m].tric = std::mem::take(&mut new_links[m]);
            }
        }
        Ok(())
    }
}
