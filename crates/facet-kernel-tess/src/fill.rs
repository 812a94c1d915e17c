//! Loop filler: triangulate a parameter-plane polygon with holes.
//!
//! Works off a doubly-linked front of boundary segments. Triangles are
//! peeled by three strategies tried in order each round: isolated-ear
//! removal, figure-eight resolution (a vertex shared by two
//! non-consecutive front segments), and shortest-segment advance toward
//! the best visible candidate vertex. A conservative first pass rejects
//! any candidate whose new sides cross the front or the original
//! boundary; the tolerant second pass additionally admits collinear
//! boundary overlaps so degenerate-but-legal trims can close.

use facet_kernel_math::{area2d, dist2_2d, Point2};

const NOTFILLED: i32 = -1;
const TOL: f64 = 1.0e-7;

#[derive(Debug, Clone, Copy)]
struct FrontSeg {
    sleft: i32,
    i0: i32,
    i1: i32,
    sright: i32,
    snew: bool,
    mark: bool,
}

/// Reusable scratch buffers of the filler, owned by the build context.
#[derive(Debug, Clone, Default)]
pub struct FillScratch {
    front: Vec<FrontSeg>,
    pts: Vec<i32>,
    segs: Vec<[i32; 2]>,
}

/// Why a fill attempt produced no triangulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillFail {
    /// A contour had fewer than three points.
    DegenerateContour,
    /// The front could not be fully collapsed.
    Incomplete,
}

/// A successful fill.
#[derive(Debug, Clone)]
pub struct FillResult {
    /// Emitted triangles as 1-based vertex triples, CCW in the plane.
    pub tris: Vec<[i32; 3]>,
    /// Figure-eight occurrences found in the outer contour; each drops
    /// the expected triangle count by two from `n - 2 + 2*holes`.
    pub n_fig8: usize,
}

/// Expected triangle count for `npts` total points and `ncontours`
/// contours, before figure-eight adjustment.
pub fn expected_tris(npts: usize, ncontours: usize) -> usize {
    npts - 2 + 2 * (ncontours - 1)
}

/// Check whether the sides `(front[index].i0, i2)` / `(i2, front[index].i1)`
/// of a candidate triangle would cross the active front or the original
/// boundary. Returns true when crossing (candidate must be rejected).
fn cross_seg(
    scratch: &FillScratch,
    index: usize,
    mid: Point2,
    i2: i32,
    verts: &[Point2],
    pass: bool,
) -> bool {
    let uv2 = verts[i2 as usize];
    let if0 = scratch.front[index].i0;
    let if1 = scratch.front[index].i1;
    let uvf0 = verts[if0 as usize];
    let uvf1 = verts[if1 as usize];

    let dist2 = dist2_2d(mid, uv2);
    let dist_f = dist2_2d(uvf0, uvf1);
    let eps = (dist2 + dist_f) * f64::EPSILON;

    let angle = (uv2.y - mid.y).atan2(uv2.x - mid.x);
    let (sinan, cosan) = angle.sin_cos();

    // the active front (only segments created by the advance)
    for (i, f) in scratch.front.iter().enumerate() {
        if i == index || f.sright == NOTFILLED || !f.snew {
            continue;
        }
        let (i0, i1) = (f.i0, f.i1);
        if i0 == i2 || i1 == i2 {
            continue;
        }
        let uv0 = verts[i0 as usize];
        let uv1 = verts[i1 as usize];
        let ty0 = (uv0.y - mid.y) * cosan - (uv0.x - mid.x) * sinan;
        let ty1 = (uv1.y - mid.y) * cosan - (uv1.x - mid.x) * sinan;
        if ty0 == 0.0 && ty1 == 0.0 {
            return true;
        }
        if ty0 * ty1 >= 0.0 {
            continue;
        }
        let frac = -ty0 / (ty1 - ty0);
        if !(0.0..=1.0).contains(&frac) {
            continue;
        }
        let x = Point2::new(uv0.x + frac * (uv1.x - uv0.x), uv0.y + frac * (uv1.y - uv0.y));
        let along = (x.x - mid.x) * cosan + (x.y - mid.y) * sinan;
        if along > 0.0 && along * along < dist2 * (1.0 + TOL) {
            return true;
        }
    }

    // the original loops
    for seg in &scratch.segs {
        let (i0, i1) = (seg[0], seg[1]);
        if (i0 == if0 && i1 == if1) || (i0 == if1 && i1 == if0) {
            continue;
        }
        let uv0 = verts[i0 as usize];
        let uv1 = verts[i1 as usize];

        if pass {
            // collinear overlap checks against both front endpoints
            let a10 = area2d(uv2, uv1, uvf0).abs();
            let a00 = area2d(uv2, uv0, uvf0).abs();
            if a10 < eps && a00 < eps {
                let del2 = uv2 - uvf0;
                let del1 = uv1 - uvf0;
                let del0 = uv0 - uvf0;
                if i1 != if0 && del2.dot(&del1) > 0.0 && del2.norm_squared() > del1.norm_squared() {
                    return true;
                }
                if i0 != if0 && del2.dot(&del0) > 0.0 && del2.norm_squared() > del0.norm_squared() {
                    return true;
                }
            }
            let a11 = area2d(uv2, uv1, uvf1).abs();
            let a01 = area2d(uv2, uv0, uvf1).abs();
            if a11 < eps && a01 < eps {
                let del2 = uv2 - uvf1;
                let del1 = uv1 - uvf1;
                let del0 = uv0 - uvf1;
                if i1 != if1 && del2.dot(&del1) > 0.0 && del2.norm_squared() > del1.norm_squared() {
                    return true;
                }
                if i0 != if1 && del2.dot(&del0) > 0.0 && del2.norm_squared() > del0.norm_squared() {
                    return true;
                }
            }
        }

        if i1 == i2 || i0 == i2 {
            continue;
        }
        let ty0 = (uv0.y - mid.y) * cosan - (uv0.x - mid.x) * sinan;
        let ty1 = (uv1.y - mid.y) * cosan - (uv1.x - mid.x) * sinan;
        if ty0 == 0.0 && ty1 == 0.0 {
            return true;
        }
        if ty0 * ty1 >= 0.0 {
            continue;
        }
        let frac = -ty0 / (ty1 - ty0);
        if !(0.0..=1.0).contains(&frac) {
            continue;
        }
        let x = Point2::new(uv0.x + frac * (uv1.x - uv0.x), uv0.y + frac * (uv1.y - uv0.y));
        let along = (x.x - mid.x) * cosan + (x.y - mid.y) * sinan;
        if along > 0.0 && along * along < dist2 * (1.0 + TOL) {
            return true;
        }
    }

    false
}

/// Triangulate the polygon-with-holes given by `cntr` contour lengths
/// over the 1-based vertex array `verts` (`verts[0]` reserved). The
/// first contour is the counter-clockwise outer boundary, the rest are
/// clockwise holes.
pub fn fill_area(
    scratch: &mut FillScratch,
    cntr: &[usize],
    verts: &[Point2],
    pass: bool,
) -> Result<FillResult, FillFail> {
    if cntr.iter().any(|&n| n < 3) {
        return Err(FillFail::DegenerateContour);
    }
    let nfront: usize = cntr.iter().sum();
    if nfront == 0 {
        return Err(FillFail::DegenerateContour);
    }

    let mtri = nfront - 2 + 2 * (cntr.len() - 1);
    let mut tris: Vec<[i32; 3]> = Vec::with_capacity(mtri);
    let mut n_fig8 = 0usize;

    scratch.front.clear();
    scratch.segs.clear();
    scratch.pts.clear();
    scratch.pts.resize(nfront + 1, 0);

    // seed the front and the boundary segment list
    let mut start = 0usize;
    for &len in cntr {
        let mut left = start + len - 1;
        for j in 0..len {
            scratch.segs.push([(left + 1) as i32, (start + j + 1) as i32]);
            scratch.front.push(FrontSeg {
                sleft: left as i32,
                i0: (left + 1) as i32,
                i1: (start + j + 1) as i32,
                sright: (start + j + 1) as i32,
                snew: false,
                mark: false,
            });
            left = start + j;
        }
        let last = scratch.front.len() - 1;
        scratch.front[last].sright = start as i32;
        start += len;
    }

    // collapse repeated vertices within each contour (figure eights)
    let mut base = 0usize;
    for (ci, &len) in cntr.iter().enumerate() {
        for j in 0..len.saturating_sub(1) {
            let i0 = (base + j + 1) as i32;
            for k in (j + 1)..len {
                let i1 = (base + k + 1) as i32;
                if verts[i0 as usize] == verts[i1 as usize] {
                    if i0 + 1 == i1 {
                        tracing::warn!(contour = ci, "null segment between {} and {}", i0, i1);
                        continue;
                    }
                    tracing::debug!(contour = ci, "figure-eight vertex {} == {}", i0, i1);
                    if ci == 0 {
                        n_fig8 += 1;
                    }
                    for f in scratch.front.iter_mut() {
                        if f.i0 == i1 {
                            f.i0 = i0;
                        }
                        if f.i1 == i1 {
                            f.i1 = i0;
                        }
                    }
                }
            }
        }
        base += len;
    }

    // collapse the front
    let mut neg = false;
    'outer: while tris.len() < mtri {
        // count right-hand vertex hits
        for p in scratch.pts.iter_mut() {
            *p = 0;
        }
        for f in &scratch.front {
            if f.sright != NOTFILLED {
                scratch.pts[f.i1 as usize] += 1;
            }
        }

        // 1) simple isolated triangles
        let mut peeled = 0;
        for i in 0..scratch.front.len() {
            if scratch.front[i].sright == NOTFILLED {
                continue;
            }
            let i0 = scratch.front[i].i0;
            let i1 = scratch.front[i].i1;
            let right = scratch.front[i].sright as usize;
            let left = scratch.front[right].sright as usize;
            if scratch.front[left].i1 != i0 {
                continue;
            }
            let i2 = scratch.front[right].i1;
            let area = area2d(verts[i0 as usize], verts[i1 as usize], verts[i2 as usize]);
            if !neg && area <= 0.0 {
                continue;
            }
            if scratch.front[left].sright != i as i32 {
                let s = scratch.front[left].sright as usize;
                scratch.front[s].sleft = scratch.front[i].sleft;
                let s = scratch.front[i].sleft as usize;
                scratch.front[s].sright = scratch.front[left].sright;
            }
            tris.push([i0, i1, i2]);
            scratch.front[i].sleft = NOTFILLED;
            scratch.front[i].sright = NOTFILLED;
            scratch.front[right].sleft = NOTFILLED;
            scratch.front[right].sright = NOTFILLED;
            scratch.front[left].sleft = NOTFILLED;
            scratch.front[left].sright = NOTFILLED;
            peeled += 1;
            neg = false;
            if tris.len() >= mtri {
                break;
            }
        }
        if peeled != 0 {
            continue 'outer;
        }

        // 2) triangles hidden by figure-eight vertices
        for i in 0..scratch.front.len() {
            if scratch.front[i].sright == NOTFILLED {
                continue;
            }
            let i0 = scratch.front[i].i0;
            let i1 = scratch.front[i].i1;
            if scratch.pts[i1 as usize] == 1 {
                continue;
            }
            for k in 0..scratch.front.len() {
                if scratch.front[k].sright == NOTFILLED {
                    continue;
                }
                if k as i32 == scratch.front[i].sright {
                    continue;
                }
                if scratch.front[k].i0 != i1 {
                    continue;
                }
                let i2 = scratch.front[k].i1;
                let area = area2d(verts[i0 as usize], verts[i1 as usize], verts[i2 as usize]);
                if !neg && area <= 0.0 {
                    continue;
                }
                for l in 0..scratch.front.len() {
                    if scratch.front[l].sright == NOTFILLED
                        || scratch.front[l].sleft == NOTFILLED
                    {
                        continue;
                    }
                    if scratch.front[l].i0 != i2 || scratch.front[l].i1 != i0 {
                        continue;
                    }
                    // re-link the front so (i, k, l) become consecutive
                    if scratch.front[i].sleft != l as i32 {
                        let index = scratch.front[i].sleft as usize;
                        let indx2 = scratch.front[l].sright as usize;
                        scratch.front[i].sleft = l as i32;
                        scratch.front[l].sright = i as i32;
                        scratch.front[index].sright = indx2 as i32;
                        scratch.front[indx2].sleft = index as i32;
                    }
                    if scratch.front[i].sright != k as i32 {
                        let index = scratch.front[i].sright as usize;
                        let indx2 = scratch.front[k].sleft as usize;
                        scratch.front[i].sright = k as i32;
                        scratch.front[k].sleft = i as i32;
                        scratch.front[index].sleft = indx2 as i32;
                        scratch.front[indx2].sright = index as i32;
                    }
                    if scratch.front[k].sright != l as i32 {
                        let index = scratch.front[k].sright as usize;
                        let indx2 = scratch.front[l].sleft as usize;
                        scratch.front[k].sright = l as i32;
                        scratch.front[l].sleft = k as i32;
                        scratch.front[index].sleft = indx2 as i32;
                        scratch.front[indx2].sright = index as i32;
                    }
                    let left = scratch.front[i].sleft as usize;
                    let right = scratch.front[i].sright as usize;
                    tris.push([i0, i1, i2]);
                    scratch.front[i].sleft = NOTFILLED;
                    scratch.front[i].sright = NOTFILLED;
                    scratch.front[right].sleft = NOTFILLED;
                    scratch.front[right].sright = NOTFILLED;
                    scratch.front[left].sleft = NOTFILLED;
                    scratch.front[left].sright = NOTFILLED;
                    peeled += 1;
                    neg = false;
                    break;
                }
                if tris.len() >= mtri || peeled != 0 {
                    break;
                }
            }
            if tris.len() >= mtri {
                break;
            }
            if peeled != 0 {
                break;
            }
        }
        if peeled != 0 {
            continue 'outer;
        }

        // 3) advance from the shortest live segment
        for f in scratch.front.iter_mut() {
            f.mark = false;
        }
        let mut chosen: Option<(usize, usize)> = None;
        loop {
            let mut index = None;
            let mut side2 = f64::MAX;
            for (i, f) in scratch.front.iter().enumerate() {
                if f.sright == NOTFILLED || f.mark {
                    continue;
                }
                let d = dist2_2d(verts[f.i0 as usize], verts[f.i1 as usize]);
                if d < side2 {
                    side2 = d;
                    index = Some(i);
                }
            }
            let Some(index) = index else { break };

            let i0 = scratch.front[index].i0;
            let i1 = scratch.front[index].i1;
            let uv0 = verts[i0 as usize];
            let uv1 = verts[i1 as usize];
            let mid = Point2::new(0.5 * (uv0.x + uv1.x), 0.5 * (uv0.y + uv1.y));

            // best candidate: closest to the midpoint, correct area,
            // no crossings
            let mut indx2 = None;
            let mut best = f64::MAX;
            for (i, f) in scratch.front.iter().enumerate() {
                if i == index || f.sright == NOTFILLED {
                    continue;
                }
                let i2 = f.i1;
                if i2 == i0 || i2 == i1 {
                    continue;
                }
                let uv2 = verts[i2 as usize];
                let area = area2d(uv0, uv1, uv2);
                if area > 0.0 {
                    let d = dist2_2d(mid, uv2) / area;
                    if d < best {
                        if cross_seg(scratch, index, mid, i2, verts, pass) {
                            continue;
                        }
                        best = d;
                        indx2 = Some(i);
                    }
                }
            }
            if let Some(indx2) = indx2 {
                chosen = Some((index, indx2));
                break;
            }
            // no candidate for a segment this small; retry with the
            // next larger one and hope for closure later
            scratch.front[index].mark = true;
        }
        let Some((index, indx2)) = chosen else {
            if !neg {
                neg = true;
                continue 'outer;
            }
            tracing::warn!("loop fill cannot find a live segment");
            break 'outer;
        };
        let i0 = scratch.front[index].i0;
        let i1 = scratch.front[index].i1;

        let i2 = scratch.front[indx2].i1;
        tris.push([i0, i1, i2]);
        neg = false;

        // patch up the front
        let left = scratch.front[index].sleft as usize;
        let right = scratch.front[index].sright as usize;

        if i2 == scratch.front[left].i0 {
            // candidate ends the left segment
            scratch.front[left].sright = right as i32;
            scratch.front[left].i1 = i1;
            scratch.front[left].snew = true;
            scratch.front[right].sleft = left as i32;
            scratch.front[index].sleft = NOTFILLED;
            scratch.front[index].sright = NOTFILLED;
        } else if i2 == scratch.front[right].i1 {
            // candidate starts the right segment
            scratch.front[left].sright = right as i32;
            scratch.front[right].sleft = left as i32;
            scratch.front[right].i0 = i0;
            scratch.front[right].snew = true;
            scratch.front[index].sleft = NOTFILLED;
            scratch.front[index].sright = NOTFILLED;
        } else {
            let mut handled = false;

            // figure-eight link through i0
            if scratch.pts[i0 as usize] != 1 {
                for i in 0..scratch.front.len() {
                    if scratch.front[i].sright == NOTFILLED {
                        continue;
                    }
                    if scratch.front[i].i0 != i2 || scratch.front[i].i1 != i0 {
                        continue;
                    }
                    let j = scratch.front[i].sright as usize;
                    scratch.front[left].sright = j as i32;
                    scratch.front[j].sleft = left as i32;
                    scratch.front[index].sleft = i as i32;
                    scratch.front[i].sright = index as i32;
                    let new_left = i;
                    scratch.front[new_left].sright = right as i32;
                    scratch.front[new_left].i1 = i1;
                    scratch.front[new_left].snew = true;
                    scratch.front[right].sleft = new_left as i32;
                    scratch.front[index].sleft = NOTFILLED;
                    scratch.front[index].sright = NOTFILLED;
                    handled = true;
                    break;
                }
            }

            // figure-eight link through i1
            if scratch.pts[i1 as usize] != 1 && !handled {
                for i in 0..scratch.front.len() {
                    if scratch.front[i].sright == NOTFILLED {
                        continue;
                    }
                    if scratch.front[i].i0 != i1 || scratch.front[i].i1 != i2 {
                        continue;
                    }
                    let j = scratch.front[i].sleft as usize;
                    scratch.front[right].sleft = j as i32;
                    scratch.front[j].sright = right as i32;
                    scratch.front[index].sright = i as i32;
                    scratch.front[i].sleft = index as i32;
                    let new_right = i;
                    scratch.front[left].sright = new_right as i32;
                    scratch.front[new_right].sleft = left as i32;
                    scratch.front[new_right].i0 = i0;
                    scratch.front[new_right].snew = true;
                    scratch.front[index].sleft = NOTFILLED;
                    scratch.front[index].sright = NOTFILLED;
                    handled = true;
                    break;
                }
            }

            // general case: split the front with a new segment
            if !handled {
                let next = match scratch
                    .front
                    .iter()
                    .position(|f| f.sright == NOTFILLED)
                {
                    Some(n) => n,
                    None => {
                        scratch.front.push(FrontSeg {
                            sleft: NOTFILLED,
                            i0: 0,
                            i1: 0,
                            sright: NOTFILLED,
                            snew: false,
                            mark: false,
                        });
                        scratch.front.len() - 1
                    }
                };
                let start = scratch.front[indx2].sright as usize;
                scratch.front[index].i1 = i2;
                scratch.front[index].sright = start as i32;
                scratch.front[index].snew = true;
                scratch.front[start].sleft = index as i32;
                scratch.front[indx2].sright = next as i32;
                scratch.front[right].sleft = next as i32;
                scratch.front[next].sleft = indx2 as i32;
                scratch.front[next].i0 = i2;
                scratch.front[next].i1 = i1;
                scratch.front[next].sright = right as i32;
                scratch.front[next].snew = true;
            }
        }
    }

    let unused = scratch
        .front
        .iter()
        .filter(|f| f.sright != NOTFILLED)
        .count();
    if unused != 0 {
        tracing::debug!(unused, "loop fill left unconnected front segments");
        return Err(FillFail::Incomplete);
    }
    Ok(FillResult { tris, n_fig8 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verts_of(pts: &[(f64, f64)]) -> Vec<Point2> {
        let mut v = vec![Point2::new(0.0, 0.0)];
        v.extend(pts.iter().map(|&(x, y)| Point2::new(x, y)));
        v
    }

    fn tri_area_sum(tris: &[[i32; 3]], verts: &[Point2]) -> f64 {
        tris.iter()
            .map(|t| {
                0.5 * area2d(
                    verts[t[0] as usize],
                    verts[t[1] as usize],
                    verts[t[2] as usize],
                )
            })
            .sum()
    }

    #[test]
    fn test_square() {
        let verts = verts_of(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let mut scratch = FillScratch::default();
        let out = fill_area(&mut scratch, &[4], &verts, false).unwrap();
        assert_eq!(out.tris.len(), 2);
        assert_eq!(out.n_fig8, 0);
        assert!((tri_area_sum(&out.tris, &verts) - 1.0).abs() < 1e-12);
        for t in &out.tris {
            assert!(
                area2d(
                    verts[t[0] as usize],
                    verts[t[1] as usize],
                    verts[t[2] as usize]
                ) > 0.0
            );
        }
    }

    #[test]
    fn test_concave_polygon() {
        // an L shape
        let verts = verts_of(&[
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ]);
        let mut scratch = FillScratch::default();
        let out = fill_area(&mut scratch, &[6], &verts, false).unwrap();
        assert_eq!(out.tris.len(), 4);
        assert!((tri_area_sum(&out.tris, &verts) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_square_with_hole() {
        // outer CCW, inner CW
        let verts = verts_of(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.4, 0.4),
            (0.4, 0.6),
            (0.6, 0.6),
            (0.6, 0.4),
        ]);
        let mut scratch = FillScratch::default();
        let out = fill_area(&mut scratch, &[4, 4], &verts, false).unwrap();
        assert_eq!(out.tris.len(), expected_tris(8, 2));
        assert_eq!(out.tris.len(), 8);
        assert!((tri_area_sum(&out.tris, &verts) - (1.0 - 0.04)).abs() < 1e-12);
        for t in &out.tris {
            assert!(
                area2d(
                    verts[t[0] as usize],
                    verts[t[1] as usize],
                    verts[t[2] as usize]
                ) > 0.0
            );
        }
    }

    #[test]
    fn test_every_edge_shared_or_boundary() {
        let verts = verts_of(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.4, 0.4),
            (0.4, 0.6),
            (0.6, 0.6),
            (0.6, 0.4),
        ]);
        let mut scratch = FillScratch::default();
        let out = fill_area(&mut scratch, &[4, 4], &verts, false).unwrap();
        let mut counts = std::collections::HashMap::new();
        for t in &out.tris {
            for s in 0..3 {
                let a = t[s];
                let b = t[(s + 1) % 3];
                *counts.entry((a.min(b), a.max(b))).or_insert(0usize) += 1;
            }
        }
        for (&(a, b), &c) in &counts {
            let boundary = scratch
                .segs
                .iter()
                .any(|s| (s[0].min(s[1]), s[0].max(s[1])) == (a, b));
            if boundary {
                assert_eq!(c, 1, "boundary edge {}-{} shared", a, b);
            } else {
                assert_eq!(c, 2, "interior edge {}-{} not shared", a, b);
            }
        }
    }

    #[test]
    fn test_figure_eight_outer_loop() {
        // self-touching bow tie at (0.5, 0.5)
        let verts = verts_of(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (0.5, 0.5),
            (1.0, 1.0),
            (0.0, 1.0),
            (0.5, 0.5),
        ]);
        let mut scratch = FillScratch::default();
        let out = fill_area(&mut scratch, &[6], &verts, false).unwrap();
        assert_eq!(out.n_fig8, 1);
        // two triangles per lobe
        assert_eq!(out.tris.len(), 4);
        for t in &out.tris {
            assert!(
                area2d(
                    verts[t[0] as usize],
                    verts[t[1] as usize],
                    verts[t[2] as usize]
                ) > 0.0
            );
        }
        assert!((tri_area_sum(&out.tris, &verts) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_contour_rejected() {
        let verts = verts_of(&[(0.0, 0.0), (1.0, 0.0)]);
        let mut scratch = FillScratch::default();
        assert_eq!(
            fill_area(&mut scratch, &[2], &verts, false).unwrap_err(),
            FillFail::DegenerateContour
        );
    }
}
