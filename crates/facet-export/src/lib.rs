#![warn(missing_docs)]

//! Triangle-soup export for facet tessellations.
//!
//! Writes the simple ASCII format consumed by cartesian flow solvers:
//! a `<nvert> <ntri>` header, one `x y z` line per vertex, and one
//! 1-based `i1 i2 i3` line per triangle (optionally followed by the
//! owning Face index as a component id). Boundary vertices shared
//! between Faces are zipper-merged on their `(ptype, pindex)`
//! classification so the soup is watertight.

use std::io::Write;

use facet_kernel_tess::Tessellation;
use thiserror::Error;

/// Errors that can occur during export.
#[derive(Error, Debug)]
pub enum ExportError {
    /// A Face carries no triangles.
    #[error("face {0} has no triangles")]
    NoData(usize),

    /// The underlying writer failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Write the whole Body tessellation as an ASCII triangle soup.
///
/// With `with_components` each triangle line carries the 1-based Face
/// index it came from.
pub fn write_soup<W: Write>(
    tess: &Tessellation,
    w: &mut W,
    with_components: bool,
) -> Result<()> {
    let nface = tess.num_faces();

    // classification table across all Faces; boundary vertices merge
    // with the first occurrence of their (ptype, pindex) pair
    let mut class: Vec<(i32, i32)> = Vec::new();
    let mut remap: Vec<usize> = Vec::new();
    let mut xyz_out: Vec<[f64; 3]> = Vec::new();

    for f in 1..=nface {
        let ft = tess
            .face(f)
            .map_err(|_| ExportError::NoData(f))?;
        if ft.ntris() == 0 {
            return Err(ExportError::NoData(f));
        }
        for i in 0..ft.npts() {
            let key = (ft.ptype[i], ft.pindex[i]);
            let mut target = None;
            if key.0 != -1 {
                target = class.iter().position(|&c| c == key);
            }
            match target {
                Some(k) => remap.push(remap[k]),
                None => {
                    let p = ft.xyz[i];
                    xyz_out.push([p.x, p.y, p.z]);
                    remap.push(xyz_out.len());
                }
            }
            class.push(key);
        }
    }

    let ntri: usize = (1..=nface).map(|f| tess.face(f).unwrap().ntris()).sum();
    writeln!(w, "{} {}", xyz_out.len(), ntri)?;
    for p in &xyz_out {
        writeln!(w, "{} {} {}", p[0], p[1], p[2])?;
    }

    let mut base = 0usize;
    for f in 1..=nface {
        let ft = tess.face(f).unwrap();
        for tri in &ft.tris {
            let ids = [
                remap[base + (tri[0] - 1) as usize],
                remap[base + (tri[1] - 1) as usize],
                remap[base + (tri[2] - 1) as usize],
            ];
            if with_components {
                writeln!(w, "{} {} {} {}", ids[0], ids[1], ids[2], f)?;
            } else {
                writeln!(w, "{} {} {}", ids[0], ids[1], ids[2])?;
            }
        }
        base += ft.npts();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_kernel_primitives::make_box;
    use facet_kernel_tess::{tessellate_body, TessParams};
    use std::collections::HashMap;

    #[test]
    fn test_box_soup_watertight() {
        let brep = make_box([0.0, 0.0, 0.0].into(), 1.0, 1.0, 1.0);
        let tess = tessellate_body(
            &brep.topology,
            &brep.geometry,
            brep.body,
            TessParams::new(0.25, 0.001, 15.0),
        )
        .unwrap();

        let mut buf = Vec::new();
        write_soup(&tess, &mut buf, true).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        let header: Vec<usize> = lines
            .next()
            .unwrap()
            .split_whitespace()
            .map(|s| s.parse().unwrap())
            .collect();
        let (nvert, ntri) = (header[0], header[1]);

        let verts: Vec<&str> = lines.by_ref().take(nvert).collect();
        assert_eq!(verts.len(), nvert);
        let tris: Vec<Vec<usize>> = lines
            .map(|l| {
                l.split_whitespace()
                    .map(|s| s.parse().unwrap())
                    .collect::<Vec<usize>>()
            })
            .collect();
        assert_eq!(tris.len(), ntri);

        // indices in range, component ids valid
        let mut edge_use: HashMap<(usize, usize), usize> = HashMap::new();
        for t in &tris {
            assert_eq!(t.len(), 4);
            for &i in &t[..3] {
                assert!(i >= 1 && i <= nvert);
            }
            assert!(t[3] >= 1 && t[3] <= 6);
            for s in 0..3 {
                let a = t[s];
                let b = t[(s + 1) % 3];
                *edge_use.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }
        // a closed solid merges into a watertight soup: every edge
        // shared by exactly two triangles
        for (&(a, b), &n) in &edge_use {
            assert_eq!(n, 2, "edge {}-{} used {} times", a, b, n);
        }
    }

    #[test]
    fn test_merge_reduces_vertex_count() {
        let brep = make_box([0.0, 0.0, 0.0].into(), 1.0, 1.0, 1.0);
        let tess = tessellate_body(
            &brep.topology,
            &brep.geometry,
            brep.body,
            TessParams::new(0.25, 0.001, 15.0),
        )
        .unwrap();
        let per_face: usize = (1..=6).map(|f| tess.face(f).unwrap().npts()).sum();

        let mut buf = Vec::new();
        write_soup(&tess, &mut buf, false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let nvert: usize = text
            .lines()
            .next()
            .unwrap()
            .split_whitespace()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(nvert < per_face, "{} !< {}", nvert, per_face);
    }
}
