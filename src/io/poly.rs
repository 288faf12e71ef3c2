//! `.poly`: a `.node` section followed by facets (each a set of polygons
//! plus optional per-facet holes), a global hole-point block, and a region
//! block. Grounded line-by-line on `tetgen_io.py`'s `load_poly`: facet
//! polygon vertex indices are stored 1-based on disk and converted to
//! 0-based on load.
//!
//! `.poly` indices are plain node-list positions, not mesh `VertexId`s —
//! [`PolyFile::into_plc`] remaps them once the caller has inserted the
//! node list into a mesh store and knows each node's `VertexId`.

use crate::error::{Location, MeshError, MeshResult};
use crate::io::node::NodeFile;
use crate::io::{format_float, significant_lines};
use crate::mesh::VertexId;
use crate::plc::{Facet, HoleSeed, Plc, Polygon, RegionSeed};
use crate::utils::types::Vertex3;

#[derive(Debug, Clone, PartialEq)]
pub struct PolyFacet {
    pub polygons: Vec<Vec<usize>>,
    pub hole_points: Vec<Vertex3>,
    pub marker: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyHole {
    pub point: Vertex3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyRegion {
    pub point: Vertex3,
    pub attribute: f64,
    pub max_volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyFile {
    pub nodes: NodeFile,
    pub facets: Vec<PolyFacet>,
    pub holes: Vec<PolyHole>,
    pub regions: Vec<PolyRegion>,
}

impl PolyFile {
    pub fn parse(text: &str) -> MeshResult<Self> {
        let lines = significant_lines(text);
        let mut idx = 0usize;

        let node_section_end = find_node_section_end(&lines)?;
        let node_text = lines[..node_section_end].join("\n");
        let nodes = NodeFile::parse(&node_text)?;
        idx = node_section_end;

        let facets = parse_facets(&lines, &mut idx)?;
        let holes = parse_holes(&lines, &mut idx)?;
        let regions = parse_regions(&lines, &mut idx)?;

        Ok(Self {
            nodes,
            facets,
            holes,
            regions,
        })
    }

    pub fn to_text(&self) -> String {
        let mut out = self.nodes.to_text();

        let any_marker = self.facets.iter().any(|f| f.marker.is_some());
        out.push_str(&format!(
            "{} {}\n",
            self.facets.len(),
            if any_marker { 1 } else { 0 }
        ));
        for facet in &self.facets {
            out.push_str(&format!(
                "{} {}{}\n",
                facet.polygons.len(),
                facet.hole_points.len(),
                facet
                    .marker
                    .map(|m| format!(" {m}"))
                    .unwrap_or_default()
            ));
            for polygon in &facet.polygons {
                out.push_str(&format!("{}", polygon.len()));
                for &v in polygon {
                    out.push_str(&format!(" {}", v + self.nodes.first_number));
                }
                out.push('\n');
            }
            for p in &facet.hole_points {
                out.push_str(&format!(
                    "{} {} {}\n",
                    format_float(p[0]),
                    format_float(p[1]),
                    format_float(p[2])
                ));
            }
        }

        out.push_str(&format!("{}\n", self.holes.len()));
        for (i, hole) in self.holes.iter().enumerate() {
            out.push_str(&format!(
                "{} {} {} {}\n",
                i + 1,
                format_float(hole.point[0]),
                format_float(hole.point[1]),
                format_float(hole.point[2])
            ));
        }

        out.push_str(&format!("{}\n", self.regions.len()));
        for (i, region) in self.regions.iter().enumerate() {
            out.push_str(&format!(
                "{} {} {} {} {} {}\n",
                i + 1,
                format_float(region.point[0]),
                format_float(region.point[1]),
                format_float(region.point[2]),
                format_float(region.attribute),
                format_float(region.max_volume.unwrap_or(-1.0))
            ));
        }

        out
    }

    /// Remaps node-list positions to mesh `VertexId`s, building a `Plc`
    /// ready for [`crate::ConstraintRecoverer`]. `vertex_ids[i]` must be
    /// the `VertexId` the caller inserted for `self.nodes.records[i]`.
    pub fn into_plc(&self, vertex_ids: &[VertexId], next_facet_id: &mut impl FnMut() -> usize, next_region_id: &mut impl FnMut() -> usize) -> MeshResult<Plc> {
        let mut plc = Plc::new();

        for facet in &self.facets {
            let mut polygons = Vec::with_capacity(facet.polygons.len());
            for ring in &facet.polygons {
                let vertices = ring
                    .iter()
                    .map(|&i| {
                        vertex_ids.get(i).copied().ok_or_else(|| {
                            MeshError::input(
                                format!("facet polygon references out-of-range node {i}"),
                                Location::Line(0),
                            )
                        })
                    })
                    .collect::<MeshResult<Vec<_>>>()?;
                polygons.push(Polygon { vertices });
            }
            let outer = polygons.first().map(|p| p.vertices.clone()).unwrap_or_default();
            let mut f = Facet::new(next_facet_id(), outer);
            f.polygons = polygons;
            f.hole_points = facet.hole_points.clone();
            f.marker = facet.marker.unwrap_or(0);
            plc.facets.push(f);
        }

        for hole in &self.holes {
            plc.holes.push(HoleSeed { point: hole.point });
        }
        for region in &self.regions {
            plc.regions.push(RegionSeed {
                id: next_region_id(),
                point: region.point,
                attribute: region.attribute,
                max_volume: region.max_volume,
            });
        }

        Ok(plc)
    }
}

fn find_node_section_end(lines: &[&str]) -> MeshResult<usize> {
    let header: Vec<&str> = lines
        .first()
        .ok_or_else(|| MeshError::input("empty `.poly` file", Location::Line(0)))?
        .split_whitespace()
        .collect();
    let num_points: usize = header
        .first()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MeshError::input("malformed `.poly` node header", Location::Line(0)))?;
    Ok((1 + num_points).min(lines.len()))
}

fn parse_facets(lines: &[&str], idx: &mut usize) -> MeshResult<Vec<PolyFacet>> {
    let Some(header_line) = lines.get(*idx) else {
        return Ok(Vec::new());
    };
    let header: Vec<&str> = header_line.split_whitespace().collect();
    let num_facets: usize = header
        .first()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MeshError::input("malformed `.poly` facet header", Location::Line(*idx)))?;
    let has_marker = header.get(1).and_then(|s| s.parse::<usize>().ok()).unwrap_or(0) != 0;
    *idx += 1;

    let mut facets = Vec::with_capacity(num_facets);
    for _ in 0..num_facets {
        let parts: Vec<&str> = lines
            .get(*idx)
            .ok_or_else(|| MeshError::input("truncated `.poly` facet section", Location::Line(*idx)))?
            .split_whitespace()
            .collect();
        *idx += 1;
        let num_polygons: usize = parts[0]
            .parse()
            .map_err(|_| MeshError::input("malformed facet polygon count", Location::Line(*idx)))?;
        let num_holes: usize = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        let marker = if has_marker {
            parts.get(2).and_then(|s| s.parse().ok())
        } else {
            None
        };

        let mut polygons = Vec::with_capacity(num_polygons);
        for _ in 0..num_polygons {
            let poly_parts: Vec<&str> = lines
                .get(*idx)
                .ok_or_else(|| MeshError::input("truncated facet polygon", Location::Line(*idx)))?
                .split_whitespace()
                .collect();
            *idx += 1;
            let n: usize = poly_parts[0]
                .parse()
                .map_err(|_| MeshError::input("malformed polygon vertex count", Location::Line(*idx)))?;
            let mut vertices = Vec::with_capacity(n);
            for k in 1..=n {
                let raw: i64 = poly_parts
                    .get(k)
                    .ok_or_else(|| MeshError::input("truncated polygon vertex list", Location::Line(*idx)))?
                    .parse()
                    .map_err(|_| MeshError::input("malformed polygon vertex index", Location::Line(*idx)))?;
                vertices.push((raw - 1) as usize);
            }
            polygons.push(vertices);
        }

        let mut hole_points = Vec::with_capacity(num_holes);
        for _ in 0..num_holes {
            let hp: Vec<&str> = lines
                .get(*idx)
                .ok_or_else(|| MeshError::input("truncated facet hole list", Location::Line(*idx)))?
                .split_whitespace()
                .collect();
            *idx += 1;
            hole_points.push(parse_point(&hp, 0)?);
        }

        facets.push(PolyFacet {
            polygons,
            hole_points,
            marker,
        });
    }
    Ok(facets)
}

fn parse_holes(lines: &[&str], idx: &mut usize) -> MeshResult<Vec<PolyHole>> {
    let Some(header_line) = lines.get(*idx) else {
        return Ok(Vec::new());
    };
    let num_holes: usize = header_line
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MeshError::input("malformed `.poly` hole header", Location::Line(*idx)))?;
    *idx += 1;
    let mut holes = Vec::with_capacity(num_holes);
    for _ in 0..num_holes {
        let parts: Vec<&str> = lines
            .get(*idx)
            .ok_or_else(|| MeshError::input("truncated `.poly` hole section", Location::Line(*idx)))?
            .split_whitespace()
            .collect();
        *idx += 1;
        holes.push(PolyHole {
            point: parse_point(&parts, 1)?,
        });
    }
    Ok(holes)
}

fn parse_regions(lines: &[&str], idx: &mut usize) -> MeshResult<Vec<PolyRegion>> {
    let Some(header_line) = lines.get(*idx) else {
        return Ok(Vec::new());
    };
    let num_regions: usize = header_line
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MeshError::input("malformed `.poly` region header", Location::Line(*idx)))?;
    *idx += 1;
    let mut regions = Vec::with_capacity(num_regions);
    for _ in 0..num_regions {
        let parts: Vec<&str> = lines
            .get(*idx)
            .ok_or_else(|| MeshError::input("truncated `.poly` region section", Location::Line(*idx)))?
            .split_whitespace()
            .collect();
        *idx += 1;
        let point = parse_point(&parts, 1)?;
        let attribute: f64 = parts.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let max_volume = parts
            .get(5)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| *v > 0.0);
        regions.push(PolyRegion {
            point,
            attribute,
            max_volume,
        });
    }
    Ok(regions)
}

fn parse_point(parts: &[&str], offset: usize) -> MeshResult<Vertex3> {
    let get = |k: usize| -> MeshResult<f64> {
        parts
            .get(offset + k)
            .ok_or_else(|| MeshError::input("truncated coordinate triple", Location::Line(0)))?
            .parse()
            .map_err(|_| MeshError::input("malformed coordinate", Location::Line(0)))
    };
    Ok([get(0)?, get(1)?, get(2)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cube_poly() {
        let text = "\
8 3 0 0
1 0 0 0
2 1 0 0
3 1 1 0
4 0 1 0
5 0 0 1
6 1 0 1
7 1 1 1
8 0 1 1
6 0
1 0
4 1 2 3 4
1 0
4 5 6 7 8
1 0
4 1 2 6 5
1 0
4 2 3 7 6
1 0
4 3 4 8 7
1 0
4 4 1 5 8
0
0
";
        let poly = PolyFile::parse(text).unwrap();
        assert_eq!(poly.nodes.records.len(), 8);
        assert_eq!(poly.facets.len(), 6);
        assert_eq!(poly.facets[0].polygons[0], vec![0, 1, 2, 3]);
        assert!(poly.holes.is_empty());
        assert!(poly.regions.is_empty());
    }
}
