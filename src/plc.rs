//! Piecewise linear complex types: the input-level segments, facets, and
//! region/hole seeds that `recover` and `carve` consume.
//!
//! Grounded on `original_source/python/tetgen/tetgen_io.py`'s `Polygon`/
//! `Facet` pair (a facet is a list of polygons plus interior hole points);
//! the teacher crate has no PLC concept at all, so these are new types
//! following the field layout of spec.md §3.

use crate::mesh::{FacetId, RegionId, VertexId};
use crate::utils::types::Vertex3;

/// An ordered pair of vertex ids marking a required edge, carrying a
/// boundary marker (0 by default, matching `.poly`'s optional marker
/// column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub a: VertexId,
    pub b: VertexId,
    pub marker: i32,
}

impl Segment {
    pub fn new(a: VertexId, b: VertexId) -> Self {
        Self { a, b, marker: 0 }
    }

    /// The segment's two endpoints as an unordered pair, for set-style
    /// comparisons against recovered mesh edges.
    pub fn endpoints(&self) -> [VertexId; 2] {
        [self.a, self.b]
    }
}

/// A triangle marking part of an input facet after its polygon has been
/// triangulated, carrying the owning facet id and the facet's marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subface {
    pub vertices: [VertexId; 3],
    pub facet: FacetId,
    pub marker: i32,
}

/// A simple polygon ring (no holes of its own): vertex ids in order around
/// the boundary. Mirrors `tetgen_io.py`'s `Polygon.vertex_list`.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub vertices: Vec<VertexId>,
}

/// An input-level polygonal facet: one or more polygons (an outer ring plus
/// optional inner rings describing holes-in-the-facet-plane) and a list of
/// points marking holes punched through those inner rings, per
/// `tetgen_io.py`'s `Facet`.
#[derive(Debug, Clone)]
pub struct Facet {
    pub id: FacetId,
    pub polygons: Vec<Polygon>,
    /// Points inside an inner ring identifying it as a hole in this facet's
    /// own plane (as opposed to a hole in the volume, which is a
    /// [`HoleSeed`]).
    pub hole_points: Vec<Vertex3>,
    pub marker: i32,
}

impl Facet {
    pub fn new(id: FacetId, outer_ring: Vec<VertexId>) -> Self {
        Self {
            id,
            polygons: vec![Polygon {
                vertices: outer_ring,
            }],
            hole_points: Vec::new(),
            marker: 0,
        }
    }

    /// All vertex ids referenced by any ring of this facet, in ring order,
    /// duplicates included (a vertex shared by two rings appears twice).
    pub fn ring_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.polygons.iter().flat_map(|p| p.vertices.iter().copied())
    }
}

/// A point inside a connected region, the region's attribute, and an
/// optional maximum volume bound for tets carved into that region.
#[derive(Debug, Clone, Copy)]
pub struct RegionSeed {
    pub id: RegionId,
    pub point: Vertex3,
    pub attribute: f64,
    pub max_volume: Option<f64>,
}

/// A point inside a region to delete entirely during carving.
#[derive(Debug, Clone, Copy)]
pub struct HoleSeed {
    pub point: Vertex3,
}

/// The full PLC: points are already registered in the mesh store's vertex
/// arena by the time this is built (segment/facet vertex ids index into
/// it), so this only carries the topology.
#[derive(Debug, Clone, Default)]
pub struct Plc {
    pub segments: Vec<Segment>,
    pub facets: Vec<Facet>,
    pub regions: Vec<RegionSeed>,
    pub holes: Vec<HoleSeed>,
}

impl Plc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every segment implied by a facet's polygon rings (consecutive
    /// vertex pairs, including the wrap-around edge), deduplicated against
    /// explicitly listed segments by the caller.
    pub fn facet_boundary_segments(facet: &Facet) -> Vec<Segment> {
        let mut segs = Vec::new();
        for polygon in &facet.polygons {
            let n = polygon.vertices.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let a = polygon.vertices[i];
                let b = polygon.vertices[(i + 1) % n];
                segs.push(Segment::new(a, b));
            }
        }
        segs
    }
}
