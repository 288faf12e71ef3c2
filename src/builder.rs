//! The Delaunay builder: turns a raw point list into a sound Delaunay
//! tetrahedralization, surrounded by ghost tets.
//!
//! Grounded on the teacher's `insert_first_tet`/`insert_vertices`
//! (`rita/src/tetrahedralization.rs`), generalized from the half-triangle
//! DCEL to the face-adjacency `MeshStore` and extended with BRIO (the
//! teacher only Hilbert-sorts; see `utils::point_order::brio_order_3d`).

use crate::error::{Location, MeshError, MeshResult};
use crate::mesh::{MeshStore, Node, Position, TetId, Tetrahedron, Vertex, VertexId, VertexTag};
use crate::predicates::orient3d;
use crate::utils::types::{sub, Vertex3};
use std::collections::HashSet;

/// Registers `coords` as a new vertex and inserts it into the mesh via
/// Bowyer–Watson cavity retriangulation. If `coords` coincides exactly with
/// an existing vertex, no new vertex is created and the existing id is
/// returned.
pub fn insert_point(mesh: &mut MeshStore, coords: Vertex3, tag: VertexTag) -> VertexId {
    let loc = mesh.locate(&coords);
    if let Position::OnVertex(local) = loc.position {
        if let Some(existing) = mesh.node_at(loc.tet, local).id() {
            #[cfg(feature = "logging")]
            log::warn!("duplicate vertex at {coords:?}, reusing existing vertex {existing:?}");
            return existing;
        }
    }

    let vid = mesh.vertices.insert(Vertex {
        coords,
        attributes: Vec::new(),
        marker: 0,
        tag,
        incident_tet: None,
    });
    let seeds = cavity_seeds(mesh, &loc);
    let cavity = mesh.find_cavity_seeded(&seeds, &coords);
    mesh.fill_cavity(&cavity, Node::Real(vid));
    vid
}

/// The tets that must be unconditionally absorbed into a cavity before the
/// usual insphere-driven flood takes over, given where the point landed.
///
/// A point inside a tet, or outside the hull, only ever needs that one tet
/// as a seed — `find_cavity`'s insphere flood takes it from there. A point
/// landing exactly on a face or edge sits on the boundary of every tet
/// around it, where the insphere test is degenerate (reads as exactly
/// zero); absorbing the whole face pair, or the whole edge ring, directly
/// avoids fanning a zero-volume tet off a face/edge the new vertex itself
/// lies in.
fn cavity_seeds(mesh: &MeshStore, loc: &crate::mesh::LocateResult) -> Vec<TetId> {
    match loc.position {
        Position::OnFace(local) => {
            let tet = mesh.tets.get(loc.tet);
            let neighbor = tet.neighbors[local];
            vec![loc.tet, neighbor]
        }
        Position::OnEdge(a, b) => {
            let tet = mesh.tets.get(loc.tet);
            let edge = [tet.nodes[a], tet.nodes[b]];
            mesh.enumerate_edge_ring(edge).collect()
        }
        _ => vec![loc.tet],
    }
}

/// Builds a Delaunay tetrahedralization of `points` from scratch: BRIO +
/// Hilbert-sorted incremental insertion starting from a seed tetrahedron.
/// Returns the vertex ids in input order (index `i` of the result
/// corresponds to `points[i]`).
pub fn build(mesh: &mut MeshStore, points: &[Vertex3]) -> MeshResult<Vec<VertexId>> {
    if points.len() < 4 {
        return Err(MeshError::input(
            format!("need at least 4 points, got {}", points.len()),
            Location::Vertices((0..points.len()).collect()),
        ));
    }

    let ids: Vec<VertexId> = points
        .iter()
        .map(|&p| {
            mesh.vertices.insert(Vertex {
                coords: p,
                attributes: Vec::new(),
                marker: 0,
                tag: VertexTag::Input,
                incident_tet: None,
            })
        })
        .collect();

    let mut insertion_order = crate::utils::point_order::brio_order_3d(
        &all_coords(mesh, &ids),
        (0..ids.len()).collect(),
        &mut mesh.rng,
    );
    // `brio_order_3d` orders local indices 0..n into `points`; translate to
    // vertex ids and consume front-to-back (first 4 seed the mesh).
    let mut queue: Vec<VertexId> = insertion_order.drain(..).map(|local| ids[local]).collect();
    queue.reverse(); // pop() takes from the seeded, Hilbert-coherent front

    seed_first_tet(mesh, &mut queue)?;

    #[cfg(feature = "logging")]
    log::debug!("inserting {} vertices via BRIO order", queue.len());

    while let Some(vid) = queue.pop() {
        insert_existing_vertex(mesh, vid);
    }

    #[cfg(feature = "logging")]
    log::info!(
        "Delaunay build done: {} vertices, {} live tets",
        ids.len(),
        mesh.tets.count_alive()
    );

    Ok(ids)
}

fn all_coords(mesh: &MeshStore, ids: &[VertexId]) -> Vec<Vertex3> {
    ids.iter().map(|&id| mesh.vertices.coords(id)).collect()
}

/// Inserts a vertex that has already been registered in the arena (used for
/// every point after the seed tet, where re-registering would duplicate
/// it).
fn insert_existing_vertex(mesh: &mut MeshStore, vid: VertexId) {
    let coords = mesh.vertices.coords(vid);
    let loc = mesh.locate(&coords);
    let seeds = cavity_seeds(mesh, &loc);
    let cavity = mesh.find_cavity_seeded(&seeds, &coords);
    mesh.fill_cavity(&cavity, Node::Real(vid));
}

/// Finds four non-coplanar points at the front of `queue` (consuming them,
/// along with any discovered to be collinear with the first two, which are
/// pushed back for later insertion) and builds the seed tetrahedron plus its
/// surrounding ghost shell.
///
/// Mirrors the teacher's `insert_first_tet`: pick the first two points in
/// insertion order, then the point farthest along their connecting line's
/// perpendicular spread (maximizing numerical stability), then scan for the
/// first point not coplanar with those three.
fn seed_first_tet(mesh: &mut MeshStore, queue: &mut Vec<VertexId>) -> MeshResult<()> {
    let v0 = queue.pop().expect("checked len >= 4");
    let v1 = queue.pop().expect("checked len >= 4");
    let p0 = mesh.vertices.coords(v0);
    let p1 = mesh.vertices.coords(v1);
    let d01 = sub(p1, p0);

    let mut best_idx = None;
    let mut best_score = -1.0;
    for (i, &vid) in queue.iter().enumerate() {
        let p = mesh.vertices.coords(vid);
        let proj = crate::utils::types::dot(sub(p, p0), d01).abs();
        if proj > best_score {
            best_score = proj;
            best_idx = Some(i);
        }
    }
    let v2 = match best_idx {
        Some(i) => queue.remove(i),
        None => {
            #[cfg(feature = "logging")]
            log::error!("fewer than 4 distinct points available while seeding first tet");
            return Err(MeshError::input(
                "fewer than 4 distinct points available",
                Location::Vertices(vec![v0, v1]),
            ));
        }
    };
    let p2 = mesh.vertices.coords(v2);

    let mut aligned = Vec::new();
    let v3 = loop {
        let Some(candidate) = queue.pop() else {
            queue.append(&mut aligned);
            #[cfg(feature = "logging")]
            log::error!("all remaining points are coplanar with the first three seed points");
            return Err(MeshError::geometry(
                "all remaining points are coplanar with the first three",
                Location::Vertices(vec![v0, v1, v2]),
            ));
        };
        let pc = mesh.vertices.coords(candidate);
        let orientation = orient3d(&p0, &p1, &p2, &pc);
        if orientation == 0.0 {
            aligned.push(candidate);
            continue;
        }
        break candidate;
    };
    queue.append(&mut aligned);
    let p3 = mesh.vertices.coords(v3);

    // Orient (v0, v1, v2, v3) positively.
    let (a, b, c, d) = if orient3d(&p0, &p1, &p2, &p3) > 0.0 {
        (v0, v1, v2, v3)
    } else {
        (v0, v2, v1, v3)
    };

    build_seed_shell(mesh, [a, b, c, d]);
    Ok(())
}

/// Builds the single real tetrahedron `[a, b, c, d]` (already positively
/// oriented) plus its four surrounding ghost tets, fully linked.
fn build_seed_shell(mesh: &mut MeshStore, verts: [VertexId; 4]) {
    let [a, b, c, d] = verts;
    let real_nodes = [Node::Real(a), Node::Real(b), Node::Real(c), Node::Real(d)];

    let real_id = mesh.tets.insert(blank(real_nodes));

    // One ghost tet per face of the real tet. `real`'s face_nodes(i) is
    // wound so that plugging `real.nodes[i]` itself into orient3d against
    // that face gives a positive result (that's what "positively oriented
    // tet" means); the ghost standing on the far side of that face must
    // therefore see the *reversed* winding, so orient3d against it is
    // positive exactly when a point is exterior to the hull through this
    // face. The `FACE_NODES` table's index-0 entry already performs that
    // reversal, so the ghost's nodes are `face` in its original order.
    let mut ghost_ids = [0usize; 4];
    for i in 0..4 {
        let face = real_tet_face_nodes(real_nodes, i);
        let nodes = [Node::Ghost, face[0], face[1], face[2]];
        ghost_ids[i] = mesh.tets.insert(blank(nodes));
        mesh.link(real_id, i, ghost_ids[i], 0);
    }

    // Stitch the four ghost tets to each other along their shared edges
    // (each pair of ghost tets shares an edge of the real tet plus the
    // ghost node).
    for i in 0..4 {
        for j in (i + 1)..4 {
            if let Some((fi, fj)) = matching_ghost_faces(mesh, ghost_ids[i], ghost_ids[j]) {
                mesh.link(ghost_ids[i], fi, ghost_ids[j], fj);
            }
        }
    }

    for &id in std::iter::once(&real_id).chain(ghost_ids.iter()) {
        for node in mesh.tets.get(id).nodes {
            if let Some(v) = node.id() {
                mesh.touch_vertex(v, id);
            }
        }
    }
    mesh.last_tet = Some(real_id);
}

fn real_tet_face_nodes(nodes: [Node; 4], opposite: usize) -> [Node; 3] {
    const FACE_NODES: [[usize; 3]; 4] = [[1, 3, 2], [0, 2, 3], [0, 3, 1], [0, 1, 2]];
    let idx = FACE_NODES[opposite];
    [nodes[idx[0]], nodes[idx[1]], nodes[idx[2]]]
}

fn matching_ghost_faces(mesh: &MeshStore, a: TetId, b: TetId) -> Option<(usize, usize)> {
    for fa in 1..4 {
        let set_a: HashSet<Node> = mesh.tets.get(a).face_nodes(fa).into_iter().collect();
        for fb in 1..4 {
            let set_b: HashSet<Node> = mesh.tets.get(b).face_nodes(fb).into_iter().collect();
            if set_a == set_b {
                return Some((fa, fb));
            }
        }
    }
    None
}

fn blank(nodes: [Node; 4]) -> Tetrahedron {
    Tetrahedron {
        nodes,
        neighbors: [TetId::MAX; 4],
        face_markers: [None; 4],
        region: None,
        volume_bound: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_sound_mesh_from_a_grid() {
        let mut points = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..3 {
                    points.push([i as f64, j as f64, k as f64]);
                }
            }
        }
        let mut mesh = MeshStore::new(7);
        let ids = build(&mut mesh, &points).unwrap();
        assert_eq!(ids.len(), points.len());
        assert!(mesh.is_sound().unwrap());
        assert!(mesh.tets.iter_alive().any(|t| !mesh.tets.get(t).is_ghost()));
    }

    #[test]
    fn fewer_than_four_points_is_a_input_error() {
        let mut mesh = MeshStore::new(1);
        let points = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let err = build(&mut mesh, &points).unwrap_err();
        assert!(matches!(err, MeshError::Input { .. }));
    }

    #[test]
    fn all_coplanar_points_is_a_geometry_error() {
        let mut mesh = MeshStore::new(1);
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        let err = build(&mut mesh, &points).unwrap_err();
        assert!(matches!(err, MeshError::Geometry { .. }));
    }

    #[test]
    fn inserting_a_duplicate_point_reuses_the_existing_vertex() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mut mesh = MeshStore::new(1);
        let ids = build(&mut mesh, &points).unwrap();
        let before = mesh.vertices.iter_live().count();

        let dup = insert_point(&mut mesh, points[0], VertexTag::Input);
        assert_eq!(dup, ids[0]);
        assert_eq!(mesh.vertices.iter_live().count(), before);
    }
}
