//! End-to-end scenarios from spec §8: concrete inputs with concrete
//! expected outputs, as opposed to the property-style unit tests living
//! alongside each module.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use tetramesh::behavior::MeshBehavior;
use tetramesh::plc::{Facet, HoleSeed, Plc};
use tetramesh::{CancellationToken, TetMesh};

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

/// Scenario 1: a single tetrahedron, convex-hull-only.
#[test]
fn single_tetrahedron_convex_hull() {
    let points = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
    ];
    let mut behavior = MeshBehavior::default();
    behavior.convex = true;

    let mesh = TetMesh::build(&points, None, &behavior, 1, &cancel()).unwrap();
    assert!(mesh.is_sound().unwrap());
    assert!((mesh.total_volume() - 1.0 / 6.0).abs() < 1e-12);

    let interior_tets = mesh
        .store
        .tets
        .iter_alive()
        .filter(|&t| !mesh.store.tets.get(t).is_ghost())
        .count();
    assert_eq!(interior_tets, 1);
}

fn cube_points() -> Vec<[f64; 3]> {
    vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ]
}

fn cube_plc() -> Plc {
    let mut plc = Plc::new();
    let quads: [[usize; 4]; 6] = [
        [0, 1, 2, 3], // bottom
        [4, 5, 6, 7], // top
        [0, 1, 5, 4], // front
        [1, 2, 6, 5], // right
        [2, 3, 7, 6], // back
        [3, 0, 4, 7], // left
    ];
    for (id, quad) in quads.iter().enumerate() {
        plc.facets.push(Facet::new(id, quad.to_vec()));
    }
    plc
}

/// Scenario 2: a unit cube recovered from its 6 quad facets.
#[test]
fn unit_cube_plc_recovery() {
    let points = cube_points();
    let plc = cube_plc();
    let mut behavior = MeshBehavior::default();
    behavior.plc = true;

    let mesh = TetMesh::build(&points, Some(&plc), &behavior, 2, &cancel()).unwrap();
    assert!(mesh.is_sound().unwrap());
    assert!((mesh.total_volume() - 1.0).abs() < 1e-9);

    for v in 0..8 {
        let incident = mesh
            .store
            .enumerate_star(tetramesh::mesh::Node::Real(v))
            .filter(|&t| !mesh.store.tets.get(t).is_ghost())
            .count();
        assert!(incident >= 3, "corner vertex {v} incident to only {incident} tets");
    }
}

/// Scenario 3: the same cube refined under a radius-edge and volume bound.
#[test]
fn unit_cube_quality_refinement() {
    let points = cube_points();
    let plc = cube_plc();
    let mut behavior = MeshBehavior::default();
    behavior.plc = true;
    behavior.quality = true;
    behavior.minratio = 2.0;
    behavior.varvolume = true;
    behavior.maxvolume = 0.05;

    let mesh = TetMesh::build(&points, Some(&plc), &behavior, 3, &cancel()).unwrap();
    assert!(mesh.is_sound().unwrap());

    for t in mesh.store.tets.iter_alive() {
        let tet = mesh.store.tets.get(t);
        if tet.is_ghost() {
            continue;
        }
        let coords: Vec<_> = tet
            .nodes
            .iter()
            .map(|n| mesh.store.node_coords(*n).unwrap())
            .collect();
        let coords: [[f64; 3]; 4] = [coords[0], coords[1], coords[2], coords[3]];
        assert!(tetramesh::predicates::aspect_ratio(&coords) <= 2.0 + 1e-6);
        assert!(tetramesh::predicates::volume(&coords) <= 0.05 + 1e-9);
    }
}

/// Scenario 4: a cube with a cubic hole carved out of its interior. The
/// hole is bounded by a real nested cube (side 0.4, centered at the same
/// point as its seed), not just a seed point floating in open space.
#[test]
fn cube_with_interior_hole() {
    let mut points = cube_points();
    let inner: [[f64; 3]; 8] = [
        [0.3, 0.3, 0.3],
        [0.7, 0.3, 0.3],
        [0.7, 0.7, 0.3],
        [0.3, 0.7, 0.3],
        [0.3, 0.3, 0.7],
        [0.7, 0.3, 0.7],
        [0.7, 0.7, 0.7],
        [0.3, 0.7, 0.7],
    ];
    let inner_base = points.len();
    points.extend_from_slice(&inner);

    let mut plc = cube_plc();
    let quads: [[usize; 4]; 6] = [
        [0, 1, 2, 3],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ];
    for (i, quad) in quads.iter().enumerate() {
        let verts: Vec<usize> = quad.iter().map(|&v| v + inner_base).collect();
        plc.facets.push(Facet::new(6 + i, verts));
    }
    plc.holes.push(HoleSeed {
        point: [0.5, 0.5, 0.5],
    });

    let mut behavior = MeshBehavior::default();
    behavior.plc = true;

    let mesh = TetMesh::build(&points, Some(&plc), &behavior, 4, &cancel()).unwrap();
    assert!(mesh.is_sound().unwrap());
    assert!(mesh.unreachable_holes.is_empty());
    assert!((mesh.total_volume() - (1.0 - 0.4_f64.powi(3))).abs() < 1e-9);

    for t in mesh.store.tets.iter_alive() {
        let tet = mesh.store.tets.get(t);
        if tet.is_ghost() {
            continue;
        }
        let coords: Vec<_> = tet
            .nodes
            .iter()
            .map(|n| mesh.store.node_coords(*n).unwrap())
            .collect();
        let centroid = [
            (coords[0][0] + coords[1][0] + coords[2][0] + coords[3][0]) / 4.0,
            (coords[0][1] + coords[1][1] + coords[2][1] + coords[3][1]) / 4.0,
            (coords[0][2] + coords[1][2] + coords[2][2] + coords[3][2]) / 4.0,
        ];
        let inside_hole = (0.3..0.7).contains(&centroid[0])
            && (0.3..0.7).contains(&centroid[1])
            && (0.3..0.7).contains(&centroid[2]);
        assert!(!inside_hole, "tet centroid {centroid:?} lies inside the hole cube");
    }
}

/// Scenario 5: 20 random points, convex-hull-only. Checks P3 directly and
/// cross-checks the mesh's hull boundary against an independently computed
/// reference (brute-force "every other point is on one side" hull test,
/// not sharing any code with the mesh's own predicates).
#[test]
fn random_points_convex_hull_matches_independent_reference() {
    let mut rng = ChaCha8Rng::seed_from_u64(20);
    let points: Vec<[f64; 3]> = (0..20)
        .map(|_| {
            [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ]
        })
        .collect();

    let mut behavior = MeshBehavior::default();
    behavior.convex = true;

    let mesh = TetMesh::build(&points, None, &behavior, 5, &cancel()).unwrap();
    assert!(mesh.is_sound().unwrap());

    for t in mesh.store.tets.iter_alive() {
        let tet = mesh.store.tets.get(t);
        if tet.is_ghost() {
            continue;
        }
        let tet_ids: Vec<usize> = tet.nodes.iter().map(|n| n.id().unwrap()).collect();
        let tet_coords: Vec<_> = tet
            .nodes
            .iter()
            .map(|n| mesh.store.node_coords(*n).unwrap())
            .collect();
        for v in 0..points.len() {
            if tet_ids.contains(&v) {
                continue;
            }
            let sign = tetramesh::predicates::insphere(
                &tet_coords[0],
                &tet_coords[1],
                &tet_coords[2],
                &tet_coords[3],
                &points[v],
            );
            assert!(sign <= 1e-9, "tet {tet_ids:?} is encroached by vertex {v}");
        }
    }

    assert_eq!(mesh_boundary_triangles(&mesh), independent_convex_hull(&points));
}

fn mesh_boundary_triangles(mesh: &TetMesh) -> BTreeSet<[usize; 3]> {
    let mut faces = BTreeSet::new();
    for t in mesh.store.tets.iter_alive() {
        let tet = mesh.store.tets.get(t);
        if tet.is_ghost() {
            continue;
        }
        for face in 0..4 {
            let neighbor = tet.neighbors[face];
            if mesh.store.tets.get(neighbor).is_ghost() {
                let mut tri: Vec<usize> = tet
                    .face_nodes(face)
                    .iter()
                    .map(|n| n.id().unwrap())
                    .collect();
                tri.sort_unstable();
                faces.insert([tri[0], tri[1], tri[2]]);
            }
        }
    }
    faces
}

/// Plain scalar-triple-product orientation test, independent of
/// `tetramesh::predicates::orient3d`'s adaptive-precision machinery.
fn naive_orient3d(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let ad = [d[0] - a[0], d[1] - a[1], d[2] - a[2]];
    ab[0] * (ac[1] * ad[2] - ac[2] * ad[1]) - ab[1] * (ac[0] * ad[2] - ac[2] * ad[0])
        + ab[2] * (ac[0] * ad[1] - ac[1] * ad[0])
}

/// A triple of points is a hull face exactly when every other point lies
/// weakly on one side of the plane it defines.
fn independent_convex_hull(points: &[[f64; 3]]) -> BTreeSet<[usize; 3]> {
    let n = points.len();
    let mut faces = BTreeSet::new();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let mut pos = false;
                let mut neg = false;
                for (l, &p) in points.iter().enumerate() {
                    if l == i || l == j || l == k {
                        continue;
                    }
                    let v = naive_orient3d(points[i], points[j], points[k], p);
                    if v > 1e-9 {
                        pos = true;
                    }
                    if v < -1e-9 {
                        neg = true;
                    }
                }
                if !(pos && neg) {
                    faces.insert([i, j, k]);
                }
            }
        }
    }
    faces
}

/// Scenario 6 (P9): identical input, options, and seed produce the same
/// tetrahedron count and total volume across two independent runs.
#[test]
fn deterministic_given_identical_seed() {
    let points = cube_points();
    let plc = cube_plc();
    let mut behavior = MeshBehavior::default();
    behavior.plc = true;
    behavior.quality = true;
    behavior.minratio = 1.4;

    let a = TetMesh::build(&points, Some(&plc), &behavior, 42, &cancel()).unwrap();
    let b = TetMesh::build(&points, Some(&plc), &behavior, 42, &cancel()).unwrap();

    assert_eq!(a.store.tets.count_alive(), b.store.tets.count_alive());
    assert!((a.total_volume() - b.total_volume()).abs() < 1e-12);
}
