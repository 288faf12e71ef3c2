use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tetramesh::behavior::MeshBehavior;
use tetramesh::{CancellationToken, TetMesh};

fn grid_points(n: usize) -> Vec<[f64; 3]> {
    let mut points = Vec::new();
    let step = 1.0 / n as f64;
    for i in 0..=n {
        for j in 0..=n {
            for k in 0..=n {
                points.push([i as f64 * step, j as f64 * step, k as f64 * step]);
            }
        }
    }
    points
}

fn cube_corners() -> Vec<[f64; 3]> {
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

fn bench_delaunay_build(c: &mut Criterion) {
    let points = grid_points(3);
    let behavior = MeshBehavior::default();
    c.bench_function("delaunay_build (64 pts, convex)", |b| {
        b.iter(|| {
            TetMesh::build(
                black_box(&points),
                None,
                black_box(&behavior),
                1,
                &CancellationToken::new(),
            )
            .unwrap()
        })
    });
}

fn bench_delaunay_build_larger(c: &mut Criterion) {
    let points = grid_points(6);
    let behavior = MeshBehavior::default();
    c.bench_function("delaunay_build (343 pts, convex)", |b| {
        b.iter(|| {
            TetMesh::build(
                black_box(&points),
                None,
                black_box(&behavior),
                1,
                &CancellationToken::new(),
            )
            .unwrap()
        })
    });
}

fn bench_quality_refinement(c: &mut Criterion) {
    let points = cube_corners();
    let mut plc = tetramesh::plc::Plc::new();
    let quads: [[usize; 4]; 6] = [
        [0, 1, 2, 3],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ];
    for (id, quad) in quads.iter().enumerate() {
        plc.facets
            .push(tetramesh::plc::Facet::new(id, quad.to_vec()));
    }

    let mut behavior = MeshBehavior::default();
    behavior.plc = true;
    behavior.quality = true;
    behavior.minratio = 1.4;

    c.bench_function("quality_refinement (cube, ratio=1.4)", |b| {
        b.iter(|| {
            TetMesh::build(
                black_box(&points),
                Some(black_box(&plc)),
                black_box(&behavior),
                1,
                &CancellationToken::new(),
            )
            .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_delaunay_build,
    bench_delaunay_build_larger,
    bench_quality_refinement,
);
criterion_main!(benches);
