//! Tetrahedralizes a unit cube given as a PLC (8 corners, 6 quad facets),
//! refines it under a radius-edge bound, and prints the `.node`/`.ele`
//! text a real run would hand off to a viewer.

use tetramesh::behavior::MeshBehavior;
use tetramesh::io::{EleFile, EleRecord, NodeFile, NodeRecord};
use tetramesh::plc::{Facet, Plc};
use tetramesh::{CancellationToken, TetMesh};

fn main() {
    env_logger::init();

    let points = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];

    let mut plc = Plc::new();
    let quads: [[usize; 4]; 6] = [
        [0, 1, 2, 3],
        [4, 5, 6, 7],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ];
    for (id, quad) in quads.iter().enumerate() {
        plc.facets.push(Facet::new(id, quad.to_vec()));
    }

    let mut behavior = MeshBehavior::default();
    behavior.plc = true;
    behavior.quality = true;
    behavior.minratio = 1.4;

    let mesh = TetMesh::build(&points, Some(&plc), &behavior, 42, &CancellationToken::new())
        .expect("cube tetrahedralization failed");

    println!("built {} tetrahedra, total volume {:.6}", mesh.store.tets.count_alive(), mesh.total_volume());

    let node_file = NodeFile {
        records: mesh
            .store
            .vertices
            .iter_live()
            .map(|v| NodeRecord {
                coords: mesh.store.vertices.coords(v),
                attributes: Vec::new(),
                marker: None,
            })
            .collect(),
        num_attributes: 0,
        has_markers: false,
        first_number: 1,
    };
    print!("{}", node_file.to_text());

    let ele_file = EleFile {
        records: mesh
            .store
            .tets
            .iter_alive()
            .filter(|&t| !mesh.store.tets.get(t).is_ghost())
            .map(|t| {
                let tet = mesh.store.tets.get(t);
                EleRecord {
                    vertices: tet.nodes.iter().map(|n| n.id().unwrap()).collect(),
                    attributes: Vec::new(),
                }
            })
            .collect(),
        num_corners: 4,
        first_number: 1,
    };
    print!("{}", ele_file.to_text());
}
