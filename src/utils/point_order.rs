//! Spatial point ordering: Hilbert-curve sorts (adapted from the teacher's
//! `rita/src/utils/point_order.rs`, which this reuses near-verbatim) plus a
//! BRIO pre-pass built on top of them.
//!
//! BRIO (biased randomized insertion order, Amenta/Choi/Rote) recursively
//! splits the point set into halves by an independent coin flip per point,
//! producing a sequence of nested rounds; processing rounds from the
//! smallest up and Hilbert-sorting within each round gives expected
//! O(n log n) incremental insertion and, unlike plain Hilbert order alone,
//! resists adversarial orderings where the walk's starting tet is always far
//! from the next point.

use super::types::Vertex3;
use rand::Rng;

type Vertex2 = [f64; 2];

/// Sorts `indices_to_add` along a 2D Hilbert curve over `vertices`.
pub fn sort_along_hilbert_curve_2d(vertices: &[Vertex2], indices_to_add: &[usize]) -> Vec<usize> {
    let mut curve_order = Vec::new();
    let (v_min, v_max) = find_min_max_2d(vertices, indices_to_add);

    let mut to_subdiv = vec![(0u8, v_min, v_max, indices_to_add.to_vec())];

    while let Some((rot, pt_min, pt_max, indices)) = to_subdiv.pop() {
        match indices.len().cmp(&1) {
            std::cmp::Ordering::Greater => {
                let sep_x = (pt_min[0] + pt_max[0]) / 2.0;
                let sep_y = (pt_min[1] + pt_max[1]) / 2.0;

                let mut ind_a = Vec::new();
                let mut ind_b = Vec::new();
                let mut ind_c = Vec::new();
                let mut ind_d = Vec::new();

                for ind in indices {
                    let vert = vertices[ind];
                    if vert[0] < sep_x {
                        if vert[1] < sep_y {
                            ind_a.push(ind);
                        } else {
                            ind_b.push(ind);
                        }
                    } else if vert[1] < sep_y {
                        ind_d.push(ind);
                    } else {
                        ind_c.push(ind);
                    }
                }

                let pt_a_min = pt_min;
                let pt_a_max = [sep_x, sep_y];
                let pt_b_min = [pt_min[0], sep_y];
                let pt_b_max = [sep_x, pt_max[1]];
                let pt_c_min = [sep_x, sep_y];
                let pt_c_max = pt_max;
                let pt_d_min = [sep_x, pt_min[1]];
                let pt_d_max = [pt_max[0], sep_y];

                match rot {
                    0 => {
                        to_subdiv.push((3, pt_a_min, pt_a_max, ind_a));
                        to_subdiv.push((0, pt_b_min, pt_b_max, ind_b));
                        to_subdiv.push((0, pt_c_min, pt_c_max, ind_c));
                        to_subdiv.push((7, pt_d_min, pt_d_max, ind_d));
                    }
                    1 => {
                        to_subdiv.push((6, pt_d_min, pt_d_max, ind_d));
                        to_subdiv.push((1, pt_c_min, pt_c_max, ind_c));
                        to_subdiv.push((1, pt_b_min, pt_b_max, ind_b));
                        to_subdiv.push((2, pt_a_min, pt_a_max, ind_a));
                    }
                    2 => {
                        to_subdiv.push((5, pt_b_min, pt_b_max, ind_b));
                        to_subdiv.push((2, pt_c_min, pt_c_max, ind_c));
                        to_subdiv.push((2, pt_d_min, pt_d_max, ind_d));
                        to_subdiv.push((1, pt_a_min, pt_a_max, ind_a));
                    }
                    3 => {
                        to_subdiv.push((0, pt_a_min, pt_a_max, ind_a));
                        to_subdiv.push((3, pt_d_min, pt_d_max, ind_d));
                        to_subdiv.push((3, pt_c_min, pt_c_max, ind_c));
                        to_subdiv.push((4, pt_b_min, pt_b_max, ind_b));
                    }
                    4 => {
                        to_subdiv.push((7, pt_c_min, pt_c_max, ind_c));
                        to_subdiv.push((4, pt_d_min, pt_d_max, ind_d));
                        to_subdiv.push((4, pt_a_min, pt_a_max, ind_a));
                        to_subdiv.push((3, pt_b_min, pt_b_max, ind_b));
                    }
                    5 => {
                        to_subdiv.push((2, pt_b_min, pt_b_max, ind_b));
                        to_subdiv.push((5, pt_a_min, pt_a_max, ind_a));
                        to_subdiv.push((5, pt_d_min, pt_d_max, ind_d));
                        to_subdiv.push((6, pt_c_min, pt_c_max, ind_c));
                    }
                    6 => {
                        to_subdiv.push((1, pt_d_min, pt_d_max, ind_d));
                        to_subdiv.push((6, pt_a_min, pt_a_max, ind_a));
                        to_subdiv.push((6, pt_b_min, pt_b_max, ind_b));
                        to_subdiv.push((5, pt_c_min, pt_c_max, ind_c));
                    }
                    _ => {
                        to_subdiv.push((4, pt_c_min, pt_c_max, ind_c));
                        to_subdiv.push((7, pt_b_min, pt_b_max, ind_b));
                        to_subdiv.push((7, pt_a_min, pt_a_max, ind_a));
                        to_subdiv.push((0, pt_d_min, pt_d_max, ind_d));
                    }
                }
            }
            std::cmp::Ordering::Equal => curve_order.push(indices[0]),
            std::cmp::Ordering::Less => (),
        }
    }

    curve_order
}

fn find_min_max_2d(vertices: &[Vertex2], indices_to_add: &[usize]) -> (Vertex2, Vertex2) {
    let mut v_min = vertices[indices_to_add[0]];
    let mut v_max = vertices[indices_to_add[0]];
    for &ind in indices_to_add {
        let vertex = vertices[ind];
        v_min[0] = v_min[0].min(vertex[0]);
        v_min[1] = v_min[1].min(vertex[1]);
        v_max[0] = v_max[0].max(vertex[0]);
        v_max[1] = v_max[1].max(vertex[1]);
    }
    (v_min, v_max)
}

/// Sorts `indices_to_add` along a 3D Hilbert curve over `vertices`.
pub fn sort_along_hilbert_curve_3d(vertices: &[Vertex3], indices_to_add: &[usize]) -> Vec<usize> {
    let mut curve_order = Vec::new();

    let mut pt_min = vertices[indices_to_add[0]];
    let mut pt_max = vertices[indices_to_add[0]];
    for &ind in indices_to_add {
        for axis in 0..3 {
            pt_min[axis] = pt_min[axis].min(vertices[ind][axis]);
            pt_max[axis] = pt_max[axis].max(vertices[ind][axis]);
        }
    }

    let mut to_subdiv = vec![([0usize, 0, 0], 0usize, pt_min, pt_max, indices_to_add.to_vec())];

    while let Some((start, dir, pt_min, pt_max, indices_to_add)) = to_subdiv.pop() {
        match indices_to_add.len().cmp(&1) {
            std::cmp::Ordering::Greater => {
                let sep_x = (pt_min[0] + pt_max[0]) / 2.0;
                let sep_y = (pt_min[1] + pt_max[1]) / 2.0;
                let sep_z = (pt_min[2] + pt_max[2]) / 2.0;

                let mut sep_ind = [
                    [[Vec::new(), Vec::new()], [Vec::new(), Vec::new()]],
                    [[Vec::new(), Vec::new()], [Vec::new(), Vec::new()]],
                ];

                for ind in indices_to_add {
                    let vert = vertices[ind];
                    let xind = usize::from(vert[0] >= sep_x);
                    let yind = usize::from(vert[1] >= sep_y);
                    let zind = usize::from(vert[2] >= sep_z);
                    sep_ind[xind][yind][zind].push(ind);
                }

                let pt_x = [pt_min[0], sep_x, pt_max[0]];
                let pt_y = [pt_min[1], sep_y, pt_max[1]];
                let pt_z = [pt_min[2], sep_z, pt_max[2]];

                let (next_modif, dir): ([usize; 8], [usize; 8]) = match (dir, start[dir]) {
                    (0, 0) => ([1, 2, 1, 0, 1, 2, 1, 0], [1, 2, 2, 0, 0, 2, 2, 1]),
                    (0, 1) => ([2, 1, 2, 0, 2, 1, 2, 0], [2, 1, 1, 0, 0, 1, 1, 2]),
                    (1, 0) => ([2, 0, 2, 1, 2, 0, 2, 1], [2, 0, 0, 1, 1, 0, 0, 2]),
                    (1, 1) => ([0, 2, 0, 1, 0, 2, 0, 1], [0, 2, 2, 1, 1, 2, 2, 0]),
                    (2, 0) => ([0, 1, 0, 2, 0, 1, 0, 2], [0, 1, 1, 2, 2, 1, 1, 0]),
                    _ => ([1, 0, 1, 2, 1, 0, 1, 2], [1, 0, 0, 2, 2, 0, 0, 1]),
                };

                let mut sep_subind = start;
                let mut start_ind = start;
                for i in 0..8 {
                    let mut vec_inds = Vec::new();
                    vec_inds.append(&mut sep_ind[sep_subind[0]][sep_subind[1]][sep_subind[2]]);
                    to_subdiv.push((
                        start_ind,
                        dir[i],
                        [
                            pt_x[sep_subind[0]],
                            pt_y[sep_subind[1]],
                            pt_z[sep_subind[2]],
                        ],
                        [
                            pt_x[sep_subind[0] + 1],
                            pt_y[sep_subind[1] + 1],
                            pt_z[sep_subind[2] + 1],
                        ],
                        vec_inds,
                    ));
                    sep_subind[next_modif[i]] = 1 - sep_subind[next_modif[i]];
                    start_ind[next_modif[i]] = 1 - start_ind[next_modif[i]];
                    start_ind[dir[i]] = 1 - start_ind[dir[i]];
                }
            }
            std::cmp::Ordering::Equal => curve_order.push(indices_to_add[0]),
            std::cmp::Ordering::Less => (),
        }
    }

    curve_order
}

/// Splits `indices` into nested rounds by an independent coin flip per
/// point, smallest (most selective) round last, so the caller can process
/// smallest-first.
fn brio_rounds(indices: Vec<usize>, rng: &mut impl Rng) -> Vec<Vec<usize>> {
    let mut rounds = Vec::new();
    let mut remaining = indices;
    while remaining.len() > 16 {
        let mut this_round = Vec::new();
        let mut next_remaining = Vec::new();
        for idx in remaining {
            if rng.gen_bool(0.5) {
                this_round.push(idx);
            } else {
                next_remaining.push(idx);
            }
        }
        if next_remaining.is_empty() || next_remaining.len() == this_round.len() + next_remaining.len() {
            rounds.push(this_round);
            rounds.push(next_remaining);
            return rounds;
        }
        rounds.push(this_round);
        remaining = next_remaining;
    }
    rounds.push(remaining);
    rounds
}

/// The BRIO insertion order over `indices`: nested random rounds, smallest
/// first, each internally sorted along the 3D Hilbert curve. Deterministic
/// given `rng`'s seed, per the determinism contract.
pub fn brio_order_3d(vertices: &[Vertex3], indices: Vec<usize>, rng: &mut impl Rng) -> Vec<usize> {
    let mut rounds = brio_rounds(indices, rng);
    rounds.reverse();

    let mut order = Vec::with_capacity(rounds.iter().map(Vec::len).sum());
    for round in rounds {
        if round.is_empty() {
            continue;
        }
        order.extend(sort_along_hilbert_curve_3d(vertices, &round));
    }
    order
}
