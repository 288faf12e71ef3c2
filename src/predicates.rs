//! Geometric predicates.
//!
//! The four sign-exact tests (`orient2d`, `orient3d`, `incircle`, `insphere`)
//! are backed by [`robust`], a pure-Rust port of Shewchuk's adaptive-precision
//! expansion arithmetic: a fast floating estimate plus a conservative error
//! bound, escalating to exact expansion sums only when the estimate falls
//! inside the bound. Everything else here (`volume`, `circumcenter`,
//! `aspect_ratio`, `dihedral_angle`, `local_feature_size`) is plain double
//! arithmetic, as spec'd.

use crate::utils::types::{cross, dist, dot, sub, Tetrahedron3, Triangle3, Vertex3};
use robust::{Coord, Coord3D};

#[inline]
fn coord2(p: &Vertex3) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

#[inline]
fn coord3(p: &Vertex3) -> Coord3D<f64> {
    Coord3D {
        x: p[0],
        y: p[1],
        z: p[2],
    }
}

/// Normalize to sign: -1.0, 0.0 or 1.0, so callers can compare signs with `==`.
#[inline]
fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Sign of the signed area of `(a, b, c)` projected to the xy-plane; 0 iff collinear.
#[inline]
pub fn orient2d(a: &Vertex3, b: &Vertex3, c: &Vertex3) -> f64 {
    sign(robust::orient2d(coord2(a), coord2(b), coord2(c)))
}

/// Sign of the signed volume of `(a, b, c, d)`; 0 iff coplanar. Positive iff
/// `d` lies on the positive side of the plane through `a, b, c` as seen
/// looking from outside (i.e. `(a, b, c)` wound counterclockwise).
#[inline]
pub fn orient3d(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> f64 {
    sign(robust::orient3d(coord3(a), coord3(b), coord3(c), coord3(d)))
}

/// Sign of "is `d` inside the circle through `a, b, c`", assuming `a, b, c`
/// wound counterclockwise in the xy-plane. Callers triangulating an
/// arbitrary-plane facet pass points already projected into a local 2D
/// parameterization of that plane (z ignored).
#[inline]
pub fn incircle(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> f64 {
    sign(robust::incircle(
        coord2(a),
        coord2(b),
        coord2(c),
        coord2(d),
    ))
}

/// Sign of "is `e` inside the sphere through `a, b, c, d`", assuming
/// `orient3d(a, b, c, d) > 0`.
#[inline]
pub fn insphere(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3, e: &Vertex3) -> f64 {
    sign(robust::insphere(
        coord3(a),
        coord3(b),
        coord3(c),
        coord3(d),
        coord3(e),
    ))
}

/// Six times the signed volume of tetrahedron `(a, b, c, d)`.
#[inline]
pub fn signed_volume6(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> f64 {
    dot(cross(sub(*b, *a), sub(*c, *a)), sub(*d, *a))
}

/// Volume of tetrahedron `t`. Always non-negative; callers that need the
/// sign should use [`orient3d`] or [`signed_volume6`].
pub fn volume(t: &Tetrahedron3) -> f64 {
    (signed_volume6(&t[0], &t[1], &t[2], &t[3]) / 6.0).abs()
}

/// Failure signal from [`circumcenter`]: the four points are nearly coplanar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Degenerate;

/// Circumcenter of a non-degenerate tetrahedron, or [`Degenerate`] if the
/// four points are nearly coplanar (absolute `orient3d` below a relative
/// threshold). Callers fall back to the centroid on `Degenerate`.
pub fn circumcenter(t: &Tetrahedron3) -> Result<Vertex3, Degenerate> {
    let [a, b, c, d] = *t;
    let vol6 = signed_volume6(&a, &b, &c, &d);

    // Relative coplanarity threshold, scaled by the tetrahedron's extent so
    // it behaves consistently across magnitudes.
    let scale = [a, b, c, d]
        .iter()
        .flat_map(|p| p.iter().map(|x| x.abs()))
        .fold(1.0_f64, f64::max);
    if vol6.abs() < 1e-12 * scale.powi(3) {
        return Err(Degenerate);
    }

    // Solve for x such that |x - a|^2 = |x - b|^2 = |x - c|^2 = |x - d|^2,
    // i.e. 2(b - a).x = |b|^2 - |a|^2, and likewise for c, d.
    let m = nalgebra::Matrix3::new(
        b[0] - a[0], b[1] - a[1], b[2] - a[2],
        c[0] - a[0], c[1] - a[1], c[2] - a[2],
        d[0] - a[0], d[1] - a[1], d[2] - a[2],
    ) * 2.0;

    let sq = |p: Vertex3| p[0] * p[0] + p[1] * p[1] + p[2] * p[2];
    let rhs = nalgebra::Vector3::new(sq(b) - sq(a), sq(c) - sq(a), sq(d) - sq(a));

    let decomp = m.lu();
    let x = decomp
        .solve(&rhs)
        .ok_or(Degenerate)?;

    Ok([a[0] + x[0], a[1] + x[1], a[2] + x[2]])
}

/// Centroid of a tetrahedron, the fallback for a degenerate [`circumcenter`].
pub fn centroid(t: &Tetrahedron3) -> Vertex3 {
    [
        (t[0][0] + t[1][0] + t[2][0] + t[3][0]) / 4.0,
        (t[0][1] + t[1][1] + t[2][1] + t[3][1]) / 4.0,
        (t[0][2] + t[1][2] + t[2][2] + t[3][2]) / 4.0,
    ]
}

/// Circumradius of a tetrahedron, via its circumcenter (falling back to the
/// centroid's distance when the tetrahedron is nearly coplanar).
pub fn circumradius(t: &Tetrahedron3) -> f64 {
    let center = circumcenter(t).unwrap_or_else(|_| centroid(t));
    dist(center, t[0])
}

/// Shortest edge length of a tetrahedron.
pub fn shortest_edge(t: &Tetrahedron3) -> f64 {
    let mut min = f64::INFINITY;
    for i in 0..4 {
        for j in (i + 1)..4 {
            min = min.min(dist(t[i], t[j]));
        }
    }
    min
}

/// Radius-edge ratio (circumradius / shortest edge), the standard
/// tetrahedral shape-quality measure used by the quality refiner.
pub fn aspect_ratio(t: &Tetrahedron3) -> f64 {
    circumradius(t) / shortest_edge(t)
}

/// Dihedral angle (radians) along the edge `a-b` of tetrahedron `(a, b, c, d)`,
/// i.e. the angle between the two faces sharing that edge.
pub fn dihedral_angle(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> f64 {
    let ab = sub(*b, *a);
    let ac = sub(*c, *a);
    let ad = sub(*d, *a);

    // Normals of the two faces sharing edge a-b, pointing away from c and d.
    let n1 = cross(ab, ac);
    let n2 = cross(ab, ad);

    let cos_theta = dot(n1, n2) / (dist([0.0; 3], n1) * dist([0.0; 3], n2));
    cos_theta.clamp(-1.0, 1.0).acos()
}

/// Minimum dihedral angle (radians) over all six edges of a tetrahedron.
pub fn min_dihedral_angle(t: &Tetrahedron3) -> f64 {
    let [a, b, c, d] = *t;
    let edges = [
        dihedral_angle(&a, &b, &c, &d),
        dihedral_angle(&a, &c, &b, &d),
        dihedral_angle(&a, &d, &b, &c),
        dihedral_angle(&b, &c, &a, &d),
        dihedral_angle(&b, &d, &a, &c),
        dihedral_angle(&c, &d, &a, &b),
    ];
    edges.into_iter().fold(f64::INFINITY, f64::min)
}

/// Local feature size at `p`: the distance from `p` to the nearest input
/// vertex or input-segment/facet feature not incident to it, used as a
/// lower bound on Steiner-point spacing near acute input corners.
pub fn local_feature_size(p: Vertex3, nearby: &[Vertex3]) -> f64 {
    nearby
        .iter()
        .map(|&q| dist(p, q))
        .fold(f64::INFINITY, f64::min)
}

/// Whether `p` lies strictly inside the diametral sphere of segment `(a, b)`
/// -- the standard segment-encroachment test.
pub fn encroaches_segment(a: &Vertex3, b: &Vertex3, p: &Vertex3) -> bool {
    dot(sub(*a, *p), sub(*b, *p)) < 0.0
}

/// Whether `p` lies strictly inside the diametral sphere of subface
/// `(a, b, c)` -- the standard subface-encroachment test.
pub fn encroaches_subface(tri: &Triangle3, p: &Vertex3) -> bool {
    let center = circumcenter_2d_embedded(tri);
    let radius = dist(center, tri[0]);
    dist(center, *p) < radius
}

/// Circumcenter of a triangle embedded in 3-space (its plane's circumcenter,
/// expressed in the ambient 3D coordinates).
///
/// `center = a + (|ac|^2 (n x ab) + |ab|^2 (ac x n)) / (2 |n|^2)`, with
/// `n = ab x ac`.
pub fn triangle_circumcenter(tri: &Triangle3) -> Vertex3 {
    circumcenter_2d_embedded(tri)
}

fn circumcenter_2d_embedded(tri: &Triangle3) -> Vertex3 {
    let [a, b, c] = *tri;
    let ab = sub(b, a);
    let ac = sub(c, a);
    let n = cross(ab, ac);

    let denom = 2.0 * dot(n, n);
    if denom.abs() < 1e-300 {
        return centroid(&[a, b, c, a]);
    }

    let term1 = cross(n, ab);
    let term2 = cross(ac, n);
    let ac_sq = dot(ac, ac);
    let ab_sq = dot(ab, ab);

    let scale = 1.0 / denom;
    [
        a[0] + (ac_sq * term1[0] + ab_sq * term2[0]) * scale,
        a[1] + (ac_sq * term1[1] + ab_sq * term2[1]) * scale,
        a[2] + (ac_sq * term1[2] + ab_sq * term2[2]) * scale,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orient3d_signs() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];
        let d_above = [0.0, 0.0, 1.0];
        let d_below = [0.0, 0.0, -1.0];
        let d_on = [0.25, 0.25, 0.0];

        assert!(orient3d(&a, &b, &c, &d_above) > 0.0);
        assert!(orient3d(&a, &b, &c, &d_below) < 0.0);
        assert_eq!(orient3d(&a, &b, &c, &d_on), 0.0);
    }

    #[test]
    fn unit_tet_volume_is_one_sixth() {
        let t = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        assert!((volume(&t) - 1.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn circumcenter_of_unit_tet() {
        let t = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let center = circumcenter(&t).unwrap();
        let r0 = dist(center, t[0]);
        for p in &t[1..] {
            assert!((dist(center, *p) - r0).abs() < 1e-9);
        }
    }

    #[test]
    fn circumcenter_degenerate_on_coplanar_points() {
        let t = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        assert!(circumcenter(&t).is_err());
    }

    #[test]
    fn aspect_ratio_of_regular_tet_is_small() {
        // A near-regular tetrahedron should have radius-edge ratio close to
        // the theoretical regular-tet value of sqrt(6)/4 ~= 0.612.
        let t = [
            [1.0, 1.0, 1.0],
            [1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
        ];
        let ratio = aspect_ratio(&t);
        assert!((ratio - (6.0_f64.sqrt() / 4.0)).abs() < 1e-9);
    }
}
