//! Small geometric type aliases, in the teacher crate's style.

/// A point in 3-space.
pub type Vertex3 = [f64; 3];

/// A vertex-id triple, the vertices of a triangle.
pub type Triangle3 = [Vertex3; 3];

/// A vertex-id quadruple, the vertices of a tetrahedron.
pub type Tetrahedron3 = [Vertex3; 4];

#[inline]
pub fn sub(a: Vertex3, b: Vertex3) -> Vertex3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn dot(a: Vertex3, b: Vertex3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn cross(a: Vertex3, b: Vertex3) -> Vertex3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub fn norm(a: Vertex3) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub fn dist(a: Vertex3, b: Vertex3) -> f64 {
    norm(sub(a, b))
}

#[inline]
pub fn midpoint(a: Vertex3, b: Vertex3) -> Vertex3 {
    [
        (a[0] + b[0]) / 2.0,
        (a[1] + b[1]) / 2.0,
        (a[2] + b[2]) / 2.0,
    ]
}
