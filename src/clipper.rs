use crate::math::Vector4;
use crate::scene::Triangle;
use glam::DVec3;

// A half space bounded by a plane. Points on the side the normal points to are inside.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub point: DVec3,
    pub normal: DVec3,
}

impl Plane {
    // A zero normal bounds nothing, so clipping against it drops every triangle
    pub fn new(point: DVec3, normal: DVec3) -> Self {
        Self {
            point,
            normal: normal.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) - self.normal.dot(self.point)
    }

    // Point where the segment start->end crosses the plane. Attributes are left to the caller.
    fn intersect(&self, start: Vector4, end: Vector4) -> Vector4 {
        let plane_d = -self.normal.dot(self.point);
        let ad = self.normal.dot(start.xyz());
        let bd = self.normal.dot(end.xyz());
        let t = (-plane_d - ad) / (bd - ad);
        start + (end - start) * t
    }

    pub fn clip(&self, triangle: &Triangle) -> Vec<Triangle> {
        let mut out = Vec::with_capacity(2);
        self.clip_into(triangle, &mut out);
        out
    }

    // Clips a triangle against the plane and appends 0, 1 or 2 triangles to `out`.
    // Returns the number of triangles appended.
    pub fn clip_into(&self, triangle: &Triangle, out: &mut Vec<Triangle>) -> usize {
        if self.normal == DVec3::ZERO {
            return 0;
        }
        let v = &triangle.vertices;
        let inside = [
            self.signed_distance(v[0].xyz()) >= 0.0,
            self.signed_distance(v[1].xyz()) >= 0.0,
            self.signed_distance(v[2].xyz()) >= 0.0,
        ];
        let inside_count = inside.iter().filter(|&&i| i).count();

        match inside_count {
            0 => 0,
            3 => {
                out.push(triangle.clone());
                1
            }
            1 => {
                // Walk the vertices in their cyclic order starting at the inside one
                let k = inside.iter().position(|&i| i).unwrap_or(0);
                let a = v[k];
                let b = v[(k + 1) % 3];
                let c = v[(k + 2) % 3];
                let (Some(ab), Some(ac)) = (
                    self.intersect_on(triangle, a, b),
                    self.intersect_on(triangle, a, c),
                ) else {
                    return 0;
                };
                out.push(triangle.with_vertices([a, ab, ac]));
                1
            }
            _ => {
                // Two inside: the quad a, b, b->c, a->c keeps the source winding
                let k = inside.iter().position(|&i| !i).unwrap_or(0);
                let a = v[(k + 1) % 3];
                let b = v[(k + 2) % 3];
                let c = v[k];
                let (Some(ac), Some(bc)) = (
                    self.intersect_on(triangle, a, c),
                    self.intersect_on(triangle, b, c),
                ) else {
                    return 0;
                };
                out.push(triangle.with_vertices([a, b, ac]));
                out.push(triangle.with_vertices([b, bc, ac]));
                2
            }
        }
    }

    // Intersection vertex with its attributes taken from the source triangle
    fn intersect_on(&self, triangle: &Triangle, start: Vector4, end: Vector4) -> Option<Vector4> {
        let point = self.intersect(start, end);
        let bary = barycentric(&triangle.vertices, point.xyz())?;
        Some(interpolate(&triangle.vertices, bary, point))
    }
}

// Barycentric weights of p relative to the triangle, p assumed to lie in its plane.
// None for a zero-area triangle.
pub fn barycentric(vertices: &[Vector4; 3], p: DVec3) -> Option<DVec3> {
    let a = vertices[0].xyz();
    let b = vertices[1].xyz();
    let c = vertices[2].xyz();
    let n = (b - a).cross(c - a);
    let area_squared = n.dot(n);
    if !(area_squared > 0.0 && area_squared.is_finite()) {
        return None;
    }
    let alpha = n.dot((c - b).cross(p - b)) / area_squared;
    let beta = n.dot((a - c).cross(p - c)) / area_squared;
    Some(DVec3::new(alpha, beta, 1.0 - alpha - beta))
}

fn interpolate(vertices: &[Vector4; 3], bary: DVec3, point: Vector4) -> Vector4 {
    let [v0, v1, v2] = vertices;
    Vector4 {
        pos: point.pos,
        original_z: v0.original_z * bary.x + v1.original_z * bary.y + v2.original_z * bary.z,
        tex: v0.tex * bary.x + v1.tex * bary.y + v2.tex * bary.z,
    }
}
