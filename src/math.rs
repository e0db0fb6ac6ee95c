use glam::{DMat4, DVec3, DVec4};
use std::ops::{Add, Div, Mul, Sub};

// A homogeneous position carrying the attributes the rasterizer interpolates.
// tex.z is the perspective reciprocal (1/w) once the vertex has been projected.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vector4 {
    pub pos: DVec4,
    pub original_z: f64,
    pub tex: DVec3,
}

impl Vector4 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            pos: DVec4::new(x, y, z, 1.0),
            original_z: z,
            tex: DVec3::ZERO,
        }
    }

    pub fn with_tex(self, u: f64, v: f64) -> Self {
        Self {
            tex: DVec3::new(u, v, 0.0),
            ..self
        }
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.pos.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.pos.y
    }

    #[inline]
    pub fn z(&self) -> f64 {
        self.pos.z
    }

    #[inline]
    pub fn w(&self) -> f64 {
        self.pos.w
    }

    pub fn xyz(&self) -> DVec3 {
        self.pos.truncate()
    }

    // Only the spatial part takes part in dot, length and cross
    pub fn dot(&self, other: Vector4) -> f64 {
        self.xyz().dot(other.xyz())
    }

    pub fn length(&self) -> f64 {
        self.dot(*self).sqrt()
    }

    // Produces NaN for a zero-length vector, use try_normalize when that can happen
    pub fn normalize(&self) -> Self {
        *self / self.length()
    }

    pub fn try_normalize(&self) -> Option<Self> {
        let length = self.length();
        if length > 0.0 && length.is_finite() {
            Some(*self / length)
        } else {
            None
        }
    }

    pub fn cross(&self, other: Vector4) -> Self {
        Self {
            pos: self.xyz().cross(other.xyz()).extend(1.0),
            ..*self
        }
    }

    // Divides u and v by w, keeps 1/w for the rasterizer, then divides the position.
    // Returns None when w cannot be divided by (behind the eye or not finite).
    pub fn perspective_divide(&self) -> Option<Self> {
        let w = self.pos.w;
        if !(w > 0.0 && w.is_finite()) {
            return None;
        }
        let one_over_w = 1.0 / w;
        Some(Self {
            pos: (self.xyz() * one_over_w).extend(1.0),
            original_z: self.original_z,
            tex: DVec3::new(self.tex.x * one_over_w, self.tex.y * one_over_w, one_over_w),
        })
    }
}

impl Add for Vector4 {
    type Output = Vector4;

    fn add(self, rhs: Vector4) -> Vector4 {
        Vector4 {
            pos: (self.xyz() + rhs.xyz()).extend(1.0),
            original_z: self.original_z + rhs.original_z,
            tex: self.tex + rhs.tex,
        }
    }
}

impl Sub for Vector4 {
    type Output = Vector4;

    fn sub(self, rhs: Vector4) -> Vector4 {
        Vector4 {
            pos: (self.xyz() - rhs.xyz()).extend(1.0),
            original_z: self.original_z - rhs.original_z,
            tex: self.tex - rhs.tex,
        }
    }
}

impl Mul<f64> for Vector4 {
    type Output = Vector4;

    fn mul(self, k: f64) -> Vector4 {
        Vector4 {
            pos: (self.xyz() * k).extend(1.0),
            original_z: self.original_z * k,
            tex: self.tex,
        }
    }
}

impl Div<f64> for Vector4 {
    type Output = Vector4;

    fn div(self, k: f64) -> Vector4 {
        Vector4 {
            pos: (self.xyz() / k).extend(1.0),
            original_z: self.original_z / k,
            tex: self.tex,
        }
    }
}

// 4x4 matrix in the row-vector convention: a vertex is transformed as `v * m`
// and `a * b` applies `a` first. The rows are stored as glam columns so that
// glam's column-vector product computes exactly the row-vector product.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix4x4(DMat4);

impl Matrix4x4 {
    pub const IDENTITY: Self = Self(DMat4::IDENTITY);

    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self(DMat4::from_cols_array_2d(&rows))
    }

    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        self.0.to_cols_array_2d()
    }

    // Euler rotation in radians: x is pitch, y is yaw, z is roll
    pub fn rotation(radians: DVec3) -> Self {
        let (sg, cg) = radians.x.sin_cos();
        let (sb, cb) = radians.y.sin_cos();
        let (sa, ca) = radians.z.sin_cos();
        Self::from_rows([
            [ca * cb, ca * sb * sg - sa * cg, ca * sb * cg + sa * sg, 0.0],
            [sa * cb, sa * sb * sg + ca * cg, sa * sb * cg - ca * sg, 0.0],
            [-sb, cb * sg, cb * cg, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    pub fn translation(offset: DVec3) -> Self {
        Self::from_rows([
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [offset.x, offset.y, offset.z, 1.0],
        ])
    }

    // Aspect ratio is height over width. Maps z=near to 0 and z=far to 1 after the
    // divide, and leaves the view space z in w.
    pub fn perspective(aspect_ratio: f64, fov_degrees: f64, near: f64, far: f64) -> Self {
        let f = 1.0 / (fov_degrees.to_radians() * 0.5).tan();
        let q = far / (far - near);
        Self::from_rows([
            [aspect_ratio * f, 0.0, 0.0, 0.0],
            [0.0, f, 0.0, 0.0],
            [0.0, 0.0, q, 1.0],
            [0.0, 0.0, -near * q, 0.0],
        ])
    }

    pub fn transform(&self, v: Vector4) -> Vector4 {
        Vector4 {
            pos: self.0 * v.pos,
            ..v
        }
    }
}

impl Mul for Matrix4x4 {
    type Output = Matrix4x4;

    fn mul(self, rhs: Matrix4x4) -> Matrix4x4 {
        Matrix4x4(rhs.0 * self.0)
    }
}

impl Mul<Matrix4x4> for Vector4 {
    type Output = Vector4;

    fn mul(self, m: Matrix4x4) -> Vector4 {
        m.transform(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const EPS: f64 = 1e-9;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{a} != {b}");
    }

    #[test]
    fn translation_lives_in_last_row() {
        let m = Matrix4x4::translation(DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.to_rows()[3], [1.0, 2.0, 3.0, 1.0]);
        let v = Vector4::new(1.0, 1.0, 1.0) * m;
        assert_eq!(v.xyz(), DVec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn multiplication_applies_left_operand_first() {
        let rotate = Matrix4x4::rotation(DVec3::new(0.0, 0.0, FRAC_PI_2));
        let translate = Matrix4x4::translation(DVec3::new(10.0, 0.0, 0.0));
        let v = Vector4::new(1.0, 0.0, 0.0);

        let combined = v * (rotate * translate);
        let stepwise = (v * rotate) * translate;
        assert_close(combined.x(), stepwise.x());
        assert_close(combined.y(), stepwise.y());
        assert_close(combined.z(), stepwise.z());
        // Rotating first keeps the translation untouched
        assert_close(combined.x(), 10.0);
    }

    #[test]
    fn identity_and_attributes_are_preserved() {
        let v = Vector4::new(1.0, -2.0, 3.0).with_tex(0.25, 0.75);
        let out = v * Matrix4x4::IDENTITY;
        assert_eq!(out, v);
    }

    #[test]
    fn pitch_of_pi_flips_y_and_z() {
        let m = Matrix4x4::rotation(DVec3::new(std::f64::consts::PI, 0.0, 0.0));
        let v = Vector4::new(1.0, 2.0, 3.0) * m;
        assert_close(v.x(), 1.0);
        assert_close(v.y(), -2.0);
        assert_close(v.z(), -3.0);
    }

    #[test]
    fn perspective_maps_near_and_far() {
        let proj = Matrix4x4::perspective(1.0, 90.0, 0.1, 1000.0);

        let near = (Vector4::new(0.0, 0.0, 0.1) * proj).perspective_divide().unwrap();
        assert_close(near.x(), 0.0);
        assert_close(near.y(), 0.0);
        assert_close(near.z(), 0.0);

        let far = (Vector4::new(0.0, 0.0, 1000.0) * proj).perspective_divide().unwrap();
        assert_close(far.z(), 1.0);

        // w carries the view space z before the divide
        let clip = Vector4::new(3.0, 4.0, 5.0) * proj;
        assert_close(clip.w(), 5.0);
        // 90 degrees gives a unit focal length
        assert_close(clip.x() / clip.w(), 0.6);
    }

    #[test]
    fn perspective_divide_stores_reciprocal_w() {
        let mut v = Vector4::new(4.0, 2.0, 0.0).with_tex(0.5, 1.0);
        v.pos.w = 2.0;
        let out = v.perspective_divide().unwrap();
        assert_eq!(out.pos, DVec4::new(2.0, 1.0, 0.0, 1.0));
        assert_eq!(out.tex, DVec3::new(0.25, 0.5, 0.5));

        v.pos.w = 0.0;
        assert!(v.perspective_divide().is_none());
        v.pos.w = -1.0;
        assert!(v.perspective_divide().is_none());
    }

    #[test]
    fn vector_operations() {
        let a = Vector4::new(1.0, 0.0, 0.0);
        let b = Vector4::new(0.0, 1.0, 0.0);
        assert_eq!(a.cross(b).xyz(), DVec3::Z);
        assert_close(a.dot(b), 0.0);
        assert_close((a + b).length(), 2.0f64.sqrt());
        assert_eq!((a - b).w(), 1.0);
        assert_close((a * 3.0).x(), 3.0);
        assert_close((Vector4::new(0.0, 0.0, 8.0) / 2.0).original_z, 4.0);

        let n = Vector4::new(3.0, 0.0, 4.0).normalize();
        assert_close(n.length(), 1.0);
        assert!(Vector4::new(0.0, 0.0, 0.0).try_normalize().is_none());
        assert!(Vector4::new(0.0, 0.0, 0.0).normalize().x().is_nan());
    }
}
