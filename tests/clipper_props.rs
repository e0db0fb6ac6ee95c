use glam::DVec3;
use proptest::prelude::*;
use swview::clipper::Plane;
use swview::math::Vector4;
use swview::scene::Triangle;

type Point = (f64, f64);

fn signed_area(points: &[Point]) -> f64 {
    let mut sum = 0.0;
    for i in 0..points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % points.len()];
        sum += x0 * y1 - x1 * y0;
    }
    sum * 0.5
}

fn triangle_points(triangle: &Triangle) -> [Point; 3] {
    triangle.vertices.map(|v| (v.x(), v.y()))
}

// Sutherland-Hodgman against a single half plane, as a polygon
fn clip_polygon(points: &[Point], normal: Point, offset: f64) -> Vec<Point> {
    let distance = |p: Point| p.0 * normal.0 + p.1 * normal.1 - offset;
    let mut out = Vec::new();
    for i in 0..points.len() {
        let current = points[i];
        let next = points[(i + 1) % points.len()];
        let (dc, dn) = (distance(current), distance(next));
        if dc >= 0.0 {
            out.push(current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            out.push((
                current.0 + (next.0 - current.0) * t,
                current.1 + (next.1 - current.1) * t,
            ));
        }
    }
    out
}

fn vertex((x, y): Point) -> Vector4 {
    Vector4::new(x, y, 0.0).with_tex(x * 0.01, y * 0.01)
}

proptest! {
    #[test]
    fn clipped_area_matches_polygon_clip(
        points in prop::array::uniform3((-100.0..100.0f64, -100.0..100.0f64)),
        angle in 0.0..std::f64::consts::TAU,
        offset in -60.0..60.0f64,
    ) {
        let area = signed_area(&points);
        prop_assume!(area.abs() > 1.0);

        let normal = (angle.cos(), angle.sin());
        let plane = Plane::new(
            DVec3::new(normal.0 * offset, normal.1 * offset, 0.0),
            DVec3::new(normal.0, normal.1, 0.0),
        );
        let triangle = Triangle::new(points.map(vertex));
        let out = plane.clip(&triangle);
        prop_assert!(out.len() <= 2);

        let expected = signed_area(&clip_polygon(&points, normal, offset));
        let actual: f64 = out.iter().map(|t| signed_area(&triangle_points(t))).sum();
        let tolerance = 1e-6 * area.abs().max(1.0);
        prop_assert!((actual - expected).abs() < tolerance, "{actual} vs {expected}");

        for t in &out {
            // Winding is preserved
            prop_assert!(signed_area(&triangle_points(t)) * area.signum() > -tolerance);
            for v in &t.vertices {
                prop_assert!(plane.signed_distance(v.xyz()) > -1e-9);
                // Affine attributes survive interpolation exactly
                prop_assert!((v.tex.x - v.x() * 0.01).abs() < 1e-9);
                prop_assert!((v.tex.y - v.y() * 0.01).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn inside_or_outside_triangles_pass_through(
        points in prop::array::uniform3((-100.0..100.0f64, -100.0..100.0f64)),
    ) {
        prop_assume!(signed_area(&points).abs() > 1.0);
        let triangle = Triangle::new(points.map(vertex));

        let keep_all = Plane::new(DVec3::new(0.0, -200.0, 0.0), DVec3::Y);
        let out = keep_all.clip(&triangle);
        prop_assert_eq!(out.len(), 1);
        prop_assert_eq!(out[0].vertices, triangle.vertices);

        let drop_all = Plane::new(DVec3::new(0.0, 200.0, 0.0), DVec3::Y);
        prop_assert!(drop_all.clip(&triangle).is_empty());
    }
}
