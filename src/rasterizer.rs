use crate::framebuffer::Framebuffer;
use crate::math::Vector4;
use crate::scene::Triangle;
use crate::util::shade_bgra;

pub const DEFAULT_FALLBACK_COLOR: [u8; 3] = [255, 0, 255];

// Vertex positions are snapped to 1/256 of a pixel before edge setup
const SUBPIXEL_BITS: u32 = 8;
const SUBPIXEL_ONE: i64 = 1 << SUBPIXEL_BITS;
const SUBPIXEL_HALF: i64 = SUBPIXEL_ONE / 2;
// Largest coordinate magnitude in pixels whose edge products still fit an i64
const MAX_COORDINATE: f64 = (1 << 20) as f64;

// Screen position on the sub-pixel grid
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FixedPoint {
    x: i64,
    y: i64,
}

impl FixedPoint {
    fn snap(v: &Vector4) -> Option<Self> {
        let (x, y) = (v.x(), v.y());
        if !(x.abs() <= MAX_COORDINATE && y.abs() <= MAX_COORDINATE) {
            return None;
        }
        Some(Self {
            x: (x * SUBPIXEL_ONE as f64).round() as i64,
            y: (y * SUBPIXEL_ONE as f64).round() as i64,
        })
    }
}

// Signed doubled area of a, b, p in sub-pixel units squared.
// Positive when p lies to the right of a->b in y-down screen space.
#[inline]
fn edge_function(a: FixedPoint, b: FixedPoint, px: i64, py: i64) -> i64 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

// Incremental edge equation for the edge a->b, exact in integers
struct Edge {
    step_x: i64,
    step_y: i64,
    row: i64,
    bias: i64,
}

impl Edge {
    fn new(a: FixedPoint, b: FixedPoint, start_x: i64, start_y: i64) -> Self {
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        // Top-left rule: top edges are horizontal pointing right, left edges point up
        let is_top = dy == 0 && dx > 0;
        let is_left = dy < 0;
        Self {
            step_x: -dy * SUBPIXEL_ONE,
            step_y: dx * SUBPIXEL_ONE,
            row: edge_function(a, b, start_x, start_y),
            bias: if is_top || is_left { 0 } else { -1 },
        }
    }
}

// Fills screen space triangles into a framebuffer
pub struct Rasterizer {
    fallback_color: [u8; 3],
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_COLOR)
    }
}

impl Rasterizer {
    pub fn new(fallback_color: [u8; 3]) -> Self {
        Self { fallback_color }
    }

    // Returns the number of pixels written
    pub fn fill(&self, triangle: &Triangle, framebuffer: &mut Framebuffer) -> usize {
        let [v0, mut v1, mut v2] = triangle.vertices;
        let (Some(p0), Some(mut p1), Some(mut p2)) =
            (FixedPoint::snap(&v0), FixedPoint::snap(&v1), FixedPoint::snap(&v2))
        else {
            return 0;
        };

        let mut area = edge_function(p0, p1, p2.x, p2.y);
        if area == 0 {
            return 0;
        }
        if area < 0 {
            std::mem::swap(&mut v1, &mut v2);
            std::mem::swap(&mut p1, &mut p2);
            area = -area;
        }

        let width = framebuffer.width();
        let height = framebuffer.height();

        // Bounding box in pixels, clamped to the buffer
        let min_x = p0.x.min(p1.x).min(p2.x).div_euclid(SUBPIXEL_ONE).max(0);
        let min_y = p0.y.min(p1.y).min(p2.y).div_euclid(SUBPIXEL_ONE).max(0);
        let max_x = (p0.x.max(p1.x).max(p2.x) + SUBPIXEL_ONE - 1)
            .div_euclid(SUBPIXEL_ONE)
            .min(width as i64);
        let max_y = (p0.y.max(p1.y).max(p2.y) + SUBPIXEL_ONE - 1)
            .div_euclid(SUBPIXEL_ONE)
            .min(height as i64);
        if !(min_x < max_x && min_y < max_y) {
            return 0;
        }

        // Edge values at the first pixel center. e0 weights v0, e1 weights v1, e2 weights v2.
        let start_x = min_x * SUBPIXEL_ONE + SUBPIXEL_HALF;
        let start_y = min_y * SUBPIXEL_ONE + SUBPIXEL_HALF;
        let mut e0 = Edge::new(p1, p2, start_x, start_y);
        let mut e1 = Edge::new(p2, p0, start_x, start_y);
        let mut e2 = Edge::new(p0, p1, start_x, start_y);

        let (min_x, min_y) = (min_x as usize, min_y as usize);
        let (max_x, max_y) = (max_x as usize, max_y as usize);
        let one_over_area = 1.0 / area as f64;
        let (color, depth) = framebuffer.color_and_depth_mut();
        let mut written = 0;

        for y in min_y..max_y {
            let mut w0 = e0.row;
            let mut w1 = e1.row;
            let mut w2 = e2.row;

            for x in min_x..max_x {
                if w0 + e0.bias >= 0 && w1 + e1.bias >= 0 && w2 + e2.bias >= 0 {
                    let b0 = w0 as f64 * one_over_area;
                    let b1 = w1 as f64 * one_over_area;
                    let b2 = w2 as f64 * one_over_area;
                    let index = y * width + x;

                    let shaded =
                        self.shade(triangle, [&v0, &v1, &v2], [b0, b1, b2], depth[index]);
                    if let Some(pixel) = shaded {
                        color[index * 4..index * 4 + 4].copy_from_slice(&pixel.color);
                        depth[index] = pixel.depth;
                        written += 1;
                    }
                }

                // Step in X
                w0 += e0.step_x;
                w1 += e1.step_x;
                w2 += e2.step_x;
            }

            // Step in Y
            e0.row += e0.step_y;
            e1.row += e1.step_y;
            e2.row += e2.step_y;
        }

        written
    }

    // Depth test and color for one covered pixel, None when nothing is written
    #[inline]
    fn shade(
        &self,
        triangle: &Triangle,
        vertices: [&Vector4; 3],
        bary: [f64; 3],
        current_depth: f64,
    ) -> Option<ShadedPixel> {
        let interpolate = |attribute: fn(&Vector4) -> f64| {
            attribute(vertices[0]) * bary[0]
                + attribute(vertices[1]) * bary[1]
                + attribute(vertices[2]) * bary[2]
        };

        let depth = interpolate(|v| v.original_z);
        if !(depth < current_depth) {
            return None;
        }

        let color = match &triangle.texture {
            Some(texture) => {
                let mut u = interpolate(|v| v.tex.x);
                let mut v = interpolate(|v| v.tex.y);
                let one_over_w = interpolate(|v| v.tex.z);
                if one_over_w != 0.0 {
                    u /= one_over_w;
                    v /= one_over_w;
                }
                let texel = texture.sample(u, v);
                // Fully transparent texels leave the pixel and its depth alone
                if texel[3] == 0 {
                    return None;
                }
                shade_bgra([texel[0], texel[1], texel[2]], triangle.illumination)
            }
            None => shade_bgra(self.fallback_color, triangle.illumination),
        };

        Some(ShadedPixel { color, depth })
    }
}

struct ShadedPixel {
    color: [u8; 4],
    depth: f64,
}
