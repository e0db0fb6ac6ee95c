use crate::clipper::Plane;
use crate::config::RenderConfig;
use crate::framebuffer::Framebuffer;
use crate::math::{Matrix4x4, Vector4};
use crate::rasterizer::Rasterizer;
use crate::rendercamera::RenderCamera;
use crate::scene::{Mesh, Triangle};
use glam::DVec3;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

// Darkest a lit face can get
const MIN_ILLUMINATION: f64 = 0.1;

// Triangle counts for one frame
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub submitted: usize,
    pub culled: usize,
    pub clipped_away: usize,
    pub rasterized: usize,
    pub pixels_written: usize,
}

// Renderer which manages transform, culling, clipping and rasterization
pub struct Renderer {
    fov_degrees: f64,
    near: f64,
    far: f64,
    light_direction: DVec3,
    near_plane: Plane,
    rasterizer: Rasterizer,
    // Scratch buffers reused across frames
    near_clipped: Vec<Triangle>,
    clip_queue: VecDeque<Triangle>,
    clip_output: Vec<Triangle>,
    visible: Vec<Triangle>,
    timer_geometry: Duration,
    timer_rasterizer: Duration,
    last_print_time: Instant,
    frame_count: u32,
}

impl Renderer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            fov_degrees: config.fov_degrees,
            near: config.near,
            far: config.far,
            light_direction: DVec3::from(config.light_direction).normalize_or_zero(),
            near_plane: Plane::new(DVec3::new(0.0, 0.0, config.near), DVec3::Z),
            rasterizer: Rasterizer::new(config.fallback_color),
            near_clipped: Vec::new(),
            clip_queue: VecDeque::new(),
            clip_output: Vec::new(),
            visible: Vec::new(),
            timer_geometry: Duration::ZERO,
            timer_rasterizer: Duration::ZERO,
            last_print_time: Instant::now(),
            frame_count: 0,
        }
    }

    // Main render function: draws the mesh into the framebuffer on top of what is there
    pub fn render(
        &mut self,
        mesh: &Mesh,
        camera: &RenderCamera,
        framebuffer: &mut Framebuffer,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        let width = framebuffer.width() as f64;
        let height = framebuffer.height() as f64;

        // Transform, cull and clip everything first
        let geometry_start = Instant::now();
        let world = camera.world_matrix();
        let projection =
            Matrix4x4::perspective(height / width, self.fov_degrees, self.near, self.far);
        let screen_planes = screen_planes(width, height);
        self.visible.clear();
        for triangle in &mesh.triangles {
            stats.submitted += 1;
            self.process_triangle(
                triangle,
                world,
                projection,
                &screen_planes,
                camera.flip_normals,
                width,
                height,
                &mut stats,
            );
        }
        let geometry_time = geometry_start.elapsed();
        self.timer_geometry += geometry_time;

        // Then rasterize the survivors in submission order
        let rasterizer_start = Instant::now();
        for triangle in &self.visible {
            stats.pixels_written += self.rasterizer.fill(triangle, framebuffer);
        }
        stats.rasterized = self.visible.len();
        let rasterizer_time = rasterizer_start.elapsed();
        self.timer_rasterizer += rasterizer_time;

        self.log_timings(geometry_time, rasterizer_time);
        stats
    }

    // Takes one mesh triangle to zero or more screen space triangles in `self.visible`
    #[allow(clippy::too_many_arguments)]
    fn process_triangle(
        &mut self,
        triangle: &Triangle,
        world: Matrix4x4,
        projection: Matrix4x4,
        screen_planes: &[Plane; 4],
        flip_normals: bool,
        width: f64,
        height: f64,
        stats: &mut FrameStats,
    ) {
        let vertices = triangle.vertices.map(|v| {
            let mut transformed = v * world;
            transformed.original_z = transformed.z();
            transformed
        });

        // Back-face culling, the camera sits at the origin
        let Some(normal) = (vertices[1] - vertices[0])
            .cross(vertices[2] - vertices[0])
            .try_normalize()
        else {
            stats.culled += 1;
            return;
        };
        let facing = normal.dot(vertices[0]);
        let front_facing = if flip_normals {
            facing < 0.0
        } else {
            facing > 0.0
        };
        if !front_facing {
            stats.culled += 1;
            return;
        }

        let lit_normal = if flip_normals {
            -normal.xyz()
        } else {
            normal.xyz()
        };
        let illumination = self.light_direction.dot(lit_normal).max(MIN_ILLUMINATION);

        let view_triangle = Triangle {
            vertices,
            illumination,
            texture: triangle.texture.clone(),
        };

        let visible_before = self.visible.len();
        let mut near_clipped = std::mem::take(&mut self.near_clipped);
        near_clipped.clear();
        self.near_plane.clip_into(&view_triangle, &mut near_clipped);

        for clipped in &near_clipped {
            let Some(screen) = to_screen(clipped, projection, width, height) else {
                continue;
            };
            self.clip_to_screen(screen, screen_planes);
        }
        self.near_clipped = near_clipped;

        if self.visible.len() == visible_before {
            stats.clipped_away += 1;
        }
    }

    // Clips against each screen edge in turn, appending what is left to `self.visible`
    fn clip_to_screen(&mut self, triangle: Triangle, planes: &[Plane; 4]) {
        self.clip_queue.clear();
        self.clip_queue.push_back(triangle);

        for plane in planes {
            let pending = self.clip_queue.len();
            for _ in 0..pending {
                let Some(next) = self.clip_queue.pop_front() else {
                    break;
                };
                self.clip_output.clear();
                plane.clip_into(&next, &mut self.clip_output);
                self.clip_queue.extend(self.clip_output.drain(..));
            }
        }

        self.visible.extend(self.clip_queue.drain(..));
    }

    fn log_timings(&mut self, geometry_time: Duration, rasterizer_time: Duration) {
        // Stutter detection (2x the average)
        if self.frame_count > 0 {
            let geometry_avg = self.timer_geometry.as_secs_f64() / self.frame_count as f64;
            let rasterizer_avg = self.timer_rasterizer.as_secs_f64() / self.frame_count as f64;
            if geometry_time > Duration::from_secs_f64(geometry_avg * 2.0) {
                log::debug!(
                    "Geometry stutter: {:.2}ms",
                    geometry_time.as_secs_f64() * 1000.0
                );
            }
            if rasterizer_time > Duration::from_secs_f64(rasterizer_avg * 2.0) {
                log::debug!(
                    "Rasterization stutter: {:.2}ms",
                    rasterizer_time.as_secs_f64() * 1000.0
                );
            }
        }

        self.frame_count += 1;
        let now = Instant::now();
        if now.duration_since(self.last_print_time) >= Duration::from_secs(1) {
            let geometry_ms = self.timer_geometry.as_secs_f64() * 1000.0 / self.frame_count as f64;
            let rasterizer_ms =
                self.timer_rasterizer.as_secs_f64() * 1000.0 / self.frame_count as f64;
            log::debug!("Geometry:       {:.2} ms", geometry_ms);
            log::debug!("Rasterization:  {:.2} ms", rasterizer_ms);
            log::debug!("Total:          {:.2} ms", geometry_ms + rasterizer_ms);
            self.last_print_time = now;
            self.frame_count = 0;
            self.timer_geometry = Duration::ZERO;
            self.timer_rasterizer = Duration::ZERO;
        }
    }
}

// Screen edges in clipping order: top, bottom, left, right
fn screen_planes(width: f64, height: f64) -> [Plane; 4] {
    [
        Plane::new(DVec3::ZERO, DVec3::Y),
        Plane::new(DVec3::new(0.0, height, 0.0), DVec3::NEG_Y),
        Plane::new(DVec3::ZERO, DVec3::X),
        Plane::new(DVec3::new(width, 0.0, 0.0), DVec3::NEG_X),
    ]
}

// Projects a view space triangle and maps it to pixel coordinates.
// None when a vertex cannot be divided by its w.
fn to_screen(
    triangle: &Triangle,
    projection: Matrix4x4,
    width: f64,
    height: f64,
) -> Option<Triangle> {
    let mut vertices = [Vector4::new(0.0, 0.0, 0.0); 3];
    for (out, vertex) in vertices.iter_mut().zip(triangle.vertices.iter()) {
        let mut projected = (*vertex * projection).perspective_divide()?;
        projected.pos.x = (projected.pos.x + 1.0) * width * 0.5;
        projected.pos.y = (projected.pos.y + 1.0) * height * 0.5;
        *out = projected;
    }
    Some(triangle.with_vertices(vertices))
}
