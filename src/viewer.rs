use crate::config::RenderConfig;
use crate::framebuffer::{Compositor, ResolutionScale};
use crate::rendercamera::RenderCamera;
use crate::renderer::{FrameStats, Renderer};
use crate::scene::Mesh;
use crate::util::bgra_to_rgba;
use glam::DVec3;
use winit::keyboard::KeyCode;

// Model extents moved per second while an arrow key is held
const POSITION_SPEED: f64 = 1.0;
// Model extents moved per mouse wheel notch
const WHEEL_STEP: f64 = 0.1;

// Everything the input layer can ask of the viewer
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ViewerAction {
    Rotate { dx: f64, dy: f64 },
    Move(DVec3),
    ToggleFlipNormals,
    ResetView,
    SetScale(ResolutionScale),
    Quit,
}

impl ViewerAction {
    // Actions triggered once per key press
    pub fn from_key(key: KeyCode) -> Option<Self> {
        let action = match key {
            KeyCode::KeyF => ViewerAction::ToggleFlipNormals,
            KeyCode::KeyR => ViewerAction::ResetView,
            KeyCode::Digit1 => ViewerAction::SetScale(ResolutionScale::X1),
            KeyCode::Digit2 => ViewerAction::SetScale(ResolutionScale::X2),
            KeyCode::Digit3 => ViewerAction::SetScale(ResolutionScale::X4),
            KeyCode::Digit4 => ViewerAction::SetScale(ResolutionScale::X8),
            KeyCode::Digit5 => ViewerAction::SetScale(ResolutionScale::X16),
            KeyCode::Escape => ViewerAction::Quit,
            _ => return None,
        };
        Some(action)
    }
}

// Mesh, camera and render targets of the running viewer, independent of any window
pub struct Viewer {
    mesh: Mesh,
    camera: RenderCamera,
    renderer: Renderer,
    compositor: Compositor,
    move_scale: f64,
}

impl Viewer {
    pub fn new(mesh: Mesh, config: &RenderConfig, scale: ResolutionScale) -> Self {
        let mut camera = RenderCamera::default();
        camera.reset(&mesh.bounds);
        let move_scale = if mesh.bounds.is_empty() {
            1.0
        } else {
            mesh.bounds.extent().max(1.0)
        };
        let compositor = Compositor::new(
            config.width as usize,
            config.height as usize,
            scale,
            config.background_bgra(),
            config.parallel_expand,
        );
        Self {
            mesh,
            camera,
            renderer: Renderer::new(config),
            compositor,
            move_scale,
        }
    }

    pub fn camera(&self) -> &RenderCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut RenderCamera {
        &mut self.camera
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn scale(&self) -> ResolutionScale {
        self.compositor.scale()
    }

    pub fn display_size(&self) -> (usize, usize) {
        self.compositor.display_size()
    }

    // Camera offset for a mouse wheel movement in notches, positive away from the viewer
    pub fn wheel_motion(&self, notches: f64) -> DVec3 {
        DVec3::new(0.0, 0.0, notches * WHEEL_STEP * self.move_scale)
    }

    // Camera offset for holding an arrow key for `seconds`, direction -1 or 1
    pub fn vertical_motion(&self, direction: f64, seconds: f64) -> DVec3 {
        DVec3::new(0.0, direction * POSITION_SPEED * self.move_scale * seconds, 0.0)
    }

    // Returns false once the viewer should close
    pub fn apply(&mut self, action: ViewerAction) -> bool {
        match action {
            ViewerAction::Rotate { dx, dy } => self.camera.rotate_mouse(dx, dy),
            ViewerAction::Move(delta) => self.camera.move_by(delta),
            ViewerAction::ToggleFlipNormals => {
                self.camera.toggle_flip_normals();
                log::info!("Flip normals: {}", self.camera.flip_normals);
            }
            ViewerAction::ResetView => {
                let flip_normals = self.camera.flip_normals;
                self.camera.reset(&self.mesh.bounds);
                self.camera.flip_normals = flip_normals;
            }
            ViewerAction::SetScale(scale) => self.compositor.set_scale(scale),
            ViewerAction::Quit => return false,
        }
        true
    }

    // Renders one frame and writes it as RGBA8 into `frame`, then clears for the next one
    pub fn draw(&mut self, frame: &mut [u8]) -> FrameStats {
        let stats = self.renderer.render(
            &self.mesh,
            &self.camera,
            self.compositor.framebuffer_mut(),
        );
        bgra_to_rgba(self.compositor.present(), frame);
        self.compositor.clear();
        stats
    }
}
