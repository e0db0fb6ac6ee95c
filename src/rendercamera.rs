use crate::math::Matrix4x4;
use crate::scene::Bounds;
use glam::DVec3;
use std::f64::consts::PI;

const DEFAULT_OFFSET: DVec3 = DVec3::new(0.0, 1.0, 10.0);
// Pitch that turns y-up model space into the y-down screen
const DEFAULT_ROTATION: DVec3 = DVec3::new(PI, 0.0, 0.0);
// Radians per pixel of mouse drag
const MOUSE_SENSITIVITY: f64 = 0.01;

// The camera sits at the origin looking down +z; the model is moved in front of it
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderCamera {
    pub position_offset: DVec3,
    pub rotation: DVec3, // pitch, yaw, roll in radians
    pub flip_normals: bool,
}

impl Default for RenderCamera {
    fn default() -> Self {
        Self {
            position_offset: DEFAULT_OFFSET,
            rotation: DEFAULT_ROTATION,
            flip_normals: false,
        }
    }
}

impl RenderCamera {
    pub fn new(position_offset: DVec3, rotation: DVec3) -> Self {
        Self {
            position_offset,
            rotation,
            flip_normals: false,
        }
    }

    // Model to view transform: rotate about the model origin, then translate
    pub fn world_matrix(&self) -> Matrix4x4 {
        Matrix4x4::rotation(self.rotation) * Matrix4x4::translation(self.position_offset)
    }

    // Centers the model on screen with its nearest point three extents away.
    // Empty bounds fall back to the default view.
    pub fn reset(&mut self, bounds: &Bounds) {
        self.rotation = DEFAULT_ROTATION;
        if bounds.is_empty() {
            self.position_offset = DEFAULT_OFFSET;
            return;
        }
        let center = bounds.center();
        let extent = bounds.extent().max(1.0);
        // The pitch of pi mirrors y and z, x is left alone
        self.position_offset = DVec3::new(-center.x, center.y, bounds.max.z + 3.0 * extent);
    }

    pub fn move_by(&mut self, delta: DVec3) {
        self.position_offset += delta;
    }

    pub fn rotate_mouse(&mut self, dx: f64, dy: f64) {
        self.rotation.y += dx * MOUSE_SENSITIVITY;
        self.rotation.x += dy * MOUSE_SENSITIVITY;
    }

    pub fn toggle_flip_normals(&mut self) {
        self.flip_normals = !self.flip_normals;
    }
}
