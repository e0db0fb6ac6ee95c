//! CPU triangle rasterizer: transform, cull, clip, rasterize and composite a mesh into a
//! BGRA8 framebuffer, plus the OBJ/MTL loading and viewer state needed to drive it.

pub mod clipper;
pub mod config;
pub mod framebuffer;
pub mod math;
pub mod rasterizer;
pub mod rendercamera;
pub mod renderer;
pub mod scene;
pub mod texture;
pub mod util;
pub mod viewer;

pub use config::{ConfigError, RenderConfig};
pub use framebuffer::{Compositor, Framebuffer, ResolutionScale, ScaleError};
pub use rendercamera::RenderCamera;
pub use renderer::{FrameStats, Renderer};
pub use scene::{AssetError, Mesh, Triangle};
pub use viewer::{Viewer, ViewerAction};
