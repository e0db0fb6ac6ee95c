use clap::Parser;
use glam::DVec2;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use pixels::{Pixels, PixelsBuilder, SurfaceTexture};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{
    DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent,
};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use swview::{Mesh, RenderConfig, ResolutionScale, Viewer, ViewerAction};

// Pixels of touchpad scrolling that count as one wheel notch
const PIXELS_PER_NOTCH: f64 = 40.0;

#[derive(Parser, Clone)]
#[command(name = "swview")]
#[command(about = "Software rasterizer viewer for OBJ files")]
struct Settings {
    /// OBJ file to load
    file: PathBuf,

    /// Render at 1/SCALE of the window resolution: 1, 2, 4, 8 or 16
    #[arg(long)]
    scale: Option<u32>,

    /// TOML file with render settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with flipped normals (for meshes with clockwise winding)
    #[arg(long)]
    flip_normals: bool,

    /// Disable vsync
    #[arg(long)]
    no_vsync: bool,

    /// Expand low resolution frames on a single thread
    #[arg(long)]
    sequential_expand: bool,
}

struct InputState {
    keys_down: HashSet<KeyCode>,
    mouse_down: bool,
    mouse_delta: DVec2,
}

impl InputState {
    fn is_key_down(&self, key_code: KeyCode) -> bool {
        self.keys_down.contains(&key_code)
    }
}

struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    viewer: Viewer,
    filename: String,
    vsync: bool,
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
    input_state: InputState,
}

impl App {
    fn new(settings: &Settings, viewer: Viewer) -> Self {
        let filename = settings
            .file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("")
            .to_string();

        Self {
            window: None,
            pixels: None,
            viewer,
            filename,
            vsync: !settings.no_vsync,
            frame_count: 0,
            last_fps_update: Instant::now(),
            last_frame_time: Instant::now(),
            input_state: InputState {
                keys_down: HashSet::new(),
                mouse_down: false,
                mouse_delta: DVec2::ZERO,
            },
        }
    }

    fn create_surface(
        &mut self,
        event_loop: &ActiveEventLoop,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let (width, height) = self.viewer.display_size();
        let window_attributes = Window::default_attributes()
            .with_inner_size(LogicalSize::new(width as f64, height as f64))
            .with_title(format!("Software Rasterizer - {}", self.filename));
        let window = Arc::new(event_loop.create_window(window_attributes)?);

        let window_size = window.inner_size();
        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window.clone());
        let pixels = PixelsBuilder::new(width as u32, height as u32, surface_texture)
            .enable_vsync(self.vsync)
            .build()?;

        window.request_redraw();
        self.window = Some(window);
        self.pixels = Some(pixels);
        Ok(())
    }

    fn dispatch(&mut self, event_loop: &ActiveEventLoop, action: ViewerAction) {
        if !self.viewer.apply(action) {
            event_loop.exit();
        }
    }

    fn update_keyboard(&mut self, event_loop: &ActiveEventLoop, event: KeyEvent) {
        let PhysicalKey::Code(key_code) = event.physical_key else {
            return;
        };
        if event.state == ElementState::Released {
            self.input_state.keys_down.remove(&key_code);
            return;
        }
        if event.repeat {
            return;
        }
        self.input_state.keys_down.insert(key_code);
        if let Some(action) = ViewerAction::from_key(key_code) {
            self.dispatch(event_loop, action);
        }
    }

    fn update_mouse_button(&mut self, state: ElementState, button: MouseButton) {
        if button != MouseButton::Left {
            return;
        }
        self.input_state.mouse_down = state == ElementState::Pressed;
        self.input_state.mouse_delta = DVec2::ZERO;
    }

    fn update_mouse_wheel(&mut self, event_loop: &ActiveEventLoop, delta: MouseScrollDelta) {
        let notches = match delta {
            MouseScrollDelta::LineDelta(_, y) => y as f64,
            MouseScrollDelta::PixelDelta(position) => position.y / PIXELS_PER_NOTCH,
        };
        // Scrolling up pulls the model closer
        let motion = self.viewer.wheel_motion(-notches);
        self.dispatch(event_loop, ViewerAction::Move(motion));
    }

    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        // Compute delta time
        let current_time = Instant::now();
        let delta_time = current_time
            .duration_since(self.last_frame_time)
            .as_secs_f64();
        self.last_frame_time = current_time;

        // Held arrow keys move the model vertically
        if self.input_state.is_key_down(KeyCode::ArrowUp) {
            let motion = self.viewer.vertical_motion(-1.0, delta_time);
            self.dispatch(event_loop, ViewerAction::Move(motion));
        }
        if self.input_state.is_key_down(KeyCode::ArrowDown) {
            let motion = self.viewer.vertical_motion(1.0, delta_time);
            self.dispatch(event_loop, ViewerAction::Move(motion));
        }

        // Dragging with the left button rotates
        if self.input_state.mouse_down && self.input_state.mouse_delta != DVec2::ZERO {
            let delta = self.input_state.mouse_delta;
            self.dispatch(
                event_loop,
                ViewerAction::Rotate {
                    dx: -delta.x,
                    dy: delta.y,
                },
            );
            self.input_state.mouse_delta = DVec2::ZERO;
        }

        let Some(pixels) = self.pixels.as_mut() else {
            return;
        };
        let stats = self.viewer.draw(pixels.frame_mut());
        if let Err(err) = pixels.render() {
            log::error!("Pixels render error: {}", err);
            event_loop.exit();
            return;
        }

        // Update FPS counter
        self.frame_count += 1;
        let elapsed = current_time.duration_since(self.last_fps_update);
        if elapsed.as_secs_f64() >= 1.0 {
            let fps = self.frame_count as f64 / elapsed.as_secs_f64();
            if let Some(window) = self.window.as_ref() {
                window.set_title(&format!(
                    "Software Rasterizer - {} - {:.1} FPS - 1/{}",
                    self.filename,
                    fps,
                    self.viewer.scale().factor(),
                ));
            }
            log::debug!("{:?}", stats);
            self.frame_count = 0;
            self.last_fps_update = current_time;
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some(pixels) = self.pixels.as_mut() {
            if let Err(err) = pixels.resize_surface(width, height) {
                log::error!("Could not resize surface to {}x{}: {}", width, height, err);
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.create_surface(event_loop) {
            log::error!("Could not create window: {}", err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                device_id: _,
                event,
                is_synthetic,
            } => {
                if is_synthetic {
                    return;
                }
                self.update_keyboard(event_loop, event);
            }
            WindowEvent::MouseInput {
                device_id: _,
                state,
                button,
            } => {
                self.update_mouse_button(state, button);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.update_mouse_wheel(event_loop, delta);
            }
            WindowEvent::RedrawRequested => {
                self.render_frame(event_loop);
            }
            WindowEvent::Resized(physical_size) => {
                self.resize_surface(physical_size.width, physical_size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.window.as_ref().map(|window| window.inner_size()) {
                    self.resize_surface(size.width, size.height);
                }
            }
            _ => (),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.input_state.mouse_delta += DVec2::new(delta.0, delta.1);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // After processing all other events, request a redraw
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

fn load_config(
    settings: &Settings,
) -> Result<(RenderConfig, ResolutionScale), Box<dyn std::error::Error>> {
    let mut config = match &settings.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    if let Some(scale) = settings.scale {
        config.scale = scale;
    }
    if settings.sequential_expand {
        config.parallel_expand = false;
    }
    config.validate()?;
    let scale = config.resolution_scale()?;
    Ok((config, scale))
}

fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let (config, scale) = load_config(&settings)?;
    let mesh = Mesh::load_obj(&settings.file)?;

    let mut viewer = Viewer::new(mesh, &config, scale);
    viewer.camera_mut().flip_normals = settings.flip_normals;

    let event_loop = EventLoop::new()?;

    // ControlFlow::Poll continuously runs the event loop, even if the OS hasn't
    // dispatched any events.
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&settings, viewer);
    event_loop.run_app(&mut app)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::parse();
    log::info!("Loading: {}", settings.file.display());

    run(settings).inspect_err(|err| log::error!("{}", err))
}
