//! Application window and event loop management.

use std::sync::Arc;

use pollster::FutureExt;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use cumulo_render::{RenderEngine, RenderError};

use crate::state::{with_state, with_state_mut};

/// The cumulo application state.
pub(crate) struct App {
    window: Option<Arc<Window>>,
    engine: Option<RenderEngine>,
    // Mouse state for camera control
    mouse_pos: (f64, f64),
    left_mouse_down: bool,
    right_mouse_down: bool,
    // Whether the camera has been auto-fitted to the scene
    camera_fitted: bool,
}

impl App {
    pub(crate) fn new() -> Self {
        Self {
            window: None,
            engine: None,
            mouse_pos: (0.0, 0.0),
            left_mouse_down: false,
            right_mouse_down: false,
            camera_fitted: false,
        }
    }

    fn fit_camera(&mut self) {
        let Some(engine) = &mut self.engine else {
            return;
        };
        if self.camera_fitted || !with_state(|s| s.options.auto_fit_camera) {
            return;
        }
        let (min, max) = with_state_mut(|state| {
            state.update_extents();
            state.bounding_box
        });
        engine.camera.look_at_box(min, max);
        self.camera_fitted = true;
    }

    fn render(&mut self) {
        self.fit_camera();
        let Some(engine) = &mut self.engine else {
            return;
        };
        let background = with_state(|s| s.options.background_color);
        let result =
            with_state_mut(|state| engine.render_frame(state.registry.iter_mut(), background));
        match result {
            Ok(()) => {}
            Err(RenderError::SurfaceLost | RenderError::SurfaceOutdated) => {
                let (width, height) = engine.dimensions();
                engine.resize(width, height);
            }
            Err(e) => log::error!("render error: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("cumulo")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .expect("failed to create window"),
        );

        let vsync = with_state(|s| s.options.vsync);
        match RenderEngine::new_windowed(Arc::clone(&window), vsync).block_on() {
            Ok(engine) => self.engine = Some(engine),
            Err(e) => {
                log::error!("failed to create render engine: {e}");
                event_loop.exit();
                return;
            }
        }

        window.request_redraw();
        self.window = Some(window);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = &mut self.engine {
                    engine.resize(size.width, size.height);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let pressed = state == ElementState::Pressed;
                match button {
                    MouseButton::Left => self.left_mouse_down = pressed,
                    MouseButton::Right => self.right_mouse_down = pressed,
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let delta_x = (position.x - self.mouse_pos.0) as f32;
                let delta_y = (position.y - self.mouse_pos.1) as f32;
                self.mouse_pos = (position.x, position.y);

                if let Some(engine) = &mut self.engine {
                    if self.left_mouse_down {
                        engine.camera.orbit(delta_x * 0.01, delta_y * 0.01);
                    } else if self.right_mouse_down {
                        let scale = with_state(|s| s.length_scale) * 0.001;
                        engine.camera.pan(-delta_x * scale, delta_y * scale);
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                if let Some(engine) = &mut self.engine {
                    let amount = match delta {
                        MouseScrollDelta::LineDelta(_, y) => y,
                        MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.01,
                    };
                    let scale = with_state(|s| s.length_scale) * 0.1;
                    engine.camera.zoom(amount * scale);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Runs the cumulo application.
pub(crate) fn run_app() {
    let event_loop = EventLoop::new().expect("failed to create event loop");
    let mut app = App::new();

    event_loop.run_app(&mut app).expect("event loop error");
}
