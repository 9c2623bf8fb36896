use std::num::NonZeroU32;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};
use softbuffer::Surface;

use crate::ui::state::{command_for, ViewerState};

pub mod render;
pub mod state;

/// Sent from decode workers to wake the event loop.
#[derive(Debug)]
pub enum UserEvent {
    ImageReady(usize),
}

// ---------------------------------------------------------------------------
// Application handler (winit 0.30 style)
// ---------------------------------------------------------------------------

pub struct App {
    pub state: ViewerState,
    pub window: Option<Arc<Window>>,
    pub context: Option<softbuffer::Context<Arc<Window>>>,
    pub surface: Option<Surface<Arc<Window>, Arc<Window>>>,
}

impl App {
    pub fn new(state: ViewerState) -> Self {
        Self {
            state,
            window: None,
            context: None,
            surface: None,
        }
    }

    fn request_redraw(&self) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn sync_title(&self) {
        if let Some(ref window) = self.window {
            window.set_title(&self.state.title());
        }
    }
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.state.title())
            .with_inner_size(LogicalSize::new(1280u32, 720u32));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        let context = match softbuffer::Context::new(Arc::clone(&window)) {
            Ok(c) => c,
            Err(e) => {
                log::error!("Failed to create softbuffer context: {}", e);
                event_loop.exit();
                return;
            }
        };
        let surface = match Surface::new(&context, Arc::clone(&window)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to create surface: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        self.state.attach_device(size.width.max(1), size.height.max(1));

        window.request_redraw();
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::ImageReady(idx) => {
                if idx == self.state.cache.current_index() {
                    self.request_redraw();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(PhysicalSize { width, height }) => {
                let w = width.max(1);
                let h = height.max(1);
                if let (Some(surface), Some(nw), Some(nh)) =
                    (self.surface.as_mut(), NonZeroU32::new(w), NonZeroU32::new(h))
                {
                    if let Err(e) = surface.resize(nw, nh) {
                        log::error!("Failed to resize surface: {}", e);
                    }
                }
                self.state.resize(w, h);
                self.request_redraw();
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                let Some(cmd) = command_for(&event.logical_key) else {
                    return;
                };
                if self.state.apply(cmd) {
                    event_loop.exit();
                    return;
                }
                self.sync_title();
                self.request_redraw();
            }

            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    if state == ElementState::Pressed {
                        self.state.begin_drag();
                    } else {
                        self.state.dragging = false;
                    }
                }
            }

            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                if self.state.cursor_moved(x, y) {
                    self.request_redraw();
                }
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(PhysicalPosition { y, .. }) => y as f32 / 40.0,
                };
                if y.abs() > 0.1 {
                    self.state.zoom(if y > 0.0 { 1 } else { -1 });
                    self.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(window) = self.window.as_ref() else {
                    return;
                };
                let size = window.inner_size();
                let fb_w = size.width.max(1);
                let fb_h = size.height.max(1);

                if let Some(ref mut surface) = self.surface {
                    match surface.buffer_mut() {
                        Ok(mut buffer) => {
                            if let Err(e) = self.state.render(&mut buffer, fb_w, fb_h) {
                                log::error!("{}", e);
                                event_loop.exit();
                                return;
                            }
                            if let Err(e) = buffer.present() {
                                log::error!("Failed to present frame: {}", e);
                            }
                        }
                        Err(e) => log::error!("Failed to map surface buffer: {}", e),
                    }
                }
            }

            _ => {}
        }
    }
}
