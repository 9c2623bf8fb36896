use std::sync::Arc;

use winit::keyboard::{Key, NamedKey};

use crate::cache::{Frame, ImageCache};
use crate::counter::Counter;
use crate::device::SoftDevice;
use crate::error::CacheError;
use crate::ui::render::{blit, clear, ViewTransform};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const SCALE_TABLE: [f32; 11] = [1.0, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0, 4.0, 5.0, 7.0, 10.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    Next,
    Prev,
    RotateCw,
    RotateCcw,
    ToggleFit,
    ResetZoom,
    ZoomIn,
    ZoomOut,
}

/// Map a pressed key to what it does; `None` for unbound keys.
pub fn command_for(key: &Key) -> Option<Command> {
    match key {
        Key::Named(named) => match named {
            NamedKey::Escape => Some(Command::Quit),
            NamedKey::ArrowRight | NamedKey::Space => Some(Command::Next),
            NamedKey::ArrowLeft => Some(Command::Prev),
            NamedKey::PageDown => Some(Command::RotateCw),
            NamedKey::PageUp => Some(Command::RotateCcw),
            NamedKey::ArrowDown => Some(Command::ToggleFit),
            NamedKey::ArrowUp => Some(Command::ResetZoom),
            _ => None,
        },
        Key::Character(s) => match s.as_str() {
            "q" => Some(Command::Quit),
            "l" | " " => Some(Command::Next),
            "h" => Some(Command::Prev),
            "r" => Some(Command::RotateCw),
            "R" => Some(Command::RotateCcw),
            "z" => Some(Command::ToggleFit),
            "0" => Some(Command::ResetZoom),
            "+" | "=" => Some(Command::ZoomIn),
            "-" => Some(Command::ZoomOut),
            _ => None,
        },
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

pub struct ViewerState {
    pub cache: ImageCache,
    pub device: Option<Arc<SoftDevice>>,
    pub fit_on_start: bool,

    zoom_idx: Counter,
    pub offset_x: f32,
    pub offset_y: f32,
    pub dragging: bool,
    pub drag_start: (f64, f64),
    pub drag_offset_start: (f32, f32),
    pub mouse_pos: (f64, f64),
}

impl ViewerState {
    pub fn new(cache: ImageCache, fit_on_start: bool) -> Self {
        Self {
            cache,
            device: None,
            fit_on_start,
            zoom_idx: Counter::clamping(0, SCALE_TABLE.len() as i64 - 1, 1),
            offset_x: 0.0,
            offset_y: 0.0,
            dragging: false,
            drag_start: (0.0, 0.0),
            drag_offset_start: (0.0, 0.0),
            mouse_pos: (0.0, 0.0),
        }
    }

    /// Hand the freshly created surface's device to the cache.
    pub fn attach_device(&mut self, width: u32, height: u32) {
        let device = Arc::new(SoftDevice::new(width, height, self.fit_on_start));
        self.cache.attach_device(device.clone());
        self.device = Some(device);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(ref device) = self.device {
            device.set_viewport(width, height);
            self.cache.refresh_window(false);
        }
    }

    pub fn title(&self) -> String {
        format!(
            "[{}/{}] {}",
            self.cache.current_index() + 1,
            self.cache.len(),
            self.cache.current_path().display()
        )
    }

    pub fn is_zoomed(&self) -> bool {
        self.zoom_idx.get() != 0
    }

    pub fn view(&self) -> ViewTransform {
        ViewTransform {
            scale: SCALE_TABLE[self.zoom_idx.get() as usize],
            offset_x: self.offset_x,
            offset_y: self.offset_y,
        }
    }

    /// Apply a command. Returns true if the app should quit.
    pub fn apply(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Quit => return true,
            Command::Next | Command::Prev => {
                let dir = if cmd == Command::Next { 1 } else { -1 };
                self.cache.navigate(dir);
                self.reset_zoom();
            }
            Command::RotateCw => self.cache.rotate_current(1),
            Command::RotateCcw => self.cache.rotate_current(-1),
            Command::ToggleFit => {
                if let Some(ref device) = self.device {
                    let fit = device.toggle_fit();
                    log::debug!("fit to window: {}", fit);
                    self.cache.refresh_window(false);
                }
            }
            Command::ResetZoom => self.reset_zoom(),
            Command::ZoomIn => self.zoom(1),
            Command::ZoomOut => self.zoom(-1),
        }
        false
    }

    pub fn zoom(&mut self, dir: i32) {
        if dir > 0 {
            self.zoom_idx.increment();
        } else {
            self.zoom_idx.decrement();
        }
        if !self.is_zoomed() {
            self.offset_x = 0.0;
            self.offset_y = 0.0;
        }
    }

    pub fn reset_zoom(&mut self) {
        self.zoom_idx.reset();
        self.offset_x = 0.0;
        self.offset_y = 0.0;
        self.dragging = false;
    }

    pub fn begin_drag(&mut self) {
        if self.is_zoomed() {
            self.dragging = true;
            self.drag_start = self.mouse_pos;
            self.drag_offset_start = (self.offset_x, self.offset_y);
        }
    }

    /// Track the cursor; returns true when a pan moved the view.
    pub fn cursor_moved(&mut self, x: f64, y: f64) -> bool {
        self.mouse_pos = (x, y);
        if !self.dragging {
            return false;
        }
        self.offset_x = self.drag_offset_start.0 + (x - self.drag_start.0) as f32;
        self.offset_y = self.drag_offset_start.1 + (y - self.drag_start.1) as f32;
        true
    }

    /// Render into the softbuffer framebuffer (u32 per pixel, 0x00RRGGBB).
    ///
    /// Blocks until the current image is ready or known to be missing.
    pub fn render(&self, frame: &mut [u32], fb_w: u32, fb_h: u32) -> Result<(), CacheError> {
        if frame.len() < fb_w as usize * fb_h as usize {
            return Ok(());
        }
        clear(frame);
        match self.cache.current_ready_bitmap()? {
            Frame::Ready { bitmap, rect } => {
                let on_screen = self.view().apply(rect, fb_w, fb_h);
                blit(frame, fb_w, fb_h, &bitmap, on_screen);
            }
            Frame::NoImage => {}
        }
        Ok(())
    }
}
