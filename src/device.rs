//! The graphics side of the cache: turning decoded pixels into something the
//! window can draw, and answering viewport questions for layout.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbaImage;

use crate::error::DeviceError;
use crate::layout::Size;
use crate::ui::render::{rgb, BG_COLOR};

/// Device-resident pixels, `0x00RRGGBB` per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceBitmap {
    pub pixels: Vec<u32>,
    pub width: u32,
    pub height: u32,
}

impl DeviceBitmap {
    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }
}

/// Everything the cache needs from the graphics layer. Called from lanes.
pub trait Device: Send + Sync {
    fn viewport(&self) -> Size;
    fn fit_to_window(&self) -> bool;
    fn upload(&self, image: &RgbaImage) -> Result<DeviceBitmap, DeviceError>;
}

// ---------------------------------------------------------------------------
// Software device backing a softbuffer surface
// ---------------------------------------------------------------------------

pub struct SoftDevice {
    viewport: Mutex<Size>,
    fit: AtomicBool,
}

impl SoftDevice {
    pub fn new(width: u32, height: u32, fit: bool) -> Self {
        Self {
            viewport: Mutex::new(Size::new(width.max(1) as f32, height.max(1) as f32)),
            fit: AtomicBool::new(fit),
        }
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        *self.viewport.lock().unwrap() = Size::new(width.max(1) as f32, height.max(1) as f32);
    }

    /// Flip fit-to-window and return the new value.
    pub fn toggle_fit(&self) -> bool {
        !self.fit.fetch_xor(true, Ordering::SeqCst)
    }
}

impl Device for SoftDevice {
    fn viewport(&self) -> Size {
        *self.viewport.lock().unwrap()
    }

    fn fit_to_window(&self) -> bool {
        self.fit.load(Ordering::SeqCst)
    }

    fn upload(&self, image: &RgbaImage) -> Result<DeviceBitmap, DeviceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DeviceError::EmptyImage { width, height });
        }

        // Flatten alpha against the window background once, at upload time.
        let [br, bg, bb, _] = BG_COLOR;
        let pixels = image
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                let a = a as u32;
                let inv = 255 - a;
                let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * inv) / 255) as u8;
                rgb(mix(r, br), mix(g, bg), mix(b, bb))
            })
            .collect();

        Ok(DeviceBitmap { pixels, width, height })
    }
}
