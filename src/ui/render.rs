// Software drawing into the softbuffer framebuffer.

use crate::device::DeviceBitmap;
use crate::layout::Rect;

pub const BG_COLOR: [u8; 4] = [211, 211, 211, 255]; // light gray

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

pub fn clear(frame: &mut [u32]) {
    frame.fill(rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]));
}

/// Pan/zoom applied on top of the cached placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { scale: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }
}

impl ViewTransform {
    /// Screen rectangle of `rect` after zooming about the frame centre and panning.
    pub fn apply(&self, rect: Rect, fb_w: u32, fb_h: u32) -> Rect {
        let cx = fb_w as f32 / 2.0;
        let cy = fb_h as f32 / 2.0;
        let tx = |x: f32| (x - cx) * self.scale + cx + self.offset_x;
        let ty = |y: f32| (y - cy) * self.scale + cy + self.offset_y;
        Rect {
            left: tx(rect.left),
            top: ty(rect.top),
            right: tx(rect.right),
            bottom: ty(rect.bottom),
        }
    }
}

/// Nearest-neighbour copy of `bmp` stretched onto `dst_rect`, clipped to the frame.
pub fn blit(dst: &mut [u32], dst_w: u32, dst_h: u32, bmp: &DeviceBitmap, dst_rect: Rect) {
    let rw = dst_rect.width();
    let rh = dst_rect.height();
    if rw <= 0.0 || rh <= 0.0 || bmp.width == 0 || bmp.height == 0 {
        return;
    }

    let dx_start = dst_rect.left.max(0.0) as u32;
    let dy_start = dst_rect.top.max(0.0) as u32;
    let dx_end = (dst_rect.right.ceil().max(0.0) as u32).min(dst_w);
    let dy_end = (dst_rect.bottom.ceil().max(0.0) as u32).min(dst_h);

    let sx_scale = bmp.width as f32 / rw;
    let sy_scale = bmp.height as f32 / rh;

    for dy in dy_start..dy_end {
        let vy = (dy as f32 + 0.5 - dst_rect.top) * sy_scale;
        if vy < 0.0 {
            continue;
        }
        let sy = vy as u32;
        if sy >= bmp.height {
            continue;
        }
        let src_row = sy as usize * bmp.width as usize;
        let dst_row = dy as usize * dst_w as usize;

        for dx in dx_start..dx_end {
            let vx = (dx as f32 + 0.5 - dst_rect.left) * sx_scale;
            if vx < 0.0 {
                continue;
            }
            let sx = vx as u32;
            if sx >= bmp.width {
                continue;
            }
            dst[dst_row + dx as usize] = bmp.pixels[src_row + sx as usize];
        }
    }
}
