#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Placement of a bitmap in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).min(win_h / img_h)
}

/// Where to draw an `image`-sized bitmap inside `target`.
///
/// Scaled to fit (aspect preserved, centred on the slack axis) when `fit` is
/// set or the image overflows the target; otherwise centred at native size.
pub fn place(target: Size, image: Size, fit: bool) -> Rect {
    if fit || image.width > target.width || image.height > target.height {
        let scale = fit_scale(image.width, image.height, target.width, target.height);
        let w = image.width * scale;
        let h = image.height * scale;
        let left = (target.width - w) / 2.0;
        let top = (target.height - h) / 2.0;
        Rect { left, top, right: left + w, bottom: top + h }
    } else {
        let left = (target.width - image.width) / 2.0;
        let top = (target.height - image.height) / 2.0;
        Rect {
            left,
            top,
            right: left + image.width,
            bottom: top + image.height,
        }
    }
}
