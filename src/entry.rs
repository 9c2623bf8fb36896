use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use image::RgbaImage;

use crate::counter::Counter;
use crate::device::{Device, DeviceBitmap};
use crate::error::DeviceError;
use crate::lane::Lane;
use crate::layout::{self, Rect, Size};

// ---------------------------------------------------------------------------
// Status monitor (shared by all entries and the render path)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unloaded,
    Loading,
    DecodedRaw,
    DecodedDevice,
    Failed,
}

impl Status {
    /// Holds decoded pixels (raw or already on the device).
    pub fn is_decoded(self) -> bool {
        matches!(self, Status::DecodedRaw | Status::DecodedDevice)
    }
}

pub struct Board {
    pub status: Vec<Status>,
    /// Last device failure reported by a lane, cleared when a device is attached.
    pub fault: Option<DeviceError>,
    /// Bumped on every `attach_device`; faults from older devices are dropped.
    pub generation: u64,
    #[cfg(test)]
    pub history: Vec<(usize, Status)>,
}

pub type SharedStatus = Arc<(Mutex<Board>, Condvar)>;

pub fn new_board(len: usize) -> SharedStatus {
    Arc::new((
        Mutex::new(Board {
            status: vec![Status::Unloaded; len],
            fault: None,
            generation: 0,
            #[cfg(test)]
            history: Vec::new(),
        }),
        Condvar::new(),
    ))
}

fn set_status(shared: &SharedStatus, idx: usize, status: Status) {
    let (lock, cvar) = &**shared;
    {
        let mut board = lock.lock().unwrap();
        board.status[idx] = status;
        #[cfg(test)]
        board.history.push((idx, status));
    }
    cvar.notify_all();
}

pub fn status_of(shared: &SharedStatus, idx: usize) -> Status {
    shared.0.lock().unwrap().status[idx]
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn decode(path: &Path) -> Result<RgbaImage, image::ImageError> {
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?;
    Ok(img.to_rgba8())
}

/// `quarter_turns` clockwise quarter turns of `img`; `None` for no rotation.
fn rotated(img: &RgbaImage, quarter_turns: i64) -> Option<RgbaImage> {
    match quarter_turns.rem_euclid(4) {
        1 => Some(image::imageops::rotate90(img)),
        2 => Some(image::imageops::rotate180(img)),
        3 => Some(image::imageops::rotate270(img)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Image entry
// ---------------------------------------------------------------------------

/// Fields only ever touched from the entry's own lane (plus read-only
/// snapshots by the render path).
struct Resources {
    rotation: Counter,
    raw_image: Option<RgbaImage>,
    rotated_view: Option<RgbaImage>,
    device_bitmap: Option<Arc<DeviceBitmap>>,
    display_rect: Option<Rect>,
}

impl Resources {
    fn active_image(&self) -> Option<&RgbaImage> {
        self.rotated_view.as_ref().or(self.raw_image.as_ref())
    }

    fn release(&mut self) {
        self.rotated_view = None;
        self.raw_image = None;
        self.device_bitmap = None;
        self.display_rect = None;
    }
}

pub struct ImageEntry {
    index: usize,
    path: PathBuf,
    lane: Lane,
    res: Mutex<Resources>,
}

impl ImageEntry {
    pub fn new(index: usize, path: PathBuf, lane: Lane) -> Self {
        Self {
            index,
            path,
            lane,
            res: Mutex::new(Resources {
                rotation: Counter::wrapping(0, 3, 1),
                raw_image: None,
                rotated_view: None,
                device_bitmap: None,
                display_rect: None,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lane(&self) -> &Lane {
        &self.lane
    }

    /// Current quarter-turn rotation, 0..=3 clockwise.
    pub fn rotation(&self) -> i64 {
        self.res.lock().unwrap().rotation.get()
    }

    /// Decode the file into `raw_image` unless already decoded.
    ///
    /// Any failure ends in `Failed`; nothing propagates out of the lane.
    pub fn load_raw(&self, shared: &SharedStatus) {
        if status_of(shared, self.index).is_decoded() {
            return;
        }
        set_status(shared, self.index, Status::Loading);

        match decode(&self.path) {
            Ok(raw) => {
                {
                    let mut guard = self.res.lock().unwrap();
                    let res = &mut *guard;
                    res.rotated_view = rotated(&raw, res.rotation.get());
                    res.raw_image = Some(raw);
                    res.device_bitmap = None;
                    res.display_rect = None;
                }
                log::debug!("[lane {}] decoded {:?}", self.index, self.path);
                set_status(shared, self.index, Status::DecodedRaw);
            }
            Err(e) => {
                log::warn!("Could not decode {}: {}", self.path.display(), e);
                self.res.lock().unwrap().release();
                set_status(shared, self.index, Status::Failed);
            }
        }
    }

    /// Build (or keep, unless `recreate`) the device bitmap and recompute its placement.
    ///
    /// Waits while the entry is still loading. Entries that are unloaded or
    /// failed are left alone.
    pub fn materialize_device(
        &self,
        shared: &SharedStatus,
        device: &dyn Device,
        recreate: bool,
    ) -> Result<(), DeviceError> {
        let status = {
            let (lock, cvar) = &**shared;
            let mut board = lock.lock().unwrap();
            while board.status[self.index] == Status::Loading {
                board = cvar.wait(board).unwrap();
            }
            board.status[self.index]
        };
        if !status.is_decoded() {
            log::debug!("[lane {}] materialize skipped ({:?})", self.index, status);
            return Ok(());
        }

        {
            let mut guard = self.res.lock().unwrap();
            let res = &mut *guard;
            if recreate || res.device_bitmap.is_none() {
                let Some(image) = res.active_image() else {
                    return Ok(());
                };
                let bitmap = device.upload(image)?;
                res.device_bitmap = Some(Arc::new(bitmap));
            }
            let image_size = res
                .device_bitmap
                .as_ref()
                .map(|b| b.size())
                .unwrap_or(Size::new(1.0, 1.0));
            res.display_rect = Some(layout::place(device.viewport(), image_size, device.fit_to_window()));
        }
        set_status(shared, self.index, Status::DecodedDevice);
        Ok(())
    }

    /// Drop every decoded resource; rotation survives.
    pub fn evict(&self, shared: &SharedStatus) {
        set_status(shared, self.index, Status::Unloaded);
        self.res.lock().unwrap().release();
        log::debug!("[lane {}] evicted", self.index);
    }

    /// Turn a quarter clockwise (`dir > 0`) or anticlockwise.
    ///
    /// A decoded entry drops its device bitmap and falls back to `DecodedRaw`
    /// until it is materialized again.
    pub fn rotate(&self, shared: &SharedStatus, dir: i32) {
        let decoded = status_of(shared, self.index).is_decoded();
        // Lowered before the bitmap goes so readers never see DecodedDevice without one.
        if decoded {
            set_status(shared, self.index, Status::DecodedRaw);
        }
        {
            let mut guard = self.res.lock().unwrap();
            let res = &mut *guard;
            if dir >= 0 {
                res.rotation.increment();
            } else {
                res.rotation.decrement();
            }
            res.device_bitmap = None;
            res.display_rect = None;
            res.rotated_view = match (&res.raw_image, decoded) {
                (Some(raw), true) => rotated(raw, res.rotation.get()),
                _ => None,
            };
        }
    }

    /// The drawable bitmap and where to draw it, if materialized.
    pub fn snapshot(&self) -> Option<(Arc<DeviceBitmap>, Rect)> {
        let res = self.res.lock().unwrap();
        Some((Arc::clone(res.device_bitmap.as_ref()?), res.display_rect?))
    }

    #[cfg(test)]
    fn has_rotated_view(&self) -> bool {
        self.res.lock().unwrap().rotated_view.is_some()
    }

    #[cfg(test)]
    fn has_raw_image(&self) -> bool {
        self.res.lock().unwrap().raw_image.is_some()
    }
}
