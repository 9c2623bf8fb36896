use std::path::Path;
use std::sync::Arc;

use crate::catalog::Catalog;
use crate::device::{Device, DeviceBitmap};
use crate::entry::{new_board, status_of, ImageEntry, SharedStatus, Status};
use crate::error::CacheError;
use crate::lane::WorkerPool;
use crate::layout::Rect;

/// Called from a worker with the entry index once that entry has something
/// new to show (materialized, or failed to decode).
pub type ReadyHook = Arc<dyn Fn(usize) + Send + Sync>;

/// What the render path gets for the current entry.
#[derive(Debug, Clone)]
pub enum Frame {
    Ready { bitmap: Arc<DeviceBitmap>, rect: Rect },
    NoImage,
}

// ---------------------------------------------------------------------------
// Cache manager: keeps {prev, current, next} resident, evicts the rest
// ---------------------------------------------------------------------------

pub struct ImageCache {
    catalog: Catalog,
    entries: Vec<Arc<ImageEntry>>,
    shared: SharedStatus,
    pool: Arc<WorkerPool>,
    device: Option<Arc<dyn Device>>,
    on_ready: Option<ReadyHook>,
}

impl ImageCache {
    /// Create one entry per catalog slot and start decoding the initial window.
    ///
    /// Only raw decoding is scheduled; device bitmaps wait for `attach_device`.
    pub fn new(catalog: Catalog, pool: Arc<WorkerPool>, on_ready: Option<ReadyHook>) -> Self {
        let entries = catalog
            .paths()
            .iter()
            .enumerate()
            .map(|(i, p)| Arc::new(ImageEntry::new(i, p.clone(), pool.lane())))
            .collect();
        let shared = new_board(catalog.len());

        let cache = Self { catalog, entries, shared, pool, device: None, on_ready };
        for idx in cache.resident() {
            cache.post_load(idx);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn current_index(&self) -> usize {
        self.catalog.current_index()
    }

    pub fn current_path(&self) -> &Path {
        self.catalog.path(self.current_index())
    }

    pub fn status(&self, idx: usize) -> Status {
        status_of(&self.shared, idx)
    }

    pub fn rotation(&self, idx: usize) -> i64 {
        self.entries[idx].rotation()
    }

    /// Entries that should hold decoded data: current first, then its
    /// neighbours, without duplicates for catalogs smaller than three.
    pub fn resident(&self) -> Vec<usize> {
        window_around(&self.catalog)
    }

    /// Install a (new) device and rebuild device bitmaps for the window.
    pub fn attach_device(&mut self, device: Arc<dyn Device>) {
        {
            let mut board = self.shared.0.lock().unwrap();
            board.generation += 1;
            board.fault = None;
        }
        self.device = Some(device);
        self.refresh_window(true);
    }

    /// Step the cursor and schedule evictions and prefetches for the
    /// entries that left or entered the window. Returns the new index.
    pub fn navigate(&mut self, dir: i32) -> usize {
        let before = self.resident();
        let idx = self.catalog.advance(dir);
        let after = self.resident();

        log::debug!("[nav] -> {} ({})", idx, self.catalog.path(idx).display());

        for &old in before.iter().filter(|i| !after.contains(*i)) {
            self.post_evict(old);
        }
        for &new in after.iter().filter(|i| !before.contains(*i)) {
            self.post_load(new);
            self.post_materialize(new, false);
        }
        idx
    }

    /// Re-run layout (and re-upload when `recreate`) for every resident entry.
    pub fn refresh_window(&self, recreate: bool) {
        for idx in self.resident() {
            self.post_materialize(idx, recreate);
        }
    }

    pub fn rotate_current(&self, dir: i32) {
        let idx = self.current_index();
        let entry = Arc::clone(&self.entries[idx]);
        let shared = Arc::clone(&self.shared);
        self.entries[idx].lane().post(move || entry.rotate(&shared, dir));
        self.post_materialize(idx, true);
    }

    /// Block until no lane has queued or running work.
    pub fn wait_idle(&self) {
        self.pool.wait_idle();
    }

    // -----------------------------------------------------------------------
    // Render-path adapter
    // -----------------------------------------------------------------------

    /// The current entry's bitmap, waiting for its lane if it is not ready yet.
    ///
    /// Returns `NoImage` for a failed entry or when there is no device to
    /// materialize into. Never schedules work itself.
    pub fn current_ready_bitmap(&self) -> Result<Frame, CacheError> {
        if self.device.is_none() {
            return Ok(Frame::NoImage);
        }
        let idx = self.current_index();
        let (lock, cvar) = &*self.shared;
        let mut board = lock.lock().unwrap();
        loop {
            if let Some(fault) = &board.fault {
                return Err(CacheError::Device(fault.clone()));
            }
            match board.status[idx] {
                // Snapshot while the monitor is held so the status cannot move under us.
                Status::DecodedDevice => {
                    if let Some((bitmap, rect)) = self.entries[idx].snapshot() {
                        return Ok(Frame::Ready { bitmap, rect });
                    }
                }
                Status::Failed => return Ok(Frame::NoImage),
                _ => {}
            }
            board = cvar.wait(board).unwrap();
        }
    }

    // -----------------------------------------------------------------------
    // Lane posting
    // -----------------------------------------------------------------------

    fn post_load(&self, idx: usize) {
        let entry = Arc::clone(&self.entries[idx]);
        let shared = Arc::clone(&self.shared);
        let on_ready = self.on_ready.clone();
        self.entries[idx].lane().post(move || {
            entry.load_raw(&shared);
            if status_of(&shared, idx) == Status::Failed {
                if let Some(hook) = on_ready {
                    hook(idx);
                }
            }
        });
    }

    fn post_materialize(&self, idx: usize, recreate: bool) {
        let Some(device) = self.device.clone() else {
            return;
        };
        let entry = Arc::clone(&self.entries[idx]);
        let shared = Arc::clone(&self.shared);
        let on_ready = self.on_ready.clone();
        let generation = self.shared.0.lock().unwrap().generation;
        self.entries[idx].lane().post(move || {
            if let Err(e) = entry.materialize_device(&shared, device.as_ref(), recreate) {
                let (lock, cvar) = &*shared;
                let mut board = lock.lock().unwrap();
                if board.generation != generation {
                    log::debug!("Dropping fault from a detached device: {}", e);
                    return;
                }
                log::error!("Device failure on {}: {}", entry.path().display(), e);
                board.fault = Some(e);
                drop(board);
                cvar.notify_all();
            }
            if let Some(hook) = on_ready {
                hook(idx);
            }
        });
    }

    fn post_evict(&self, idx: usize) {
        let entry = Arc::clone(&self.entries[idx]);
        let shared = Arc::clone(&self.shared);
        self.entries[idx].lane().post(move || entry.evict(&shared));
    }
}

fn window_around(catalog: &Catalog) -> Vec<usize> {
    let mut window = vec![catalog.current_index()];
    for idx in [catalog.neighbor(-1), catalog.neighbor(1)] {
        if !window.contains(&idx) {
            window.push(idx);
        }
    }
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::RecordingDevice;
    use image::{Rgb, Rgba, RgbImage, RgbaImage};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Write real images named `names` into a scratch dir; names listed in
    /// `corrupt` get garbage bytes instead.
    fn fixture(names: &[&str], corrupt: &[&str]) -> (TempDir, Vec<PathBuf>) {
        let dir = tempfile::tempdir().unwrap();
        let paths = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let p = dir.path().join(name);
                if corrupt.contains(name) {
                    std::fs::write(&p, b"corrupt").unwrap();
                } else {
                    RgbImage::from_pixel(8 + i as u32, 6, Rgb([0, 128, 255]))
                        .save(&p)
                        .unwrap();
                }
                p
            })
            .collect();
        (dir, paths)
    }

    fn cache_over(paths: &[PathBuf], start: usize) -> ImageCache {
        let catalog = Catalog::from_paths(paths.to_vec(), &paths[start]).unwrap();
        ImageCache::new(catalog, WorkerPool::new(3).unwrap(), None)
    }

    fn attach(cache: &mut ImageCache) -> Arc<RecordingDevice> {
        let device = Arc::new(RecordingDevice::new(320, 240));
        cache.attach_device(device.clone());
        device
    }

    fn decoded(cache: &ImageCache) -> Vec<usize> {
        (0..cache.len()).filter(|&i| cache.status(i).is_decoded()).collect()
    }

    #[test]
    fn window_is_min_n_3_at_quiescence() {
        for n in 1..=6 {
            let names: Vec<String> = (0..n).map(|i| format!("img{i}.png")).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            let (_dir, paths) = fixture(&names, &[]);
            let mut cache = cache_over(&paths, 0);
            cache.wait_idle();
            assert_eq!(decoded(&cache).len(), n.min(3), "n = {n}");

            attach(&mut cache);
            for _ in 0..(2 * n + 1) {
                cache.navigate(1);
                cache.wait_idle();
                assert_eq!(decoded(&cache).len(), n.min(3), "n = {n}");
            }
        }
    }

    #[test]
    fn new_only_decodes_without_device() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png"], &[]);
        let cache = cache_over(&paths, 1);
        cache.wait_idle();
        for i in 0..3 {
            assert_eq!(cache.status(i), Status::DecodedRaw);
        }
        assert!(matches!(cache.current_ready_bitmap(), Ok(Frame::NoImage)));
    }

    #[test]
    fn three_entry_catalog_never_evicts() {
        let (_dir, paths) = fixture(&["A.png", "B.jpg", "C.bmp"], &[]);
        let mut cache = cache_over(&paths, 1);
        attach(&mut cache);
        assert_eq!(cache.current_index(), 1);

        assert_eq!(cache.navigate(1), 2);
        cache.wait_idle();
        assert_eq!(decoded(&cache), vec![0, 1, 2]);

        assert_eq!(cache.navigate(1), 0);
        cache.wait_idle();
        assert_eq!(decoded(&cache), vec![0, 1, 2]);
        assert_eq!(cache.current_path().file_name().unwrap(), "A.png");
    }

    #[test]
    fn four_entry_catalog_slides_window() {
        let (_dir, paths) = fixture(&["A.png", "B.jpg", "C.bmp", "D.gif"], &[]);
        let mut cache = cache_over(&paths, 0);
        attach(&mut cache);
        cache.wait_idle();
        assert_eq!(cache.resident(), vec![0, 3, 1]);
        assert_eq!(decoded(&cache), vec![0, 1, 3]);

        assert_eq!(cache.navigate(1), 1);
        cache.wait_idle();
        assert_eq!(cache.resident(), vec![1, 0, 2]);
        assert_eq!(decoded(&cache), vec![0, 1, 2]);
        assert_eq!(cache.status(3), Status::Unloaded);
        assert_eq!(cache.status(2), Status::DecodedDevice);
    }

    #[test]
    fn full_lap_restores_cursor_and_window() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png", "d.png", "e.png"], &[]);
        let mut cache = cache_over(&paths, 2);
        attach(&mut cache);
        cache.wait_idle();
        let initial = decoded(&cache);

        for _ in 0..paths.len() {
            cache.navigate(1);
        }
        cache.wait_idle();
        assert_eq!(cache.current_index(), 2);
        assert_eq!(decoded(&cache), initial);

        for _ in 0..paths.len() {
            cache.navigate(-1);
        }
        cache.wait_idle();
        assert_eq!(cache.current_index(), 2);
        assert_eq!(decoded(&cache), initial);
    }

    #[test]
    fn single_entry_catalog_is_never_evicted() {
        let (_dir, paths) = fixture(&["only.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        attach(&mut cache);
        for dir in [1, -1, 1, 1] {
            assert_eq!(cache.navigate(dir), 0);
        }
        cache.wait_idle();
        assert_eq!(cache.resident(), vec![0]);
        assert_eq!(cache.status(0), Status::DecodedDevice);
        assert!(matches!(cache.current_ready_bitmap(), Ok(Frame::Ready { .. })));
    }

    #[test]
    fn two_entry_catalog_keeps_both() {
        let (_dir, paths) = fixture(&["a.png", "b.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        attach(&mut cache);
        assert_eq!(cache.resident(), vec![0, 1]);
        cache.navigate(1);
        cache.navigate(1);
        cache.wait_idle();
        assert_eq!(cache.status(0), Status::DecodedDevice);
        assert_eq!(cache.status(1), Status::DecodedDevice);
    }

    #[test]
    fn render_path_waits_for_device_bitmap() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png", "d.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        attach(&mut cache);
        cache.navigate(1);
        cache.navigate(1);
        // No wait_idle: the adapter itself must block until index 2 is ready.
        match cache.current_ready_bitmap().unwrap() {
            Frame::Ready { bitmap, rect } => {
                assert_eq!((bitmap.width, bitmap.height), (10, 6));
                assert_eq!(rect, Rect { left: 155.0, top: 117.0, right: 165.0, bottom: 123.0 });
            }
            Frame::NoImage => panic!("expected a bitmap"),
        }
    }

    #[test]
    fn corrupt_current_entry_renders_no_image() {
        let (_dir, paths) = fixture(&["A.png", "B.jpg", "C.bmp"], &["B.jpg"]);
        let mut cache = cache_over(&paths, 1);
        attach(&mut cache);
        assert!(matches!(cache.current_ready_bitmap(), Ok(Frame::NoImage)));
        assert_eq!(cache.status(1), Status::Failed);

        cache.navigate(1);
        assert!(matches!(cache.current_ready_bitmap(), Ok(Frame::Ready { .. })));
    }

    #[test]
    fn failed_entry_is_retried_after_leaving_window() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png", "d.png", "e.png"], &["a.png"]);
        let mut cache = cache_over(&paths, 0);
        cache.wait_idle();
        assert_eq!(cache.status(0), Status::Failed);

        cache.navigate(1);
        cache.navigate(1);
        cache.wait_idle();
        assert_eq!(cache.status(0), Status::Unloaded);

        // Repair the file, then bring it back into the window.
        RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])).save(&paths[0]).unwrap();
        cache.navigate(-1);
        cache.wait_idle();
        assert_eq!(cache.status(0), Status::DecodedRaw);
    }

    #[test]
    fn rotate_forces_one_recreate_per_call() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        let device = attach(&mut cache);
        cache.wait_idle();
        let base = device.uploads();
        assert_eq!(base, 3);

        for turn in 1..=4 {
            cache.rotate_current(1);
            cache.wait_idle();
            assert_eq!(device.uploads(), base + turn);
            assert_eq!(cache.rotation(0), turn as i64 % 4);
        }
        assert_eq!(cache.rotation(0), 0);
        assert_eq!(cache.status(0), Status::DecodedDevice);

        cache.rotate_current(-1);
        cache.wait_idle();
        assert_eq!(cache.rotation(0), 3);
        match cache.current_ready_bitmap().unwrap() {
            Frame::Ready { bitmap, .. } => assert_eq!((bitmap.width, bitmap.height), (6, 8)),
            Frame::NoImage => panic!("expected a bitmap"),
        }
    }

    #[test]
    fn render_right_after_rotate_never_drops_the_image() {
        let names = ["a.png", "b.png", "c.png"];
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = names
            .iter()
            .map(|name| {
                let p = dir.path().join(name);
                RgbImage::from_pixel(400, 300, Rgb([9, 9, 9])).save(&p).unwrap();
                p
            })
            .collect();
        let mut cache = cache_over(&paths, 0);
        attach(&mut cache);
        cache.wait_idle();

        for turn in 1..=40 {
            cache.rotate_current(1);
            for _ in 0..200 {
                assert!(
                    matches!(cache.current_ready_bitmap(), Ok(Frame::Ready { .. })),
                    "blank frame after rotation {turn}"
                );
            }
        }
        cache.wait_idle();
        assert_eq!(cache.rotation(0), 0);
    }

    /// Parks every lane until the returned gate is opened.
    fn hold_lanes(cache: &ImageCache) -> Arc<(std::sync::Mutex<bool>, std::sync::Condvar)> {
        let gate = Arc::new((std::sync::Mutex::new(false), std::sync::Condvar::new()));
        for entry in &cache.entries {
            let gate = Arc::clone(&gate);
            entry.lane().post(move || {
                let (lock, cvar) = &*gate;
                let mut open = lock.lock().unwrap();
                while !*open {
                    open = cvar.wait(open).unwrap();
                }
            });
        }
        gate
    }

    #[test]
    fn fault_from_replaced_device_is_ignored() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        cache.wait_idle();

        let gate = hold_lanes(&cache);
        let broken = Arc::new(RecordingDevice::new(100, 100));
        broken.fail.store(true, Ordering::SeqCst);
        cache.attach_device(broken.clone());
        let good = attach(&mut cache);
        {
            let (lock, cvar) = &*gate;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }

        assert!(matches!(cache.current_ready_bitmap(), Ok(Frame::Ready { .. })));
        cache.wait_idle();
        assert_eq!(broken.uploads(), 3);
        assert_eq!(good.uploads(), 3);
        assert!(cache.shared.0.lock().unwrap().fault.is_none());
    }

    #[test]
    fn refresh_without_recreate_keeps_bitmaps() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png", "d.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        let device = attach(&mut cache);
        cache.wait_idle();
        let Frame::Ready { rect: first, .. } = cache.current_ready_bitmap().unwrap() else {
            panic!("expected a bitmap");
        };

        cache.refresh_window(false);
        cache.wait_idle();
        let Frame::Ready { rect: second, .. } = cache.current_ready_bitmap().unwrap() else {
            panic!("expected a bitmap");
        };
        assert_eq!(first, second);
        assert_eq!(device.uploads(), 3);

        device.soft.toggle_fit();
        cache.refresh_window(false);
        cache.wait_idle();
        let Frame::Ready { rect: fitted, .. } = cache.current_ready_bitmap().unwrap() else {
            panic!("expected a bitmap");
        };
        assert_eq!(fitted.left, 0.0);
        assert_eq!(fitted.right, 320.0);
        assert_eq!(device.uploads(), 3);

        cache.refresh_window(true);
        cache.wait_idle();
        assert_eq!(device.uploads(), 6);
    }

    #[test]
    fn device_fault_surfaces_and_clears_on_reattach() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png"], &[]);
        let mut cache = cache_over(&paths, 0);
        let broken = Arc::new(RecordingDevice::new(100, 100));
        broken.fail.store(true, Ordering::SeqCst);
        cache.attach_device(broken);
        assert!(matches!(cache.current_ready_bitmap(), Err(CacheError::Device(_))));

        cache.wait_idle();
        attach(&mut cache);
        assert!(matches!(cache.current_ready_bitmap(), Ok(Frame::Ready { .. })));
    }

    #[test]
    fn ready_hook_fires_for_materialized_and_failed_entries() {
        let (_dir, paths) = fixture(&["a.png", "b.png", "c.png"], &["c.png"]);
        let catalog = Catalog::from_paths(paths.clone(), &paths[0]).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let hook: ReadyHook = {
            let calls = Arc::clone(&calls);
            Arc::new(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let mut cache = ImageCache::new(catalog, WorkerPool::new(2).unwrap(), Some(hook));
        cache.wait_idle();
        // One failed decode so far.
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        attach(&mut cache);
        cache.wait_idle();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
