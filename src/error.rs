//! Error types for the catalog, the image cache and the device layer.

use std::path::PathBuf;

/// Fatal errors surfaced by catalog construction and the render path.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The start file is not one of the recognized images in its directory.
    #[error("image not found in its directory: {}", .0.display())]
    NotFound(PathBuf),

    /// The containing directory could not be enumerated.
    #[error("cannot read directory {}: {source}", dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The worker pool could not be started.
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The device failed to produce a bitmap for some entry.
    #[error("device failure: {0}")]
    Device(#[from] DeviceError),
}

/// Failures while turning decoded pixels into a device bitmap.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("cannot upload an empty image ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("surface error: {0}")]
    Surface(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("value {value} outside [{min}, {max}]")]
    OutOfRange { value: i64, min: i64, max: i64 },
}
