use clap::Parser;

pub const HELP_KEYS: &str = "\
Key Bindings:
  Esc / q             : Quit
  Left / h            : Previous image
  Right / l / Space   : Next image
  PageDown / r        : Rotate 90 CW
  PageUp / R          : Rotate 90 CCW
  Down / z            : Toggle fit to window
  Up / 0              : Reset zoom
  + / - / Wheel       : Zoom in / out
  Drag                : Pan (while zoomed)
";

#[derive(Parser)]
#[command(name = "imv", about = "Browse the images next to a file", after_help = HELP_KEYS)]
pub struct Cli {
    /// Image to open; its siblings become the browsing list
    pub path: std::path::PathBuf,

    /// Number of decode workers (default: available cores, 2..=8)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Start with fit-to-window enabled
    #[arg(short, long)]
    pub fit: bool,

    /// Sort the directory listing by name instead of keeping enumeration order
    #[arg(short, long)]
    pub sort: bool,
}

impl Cli {
    pub fn worker_threads(&self) -> usize {
        self.threads.filter(|&n| n > 0).unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
                .clamp(2, 8)
        })
    }
}
