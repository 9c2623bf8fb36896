mod cache;
mod catalog;
mod cli;
mod counter;
mod device;
mod entry;
mod error;
mod lane;
mod layout;
mod ui;

use clap::Parser;
use std::sync::{Arc, Mutex};
use winit::event_loop::EventLoop;

use crate::cache::{ImageCache, ReadyHook};
use crate::catalog::Catalog;
use crate::cli::Cli;
use crate::lane::WorkerPool;
use crate::ui::state::ViewerState;
use crate::ui::{App, UserEvent};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let catalog = match Catalog::scan(&cli.path, cli.sort) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let pool = match WorkerPool::new(cli.worker_threads()) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let event_loop = match EventLoop::<UserEvent>::with_user_event().build() {
        Ok(l) => l,
        Err(e) => {
            log::error!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    let proxy = Mutex::new(event_loop.create_proxy());
    let on_ready: ReadyHook = Arc::new(move |idx| {
        let _ = proxy.lock().unwrap().send_event(UserEvent::ImageReady(idx));
    });

    // Decoding of the initial window starts here, before the window exists.
    let cache = ImageCache::new(catalog, Arc::clone(&pool), Some(on_ready));
    let mut app = App::new(ViewerState::new(cache, cli.fit));

    if let Err(e) = event_loop.run_app(&mut app) {
        log::error!("Event loop error: {}", e);
    }

    app.state.cache.wait_idle();
}
