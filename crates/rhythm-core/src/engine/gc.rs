//! Deferred deallocation for decoded sources
//!
//! Decoded assets are held in `basedrop::Shared<AudioSource>`. Dropping the
//! last reference on the audio thread only enqueues the pointer; the memory
//! is released later on the `source-gc` thread, where a multi-megabyte
//! `munmap` can't cause an underrun.
//!
//! ```ignore
//! use basedrop::Shared;
//! use rhythm_core::engine::gc_handle;
//!
//! let source = Shared::new(&gc_handle(), decoded);
//! let player = Player::new(source.clone());
//! drop(source); // still alive through the player
//! ```

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// How often the collector thread reclaims deferred drops
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // Collector is !Sync, so it is created and owned by its own thread
    let spawned = thread::Builder::new()
        .name("source-gc".to_string())
        .spawn(move || {
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::debug!("Source GC thread started");
            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            // Deferred drops are never reclaimed in this mode
            log::error!("Failed to start source GC thread, decoded sources will leak");
            let collector: &'static mut Collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for allocating `Shared<T>` values collected off the audio thread
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
