//! RT-safe garbage collection for audio buffers
//!
//! Decoded and remixed buffers travel to the audio thread as
//! `basedrop::Shared<AudioBuffer>`. When the transport swaps to a new buffer
//! the old pointer is dropped on the audio thread; `Shared` only enqueues it
//! there, and the memory is released on a dedicated collector thread.
//!
//! ```ignore
//! use basedrop::Shared;
//! use crate::engine::gc::gc_handle;
//!
//! let buffer = Shared::new(&gc_handle(), decoded);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Global handle for creating Shared<T> allocations
static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Collection interval; fast enough for buffer-sized reclamation
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }

            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            // No collector thread: leak the collector so its handle stays valid.
            // Deferred drops then accumulate until process exit.
            log::error!("Failed to start audio GC thread, deferred drops will not be reclaimed");
            let collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Get a handle for creating Shared<T> allocations
///
/// The handle is lightweight and can be cloned.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
