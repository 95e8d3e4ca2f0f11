//! Background studio worker
//!
//! Decoding and remixing are CPU-bound, so they run on a dedicated thread
//! instead of the control thread. Jobs are tagged with the host epoch that
//! was current when they were requested. The host publishes its latest epoch
//! through a shared atomic, and the worker skips any job that has already
//! gone stale before it starts.
//!
//! The single thread serializes jobs: results come back in request order.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use basedrop::Shared;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::audio_file::{AudioFormatHint, Decoder};
use crate::slicer::{self, SlicePattern, Tempo};
use crate::types::AudioBuffer;

// ─────────────────────────────────────────────────────────────────────────────
// Jobs and Results
// ─────────────────────────────────────────────────────────────────────────────

/// Where a decode job reads its audio from
#[derive(Debug, Clone)]
pub enum DecodeSource {
    File(PathBuf),
    Bytes {
        name: String,
        bytes: Vec<u8>,
        hint: AudioFormatHint,
    },
}

impl DecodeSource {
    /// Display name for logs and events
    pub fn name(&self) -> String {
        match self {
            DecodeSource::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            DecodeSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Work sent to the worker thread
pub enum WorkerJob {
    Decode {
        epoch: u64,
        source: DecodeSource,
    },
    Remix {
        epoch: u64,
        source: Shared<AudioBuffer>,
        tempo: Tempo,
        pattern: SlicePattern,
    },
    Shutdown,
}

/// Which kind of job a result belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Decode,
    Remix,
}

/// Results returned by the worker thread
pub enum WorkerResult {
    Decoded {
        epoch: u64,
        name: String,
        buffer: AudioBuffer,
    },
    /// `buffer` is `None` when the remix was a no-op and the source stands
    Remixed {
        epoch: u64,
        buffer: Option<AudioBuffer>,
    },
    Failed {
        epoch: u64,
        kind: JobKind,
        message: String,
    },
    /// The job's epoch was stale before it started
    Cancelled { epoch: u64, kind: JobKind },
}

impl WorkerResult {
    pub fn epoch(&self) -> u64 {
        match self {
            WorkerResult::Decoded { epoch, .. }
            | WorkerResult::Remixed { epoch, .. }
            | WorkerResult::Failed { epoch, .. }
            | WorkerResult::Cancelled { epoch, .. } => *epoch,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            WorkerResult::Decoded { .. } => JobKind::Decode,
            WorkerResult::Remixed { .. } => JobKind::Remix,
            WorkerResult::Failed { kind, .. } | WorkerResult::Cancelled { kind, .. } => *kind,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to the background worker thread
pub struct StudioWorker {
    job_tx: Sender<WorkerJob>,
    result_rx: Receiver<WorkerResult>,
    latest_epoch: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl StudioWorker {
    /// Spawn the worker thread
    pub fn spawn(decoder: Arc<dyn Decoder>) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam::channel::unbounded();
        let (result_tx, result_rx) = crossbeam::channel::unbounded();
        let latest_epoch = Arc::new(AtomicU64::new(0));

        let epoch = latest_epoch.clone();
        let handle = thread::Builder::new()
            .name("studio-worker".to_string())
            .spawn(move || worker_thread(job_rx, result_tx, decoder, epoch))?;

        log::info!("Spawned background studio worker");

        Ok(Self {
            job_tx,
            result_rx,
            latest_epoch,
            handle: Some(handle),
        })
    }

    /// Publish the host's current epoch; queued jobs older than this are skipped
    pub fn set_latest_epoch(&self, epoch: u64) {
        self.latest_epoch.store(epoch, Ordering::Relaxed);
    }

    /// Queue a job; returns false if the worker thread is gone
    pub fn submit(&self, job: WorkerJob) -> bool {
        match self.job_tx.send(job) {
            Ok(()) => true,
            Err(_) => {
                log::error!("Studio worker is not running, job dropped");
                false
            }
        }
    }

    /// Non-blocking result poll
    pub fn try_recv(&self) -> Option<WorkerResult> {
        match self.result_rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for a result
    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerResult> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for StudioWorker {
    fn drop(&mut self) {
        let _ = self.job_tx.send(WorkerJob::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker Thread
// ─────────────────────────────────────────────────────────────────────────────

fn worker_thread(
    rx: Receiver<WorkerJob>,
    tx: Sender<WorkerResult>,
    decoder: Arc<dyn Decoder>,
    latest_epoch: Arc<AtomicU64>,
) {
    log::info!("Studio worker started");

    while let Ok(job) = rx.recv() {
        let result = match job {
            WorkerJob::Shutdown => break,
            WorkerJob::Decode { epoch, source } => {
                if is_stale(epoch, &latest_epoch) {
                    log::debug!("Skipping stale decode (epoch {})", epoch);
                    WorkerResult::Cancelled { epoch, kind: JobKind::Decode }
                } else {
                    run_decode(decoder.as_ref(), epoch, source)
                }
            }
            WorkerJob::Remix {
                epoch,
                source,
                tempo,
                pattern,
            } => {
                if is_stale(epoch, &latest_epoch) {
                    log::debug!("Skipping stale remix (epoch {})", epoch);
                    WorkerResult::Cancelled { epoch, kind: JobKind::Remix }
                } else {
                    run_remix(epoch, &source, tempo, &pattern)
                }
            }
        };

        if tx.send(result).is_err() {
            break;
        }
    }

    log::info!("Studio worker stopped");
}

fn is_stale(epoch: u64, latest: &AtomicU64) -> bool {
    epoch < latest.load(Ordering::Relaxed)
}

fn run_decode(decoder: &dyn Decoder, epoch: u64, source: DecodeSource) -> WorkerResult {
    let name = source.name();
    log::info!("Decoding {}", name);

    let decoded = match source {
        DecodeSource::File(path) => decoder.decode_file(&path),
        DecodeSource::Bytes { bytes, hint, .. } => decoder.decode_bytes(bytes, hint),
    };

    match decoded {
        Ok(buffer) => WorkerResult::Decoded { epoch, name, buffer },
        Err(e) => {
            log::warn!("Failed to decode {}: {}", name, e);
            WorkerResult::Failed {
                epoch,
                kind: JobKind::Decode,
                message: e.to_string(),
            }
        }
    }
}

fn run_remix(epoch: u64, source: &AudioBuffer, tempo: Tempo, pattern: &SlicePattern) -> WorkerResult {
    let start = std::time::Instant::now();
    let buffer = match slicer::remix(source, tempo, pattern) {
        std::borrow::Cow::Borrowed(_) => None,
        std::borrow::Cow::Owned(buffer) => Some(buffer),
    };
    log::info!(
        "Remix at {} with {} steps took {:?}",
        tempo,
        pattern.len(),
        start.elapsed()
    );
    WorkerResult::Remixed { epoch, buffer }
}
