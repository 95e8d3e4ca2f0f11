//! Headless render thread
//!
//! Drives the engine in device-sized blocks at real-time pace when no output
//! device is available. Rendered audio is discarded; the transport, events
//! and atomics behave exactly as with a device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::backend::{build_engine, AudioHandle, AudioSystemResult, EngineSetup};
use super::config::AudioConfig;
use super::error::AudioResult;

/// Stops and joins the render thread on drop
pub struct HeadlessHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    buffer_size: u32,
}

impl HeadlessHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

impl Drop for HeadlessHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

pub fn start_audio_system(config: &AudioConfig, setup: &EngineSetup) -> AudioResult<AudioSystemResult> {
    let sample_rate = config.target_sample_rate();
    let buffer_size = config.buffer_size.frames();
    let latency_ms = config.buffer_size.latency_ms(sample_rate);

    let parts = build_engine(setup, sample_rate)?;
    let mut state = parts.state;
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let block = Duration::from_secs_f64(buffer_size as f64 / sample_rate as f64);

    let thread = thread::Builder::new()
        .name("headless-audio".to_string())
        .spawn(move || {
            let mut scratch = vec![0.0f32; buffer_size as usize * 2];
            let mut deadline = Instant::now();
            while flag.load(Ordering::Relaxed) {
                state.render_interleaved(&mut scratch, 2);
                deadline += block;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    // Fell behind; resync rather than render a burst
                    deadline = now;
                }
            }
        })?;

    log::info!(
        "Headless rendering at {}Hz, {} frames per block",
        sample_rate,
        buffer_size
    );

    Ok(AudioSystemResult {
        handle: AudioHandle::Headless(HeadlessHandle {
            running,
            thread: Some(thread),
            sample_rate,
            buffer_size,
        }),
        command_sender: parts.command_sender,
        atomics: parts.atomics,
        events: parts.events,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReverbConfig;
    use crate::engine::gc::gc_handle;
    use crate::engine::{EngineCommand, TransportEvent};
    use crate::types::{AudioBuffer, PlayState};
    use basedrop::Shared;

    #[test]
    fn test_headless_plays_in_real_time() {
        let config = AudioConfig::headless().with_buffer_frames(64).with_sample_rate(8000);
        let setup = EngineSetup {
            band_count: 1,
            reverb: ReverbConfig {
                duration: 0.05,
                block_size: 64,
                ..Default::default()
            },
        };
        let mut system = start_audio_system(&config, &setup).unwrap();
        assert!(system.handle.is_headless());
        assert_eq!(system.sample_rate, 8000);

        // 0.1 s of audio
        let buffer = Shared::new(&gc_handle(), AudioBuffer::from_mono(vec![0.1; 800], 8000).unwrap());
        assert!(system
            .command_sender
            .send(EngineCommand::LoadBuffer { buffer, generation: 1 })
            .is_ok());
        assert!(system.command_sender.send(EngineCommand::Play).is_ok());

        let start = Instant::now();
        let mut finished = false;
        while start.elapsed() < Duration::from_secs(5) && !finished {
            while let Ok(event) = system.events.pop() {
                finished |= event == TransportEvent::Finished { generation: 1 };
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(finished);
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(system.atomics.play_state(), PlayState::Stopped);
    }
}
