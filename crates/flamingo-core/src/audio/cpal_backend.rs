//! CPAL audio backend
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │   Control Thread │───push()───────────►│   Command Queue     │
//! │  (PlaybackHost)  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ Relaxed atomics + event queue             ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ TransportAtomics │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │     block writes    │  (owns AudioEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::backend::{build_engine, AudioCallbackState, AudioHandle, AudioSystemResult, EngineSetup};
use super::config::AudioConfig;
use super::device::{find_device_by_id, get_default_device};
use super::error::{AudioError, AudioResult};

/// Keeps the output stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl CpalAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }
}

/// Open the configured device and start streaming
pub fn start_audio_system(config: &AudioConfig, setup: &EngineSetup) -> AudioResult<AudioSystemResult> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => get_default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported_config = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;
    let buffer_size = config.buffer_size.frames();

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };
    let latency_ms = config.buffer_size.latency_ms(sample_rate);

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms
    );

    let parts = build_engine(setup, sample_rate)?;
    let stream = build_output_stream(&device, &stream_config, parts.state)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioSystemResult {
        handle: AudioHandle::Cpal(CpalAudioHandle {
            _stream: stream,
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

/// Pick the best output configuration for a device
///
/// Prefers f32 stereo at the requested rate; otherwise any stereo config,
/// otherwise anything. A device that cannot do the requested rate runs at its
/// maximum and the transport converts on playback.
fn get_output_config(device: &cpal::Device, config: &AudioConfig) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target = config.target_sample_rate();
    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0
    };

    let best = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        .find(in_range)
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| AudioError::ConfigError("No supported output configurations".to_string()))?;

    let sample_rate = if in_range(&best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz",
            target,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(sample_rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: AudioCallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.render_interleaved(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
