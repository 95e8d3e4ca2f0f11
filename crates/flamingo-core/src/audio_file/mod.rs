//! Audio file boundary: input validation, decoding and WAV export
//!
//! Uploaded files are accepted by content type (`audio/*`) or by extension.
//! Decoding goes through the [`Decoder`] trait; [`SymphoniaDecoder`] is the
//! production implementation and turns any supported container into a planar
//! [`AudioBuffer`] at the file's native sample rate.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::types::{AudioBuffer, AudioBufferError};

/// Message shown when an upload is not recognizably audio
pub const INVALID_AUDIO_MESSAGE: &str = "Please upload a valid audio file (e.g., MP3, WAV).";

/// Extensions accepted without a content type
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp3", "wav", "flac", "ogg"];

/// Audio file errors
#[derive(Error, Debug)]
pub enum AudioFileError {
    /// Upload is not an audio file
    #[error("{}", INVALID_AUDIO_MESSAGE)]
    Rejected { name: String },

    #[error("Failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Audio stream has no sample rate")]
    UnknownSampleRate,

    #[error("File contains no audio frames")]
    Empty,

    #[error("Decoded audio is malformed: {0}")]
    InvalidBuffer(#[from] AudioBufferError),

    #[error("WAV export failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Container format inferred from an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormatHint {
    Mp3,
    Wav,
    Flac,
    Ogg,
    /// Declared `audio/*` but not one we can name
    Other,
}

impl AudioFormatHint {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" | "wave" => Some(Self::Wav),
            "flac" => Some(Self::Flac),
            "ogg" | "oga" => Some(Self::Ogg),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let subtype = content_type.trim().to_ascii_lowercase();
        let subtype = subtype.strip_prefix("audio/")?;
        Some(match subtype.split(';').next().unwrap_or("").trim() {
            "mpeg" | "mp3" => Self::Mp3,
            "wav" | "wave" | "x-wav" | "vnd.wave" => Self::Wav,
            "flac" | "x-flac" => Self::Flac,
            "ogg" | "vorbis" => Self::Ogg,
            _ => Self::Other,
        })
    }

    /// Extension to pass to the decoder's probe
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Mp3 => Some("mp3"),
            Self::Wav => Some("wav"),
            Self::Flac => Some("flac"),
            Self::Ogg => Some("ogg"),
            Self::Other => None,
        }
    }
}

/// Accept an upload if its content type starts with `audio/` or its name
/// has a supported extension
pub fn validate_input(name: &str, content_type: Option<&str>) -> Result<AudioFormatHint, AudioFileError> {
    let by_extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(AudioFormatHint::from_extension);
    let by_type = content_type.and_then(AudioFormatHint::from_content_type);

    match (by_type, by_extension) {
        // A known extension is more specific than a generic audio/* type
        (Some(AudioFormatHint::Other), Some(ext)) => Ok(ext),
        (Some(hint), _) => Ok(hint),
        (None, Some(ext)) => Ok(ext),
        (None, None) => {
            log::warn!("Rejected upload {:?} (content type {:?})", name, content_type);
            Err(AudioFileError::Rejected {
                name: name.to_string(),
            })
        }
    }
}

/// Turns encoded audio into a decoded buffer
pub trait Decoder: Send + Sync {
    /// Decode a file from disk
    fn decode_file(&self, path: &Path) -> Result<AudioBuffer, AudioFileError>;

    /// Decode an in-memory upload
    fn decode_bytes(&self, bytes: Vec<u8>, hint: AudioFormatHint) -> Result<AudioBuffer, AudioFileError>;
}

/// Symphonia-backed decoder (MP3, WAV, FLAC, Ogg Vorbis)
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_source(
        &self,
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
    ) -> Result<AudioBuffer, AudioFileError> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(AudioFileError::NoAudioTrack)?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(AudioFileError::UnknownSampleRate)?;
        let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioFileError::UnsupportedFormat(e.to_string()))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    log::warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("Error decoding packet: {}", e);
                    continue;
                }
            };

            let spec = *decoded.spec();
            channels = spec.channels.count();
            let needed = decoded.capacity() * channels;
            if sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            if let Some(ref mut buf) = sample_buf {
                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
        }

        if samples.is_empty() || channels == 0 {
            return Err(AudioFileError::Empty);
        }

        let buffer = AudioBuffer::from_interleaved(&samples, channels, sample_rate)?;
        log::info!(
            "Decoded {} channels, {} Hz, {:.2}s",
            buffer.channel_count(),
            buffer.sample_rate(),
            buffer.duration_seconds()
        );
        Ok(buffer)
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode_file(&self, path: &Path) -> Result<AudioBuffer, AudioFileError> {
        let file = File::open(path).map_err(|source| AudioFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let extension = path.extension().and_then(|e| e.to_str());
        self.decode_source(Box::new(file), extension)
    }

    fn decode_bytes(&self, bytes: Vec<u8>, hint: AudioFormatHint) -> Result<AudioBuffer, AudioFileError> {
        self.decode_source(Box::new(Cursor::new(bytes)), hint.extension())
    }
}

/// Write a buffer as 32-bit float WAV
pub fn write_wav(path: &Path, buffer: &AudioBuffer) -> Result<(), AudioFileError> {
    let spec = hound::WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in buffer.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    log::info!("Exported {:.2}s to {:?}", buffer.duration_seconds(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_by_content_type() {
        assert_eq!(validate_input("track", Some("audio/mpeg")).unwrap(), AudioFormatHint::Mp3);
        assert_eq!(validate_input("x.bin", Some("audio/wav")).unwrap(), AudioFormatHint::Wav);
        assert_eq!(validate_input("a", Some("audio/aac")).unwrap(), AudioFormatHint::Other);
    }

    #[test]
    fn test_validate_by_extension() {
        assert_eq!(validate_input("song.MP3", None).unwrap(), AudioFormatHint::Mp3);
        assert_eq!(validate_input("loop.wav", Some("")).unwrap(), AudioFormatHint::Wav);
        assert_eq!(
            validate_input("take.flac", Some("audio/x-unknown")).unwrap(),
            AudioFormatHint::Flac
        );
    }

    #[test]
    fn test_validate_rejects_non_audio() {
        let err = validate_input("notes.txt", Some("text/plain")).unwrap_err();
        assert!(matches!(err, AudioFileError::Rejected { .. }));
        assert_eq!(err.to_string(), INVALID_AUDIO_MESSAGE);
        assert!(validate_input("video.mp4", Some("video/mp4")).is_err());
    }

    #[test]
    fn test_wav_export_then_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remix.wav");
        let buffer = AudioBuffer::new(
            vec![
                (0..4410).map(|i| (i as f32 / 4410.0) - 0.5).collect(),
                vec![0.25; 4410],
            ],
            44100,
        )
        .unwrap();

        write_wav(&path, &buffer).unwrap();
        let decoded = SymphoniaDecoder::new().decode_file(&path).unwrap();

        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_rate(), 44100);
        assert_eq!(decoded.frame_count(), 4410);
        assert!((decoded.channel(0)[100] - buffer.channel(0)[100]).abs() < 1e-6);
        assert!((decoded.channel(1)[4000] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_decode_bytes_from_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let buffer = AudioBuffer::from_mono(vec![0.5; 800], 8000).unwrap();
        write_wav(&path, &buffer).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let decoded = SymphoniaDecoder::new()
            .decode_bytes(bytes, AudioFormatHint::Wav)
            .unwrap();
        assert_eq!(decoded.channel_count(), 1);
        assert_eq!(decoded.frame_count(), 800);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = SymphoniaDecoder::new()
            .decode_bytes(b"definitely not audio".to_vec(), AudioFormatHint::Mp3)
            .unwrap_err();
        assert!(matches!(
            err,
            AudioFileError::UnsupportedFormat(_) | AudioFileError::Empty
        ));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = SymphoniaDecoder::new()
            .decode_file(Path::new("/nonexistent/track.wav"))
            .unwrap_err();
        assert!(matches!(err, AudioFileError::Io { .. }));
    }
}
