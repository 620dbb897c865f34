//! Audio capture pipeline — microphone → downmix → resample → fixed blocks.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → AudioChunk (mpsc) → stereo_to_mono
//!           → resample → AudioBlock (i16) → capture loop
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use live_transcribe::audio::{AudioSource, MicSource};
//! use live_transcribe::config::AudioConfig;
//!
//! let (source, _handle) = MicSource::open(&AudioConfig::default()).unwrap();
//! let block = source.capture_block(3.0, 16_000).unwrap();
//! println!("captured {} samples @ {} Hz", block.len(), block.sample_rate);
//! ```

pub mod block;
pub mod capture;
pub mod resample;
pub mod waveform;

pub use block::AudioBlock;
pub use capture::{AudioChunk, AudioSource, CaptureError, MicSource, StreamHandle};
pub use resample::{resample, stereo_to_mono};
pub use waveform::WaveformData;
