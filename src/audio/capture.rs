//! Microphone capture via `cpal`.
//!
//! [`AudioSource`] is the interface the capture loop consumes: one-shot
//! ambient-noise calibration plus blocking fixed-duration block capture.
//!
//! [`MicSource`] is the production implementation.  [`MicSource::open`]
//! starts a cpal input stream whose callback forwards raw [`AudioChunk`]s
//! over an mpsc channel; the returned [`StreamHandle`] is a RAII guard —
//! dropping it stops the underlying hardware stream.  `capture_block`
//! accumulates fresh audio from that channel, downmixes, resamples, and
//! converts to signed 16-bit samples.

use std::sync::mpsc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::block::AudioBlock;
use crate::audio::resample::{resample, stereo_to_mono};
use crate::config::AudioConfig;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]` at the device's
/// native rate; [`MicSource::capture_block`] handles downmixing and rate
/// conversion.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value calls `cpal::Stream::drop` which stops the underlying
/// hardware stream.  `cpal::Stream` is not `Send` on all platforms, so the
/// handle stays on the thread that opened the device.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors from microphone setup and block capture.
///
/// The setup variants (`NoDevice` through `PlayStream`) are fatal at
/// startup.  `Timeout` and `StreamClosed` occur per capture and are handled
/// at the cycle boundary.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("no input device named {0:?}")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio device produced no data within the capture window")]
    Timeout,

    #[error("audio stream closed")]
    StreamClosed,
}

// ---------------------------------------------------------------------------
// AudioSource trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for block-oriented audio capture.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn AudioSource>` and called from the capture worker.
///
/// # Contract
///
/// - `capture_block` blocks until `duration_secs` of *fresh* audio has
///   accumulated (audio queued before the call is discarded), then returns
///   exactly `duration_secs × sample_rate` mono i16 samples.
/// - `calibrate` is one-shot, called once before the cycle loop starts; it
///   returns the measured ambient RMS floor in `[0.0, 1.0]`.
pub trait AudioSource: Send + Sync {
    /// Measure the ambient noise level over `duration_secs` of audio.
    fn calibrate(&self, duration_secs: f32) -> Result<f32, CaptureError>;

    /// Record one fixed-duration block at `sample_rate`.
    fn capture_block(&self, duration_secs: f32, sample_rate: u32)
        -> Result<AudioBlock, CaptureError>;
}

// Compile-time assertion: Box<dyn AudioSource> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn AudioSource>) {}
};

// ---------------------------------------------------------------------------
// MicSource
// ---------------------------------------------------------------------------

/// Microphone-backed [`AudioSource`] built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use live_transcribe::audio::{AudioSource, MicSource};
/// use live_transcribe::config::AudioConfig;
///
/// let config = AudioConfig::default();
/// let (source, _handle) = MicSource::open(&config).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop recording.
///
/// let floor = source.calibrate(0.5).unwrap();
/// println!("ambient floor: {floor:.4}");
/// let block = source.capture_block(3.0, 16_000).unwrap();
/// println!("captured {} samples", block.len());
/// ```
pub struct MicSource {
    /// Chunk stream fed by the cpal callback.  Guarded by a mutex so the
    /// source is `Sync`; only one capture runs at a time by design.
    rx: Mutex<mpsc::Receiver<AudioChunk>>,
    /// Native sample rate reported by the device (Hz).
    native_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
    /// Extra time beyond the block duration before a capture times out.
    grace: Duration,
    /// Ambient RMS floor measured by [`calibrate`](AudioSource::calibrate).
    noise_floor: Mutex<Option<f32>>,
}

impl MicSource {
    /// Open the configured input device and start streaming.
    ///
    /// Uses the device named in `config.device` when set, otherwise the
    /// system default input device.  The returned [`StreamHandle`] must be
    /// kept alive for as long as capture should continue.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::NoDevice`] / [`CaptureError::DeviceNotFound`]
    /// when no usable input device exists, or a stream setup error when the
    /// platform rejects the configuration.
    pub fn open(config: &AudioConfig) -> Result<(Self, StreamHandle), CaptureError> {
        let host = cpal::default_host();

        let device = match &config.device {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.clone()))?,
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
        };

        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let native_rate = supported.sample_rate().0;
        let stream_config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::channel::<AudioChunk>();

        let stream = device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate: native_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;

        log::info!(
            "audio capture started ({} Hz, {} ch{})",
            native_rate,
            channels,
            config
                .device
                .as_deref()
                .map(|n| format!(", device {n:?}"))
                .unwrap_or_default()
        );

        Ok((
            Self {
                rx: Mutex::new(rx),
                native_rate,
                channels,
                grace: Duration::from_secs_f32(config.capture_grace_secs),
                noise_floor: Mutex::new(None),
            },
            StreamHandle { _stream: stream },
        ))
    }

    /// Collect `duration_secs` of fresh mono audio at the native rate.
    ///
    /// Discards chunks queued before the call so a block never contains
    /// audio recorded while the loop was paused.
    fn collect_native(&self, duration_secs: f32) -> Result<Vec<f32>, CaptureError> {
        let rx = self.rx.lock().unwrap();

        // Flush stale chunks.
        while rx.try_recv().is_ok() {}

        let target = (duration_secs * self.native_rate as f32) as usize;
        let deadline = Instant::now() + Duration::from_secs_f32(duration_secs) + self.grace;
        let mut mono: Vec<f32> = Vec::with_capacity(target);

        while mono.len() < target {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(CaptureError::Timeout)?;

            match rx.recv_timeout(remaining) {
                Ok(chunk) => mono.extend(stereo_to_mono(&chunk.samples, chunk.channels)),
                Err(mpsc::RecvTimeoutError::Timeout) => return Err(CaptureError::Timeout),
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::StreamClosed)
                }
            }
        }

        mono.truncate(target);
        Ok(mono)
    }

    #[cfg(test)]
    fn with_channel(
        rx: mpsc::Receiver<AudioChunk>,
        native_rate: u32,
        channels: u16,
        grace: Duration,
    ) -> Self {
        Self {
            rx: Mutex::new(rx),
            native_rate,
            channels,
            grace,
            noise_floor: Mutex::new(None),
        }
    }

    /// Number of interleaved channels delivered by the device.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }
}

impl AudioSource for MicSource {
    fn calibrate(&self, duration_secs: f32) -> Result<f32, CaptureError> {
        let mono = self.collect_native(duration_secs)?;

        let mean_sq =
            mono.iter().map(|&s| s * s).sum::<f32>() / mono.len().max(1) as f32;
        let floor = mean_sq.sqrt();

        *self.noise_floor.lock().unwrap() = Some(floor);
        log::info!("ambient noise floor: {floor:.4}");
        Ok(floor)
    }

    fn capture_block(
        &self,
        duration_secs: f32,
        sample_rate: u32,
    ) -> Result<AudioBlock, CaptureError> {
        let mono = self.collect_native(duration_secs)?;
        let mut resampled = resample(&mono, self.native_rate, sample_rate);

        // Pin the block to exactly duration × rate samples; resampling can be
        // off by a sample either way.
        let target = (duration_secs * sample_rate as f32) as usize;
        resampled.resize(target, 0.0);

        let block = AudioBlock::from_f32(&resampled, sample_rate);

        if let Some(floor) = *self.noise_floor.lock().unwrap() {
            if floor > 0.0 && block.rms() <= floor {
                log::debug!(
                    "captured block at or below ambient floor ({:.4} <= {floor:.4})",
                    block.rms()
                );
            }
        }

        Ok(block)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// `AudioChunk` must be `Send` so it can cross thread boundaries.
    #[test]
    fn audio_chunk_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<AudioChunk>();
    }

    /// `MicSource` must be `Send + Sync` to live behind `Arc<dyn AudioSource>`.
    #[test]
    fn mic_source_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MicSource>();
    }

    fn chunk(value: f32, len: usize, rate: u32) -> AudioChunk {
        AudioChunk {
            samples: vec![value; len],
            sample_rate: rate,
            channels: 1,
        }
    }

    /// Spawn a producer that feeds `n` chunks after a short delay, so the
    /// chunks arrive while `capture_block` is already draining fresh audio.
    fn feed_later(tx: mpsc::Sender<AudioChunk>, value: f32, n: usize, len: usize, rate: u32) {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            for _ in 0..n {
                let _ = tx.send(chunk(value, len, rate));
            }
        });
    }

    #[test]
    fn capture_block_returns_exact_length() {
        let (tx, rx) = mpsc::channel();
        let source = MicSource::with_channel(rx, 16_000, 1, Duration::from_secs(2));

        // 0.1 s @ 16 kHz = 1 600 samples; feed two 1 000-sample chunks.
        feed_later(tx, 0.5, 2, 1_000, 16_000);

        let block = source.capture_block(0.1, 16_000).unwrap();
        assert_eq!(block.len(), 1_600);
        assert_eq!(block.sample_rate, 16_000);
    }

    #[test]
    fn capture_block_resamples_to_requested_rate() {
        let (tx, rx) = mpsc::channel();
        let source = MicSource::with_channel(rx, 48_000, 1, Duration::from_secs(2));

        // 0.1 s @ 48 kHz native = 4 800 samples in; 1 600 out at 16 kHz.
        feed_later(tx, 0.5, 5, 1_000, 48_000);

        let block = source.capture_block(0.1, 16_000).unwrap();
        assert_eq!(block.len(), 1_600);
        assert!((block.rms() - 0.5).abs() < 0.01, "rms = {}", block.rms());
    }

    #[test]
    fn capture_block_discards_stale_audio() {
        let (tx, rx) = mpsc::channel();
        let source = MicSource::with_channel(rx, 16_000, 1, Duration::from_secs(2));

        // Stale loud audio queued before the capture begins…
        for _ in 0..4 {
            tx.send(chunk(0.9, 1_000, 16_000)).unwrap();
        }
        // …fresh quiet audio arriving after.
        feed_later(tx, 0.1, 2, 1_000, 16_000);

        let block = source.capture_block(0.1, 16_000).unwrap();
        assert!(
            (block.rms() - 0.1).abs() < 0.01,
            "stale audio leaked into block: rms = {}",
            block.rms()
        );
    }

    #[test]
    fn capture_block_times_out_without_data() {
        let (_tx, rx) = mpsc::channel();
        let source = MicSource::with_channel(rx, 16_000, 1, Duration::from_millis(20));

        let err = source.capture_block(0.01, 16_000).unwrap_err();
        assert!(matches!(err, CaptureError::Timeout), "got {err:?}");
    }

    #[test]
    fn capture_block_reports_closed_stream() {
        let (tx, rx) = mpsc::channel::<AudioChunk>();
        drop(tx);
        let source = MicSource::with_channel(rx, 16_000, 1, Duration::from_secs(1));

        let err = source.capture_block(0.01, 16_000).unwrap_err();
        assert!(matches!(err, CaptureError::StreamClosed), "got {err:?}");
    }

    #[test]
    fn calibrate_measures_and_stores_the_floor() {
        let (tx, rx) = mpsc::channel();
        let source = MicSource::with_channel(rx, 16_000, 1, Duration::from_secs(2));

        feed_later(tx, 0.5, 2, 1_000, 16_000);

        let floor = source.calibrate(0.1).unwrap();
        assert!((floor - 0.5).abs() < 0.01, "floor = {floor}");
        assert_eq!(*source.noise_floor.lock().unwrap(), Some(floor));
    }
}
