//! Capture loop controller — run state plus the worker that drives cycles.
//!
//! # Architecture
//!
//! ```text
//! UI thread / Ctrl-C handler
//!        │  start / pause / resume / stop   (validated synchronously)
//!        ▼
//! ControllerHandle ──▶ RunState (mutex) ◀── polled at cycle boundaries
//!        │ wake (Notify)
//!        ▼
//! CaptureLoop::run()  ← dedicated tokio task
//!        │
//!        └─ capture_block → publish_waveform → recognize → publish
//!                (strictly sequential; one block in flight at most)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use live_transcribe::audio::{AudioSource, MicSource};
//! use live_transcribe::config::AppConfig;
//! use live_transcribe::controller::CaptureLoop;
//! use live_transcribe::recognize::{RecognitionService, WebSpeechClient};
//! use live_transcribe::sink::{ConsoleSink, ResultSink};
//!
//! # async fn example() {
//! let config = AppConfig::default();
//! let (mic, _stream) = MicSource::open(&config.audio).unwrap();
//!
//! let (worker, handle) = CaptureLoop::new(
//!     Arc::new(mic) as Arc<dyn AudioSource>,
//!     Arc::new(WebSpeechClient::from_config(&config.recognition)) as Arc<dyn RecognitionService>,
//!     Arc::new(ConsoleSink) as Arc<dyn ResultSink>,
//!     &config.audio,
//! );
//! tokio::spawn(worker.run());
//! handle.start().unwrap();
//! # }
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{CaptureLoop, ControllerHandle};
pub use state::{LoopCommand, RunState, StateError};
