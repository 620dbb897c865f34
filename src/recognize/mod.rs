//! Speech recognition module.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │          RecognitionService (trait)             │
//! │                                                 │
//! │   ┌────────────────┐     ┌──────────────────┐   │
//! │   │ WebSpeechClient │ ──▶ │ encode_wav      │   │
//! │   │ - reqwest       │     │ parse_transcript │   │
//! │   └────────────────┘     └──────────────────┘   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use live_transcribe::audio::AudioBlock;
//! use live_transcribe::config::RecognitionConfig;
//! use live_transcribe::recognize::{RecognitionService, WebSpeechClient};
//!
//! # async fn example() {
//! let client = WebSpeechClient::from_config(&RecognitionConfig::default());
//! let block = AudioBlock::from_f32(&vec![0.0; 48_000], 16_000);
//! match client.recognize(&block).await {
//!     Ok(text) => println!("You said: {text}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! # }
//! ```

pub mod service;
pub mod web;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use service::{RecognitionService, RecognizeError};
pub use web::{encode_wav, parse_transcript, WebSpeechClient};

// test-only re-export so the controller test module can import MockRecognizer
// without `use live_transcribe::recognize::service::MockRecognizer`.
#[cfg(test)]
pub use service::MockRecognizer;
