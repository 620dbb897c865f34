//! live-transcribe — continuous microphone transcription via a cloud speech
//! API, on the console or in a desktop window with a live waveform.
//!
//! # Components
//!
//! * [`audio`] — cpal microphone capture, downmix/resample, fixed
//!   [`AudioBlock`](audio::AudioBlock)s, waveform data.
//! * [`recognize`] — the async [`RecognitionService`](recognize::RecognitionService)
//!   trait and the HTTP [`WebSpeechClient`](recognize::WebSpeechClient).
//! * [`controller`] — the capture loop worker and its
//!   start/pause/resume/stop command handle.
//! * [`sink`] — per-cycle [`TranscriptResult`](sink::TranscriptResult)s and
//!   the console/channel sinks that render them.
//! * [`config`] — TOML settings and platform paths.
//! * [`app`] / [`cli`] — the egui window and the clap argument surface.

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod controller;
pub mod recognize;
pub mod sink;
