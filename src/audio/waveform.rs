//! Waveform amplitude data for the GUI plot.
//!
//! Each completed capture cycle produces one [`WaveformData`] snapshot from
//! the block's samples; the egui plot renders it as a bar chart of the
//! block's amplitude envelope.
//!
//! # Example
//!
//! ```rust
//! use live_transcribe::audio::{AudioBlock, WaveformData};
//!
//! // 1 second of a quiet tone at 16 kHz
//! let samples: Vec<f32> = (0..16_000)
//!     .map(|i| (i as f32 * 0.001).sin() * 0.5)
//!     .collect();
//! let block = AudioBlock::from_f32(&samples, 16_000);
//!
//! let waveform = WaveformData::compute(&block.samples, 30);
//! assert_eq!(waveform.bars.len(), 30);
//! for &bar in &waveform.bars {
//!     assert!(bar >= 0.0 && bar <= 1.0);
//! }
//! ```

// ---------------------------------------------------------------------------
// WaveformData
// ---------------------------------------------------------------------------

/// Amplitude snapshot for the waveform bar chart.
///
/// Each element of `bars` is an RMS amplitude in `[0.0, 1.0]` representing
/// an equal-width chunk of the block.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformData {
    /// RMS amplitude per bar, clamped to `[0.0, 1.0]`.
    pub bars: Vec<f32>,
}

impl WaveformData {
    /// Compute `num_bars` RMS amplitude values from 16-bit `samples`.
    ///
    /// The samples are divided into `num_bars` equal-sized chunks; the RMS of
    /// each chunk (normalized by `i16::MAX`) becomes one bar.  If there are
    /// fewer samples than bars the remaining bars are padded with `0.0`.
    ///
    /// # Arguments
    ///
    /// * `samples`  — mono signed 16-bit PCM, any rate.
    /// * `num_bars` — number of bars to produce (e.g. `30` for a 30-column
    ///   plot).  If `0`, an empty `WaveformData` is returned.
    pub fn compute(samples: &[i16], num_bars: usize) -> Self {
        if num_bars == 0 {
            return Self { bars: Vec::new() };
        }

        if samples.is_empty() {
            return Self {
                bars: vec![0.0; num_bars],
            };
        }

        let chunk_size = (samples.len() / num_bars).max(1);

        let mut bars: Vec<f32> = samples
            .chunks(chunk_size)
            .take(num_bars)
            .map(|chunk| {
                let mean_sq: f32 = chunk
                    .iter()
                    .map(|&s| {
                        let n = s as f32 / i16::MAX as f32;
                        n * n
                    })
                    .sum::<f32>()
                    / chunk.len() as f32;
                mean_sq.sqrt().min(1.0)
            })
            .collect();

        // Pad any remaining bars with 0.0
        bars.resize(num_bars, 0.0);

        Self { bars }
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Returns `true` when there are no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Peak bar value across the waveform (useful for normalisation).
    pub fn peak(&self) -> f32 {
        self.bars.iter().cloned().fold(0.0_f32, f32::max)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
