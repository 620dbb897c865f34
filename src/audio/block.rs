//! Fixed-duration PCM audio blocks.
//!
//! [`AudioBlock`] is the unit of work handed from the audio source to the
//! recognition service: `duration × sample_rate` signed 16-bit mono samples,
//! tagged with the sample rate they were produced at.  A block is owned by
//! the capture loop for exactly one cycle and dropped once the recognition
//! call returns.

// ---------------------------------------------------------------------------
// AudioBlock
// ---------------------------------------------------------------------------

/// One fixed-duration block of mono PCM audio.
///
/// # Example
///
/// ```rust
/// use live_transcribe::audio::AudioBlock;
///
/// let block = AudioBlock::from_f32(&vec![0.0_f32; 48_000], 16_000);
/// assert_eq!(block.len(), 48_000);
/// assert!((block.duration_secs() - 3.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    /// Mono PCM samples, signed 16-bit.
    pub samples: Vec<i16>,
    /// Sample rate the block was produced at, in Hz.
    pub sample_rate: u32,
}

impl AudioBlock {
    /// Build a block from `f32` samples in `[-1.0, 1.0]`.
    ///
    /// Samples outside the unit range are clamped before conversion, so a
    /// clipped input cannot wrap around to the opposite sign.
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let samples = samples
            .iter()
            .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples in the block.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when the block holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Block duration in seconds, derived from length and sample rate.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Root-mean-square amplitude of the block, normalized to `[0.0, 1.0]`.
    ///
    /// Used for silence diagnostics against the calibrated ambient floor.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mean_sq: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let n = s as f64 / i16::MAX as f64;
                n * n
            })
            .sum::<f64>()
            / self.samples.len() as f64;
        mean_sq.sqrt() as f32
    }

}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
