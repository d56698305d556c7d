//! Waveform preview/detail data, in any of the three historical encodings.

use thiserror::Error;

/// Which waveform encoding a blob of raw samples uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformVariant {
    /// Single-channel blue waveform, 1 byte/frame.
    Blue,
    /// Color waveform, 2 bytes/frame.
    Rgb,
    /// Three-band (nxs2) color waveform, 6 bytes/frame.
    ThreeBand,
}

impl WaveformVariant {
    fn bytes_per_frame(self) -> usize {
        match self {
            WaveformVariant::Blue => 1,
            WaveformVariant::Rgb => 2,
            WaveformVariant::ThreeBand => 6,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("waveform byte length {len} is not a multiple of {bytes_per_frame} for variant {variant:?}")]
pub struct WaveformError {
    variant: WaveformVariant,
    len: usize,
    bytes_per_frame: usize,
}

/// Shared representation for waveform preview and detail assets; the two
/// differ only in the time span one sample frame represents, which is a
/// concern of the caller (a renderer), not of this data type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    variant: WaveformVariant,
    samples: std::sync::Arc<[u8]>,
}

impl Waveform {
    /// Build a waveform, validating that `samples.len()` is a whole number
    /// of frames for `variant`.
    pub fn new(variant: WaveformVariant, samples: Vec<u8>) -> Result<Self, WaveformError> {
        let bpf = variant.bytes_per_frame();
        if samples.len() % bpf != 0 {
            return Err(WaveformError {
                variant,
                len: samples.len(),
                bytes_per_frame: bpf,
            });
        }
        Ok(Self {
            variant,
            samples: samples.into(),
        })
    }

    pub fn variant(&self) -> WaveformVariant {
        self.variant
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Number of sample frames, derived from variant and byte length.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.variant.bytes_per_frame()
    }
}

/// Caller-expressed preference among waveform variants, used by the
/// waveform finder's fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveformPreference {
    ThreeBand,
    Rgb,
}

impl WaveformPreference {
    /// Ordered fallback chain for a preview request: preferred variant,
    /// then monochrome. Preview has no RGB-detail-only intermediate step.
    pub fn preview_fallback_order(self) -> &'static [WaveformVariant] {
        match self {
            WaveformPreference::ThreeBand => {
                &[WaveformVariant::ThreeBand, WaveformVariant::Blue]
            }
            WaveformPreference::Rgb => &[WaveformVariant::Rgb, WaveformVariant::Blue],
        }
    }

    /// Ordered fallback chain for a detail request: preferred variant, then
    /// RGB, then monochrome.
    pub fn detail_fallback_order(self) -> &'static [WaveformVariant] {
        match self {
            WaveformPreference::ThreeBand => &[
                WaveformVariant::ThreeBand,
                WaveformVariant::Rgb,
                WaveformVariant::Blue,
            ],
            WaveformPreference::Rgb => &[WaveformVariant::Rgb, WaveformVariant::Blue],
        }
    }
}
