//! Beat grids: the beat-number-to-timestamp mapping used to anchor track
//! position.

use smallvec::SmallVec;
use thiserror::Error;

/// Beat grids smaller than this are stored inline; this covers the vast
/// majority of real tracks without spilling to the heap.
const INLINE_BEATS: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BeatGridError {
    #[error("beat grid must have at least one beat")]
    Empty,
    #[error("beat times must be strictly increasing, beat {beat} time {time} <= previous {prev}")]
    NotMonotonic { beat: u32, time: u32, prev: u32 },
}

/// An immutable beat→timestamp mapping for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatGrid {
    /// `times[i]` is the timestamp, in ms, of beat `i + 1`.
    times: SmallVec<[u32; INLINE_BEATS]>,
}

impl BeatGrid {
    /// Build a beat grid from per-beat timestamps (beat 1 first).
    /// Validates strictly increasing times.
    pub fn new(times: Vec<u32>) -> Result<Self, BeatGridError> {
        if times.is_empty() {
            return Err(BeatGridError::Empty);
        }
        for (i, window) in times.windows(2).enumerate() {
            if window[1] <= window[0] {
                return Err(BeatGridError::NotMonotonic {
                    beat: (i + 2) as u32,
                    time: window[1],
                    prev: window[0],
                });
            }
        }
        Ok(Self {
            times: times.into(),
        })
    }

    pub fn beat_count(&self) -> u32 {
        self.times.len() as u32
    }

    /// Timestamp, in ms, of `beat` (1-indexed). Returns `None` if out of range.
    pub fn time_for_beat(&self, beat: u32) -> Option<u32> {
        if beat == 0 {
            return None;
        }
        self.times.get((beat - 1) as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_grid() {
        assert_eq!(BeatGrid::new(vec![]).unwrap_err(), BeatGridError::Empty);
    }

    #[test]
    fn rejects_non_monotonic_times() {
        assert!(BeatGrid::new(vec![0, 500, 400]).is_err());
    }

    #[test]
    fn time_for_beat_is_one_indexed() {
        let bg = BeatGrid::new(vec![0, 500, 1000]).unwrap();
        assert_eq!(bg.time_for_beat(1), Some(0));
        assert_eq!(bg.time_for_beat(3), Some(1000));
        assert_eq!(bg.time_for_beat(4), None);
        assert_eq!(bg.time_for_beat(0), None);
    }

    #[test]
    fn beat_count_matches_input_len() {
        let bg = BeatGrid::new(vec![0, 500, 1000, 1500]).unwrap();
        assert_eq!(bg.beat_count(), 4);
    }
}
