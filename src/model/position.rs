//! The rolling per-player position state the track-position extrapolator
//! maintains.

use std::sync::Arc;

use super::beat_grid::BeatGrid;

/// A snapshot of where a player's playhead was, as of `timestamp_ns`, and
/// enough information to extrapolate it forward.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPositionUpdate {
    /// Monotonic event timestamp, nanoseconds, used to order updates and
    /// drive the compare-and-swap replacement rule.
    pub timestamp_ns: u64,
    pub position_ms: i64,
    pub beat_number: u32,
    /// `true` if this update was anchored by a beat packet ("definitive");
    /// `false` if it was derived from a status packet.
    pub definitive: bool,
    pub playing: bool,
    pub pitch: f64,
    pub reverse: bool,
    pub beat_grid: Arc<BeatGrid>,
}

/// A status packet: a player's current beat number, pitch, and transport
/// state as of `timestamp_ns`. Non-definitive by nature -- it only anchors
/// a position once combined with a beat grid.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPacket {
    pub timestamp_ns: u64,
    pub beat_number: u32,
    pub pitch: f64,
    pub playing: bool,
    pub reverse: bool,
    pub beat_grid: Arc<BeatGrid>,
}

/// A beat packet: a definitive anchor asserting the player just crossed a
/// beat boundary, playing forward, at `timestamp_ns`.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatPacket {
    pub timestamp_ns: u64,
    pub beat_grid: Arc<BeatGrid>,
}

impl TrackPositionUpdate {
    /// Extrapolate this state forward to `at_ns`:
    ///
    /// ```text
    /// elapsedMs = (t - S.timestamp) / 1_000_000
    /// moved     = round(S.pitch * elapsedMs)
    /// predicted = S.playing ? (S.reverse ? S.position - moved : S.position + moved) : S.position
    /// ```
    ///
    /// Never clamps to track duration; runs indefinitely. Callers that need
    /// clamping do so themselves.
    pub fn interpolate(&self, at_ns: u64) -> i64 {
        if !self.playing {
            return self.position_ms;
        }
        let elapsed_ms = (at_ns as i128 - self.timestamp_ns as i128) as f64 / 1_000_000.0;
        let moved = (self.pitch * elapsed_ms).round() as i64;
        if self.reverse {
            self.position_ms - moved
        } else {
            self.position_ms + moved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Arc<BeatGrid> {
        Arc::new(BeatGrid::new(vec![0, 500, 1000, 1500, 2000]).unwrap())
    }

    #[test]
    fn interpolates_forward_when_playing() {
        let s = TrackPositionUpdate {
            timestamp_ns: 1_000_000_000,
            position_ms: 10_000,
            beat_number: 10,
            definitive: true,
            playing: true,
            pitch: 1.0,
            reverse: false,
            beat_grid: grid(),
        };
        let predicted = s.interpolate(2_500_000_000);
        assert_eq!(predicted, 10_000 + 1_500);
    }

    #[test]
    fn does_not_move_when_not_playing() {
        let s = TrackPositionUpdate {
            timestamp_ns: 1_000_000_000,
            position_ms: 10_000,
            beat_number: 10,
            definitive: true,
            playing: false,
            pitch: 1.0,
            reverse: false,
            beat_grid: grid(),
        };
        assert_eq!(s.interpolate(5_000_000_000), 10_000);
    }

    #[test]
    fn reverse_playback_moves_backward() {
        let s = TrackPositionUpdate {
            timestamp_ns: 0,
            position_ms: 10_000,
            beat_number: 10,
            definitive: true,
            playing: true,
            pitch: 1.0,
            reverse: true,
            beat_grid: grid(),
        };
        assert_eq!(s.interpolate(500_000_000), 10_000 - 500);
    }

    proptest::proptest! {
        #[test]
        fn monotone_forward_while_playing(t1_ms in 0u64..100_000, delta_ms in 0u64..100_000) {
            let s = TrackPositionUpdate {
                timestamp_ns: 0,
                position_ms: 0,
                beat_number: 1,
                definitive: false,
                playing: true,
                pitch: 1.0,
                reverse: false,
                beat_grid: grid(),
            };
            let p1 = s.interpolate(t1_ms * 1_000_000);
            let p2 = s.interpolate((t1_ms + delta_ms) * 1_000_000);
            proptest::prop_assert!(p2 >= p1);
        }
    }
}
