//! The track-position extrapolator: turns a trickle of beat and status
//! packets into a continuously queryable playhead estimate per player.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{BeatPacket, PlayerId, StatusPacket, TrackPositionUpdate};

/// Tracks the latest known position state for every player and extrapolates
/// it forward on demand.
///
/// Writes are serialized per player by `dashmap`'s per-shard locking, so
/// every writer for a given player contends on the same shard lock rather
/// than racing a lock-free compare-and-swap.
#[derive(Default)]
pub struct PositionExtrapolator {
    players: DashMap<PlayerId, TrackPositionUpdate>,
}

impl PositionExtrapolator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new observation for `player`. A definitive (beat-anchored)
    /// update always replaces whatever is stored; a non-definitive
    /// (status-packet-derived) update only replaces an existing one if it's
    /// chronologically newer, so a late-arriving status packet can never
    /// roll a definitive anchor backwards.
    pub fn update(&self, player: PlayerId, update: TrackPositionUpdate) {
        let mut slot = self.players.entry(player).or_insert_with(|| update.clone());
        let replace = update.definitive || update.timestamp_ns >= slot.timestamp_ns;
        if replace {
            *slot = update;
        }
    }

    /// Fold a status packet into `player`'s state: if there is no prior
    /// state or the beat grid changed, anchor directly off
    /// `beatGrid.timeForBeat(beatNumber)`; otherwise interpolate the prior
    /// state forward to the packet's timestamp and carry the new beat
    /// number. A status-derived state is never definitive.
    ///
    /// The whole read-modify-write happens under `dashmap`'s per-shard
    /// lock, so a stale packet racing a fresher one either loses the lock
    /// and retries against the now-current state, or sees its own
    /// timestamp rejected outright -- the same "abandon if a fresher state
    /// was installed concurrently" contract a lock-free CAS loop would give.
    pub fn on_status(&self, player: PlayerId, status: StatusPacket) {
        if status.beat_number == 0 {
            return;
        }
        match self.players.entry(player) {
            Entry::Vacant(v) => {
                if let Some(position_ms) = status.beat_grid.time_for_beat(status.beat_number) {
                    v.insert(TrackPositionUpdate {
                        timestamp_ns: status.timestamp_ns,
                        position_ms: position_ms as i64,
                        beat_number: status.beat_number,
                        definitive: false,
                        playing: status.playing,
                        pitch: status.pitch,
                        reverse: status.reverse,
                        beat_grid: status.beat_grid,
                    });
                }
            }
            Entry::Occupied(mut o) => {
                if status.timestamp_ns < o.get().timestamp_ns {
                    return;
                }
                let grid_changed = o.get().beat_grid != status.beat_grid;
                let position_ms = if grid_changed {
                    match status.beat_grid.time_for_beat(status.beat_number) {
                        Some(p) => p as i64,
                        None => return,
                    }
                } else {
                    o.get().interpolate(status.timestamp_ns)
                };
                o.insert(TrackPositionUpdate {
                    timestamp_ns: status.timestamp_ns,
                    position_ms,
                    beat_number: status.beat_number,
                    definitive: false,
                    playing: status.playing,
                    pitch: status.pitch,
                    reverse: status.reverse,
                    beat_grid: status.beat_grid,
                });
            }
        }
    }

    /// Fold a beat packet into `player`'s state: with no prior state or a
    /// changed beat grid, resync to beat 1 (non-definitive); otherwise
    /// advance the prior beat number by one, mark the result definitive,
    /// and assert forward playback.
    pub fn on_beat(&self, player: PlayerId, beat: BeatPacket) {
        match self.players.entry(player) {
            Entry::Vacant(v) => {
                if let Some(position_ms) = beat.beat_grid.time_for_beat(1) {
                    v.insert(TrackPositionUpdate {
                        timestamp_ns: beat.timestamp_ns,
                        position_ms: position_ms as i64,
                        beat_number: 1,
                        definitive: false,
                        playing: true,
                        pitch: 1.0,
                        reverse: false,
                        beat_grid: beat.beat_grid,
                    });
                }
            }
            Entry::Occupied(mut o) => {
                let grid_changed = o.get().beat_grid != beat.beat_grid;
                if grid_changed {
                    if let Some(position_ms) = beat.beat_grid.time_for_beat(1) {
                        o.insert(TrackPositionUpdate {
                            timestamp_ns: beat.timestamp_ns,
                            position_ms: position_ms as i64,
                            beat_number: 1,
                            definitive: false,
                            playing: o.get().playing,
                            pitch: o.get().pitch,
                            reverse: o.get().reverse,
                            beat_grid: beat.beat_grid,
                        });
                    }
                    return;
                }
                let new_beat = o.get().beat_number + 1;
                let Some(position_ms) = beat.beat_grid.time_for_beat(new_beat) else {
                    return;
                };
                let pitch = o.get().pitch;
                o.insert(TrackPositionUpdate {
                    timestamp_ns: beat.timestamp_ns,
                    position_ms: position_ms as i64,
                    beat_number: new_beat,
                    definitive: true,
                    playing: true,
                    pitch,
                    reverse: false,
                    beat_grid: beat.beat_grid,
                });
            }
        }
    }

    /// The best current estimate of `player`'s position, extrapolated
    /// forward to `at_ns`. `None` if nothing has ever been observed for
    /// that player.
    pub fn position_at(&self, player: PlayerId, at_ns: u64) -> Option<i64> {
        self.players.get(&player).map(|s| s.interpolate(at_ns))
    }

    /// The raw last-known state for `player`, if any.
    pub fn last_known(&self, player: PlayerId) -> Option<TrackPositionUpdate> {
        self.players.get(&player).map(|s| s.clone())
    }

    /// Forget a player, e.g. on disconnect.
    pub fn clear(&self, player: PlayerId) {
        self.players.remove(&player);
    }
}
