//! Value types identifying decks, media slots, and database-backed assets:
//! `DeckRef`, `SlotRef`, `DataRef`.

use serde::{Deserialize, Serialize};

/// A player number on the network, `1..=4` in practice but not bounded here
/// (the raw device-status decoder is an external collaborator; we accept
/// whatever it reports and let callers reject out-of-range values).
pub type PlayerId = u8;

/// A physical or logical media source attached to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    Cd,
    Sd,
    Usb,
    /// Rekordbox running on a desktop, reachable as a network "collection".
    Collection,
}

impl Slot {
    /// NFS mount path fragment for this slot, or `None` if the slot cannot
    /// be mounted over the file-transfer transport.
    pub fn mount_path(self) -> Option<&'static str> {
        match self {
            Slot::Sd => Some("/B/"),
            Slot::Usb => Some("/C/"),
            Slot::Cd | Slot::Collection => None,
        }
    }
}

/// A reference to a deck (a player's active playback slot or a hot-cue slot).
///
/// `hot_cue == 0` means the active deck. Equality and ordering are by value;
/// this is a plain value type, not an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeckRef {
    pub player: PlayerId,
    /// `0` is the active deck; `1..=N` are hot-cue slots.
    pub hot_cue: u8,
}

impl DeckRef {
    /// Reference to player `player`'s active deck.
    pub const fn active(player: PlayerId) -> Self {
        Self { player, hot_cue: 0 }
    }

    /// Reference to one of player `player`'s hot-cue slots.
    pub const fn hot_cue(player: PlayerId, hot_cue: u8) -> Self {
        Self { player, hot_cue }
    }

    /// Whether this is the active-deck slot (`hot_cue == 0`).
    pub const fn is_active(self) -> bool {
        self.hot_cue == 0
    }
}

/// A reference to a media slot on a specific player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub player: PlayerId,
    pub slot: Slot,
}

impl SlotRef {
    pub const fn new(player: PlayerId, slot: Slot) -> Self {
        Self { player, slot }
    }
}

/// A reference to a specific asset or track in a media database: the slot it
/// lives on plus its rekordbox row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRef {
    pub slot: SlotRef,
    pub rekordbox_id: u32,
}

impl DataRef {
    pub const fn new(slot: SlotRef, rekordbox_id: u32) -> Self {
        Self { slot, rekordbox_id }
    }
}
