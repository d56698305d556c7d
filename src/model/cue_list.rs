//! Cue lists: an ordered sequence of memory points and hot cues, parsed from
//! either the legacy or the nxs2-era ("extended") analysis-file tag
//! encoding into one unified representation.

use smallvec::SmallVec;
use thiserror::Error;

/// A track's embedded artwork color or a cue's manually-assigned color,
/// three-byte RGB as carried in the extended analysis tag encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A single cue-list entry: a memory point (`hot_cue_number == 0`) or a hot
/// cue (`1..=N`), optionally a loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CueEntry {
    /// `0` for a plain memory point, `1..=N` for a hot cue.
    pub hot_cue_number: u8,
    pub is_loop: bool,
    /// Cue position, in the same units as the owning beat grid's frame
    /// positions; the canonical sort key.
    pub cue_pos: u64,
    pub cue_time_ms: u32,
    /// Only meaningful when `is_loop`; must be `> cue_pos`.
    pub loop_pos: u64,
    pub loop_time_ms: u32,
    pub comment: Option<String>,
    /// rekordbox's own color-id for this cue (0 = no color).
    pub color_id: u8,
    /// RGB color embedded directly in the extended tag, if present.
    pub embedded_color: Option<Rgb>,
    /// RGB color as looked up from rekordbox's fixed palette via `color_id`.
    pub rekordbox_color: Option<Rgb>,
}

impl CueEntry {
    /// Construct a plain memory point.
    pub fn memory_point(cue_pos: u64, cue_time_ms: u32) -> Self {
        Self {
            hot_cue_number: 0,
            is_loop: false,
            cue_pos,
            cue_time_ms,
            loop_pos: 0,
            loop_time_ms: 0,
            comment: None,
            color_id: 0,
            embedded_color: None,
            rekordbox_color: None,
        }
    }

    /// Construct a hot cue (non-loop).
    pub fn hot_cue(number: u8, cue_pos: u64, cue_time_ms: u32) -> Self {
        Self {
            hot_cue_number: number,
            ..Self::memory_point(cue_pos, cue_time_ms)
        }
    }

    /// Whether this is a memory point (as opposed to a hot cue).
    pub fn is_memory_point(&self) -> bool {
        self.hot_cue_number == 0
    }
}

/// Entry ordering/loop invariants were violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CueListError {
    #[error("loop entry at cue_pos {cue_pos} has loop_pos {loop_pos} which is not greater")]
    LoopNotAfterCue { cue_pos: u64, loop_pos: u64 },
}

/// An ordered sequence of cue-list entries. Construction sorts and
/// validates; once built, [`CueList::entries`] is immutable.
#[derive(Debug, Clone, PartialEq)]
pub struct CueList {
    entries: SmallVec<[CueEntry; 8]>,
}

impl CueList {
    /// Build a cue list, sorting entries by `cue_pos` ascending and, for
    /// entries sharing a position, placing hot cues after memory points.
    pub fn new(mut entries: Vec<CueEntry>) -> Result<Self, CueListError> {
        for e in &entries {
            if e.is_loop && e.loop_pos <= e.cue_pos {
                return Err(CueListError::LoopNotAfterCue {
                    cue_pos: e.cue_pos,
                    loop_pos: e.loop_pos,
                });
            }
        }
        entries.sort_by(|a, b| {
            a.cue_pos
                .cmp(&b.cue_pos)
                .then_with(|| a.is_memory_point().cmp(&b.is_memory_point()).reverse())
        });
        Ok(Self {
            entries: entries.into(),
        })
    }

    /// Build a unified cue list from the two historical tag encodings.
    /// Extended (nxs2) entries take precedence; legacy entries are only
    /// used when no extended entries were produced.
    pub fn from_tags(
        extended: Vec<CueEntry>,
        legacy: Vec<CueEntry>,
    ) -> Result<Self, CueListError> {
        if extended.is_empty() {
            Self::new(legacy)
        } else {
            Self::new(extended)
        }
    }

    /// An empty cue list.
    pub fn empty() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }

    pub fn entries(&self) -> &[CueEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry at or immediately before `time_ms`, if any, via binary
    /// search on the (monotonic) `cue_time_ms` key.
    pub fn entry_at_or_before(&self, time_ms: u32) -> Option<&CueEntry> {
        match self
            .entries
            .binary_search_by(|e| e.cue_time_ms.cmp(&time_ms))
        {
            Ok(idx) => self.entries.get(idx),
            Err(0) => None,
            Err(idx) => self.entries.get(idx - 1),
        }
    }

    /// Hot-cue numbers present in this list (memory points excluded).
    pub fn hot_cue_numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries
            .iter()
            .filter(|e| !e.is_memory_point())
            .map(|e| e.hot_cue_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_ascending_by_cue_pos() {
        let cl = CueList::new(vec![
            CueEntry::memory_point(200, 200),
            CueEntry::memory_point(100, 100),
        ])
        .unwrap();
        let positions: Vec<_> = cl.entries().iter().map(|e| e.cue_pos).collect();
        assert_eq!(positions, vec![100, 200]);
    }

    #[test]
    fn hot_cues_sort_after_memory_points_at_equal_position() {
        let cl = CueList::new(vec![
            CueEntry::hot_cue(1, 100, 100),
            CueEntry::memory_point(100, 100),
        ])
        .unwrap();
        assert!(cl.entries()[0].is_memory_point());
        assert_eq!(cl.entries()[1].hot_cue_number, 1);
    }

    #[test]
    fn rejects_loop_not_after_cue() {
        let mut bad = CueEntry::hot_cue(1, 500, 500);
        bad.is_loop = true;
        bad.loop_pos = 400;
        let err = CueList::new(vec![bad]).unwrap_err();
        assert_eq!(
            err,
            CueListError::LoopNotAfterCue {
                cue_pos: 500,
                loop_pos: 400
            }
        );
    }

    #[test]
    fn extended_tags_take_precedence_over_legacy() {
        let extended = vec![CueEntry::hot_cue(1, 100, 100)];
        let legacy = vec![CueEntry::hot_cue(2, 200, 200)];
        let cl = CueList::from_tags(extended, legacy).unwrap();
        assert_eq!(cl.entries().len(), 1);
        assert_eq!(cl.entries()[0].hot_cue_number, 1);
    }

    #[test]
    fn legacy_used_when_extended_empty() {
        let cl = CueList::from_tags(vec![], vec![CueEntry::hot_cue(2, 200, 200)]).unwrap();
        assert_eq!(cl.entries()[0].hot_cue_number, 2);
    }

    #[test]
    fn entry_at_or_before_finds_nearest_preceding() {
        let cl = CueList::new(vec![
            CueEntry::memory_point(0, 0),
            CueEntry::memory_point(1000, 1000),
            CueEntry::memory_point(2000, 2000),
        ])
        .unwrap();
        assert_eq!(cl.entry_at_or_before(1500).unwrap().cue_time_ms, 1000);
        assert_eq!(cl.entry_at_or_before(0).unwrap().cue_time_ms, 0);
        assert!(
            CueList::empty().entry_at_or_before(100).is_none()
        );
    }

    #[test]
    fn sorted_nondecreasing_property(
    ) {
        let cl = CueList::new(vec![
            CueEntry::hot_cue(3, 500, 500),
            CueEntry::memory_point(500, 500),
            CueEntry::memory_point(100, 100),
        ])
        .unwrap();
        let e = cl.entries();
        for i in 1..e.len() {
            assert!(e[i - 1].cue_pos <= e[i].cue_pos);
            if e[i - 1].cue_pos == e[i].cue_pos {
                assert!(!(e[i - 1].is_memory_point() == false && e[i].is_memory_point()));
            }
        }
    }
}
