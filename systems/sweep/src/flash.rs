//! Transient flash markers shown where sweepers cleared an occupant.

use std::{collections::BTreeMap, time::Duration};

use gridsweep_core::{CellCoord, Event};

/// Flash marker alive at a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlashMarker {
    /// Cell the marker is drawn at.
    pub cell: CellCoord,
    /// Character drawn for the marker.
    pub glyph: char,
    /// Clock reading at which the marker was created.
    pub created_at: Duration,
    /// Lifetime of the marker.
    pub duration: Duration,
}

impl FlashMarker {
    fn expired(&self, now: Duration) -> bool {
        now.saturating_sub(self.created_at) >= self.duration
    }
}

/// Keeps at most one live marker per cell. The map doubles as the live set.
#[derive(Debug, Default)]
pub(crate) struct FlashEmitter {
    live: BTreeMap<CellCoord, FlashMarker>,
}

impl FlashEmitter {
    /// Creates a marker at `cell` unless one is already alive there, and
    /// publishes the matching `FlashRequested` event. Returns whether a marker
    /// was created.
    pub(crate) fn emit(
        &mut self,
        cell: CellCoord,
        glyph: char,
        duration: Duration,
        now: Duration,
        out: &mut Vec<Event>,
    ) -> bool {
        if self.live.contains_key(&cell) {
            return false;
        }
        let _ = self.live.insert(
            cell,
            FlashMarker {
                cell,
                glyph,
                created_at: now,
                duration,
            },
        );
        out.push(Event::FlashRequested {
            cell,
            glyph,
            duration,
        });
        true
    }

    /// Destroys every marker whose age reached its duration. Returns the
    /// number of markers removed.
    pub(crate) fn expire(&mut self, now: Duration) -> usize {
        let before = self.live.len();
        self.live.retain(|_, marker| !marker.expired(now));
        before - self.live.len()
    }

    pub(crate) fn clear(&mut self) {
        self.live.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn snapshot(&self) -> Vec<FlashMarker> {
        self.live.values().copied().collect()
    }
}
