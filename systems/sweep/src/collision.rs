//! Swept-segment collision between sweepers and grid occupants.
//!
//! Sweepers routinely cover more than one cell per tick, so the scanner tests
//! every cell between the start and end of a move rather than only the
//! destination.

use std::ops::RangeInclusive;

use gridsweep_core::{CellCoord, Classifier, EntityId, GridHost};

use crate::agent::SweepAgent;

/// Target occupant found inside a swept range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Hit {
    pub(crate) cell: CellCoord,
    pub(crate) entity: EntityId,
}

/// Travel-axis cell indices covered by a move from `from` to `to`, clamped to
/// `0..extent`. Both endpoints are inclusive; `None` when the move lies
/// entirely outside the grid.
pub(crate) fn swept_span(from: f64, to: f64, extent: u32) -> Option<RangeInclusive<u32>> {
    if extent == 0 || !from.is_finite() || !to.is_finite() {
        return None;
    }
    let low = from.min(to).floor();
    let high = from.max(to).floor();
    let last = f64::from(extent - 1);
    if high < 0.0 || low > last {
        return None;
    }
    Some(low.max(0.0) as u32..=high.min(last) as u32)
}

/// Reusable scratch buffers for collision scans.
#[derive(Debug, Default)]
pub(crate) struct CollisionScanner {
    occupants: Vec<EntityId>,
    hits: Vec<Hit>,
}

impl CollisionScanner {
    /// Collects every target occupant inside `span` on the agent's lane.
    ///
    /// Empty cells and the agent's own registration are skipped. Cells
    /// already cleared by an earlier scan in the same tick are simply empty.
    pub(crate) fn scan<H>(
        &mut self,
        host: &H,
        classifier: &dyn Classifier<H>,
        agent: &SweepAgent,
        span: RangeInclusive<u32>,
    ) -> &[Hit]
    where
        H: GridHost + ?Sized,
    {
        self.hits.clear();
        for index in span {
            let cell = agent.cell_at(index);
            if host.occupant(cell).is_none() {
                continue;
            }
            self.occupants.clear();
            host.occupants(cell, &mut self.occupants);
            for entity in self.occupants.iter().copied() {
                if entity == agent.entity {
                    continue;
                }
                if classifier.matches(host, entity) {
                    self.hits.push(Hit { cell, entity });
                }
            }
        }
        &self.hits
    }
}
