//! Pooled ring buffers remembering the cells each sweeper visited.
//!
//! Trails are purely cosmetic. Every ring has the same fixed capacity, so the
//! pool keeps a preallocated array of slots plus a free-index list and never
//! allocates once enough slots exist for the largest wave seen so far.

use std::time::Duration;

use gridsweep_core::CellCoord;

/// Number of slots allocated up front when the wave size is unbounded.
const DEFAULT_PREALLOCATED_SLOTS: usize = 32;

/// Trail cell exposed to renderers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrailPoint {
    /// Cell the sweeper passed through.
    pub cell: CellCoord,
    /// Remaining brightness in `0.0..=1.0`; newest cells are brightest.
    pub intensity: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TrailEntry {
    cell: CellCoord,
    visited_at: Duration,
}

/// Handle to one ring inside a [`TrailPool`].
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TrailRing {
    slot: usize,
    head: usize,
    len: usize,
    last: Option<CellCoord>,
}

impl TrailRing {
    /// Number of cells currently remembered.
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

#[derive(Debug)]
pub(crate) struct TrailPool {
    capacity: usize,
    slots: Vec<Box<[Option<TrailEntry>]>>,
    free: Vec<usize>,
}

impl TrailPool {
    /// Creates a pool of rings holding `capacity` cells each.
    pub(crate) fn new(capacity: usize, expected_agents: usize) -> Self {
        let capacity = capacity.max(1);
        let preallocated = if expected_agents == 0 {
            DEFAULT_PREALLOCATED_SLOTS
        } else {
            expected_agents
        };
        let slots: Vec<Box<[Option<TrailEntry>]>> = (0..preallocated)
            .map(|_| vec![None; capacity].into_boxed_slice())
            .collect();
        let free = (0..preallocated).rev().collect();
        Self {
            capacity,
            slots,
            free,
        }
    }

    /// Cells remembered per ring.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Rings currently handed out.
    pub(crate) fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Hands out an empty ring, growing the pool only when every slot is taken.
    pub(crate) fn acquire(&mut self) -> TrailRing {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots
                    .push(vec![None; self.capacity].into_boxed_slice());
                self.slots.len() - 1
            }
        };
        if let Some(storage) = self.slots.get_mut(slot) {
            storage.fill(None);
        }
        TrailRing {
            slot,
            head: 0,
            len: 0,
            last: None,
        }
    }

    /// Returns the ring's storage to the free list.
    pub(crate) fn release(&mut self, ring: TrailRing) {
        if ring.slot < self.slots.len() && !self.free.contains(&ring.slot) {
            self.free.push(ring.slot);
        }
    }

    /// Records `cell` when it differs from the most recent entry, overwriting
    /// the oldest entry once the ring is full. Returns whether the ring changed.
    pub(crate) fn record(&mut self, ring: &mut TrailRing, cell: CellCoord, now: Duration) -> bool {
        if ring.last == Some(cell) {
            return false;
        }
        let Some(storage) = self.slots.get_mut(ring.slot) else {
            return false;
        };
        storage[ring.head] = Some(TrailEntry {
            cell,
            visited_at: now,
        });
        ring.head = (ring.head + 1) % self.capacity;
        ring.len = (ring.len + 1).min(self.capacity);
        ring.last = Some(cell);
        true
    }

    /// Visible trail cells, newest first. Cells older than `fade` are omitted.
    pub(crate) fn points(&self, ring: &TrailRing, now: Duration, fade: Duration) -> Vec<TrailPoint> {
        let Some(storage) = self.slots.get(ring.slot) else {
            return Vec::new();
        };
        let mut points = Vec::with_capacity(ring.len());
        for offset in 1..=ring.len() {
            let index = (ring.head + self.capacity - offset) % self.capacity;
            let Some(entry) = storage[index] else {
                continue;
            };
            let age = now.saturating_sub(entry.visited_at);
            let intensity = if fade.is_zero() {
                1.0
            } else if age >= fade {
                continue;
            } else {
                1.0 - (age.as_secs_f32() / fade.as_secs_f32())
            };
            points.push(TrailPoint {
                cell: entry.cell,
                intensity,
            });
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(column: u32) -> CellCoord {
        CellCoord::new(column, 0)
    }

    #[test]
    fn ring_never_exceeds_capacity() {
        let mut pool = TrailPool::new(3, 1);
        let mut ring = pool.acquire();
        for column in 0..10 {
            assert!(pool.record(&mut ring, cell(column), Duration::ZERO));
            assert!(ring.len() <= pool.capacity());
        }
        let cells: Vec<CellCoord> = pool
            .points(&ring, Duration::ZERO, Duration::from_secs(1))
            .into_iter()
            .map(|point| point.cell)
            .collect();
        assert_eq!(cells, vec![cell(9), cell(8), cell(7)]);
    }

    #[test]
    fn repeated_cell_does_not_advance() {
        let mut pool = TrailPool::new(4, 1);
        let mut ring = pool.acquire();
        assert!(pool.record(&mut ring, cell(2), Duration::ZERO));
        assert!(!pool.record(&mut ring, cell(2), Duration::from_millis(5)));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn points_fade_with_age() {
        let mut pool = TrailPool::new(4, 1);
        let mut ring = pool.acquire();
        let fade = Duration::from_millis(400);
        assert!(pool.record(&mut ring, cell(0), Duration::ZERO));
        assert!(pool.record(&mut ring, cell(1), Duration::from_millis(200)));

        let points = pool.points(&ring, Duration::from_millis(300), fade);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].cell, cell(1));
        assert!((points[0].intensity - 0.75).abs() < 1e-6);
        assert!((points[1].intensity - 0.25).abs() < 1e-6);

        let points = pool.points(&ring, Duration::from_millis(500), fade);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].cell, cell(1));
    }

    #[test]
    fn released_slots_are_reused_without_growth() {
        let mut pool = TrailPool::new(2, 2);
        let first = pool.acquire();
        let second = pool.acquire();
        assert_eq!(pool.in_use(), 2);
        pool.release(first);
        pool.release(second);
        assert_eq!(pool.in_use(), 0);

        let mut reused = pool.acquire();
        assert_eq!(reused.len(), 0);
        assert!(pool
            .points(&reused, Duration::ZERO, Duration::from_secs(1))
            .is_empty());
        assert!(pool.record(&mut reused, cell(4), Duration::ZERO));
        assert_eq!(pool.slots.len(), 2);
    }
}
