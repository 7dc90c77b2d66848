//! Per-sweeper physics state.

use gridsweep_core::{CellCoord, Direction, EntityId, SweeperId};

use crate::trail::TrailRing;

/// Distance in cells within which a sweeper counts as arrived. Absorbs the
/// nanosecond rounding of tick durations accumulated over a full crossing.
const ARRIVAL_TOLERANCE: f64 = 1e-3;

/// Continuous position or velocity expressed in cell units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellPoint {
    /// Horizontal component; column `n` spans `n..n + 1`.
    pub x: f64,
    /// Vertical component; row `n` spans `n..n + 1`.
    pub y: f64,
}

impl CellPoint {
    /// Creates a new point from its components.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Initial placement of a sweeper decided when a wave is planned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SpawnPlan {
    pub(crate) direction: Direction,
    /// Row for horizontal sweepers, column for vertical ones.
    pub(crate) lane: u32,
    /// Starting coordinate on the travel axis.
    pub(crate) start: f64,
    /// Coordinate on the travel axis at which the sweeper retires.
    pub(crate) target: f64,
    /// Speed in cells per second.
    pub(crate) speed: f64,
}

#[derive(Debug)]
pub(crate) struct SweepAgent {
    pub(crate) id: SweeperId,
    pub(crate) entity: EntityId,
    pub(crate) direction: Direction,
    pub(crate) position: CellPoint,
    pub(crate) velocity: CellPoint,
    pub(crate) target: f64,
    pub(crate) glyph: char,
    pub(crate) trail: TrailRing,
}

impl SweepAgent {
    pub(crate) fn new(
        id: SweeperId,
        entity: EntityId,
        plan: SpawnPlan,
        glyph: char,
        trail: TrailRing,
    ) -> Self {
        let lane = f64::from(plan.lane);
        let step = plan.direction.sign() * plan.speed;
        let (position, velocity) = if plan.direction.is_horizontal() {
            (CellPoint::new(plan.start, lane), CellPoint::new(step, 0.0))
        } else {
            (CellPoint::new(lane, plan.start), CellPoint::new(0.0, step))
        };
        Self {
            id,
            entity,
            direction: plan.direction,
            position,
            velocity,
            target: plan.target,
            glyph,
            trail,
        }
    }

    /// Coordinate on the travel axis.
    pub(crate) fn travel(&self) -> f64 {
        if self.direction.is_horizontal() {
            self.position.x
        } else {
            self.position.y
        }
    }

    fn travel_velocity(&self) -> f64 {
        if self.direction.is_horizontal() {
            self.velocity.x
        } else {
            self.velocity.y
        }
    }

    /// Fixed coordinate on the axis perpendicular to travel.
    pub(crate) fn lane(&self) -> u32 {
        let lane = if self.direction.is_horizontal() {
            self.position.y
        } else {
            self.position.x
        };
        lane.max(0.0) as u32
    }

    /// Integrates the position over `dt_secs` and returns the travel-axis
    /// coordinates before and after the move. An arriving sweeper is snapped
    /// onto its target so the final move covers the target cell.
    pub(crate) fn integrate(&mut self, dt_secs: f64) -> (f64, f64) {
        let from = self.travel();
        self.position.x += self.velocity.x * dt_secs;
        self.position.y += self.velocity.y * dt_secs;
        if self.reached_target() {
            if self.direction.is_horizontal() {
                self.position.x = self.target;
            } else {
                self.position.y = self.target;
            }
        }
        (from, self.travel())
    }

    /// Positive motion finishes at `>= target`, negative motion at `<= target`,
    /// both within [`ARRIVAL_TOLERANCE`].
    pub(crate) fn reached_target(&self) -> bool {
        let velocity = self.travel_velocity();
        if velocity > 0.0 {
            self.travel() >= self.target - ARRIVAL_TOLERANCE
        } else if velocity < 0.0 {
            self.travel() <= self.target + ARRIVAL_TOLERANCE
        } else {
            true
        }
    }

    /// Cell for a travel-axis index on this sweeper's lane.
    pub(crate) fn cell_at(&self, index: u32) -> CellCoord {
        if self.direction.is_horizontal() {
            CellCoord::new(index, self.lane())
        } else {
            CellCoord::new(self.lane(), index)
        }
    }

    /// Rounded grid cell, or `None` while the sweeper is outside the grid.
    pub(crate) fn grid_cell(&self, columns: u32, rows: u32) -> Option<CellCoord> {
        let x = self.position.x.round();
        let y = self.position.y.round();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let cell = CellCoord::new(x as u32, y as u32);
        cell.within(columns, rows).then_some(cell)
    }

    /// Rounded grid cell clamped into the grid, used for the occupancy
    /// registration so the sweeper always has exactly one.
    pub(crate) fn registration_cell(&self, columns: u32, rows: u32) -> CellCoord {
        let clamp = |value: f64, extent: u32| -> u32 {
            let last = f64::from(extent.saturating_sub(1));
            value.round().clamp(0.0, last) as u32
        };
        CellCoord::new(clamp(self.position.x, columns), clamp(self.position.y, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trail::TrailPool;

    fn agent(plan: SpawnPlan) -> SweepAgent {
        let mut pool = TrailPool::new(4, 1);
        SweepAgent::new(SweeperId::new(0), EntityId::new(0), plan, '=', pool.acquire())
    }

    #[test]
    fn eastbound_agent_finishes_at_or_past_target() {
        let mut agent = agent(SpawnPlan {
            direction: Direction::East,
            lane: 5,
            start: -1.0,
            target: 79.0,
            speed: 40.0,
        });
        assert_eq!(agent.velocity, CellPoint::new(40.0, 0.0));
        assert_eq!(agent.integrate(0.25), (-1.0, 9.0));
        assert!(!agent.reached_target());
        agent.position.x = 79.0;
        assert!(agent.reached_target());
    }

    #[test]
    fn northbound_agent_uses_less_or_equal_comparator() {
        let mut agent = agent(SpawnPlan {
            direction: Direction::North,
            lane: 3,
            start: 6.0,
            target: 0.0,
            speed: 12.0,
        });
        assert_eq!(agent.integrate(0.25), (6.0, 3.0));
        assert!(!agent.reached_target());
        assert_eq!(agent.integrate(0.5), (3.0, 0.0));
        assert!(agent.reached_target());
        assert_eq!(agent.cell_at(2), CellCoord::new(3, 2));
    }

    #[test]
    fn rounding_shortfall_still_arrives_on_target() {
        let mut agent = agent(SpawnPlan {
            direction: Direction::East,
            lane: 5,
            start: -1.0,
            target: 79.0,
            speed: 80.0,
        });
        let dt = std::time::Duration::from_secs(1) / 60;
        let mut last = (0.0, 0.0);
        for _ in 0..60 {
            assert!(!agent.reached_target());
            last = agent.integrate(dt.as_secs_f64());
        }
        assert!(agent.reached_target());
        assert_eq!(last.1, 79.0);
        assert!(last.0 < 79.0);
    }

    #[test]
    fn off_grid_agent_registers_at_nearest_edge() {
        let agent = agent(SpawnPlan {
            direction: Direction::West,
            lane: 2,
            start: 80.0,
            target: 0.0,
            speed: 40.0,
        });
        assert_eq!(agent.grid_cell(80, 24), None);
        assert_eq!(agent.registration_cell(80, 24), CellCoord::new(79, 2));
    }
}
