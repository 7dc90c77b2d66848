#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the gridsweep workspace.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative character grid, and the sweep system. Adapters submit
//! [`Command`] values describing desired grid mutations, the world executes
//! those commands via its `apply` entry point, and broadcasts [`Event`] values
//! for systems to react to. The sweep system reaches the grid exclusively
//! through the [`GridHost`] boundary, selects its victims through an injected
//! [`Classifier`], and reads time from an injected [`Clock`].

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Broad classification assigned to every occupant of the character grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OccupantClass {
    /// Regular text characters that players interact with.
    Text,
    /// Hazard characters that sweeps are typically configured to clear.
    Hazard,
    /// Transient sweeper registrations owned by the sweep system.
    Sweeper,
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Resizes the character grid, discarding every occupant.
    ConfigureGrid {
        /// Number of columns laid out in the grid.
        columns: u32,
        /// Number of rows laid out in the grid.
        rows: u32,
    },
    /// Creates a new occupant and registers it at the provided cell.
    PlaceOccupant {
        /// Cell that receives the occupant.
        cell: CellCoord,
        /// Classification applied to the occupant.
        class: OccupantClass,
        /// Character drawn for the occupant.
        glyph: char,
    },
    /// Destroys an entity and releases its grid registration.
    DestroyEntity {
        /// Identifier of the entity to destroy.
        entity: EntityId,
    },
    /// Runs the generic cull pass that drains unprotected hazards.
    Cull,
}

/// Events broadcast by the world and by the sweep system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Confirms that the grid was resized.
    GridConfigured {
        /// Number of columns in the grid.
        columns: u32,
        /// Number of rows in the grid.
        rows: u32,
    },
    /// Confirms that an occupant was created.
    OccupantPlaced {
        /// Identifier allocated to the occupant.
        entity: EntityId,
        /// Cell the occupant was registered at.
        cell: CellCoord,
        /// Classification of the occupant.
        class: OccupantClass,
    },
    /// Confirms that an entity was destroyed.
    EntityDestroyed {
        /// Identifier of the destroyed entity.
        entity: EntityId,
    },
    /// Reports the outcome of a cull pass.
    Culled {
        /// Number of entities removed by the pass.
        removed: usize,
    },
    /// Asks the sweep system to start a new wave.
    SweepRequested {
        /// Origin of a radial wave; `None` requests a full-grid row sweep.
        origin: Option<CellCoord>,
        /// Monotonic tag used to collapse duplicate requests.
        generation: Generation,
    },
    /// Announces that a sweeper entered the grid.
    SweeperSpawned {
        /// Identifier of the sweeper.
        sweeper: SweeperId,
        /// Cell the sweeper is registered at when spawned.
        cell: CellCoord,
        /// Direction of travel.
        direction: Direction,
    },
    /// Announces that a sweeper cleared an occupant.
    TargetCleared {
        /// Sweeper responsible for the removal.
        sweeper: SweeperId,
        /// Entity that was removed.
        entity: EntityId,
        /// Cell the entity occupied.
        cell: CellCoord,
    },
    /// Announces that a sweeper reached its target and left the grid.
    SweeperFinished {
        /// Identifier of the sweeper.
        sweeper: SweeperId,
    },
    /// Asks renderers to display a transient flash at a cell.
    FlashRequested {
        /// Cell that should flash.
        cell: CellCoord,
        /// Character drawn for the flash.
        glyph: char,
        /// How long the flash remains visible.
        duration: Duration,
    },
    /// Announces that a sweep wave ended. Emitted exactly once per wave.
    SweepCompleted {
        /// Generation tag of the request that started the wave.
        generation: Generation,
        /// Number of sweepers spawned by the wave; zero for phantom waves.
        agents_spawned: usize,
    },
}

/// Cardinal travel directions available to sweepers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Movement toward decreasing row indices.
    North,
    /// Movement toward increasing column indices.
    East,
    /// Movement toward increasing row indices.
    South,
    /// Movement toward decreasing column indices.
    West,
}

impl Direction {
    /// All four directions in the order radial waves spawn them.
    pub const RADIAL: [Direction; 4] = [
        Direction::East,
        Direction::West,
        Direction::South,
        Direction::North,
    ];

    /// Reports whether the direction travels along the column axis.
    #[must_use]
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Self::East | Self::West)
    }

    /// Unit step along the travel axis, `1.0` or `-1.0`.
    #[must_use]
    pub const fn sign(self) -> f64 {
        match self {
            Self::East | Self::South => 1.0,
            Self::West | Self::North => -1.0,
        }
    }
}

/// Extent of a requested sweep wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SweepScope {
    /// One sweeper per row holding a target occupant.
    FullGrid,
    /// Four sweepers leaving the origin along the cardinal directions.
    Radial {
        /// Cell the sweepers start from.
        origin: CellCoord,
    },
}

impl SweepScope {
    /// Derives the scope carried by a `SweepRequested` event.
    #[must_use]
    pub const fn from_origin(origin: Option<CellCoord>) -> Self {
        match origin {
            Some(origin) => Self::Radial { origin },
            None => Self::FullGrid,
        }
    }
}

/// Monotonic generation tag attached to sweep requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    /// Creates a new generation tag.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric value of the tag.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Returns the tag that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Unique identifier assigned to a grid entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a sweeper by the sweep system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SweeperId(u32);

impl SweeperId {
    /// Creates a new sweeper identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Reports whether the cell lies inside a grid of the given dimensions.
    #[must_use]
    pub const fn within(&self, columns: u32, rows: u32) -> bool {
        self.column < columns && self.row < rows
    }
}

/// Spatial and lifecycle surface the sweep system consumes from its host.
///
/// Cells may hold several registrations at once: a sweeper's own registration
/// briefly shares a cell with the occupant it is about to clear, which is why
/// [`GridHost::occupants`] exists alongside [`GridHost::occupant`].
pub trait GridHost {
    /// Number of columns and rows in the grid.
    fn dimensions(&self) -> (u32, u32);

    /// Topmost entity registered at the cell, if any.
    fn occupant(&self, cell: CellCoord) -> Option<EntityId>;

    /// Appends every entity registered at the cell to `out`.
    fn occupants(&self, cell: CellCoord, out: &mut Vec<EntityId>);

    /// Creates an unregistered entity.
    fn spawn_entity(&mut self, class: OccupantClass, glyph: char) -> EntityId;

    /// Destroys the entity and its registration. Returns `false` when the
    /// entity no longer exists.
    fn destroy_entity(&mut self, entity: EntityId) -> bool;

    /// Registers the entity at a cell. Returns `false` when the entity is
    /// unknown or the cell lies outside the grid.
    fn place(&mut self, entity: EntityId, cell: CellCoord) -> bool;

    /// Moves an existing registration. Returns `false` when the entity is
    /// unknown or the cell lies outside the grid.
    fn move_to(&mut self, entity: EntityId, cell: CellCoord) -> bool;

    /// Drops the entity's registration without destroying the entity.
    fn remove_position(&mut self, entity: EntityId);

    /// Exempts the entity from unrelated cull and drain passes while set.
    fn set_protected(&mut self, entity: EntityId, protected: bool);
}

/// Predicate selecting which occupants a sweeper destroys.
pub trait Classifier<H: ?Sized>: Send + Sync {
    /// Reports whether the entity belongs to the target classification.
    fn matches(&self, host: &H, entity: EntityId) -> bool;
}

impl<H, F> Classifier<H> for F
where
    H: ?Sized,
    F: Fn(&H, EntityId) -> bool + Send + Sync,
{
    fn matches(&self, host: &H, entity: EntityId) -> bool {
        self(host, entity)
    }
}

/// Injected time source. Readings are offsets from an arbitrary epoch.
pub trait Clock: Send + Sync {
    /// Current reading of the clock.
    fn now(&self) -> Duration;
}

/// Monotonic wall-clock time source.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose epoch is the moment of construction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Simulated clock advanced explicitly by its owner.
///
/// Clones share the same reading, so a test can keep one handle while the
/// sweep system holds another.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `dt`.
    pub fn advance(&self, dt: Duration) {
        let mut now = self.now.lock();
        *now = now.saturating_add(dt);
    }

    /// Sets the clock to an absolute reading.
    pub fn set(&self, reading: Duration) {
        *self.now.lock() = reading;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CellCoord, Classifier, Clock, Direction, EntityId, Generation, ManualClock, SweepScope,
    };
    use std::time::Duration;

    #[test]
    fn cell_within_respects_exclusive_bounds() {
        assert!(CellCoord::new(0, 0).within(1, 1));
        assert!(CellCoord::new(79, 23).within(80, 24));
        assert!(!CellCoord::new(80, 0).within(80, 24));
        assert!(!CellCoord::new(0, 24).within(80, 24));
    }

    #[test]
    fn scope_follows_event_origin() {
        assert_eq!(SweepScope::from_origin(None), SweepScope::FullGrid);
        let origin = CellCoord::new(3, 4);
        assert_eq!(
            SweepScope::from_origin(Some(origin)),
            SweepScope::Radial { origin }
        );
    }

    #[test]
    fn direction_signs_match_axes() {
        assert!(Direction::East.is_horizontal());
        assert!(Direction::West.is_horizontal());
        assert!(!Direction::North.is_horizontal());
        assert!((Direction::East.sign() - 1.0).abs() < f64::EPSILON);
        assert!((Direction::North.sign() + 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn manual_clock_clones_share_reading() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(250));
        clock.set(Duration::from_secs(3));
        assert_eq!(handle.now(), Duration::from_secs(3));
    }

    #[test]
    fn closures_act_as_classifiers() {
        let even = |_: &(), entity: EntityId| entity.get() % 2 == 0;
        assert!(even.matches(&(), EntityId::new(4)));
        assert!(!even.matches(&(), EntityId::new(5)));
    }

    #[test]
    fn entity_id_round_trips_through_bincode() {
        let entity = EntityId::new(42);
        let bytes = bincode::serialize(&entity).expect("serialize");
        let restored: EntityId = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, entity);
        assert_eq!(Generation::new(7).next(), Generation::new(8));
    }
}
