use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Duration,
};

use gridsweep_core::{
    CellCoord, Command, EntityId, Event, Generation, ManualClock, OccupantClass, SweepScope,
};
use gridsweep_system_sweep::{SweepConfig, SweepCoordinator};
use gridsweep_world::{self as world, query, World};
use parking_lot::Mutex;

const FRAME: Duration = Duration::from_millis(40);

#[test]
fn deterministic_replay_produces_identical_history() {
    let first = replay(scripted_commands());
    let second = replay(scripted_commands());

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.completions(), 2, "both scripted waves complete");
    assert!(
        first.frames.last().is_some_and(|frame| !frame.contains('#')),
        "every hazard is cleared"
    );
}

fn scripted_commands() -> Vec<Command> {
    let mut commands = Vec::new();
    for (index, row) in [1u32, 2, 4, 5, 7].into_iter().enumerate() {
        let column = (index as u32 * 7 + row * 3) % 24;
        commands.push(Command::PlaceOccupant {
            cell: CellCoord::new(column, row),
            class: OccupantClass::Hazard,
            glyph: '#',
        });
        commands.push(Command::PlaceOccupant {
            cell: CellCoord::new((column + 5) % 24, row),
            class: OccupantClass::Text,
            glyph: 't',
        });
    }
    commands.push(Command::PlaceOccupant {
        cell: CellCoord::new(12, 0),
        class: OccupantClass::Hazard,
        glyph: '#',
    });
    commands
}

fn replay(commands: Vec<Command>) -> ReplayOutcome {
    let mut host = World::with_dimensions(24, 8);
    let mut log = Vec::new();
    for command in commands {
        let mut events = Vec::new();
        world::apply(&mut host, command, &mut events);
        log.extend(events.iter().map(EventRecord::from));
    }

    let clock = ManualClock::new();
    let config = SweepConfig {
        animation_duration_ms: 600,
        trail_length: 4,
        ..SweepConfig::default()
    };
    let sweep = SweepCoordinator::new(
        Arc::new(Mutex::new(host)),
        |world: &World, entity: EntityId| {
            query::class_of(world, entity) == Some(OccupantClass::Hazard)
        },
        Arc::new(clock.clone()),
        config,
    )
    .expect("valid configuration");

    let mut frames = Vec::new();
    let first = Generation::new(1);
    let requests = [
        (0, SweepScope::FullGrid, first),
        (
            40,
            SweepScope::Radial {
                origin: CellCoord::new(12, 3),
            },
            first.next(),
        ),
    ];

    for frame in 0..80 {
        for (at, scope, generation) in requests {
            if at == frame {
                let _ = sweep.request_sweep(scope, generation);
            }
        }
        clock.advance(FRAME);
        sweep.update(FRAME);

        let mut events = Vec::new();
        sweep.drain_events(&mut events);
        log.extend(events.iter().map(EventRecord::from));
        frames.push(query::render_rows(&sweep.host().lock(), '.').join("\n"));
    }
    sweep.shutdown();

    ReplayOutcome { frames, events: log }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    frames: Vec<String>,
    events: Vec<EventRecord>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    fn completions(&self) -> usize {
        self.events
            .iter()
            .filter(|record| matches!(record, EventRecord::Completed { .. }))
            .count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum EventRecord {
    Placed { entity: u32, column: u32, row: u32 },
    Spawned { sweeper: u32, column: u32, row: u32 },
    Cleared { sweeper: u32, entity: u32 },
    Flashed { column: u32, row: u32 },
    Finished { sweeper: u32 },
    Completed { generation: u64, agents: usize },
    Other(String),
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        match event {
            Event::OccupantPlaced { entity, cell, .. } => Self::Placed {
                entity: entity.get(),
                column: cell.column(),
                row: cell.row(),
            },
            Event::SweeperSpawned { sweeper, cell, .. } => Self::Spawned {
                sweeper: sweeper.get(),
                column: cell.column(),
                row: cell.row(),
            },
            Event::TargetCleared {
                sweeper, entity, ..
            } => Self::Cleared {
                sweeper: sweeper.get(),
                entity: entity.get(),
            },
            Event::FlashRequested { cell, .. } => Self::Flashed {
                column: cell.column(),
                row: cell.row(),
            },
            Event::SweeperFinished { sweeper } => Self::Finished {
                sweeper: sweeper.get(),
            },
            Event::SweepCompleted {
                generation,
                agents_spawned,
            } => Self::Completed {
                generation: generation.get(),
                agents: *agents_spawned,
            },
            other => Self::Other(format!("{other:?}")),
        }
    }
}
