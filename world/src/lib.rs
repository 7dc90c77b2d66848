#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative character grid used as the reference sweep host.

mod occupancy;

use std::collections::BTreeMap;

use gridsweep_core::{CellCoord, Command, EntityId, Event, GridHost, OccupantClass};

use crate::occupancy::OccupancyGrid;

const DEFAULT_GRID_COLUMNS: u32 = 80;
const DEFAULT_GRID_ROWS: u32 = 24;

/// Represents the authoritative character grid state.
#[derive(Debug)]
pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    occupancy: OccupancyGrid,
    next_entity: u32,
}

impl World {
    /// Creates an empty world using the default terminal-sized grid.
    #[must_use]
    pub fn new() -> Self {
        Self::with_dimensions(DEFAULT_GRID_COLUMNS, DEFAULT_GRID_ROWS)
    }

    /// Creates an empty world with explicit dimensions.
    #[must_use]
    pub fn with_dimensions(columns: u32, rows: u32) -> Self {
        Self {
            entities: BTreeMap::new(),
            occupancy: OccupancyGrid::new(columns, rows),
            next_entity: 0,
        }
    }

    fn allocate(&mut self, class: OccupantClass, glyph: char) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity = self.next_entity.wrapping_add(1);
        let _ = self.entities.insert(
            id,
            Entity {
                class,
                glyph,
                cell: None,
                protected: false,
            },
        );
        id
    }

    fn release_registration(&mut self, entity: EntityId) {
        let Some(state) = self.entities.get_mut(&entity) else {
            return;
        };
        if let Some(cell) = state.cell.take() {
            self.occupancy.vacate(entity, cell);
        }
    }

    fn cull_unprotected(&mut self) -> usize {
        let doomed: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, entity)| entity.class == OccupantClass::Hazard && !entity.protected)
            .map(|(id, _)| *id)
            .collect();
        for entity in &doomed {
            let _ = self.destroy_entity(*entity);
        }
        doomed.len()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl GridHost for World {
    fn dimensions(&self) -> (u32, u32) {
        self.occupancy.dimensions()
    }

    fn occupant(&self, cell: CellCoord) -> Option<EntityId> {
        self.occupancy.top(cell)
    }

    fn occupants(&self, cell: CellCoord, out: &mut Vec<EntityId>) {
        if let Some(stack) = self.occupancy.stack(cell) {
            out.extend(stack.iter().copied());
        }
    }

    fn spawn_entity(&mut self, class: OccupantClass, glyph: char) -> EntityId {
        self.allocate(class, glyph)
    }

    fn destroy_entity(&mut self, entity: EntityId) -> bool {
        self.release_registration(entity);
        self.entities.remove(&entity).is_some()
    }

    fn place(&mut self, entity: EntityId, cell: CellCoord) -> bool {
        if !self.entities.contains_key(&entity) {
            return false;
        }
        if self.occupancy.index(cell).is_none() {
            return false;
        }
        self.release_registration(entity);
        if !self.occupancy.occupy(entity, cell) {
            return false;
        }
        if let Some(state) = self.entities.get_mut(&entity) {
            state.cell = Some(cell);
        }
        true
    }

    fn move_to(&mut self, entity: EntityId, cell: CellCoord) -> bool {
        match self.entities.get(&entity).and_then(|state| state.cell) {
            Some(current) if current == cell => true,
            Some(_) => self.place(entity, cell),
            None => false,
        }
    }

    fn remove_position(&mut self, entity: EntityId) {
        self.release_registration(entity);
    }

    fn set_protected(&mut self, entity: EntityId, protected: bool) {
        if let Some(state) = self.entities.get_mut(&entity) {
            state.protected = protected;
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureGrid { columns, rows } => {
            world.entities.clear();
            world.occupancy = OccupancyGrid::new(columns, rows);
            out_events.push(Event::GridConfigured { columns, rows });
        }
        Command::PlaceOccupant { cell, class, glyph } => {
            if !cell.within(columns_of(world), rows_of(world)) {
                return;
            }
            let entity = world.allocate(class, glyph);
            if world.place(entity, cell) {
                out_events.push(Event::OccupantPlaced {
                    entity,
                    cell,
                    class,
                });
            } else {
                let _ = world.entities.remove(&entity);
            }
        }
        Command::DestroyEntity { entity } => {
            if world.destroy_entity(entity) {
                out_events.push(Event::EntityDestroyed { entity });
            }
        }
        Command::Cull => {
            let removed = world.cull_unprotected();
            out_events.push(Event::Culled { removed });
        }
    }
}

fn columns_of(world: &World) -> u32 {
    world.occupancy.dimensions().0
}

fn rows_of(world: &World) -> u32 {
    world.occupancy.dimensions().1
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use gridsweep_core::{CellCoord, EntityId, OccupantClass};

    /// Immutable representation of a single entity used for queries.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EntitySnapshot {
        /// Identifier of the entity.
        pub id: EntityId,
        /// Classification of the entity.
        pub class: OccupantClass,
        /// Character drawn for the entity.
        pub glyph: char,
        /// Cell the entity is registered at, if any.
        pub cell: Option<CellCoord>,
        /// Whether the entity is exempt from cull passes.
        pub protected: bool,
    }

    /// Dimensions of the grid as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(world: &World) -> (u32, u32) {
        world.occupancy.dimensions()
    }

    /// Captures a snapshot of a single entity.
    #[must_use]
    pub fn entity(world: &World, id: EntityId) -> Option<EntitySnapshot> {
        world.entities.get(&id).map(|state| EntitySnapshot {
            id,
            class: state.class,
            glyph: state.glyph,
            cell: state.cell,
            protected: state.protected,
        })
    }

    /// Classification of an entity, if it still exists.
    #[must_use]
    pub fn class_of(world: &World, id: EntityId) -> Option<OccupantClass> {
        world.entities.get(&id).map(|state| state.class)
    }

    /// Total number of live entities.
    #[must_use]
    pub fn entity_count(world: &World) -> usize {
        world.entities.len()
    }

    /// Registered entities of the requested class in identifier order.
    #[must_use]
    pub fn occupants_of_class(world: &World, class: OccupantClass) -> Vec<(EntityId, CellCoord)> {
        world
            .entities
            .iter()
            .filter(|(_, state)| state.class == class)
            .filter_map(|(id, state)| state.cell.map(|cell| (*id, cell)))
            .collect()
    }

    /// Renders the topmost glyph of every cell, one string per row. Empty
    /// cells are drawn as `blank`.
    #[must_use]
    pub fn render_rows(world: &World, blank: char) -> Vec<String> {
        let (columns, rows) = world.occupancy.dimensions();
        (0..rows)
            .map(|row| {
                (0..columns)
                    .map(|column| {
                        world
                            .occupancy
                            .top(CellCoord::new(column, row))
                            .and_then(|id| world.entities.get(&id))
                            .map_or(blank, |state| state.glyph)
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
struct Entity {
    class: OccupantClass,
    glyph: char,
    cell: Option<CellCoord>,
    protected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_configures_grid_and_clears_entities() {
        let mut world = World::with_dimensions(4, 4);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::PlaceOccupant {
                cell: CellCoord::new(1, 1),
                class: OccupantClass::Text,
                glyph: 'a',
            },
            &mut events,
        );
        assert_eq!(query::entity_count(&world), 1);

        events.clear();
        apply(
            &mut world,
            Command::ConfigureGrid {
                columns: 12,
                rows: 8,
            },
            &mut events,
        );

        assert_eq!(query::dimensions(&world), (12, 8));
        assert_eq!(query::entity_count(&world), 0);
        assert_eq!(
            events,
            vec![Event::GridConfigured {
                columns: 12,
                rows: 8
            }]
        );
    }

    #[test]
    fn placement_outside_grid_is_ignored() {
        let mut world = World::with_dimensions(3, 3);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::PlaceOccupant {
                cell: CellCoord::new(3, 0),
                class: OccupantClass::Hazard,
                glyph: '#',
            },
            &mut events,
        );
        assert!(events.is_empty());
        assert_eq!(query::entity_count(&world), 0);
    }

    #[test]
    fn destroying_missing_entity_is_a_no_op() {
        let mut world = World::with_dimensions(3, 3);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::DestroyEntity {
                entity: EntityId::new(9),
            },
            &mut events,
        );
        assert!(events.is_empty());
        assert!(!world.destroy_entity(EntityId::new(9)));
    }

    #[test]
    fn move_to_relocates_registration() {
        let mut world = World::with_dimensions(5, 1);
        let entity = world.spawn_entity(OccupantClass::Sweeper, '=');
        assert!(!world.move_to(entity, CellCoord::new(1, 0)));
        assert!(world.place(entity, CellCoord::new(0, 0)));
        assert!(world.move_to(entity, CellCoord::new(3, 0)));
        assert_eq!(world.occupant(CellCoord::new(0, 0)), None);
        assert_eq!(world.occupant(CellCoord::new(3, 0)), Some(entity));
        assert!(!world.move_to(entity, CellCoord::new(5, 0)));
    }

    #[test]
    fn render_rows_draws_topmost_glyph() {
        let mut world = World::with_dimensions(3, 2);
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::PlaceOccupant {
                cell: CellCoord::new(1, 0),
                class: OccupantClass::Hazard,
                glyph: '#',
            },
            &mut events,
        );
        let sweeper = world.spawn_entity(OccupantClass::Sweeper, '=');
        assert!(world.place(sweeper, CellCoord::new(1, 0)));

        assert_eq!(
            query::render_rows(&world, '.'),
            vec![".=.".to_owned(), "...".to_owned()]
        );
    }
}
