use gridsweep_core::{CellCoord, Command, Event, GridHost, OccupantClass};
use gridsweep_world::{self as world, query, World};

#[test]
fn cull_spares_protected_entities() {
    let mut world = World::with_dimensions(6, 2);
    let mut events = Vec::new();
    for column in 0..3 {
        world::apply(
            &mut world,
            Command::PlaceOccupant {
                cell: CellCoord::new(column, 0),
                class: OccupantClass::Hazard,
                glyph: '#',
            },
            &mut events,
        );
    }
    world::apply(
        &mut world,
        Command::PlaceOccupant {
            cell: CellCoord::new(4, 1),
            class: OccupantClass::Text,
            glyph: 'k',
        },
        &mut events,
    );

    let shielded = query::occupants_of_class(&world, OccupantClass::Hazard)[0].0;
    world.set_protected(shielded, true);

    events.clear();
    world::apply(&mut world, Command::Cull, &mut events);

    assert_eq!(events, vec![Event::Culled { removed: 2 }]);
    let remaining = query::occupants_of_class(&world, OccupantClass::Hazard);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].0, shielded);
    assert!(query::entity(&world, shielded).is_some_and(|entity| entity.protected));
    assert_eq!(query::occupants_of_class(&world, OccupantClass::Text).len(), 1);
}

#[test]
fn shared_cells_list_every_registration() {
    let mut world = World::with_dimensions(4, 4);
    let mut events = Vec::new();
    let cell = CellCoord::new(2, 3);
    world::apply(
        &mut world,
        Command::PlaceOccupant {
            cell,
            class: OccupantClass::Hazard,
            glyph: '#',
        },
        &mut events,
    );
    let sweeper = world.spawn_entity(OccupantClass::Sweeper, '=');
    assert!(world.place(sweeper, cell));

    let mut occupants = Vec::new();
    world.occupants(cell, &mut occupants);
    assert_eq!(occupants.len(), 2);
    assert_eq!(world.occupant(cell), Some(sweeper));

    world.remove_position(sweeper);
    occupants.clear();
    world.occupants(cell, &mut occupants);
    assert_eq!(occupants.len(), 1);
    assert_eq!(query::class_of(&world, occupants[0]), Some(OccupantClass::Hazard));
}
