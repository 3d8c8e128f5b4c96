//! Basic world usage: spawning entities, reading components, querying.

use archetype_ecs::prelude::*;

#[derive(Debug)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug)]
struct Velocity {
    x: f32,
    y: f32,
}

impl_component!(Position, Velocity);

fn main() {
    println!("=== Basic ECS Example ===");

    let mut world = World::new();

    println!("Spawning entities...");
    for i in 0..10 {
        world.create_entity((
            Position { x: i as f32, y: i as f32 },
            Velocity { x: 0.1, y: 0.0 },
        ));
    }

    let count = Query::<(Position,)>::new(&world).count();
    println!("Found {count} entities with Position");

    let first_id = Query::<(Position,)>::new(&world).first().unwrap().id();
    world.remove_entity(first_id).unwrap();
    println!("Despawned one entity");

    println!("=== Example Complete ===");
}
