//! Querying entities by component combination and mutating through them.

use archetype_ecs::prelude::*;

#[derive(Clone)]
struct Position {
    x: f32,
    y: f32,
    z: f32,
}

#[derive(Clone)]
struct Velocity {
    x: f32,
    y: f32,
    z: f32,
}

impl_component!(Position, Velocity);

fn main() {
    let mut world = World::new();

    println!("=== Basic Query Iteration Example ===\n");

    println!("Spawning 1000 entities with Position and Velocity...");
    for i in 0..1000 {
        world.create_entity((
            Position { x: i as f32, y: 0.0, z: 0.0 },
            Velocity { x: 0.1, y: 0.0, z: 0.0 },
        ));
    }

    let query = Query::<(Position, Velocity)>::new(&world);
    println!("Spawned {} entities\n", query.count());

    println!("Querying entities with Position and Velocity:");
    for (count, entity) in query.iter().enumerate().take(5) {
        let pos = entity.get::<Position>().unwrap();
        let vel = entity.get::<Velocity>().unwrap();
        let new_x = pos.x + vel.x;
        println!(
            "  Entity {}: Position({:.1}, {:.1}, {:.1}) + Velocity({:.1}, {:.1}, {:.1}) -> New X: {:.1}",
            count + 1,
            pos.x,
            pos.y,
            pos.z,
            vel.x,
            vel.y,
            vel.z,
            new_x
        );
    }
    println!("  ... and {} more entities\n", query.count() - 5);

    println!("Querying entities with Position only:");
    for entity in Query::<(Position,)>::new(&world).iter().take(3) {
        let pos = entity.get::<Position>().unwrap();
        println!("  Position: ({:.1}, {:.1}, {:.1})", pos.x, pos.y, pos.z);
    }

    println!("\n=== Example Complete ===");
}
