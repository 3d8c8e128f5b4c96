//! Plugins registering systems into named schedules, and duplicate
//! rejection for `is_unique` plugins.

use archetype_ecs::prelude::*;

struct RenderPlugin;
impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        println!("  Setting up {}...", self.name());
        let system = render_frame.into_system();
        let (schedules, world) = app.schedules_and_world_mut();
        schedules.schedule_mut("Render").unwrap().add(system, world);
    }
}

struct PhysicsPlugin;
impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        println!("  Setting up {}...", self.name());
        let system = step_physics.into_system();
        let (schedules, world) = app.schedules_and_world_mut();
        schedules.schedule_mut("Update").unwrap().add(system, world);
    }
}

fn render_frame(_commands: &mut Commands<'_>) -> Result<()> {
    println!("  Rendering frame...");
    Ok(())
}

fn step_physics(_commands: &mut Commands<'_>) -> Result<()> {
    println!("  Updating physics...");
    Ok(())
}

fn main() {
    println!("=== Plugin System Example ===\n");

    let mut app = App::default();
    app.add_plugin(RenderPlugin).unwrap();
    app.add_plugin(PhysicsPlugin).unwrap();

    // A second RenderPlugin is rejected: it's `is_unique` by default.
    assert!(app.add_plugin(RenderPlugin).is_err());

    println!("\n=== Running Application ===");
    for frame in 1..=3 {
        println!("\n--- Frame {frame} ---");
        if let Err(e) = app.step() {
            println!("Error running frame {frame}: {e:?}");
            break;
        }
    }

    println!("\n=== Example Complete ===");
}
