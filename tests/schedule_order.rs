//! The default schedule skeleton runs in `Startup -> BeginFrame -> Update ->
//! Render -> EndFrame -> Shutdown` order across one `run()` pass.

use archetype_ecs::prelude::*;

struct Log(Vec<&'static str>);

macro_rules! logging_system {
    ($name:ident, $label:literal) => {
        fn $name(_c: &mut Commands<'_>, mut log: ResMut<'_, Log>) -> Result<()> {
            log.0.push($label);
            Ok(())
        }
    };
}

logging_system!(log_startup, "startup");
logging_system!(log_begin, "begin");
logging_system!(log_update, "update");
logging_system!(log_render, "render");
logging_system!(log_end, "end");

fn log_shutdown(_c: &mut Commands<'_>, mut log: ResMut<'_, Log>) -> Result<()> {
    log.0.push("shutdown");
    Ok(())
}

fn request_exit(commands: &mut Commands<'_>) -> Result<()> {
    commands.insert_resource(Exit { code: 0 });
    Ok(())
}

#[test]
fn default_schedules_run_in_the_documented_order() {
    let mut app = App::default();
    app.world_mut().insert_resource(Log(Vec::new()));

    for (label, system) in [
        ("Startup", log_startup.into_system()),
        ("BeginFrame", log_begin.into_system()),
        ("Update", log_update.into_system()),
        ("Render", log_render.into_system()),
        ("EndFrame", log_end.into_system()),
        ("Shutdown", log_shutdown.into_system()),
    ] {
        let (schedules, world) = app.schedules_and_world_mut();
        schedules.schedule_mut(label).unwrap().add(system, world);
    }
    {
        let (schedules, world) = app.schedules_and_world_mut();
        schedules.schedule_mut("Update").unwrap().add(request_exit.into_system(), world);
    }

    app.run().unwrap();

    assert_eq!(
        app.world().resource::<Log>().unwrap().0,
        vec!["startup", "begin", "update", "render", "end", "shutdown"]
    );
}
