//! A SubApp drains commands from its parent and replies, exercising the
//! inbox/outbox channel pair end to end.

use std::time::{Duration, Instant};

use archetype_ecs::prelude::*;

#[derive(Clone, Debug, PartialEq)]
enum Cmd {
    A,
    B,
}

#[derive(Clone, Debug, PartialEq)]
enum Reply {
    Sincere(&'static str),
    Snarky(&'static str),
}

struct RepliesLog(Vec<Reply>);
struct CommandsSent(bool);

fn child_responds(_c: &mut Commands<'_>, inbox: InboxReceiver<'_, Cmd>, outbox: OutboxSender<'_, Reply>) -> Result<()> {
    while let Ok(cmd) = inbox.try_recv() {
        let reply = match cmd {
            Cmd::A => Reply::Sincere("thanks"),
            Cmd::B => Reply::Snarky("sure"),
        };
        outbox.send(reply).ok();
    }
    Ok(())
}

/// Sends both commands exactly once, on the parent's first `Update` pass.
fn parent_sends_commands(_c: &mut Commands<'_>, inbox: InboxSender<'_, Cmd>, mut sent: ResMut<'_, CommandsSent>) -> Result<()> {
    if !sent.0 {
        inbox.send(Cmd::A).ok();
        inbox.send(Cmd::B).ok();
        sent.0 = true;
    }
    Ok(())
}

fn parent_collects(_c: &mut Commands<'_>, outbox: OutboxReceiver<'_, Reply>, mut log: ResMut<'_, RepliesLog>) -> Result<()> {
    while let Ok(reply) = outbox.try_recv() {
        log.0.push(reply);
    }
    Ok(())
}

#[test]
fn parent_receives_replies_for_each_command_in_order() {
    let mut child = App::default();
    {
        let (schedules, world) = child.schedules_and_world_mut();
        schedules.schedule_mut("Update").unwrap().add(child_responds.into_system(), world);
    }

    let mut parent = App::default();
    parent.world_mut().insert_resource(RepliesLog(Vec::new()));
    parent.world_mut().insert_resource(CommandsSent(false));
    {
        let (schedules, world) = parent.schedules_and_world_mut();
        let update = schedules.schedule_mut("Update").unwrap();
        update.add(parent_sends_commands.into_system(), world);
        update.add(parent_collects.into_system(), world);
    }

    let mut sub: SubApp<Cmd, Reply> = SubApp::new(child, 8, 8);
    sub.start(parent.world_mut()).unwrap();

    let deadline = Instant::now() + Duration::from_millis(250);
    while parent.world().resource::<RepliesLog>().unwrap().0.len() < 2 && Instant::now() < deadline {
        parent.step().unwrap();
        std::thread::sleep(Duration::from_millis(2));
    }

    sub.stop(parent.world_mut());

    assert_eq!(
        parent.world().resource::<RepliesLog>().unwrap().0,
        vec![Reply::Sincere("thanks"), Reply::Snarky("sure")]
    );
}
