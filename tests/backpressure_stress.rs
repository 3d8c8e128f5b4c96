//! A three-hop `SubApp` pipeline (parent -> middle -> leaf) with 8-slot
//! queues at every hop, pushing 1000 values plus a trailing `Done` marker
//! through blocking sends to exercise backpressure end to end.

use archetype_ecs::prelude::*;

const COUNT: i32 = 1000;

#[derive(Clone, Debug, PartialEq)]
enum Msg {
    Value(i32),
    Done,
}

struct Sent(bool);
struct Collected(Vec<Msg>);

fn leaf_responds(_c: &mut Commands<'_>, inbox: InboxReceiver<'_, Msg>, outbox: OutboxSender<'_, Msg>) -> Result<()> {
    while let Ok(msg) = inbox.try_recv() {
        let forwarded = match msg {
            Msg::Value(n) => Msg::Value(n + 1),
            Msg::Done => Msg::Done,
        };
        outbox.send(forwarded).ok();
    }
    Ok(())
}

fn relay_down(_c: &mut Commands<'_>, from_parent: InboxReceiver<'_, Msg>, to_leaf: InboxSender<'_, Msg>) -> Result<()> {
    while let Ok(msg) = from_parent.try_recv() {
        to_leaf.send(msg).ok();
    }
    Ok(())
}

fn relay_up(_c: &mut Commands<'_>, from_leaf: OutboxReceiver<'_, Msg>, to_parent: OutboxSender<'_, Msg>) -> Result<()> {
    while let Ok(msg) = from_leaf.try_recv() {
        to_parent.send(msg).ok();
    }
    Ok(())
}

/// Pushes every value (blocking on a full queue) exactly once, then `Done`.
fn send_all(_c: &mut Commands<'_>, to_middle: InboxSender<'_, Msg>, mut sent: ResMut<'_, Sent>) -> Result<()> {
    if sent.0 {
        return Ok(());
    }
    for n in 0..COUNT {
        to_middle.send(Msg::Value(n)).ok();
    }
    to_middle.send(Msg::Done).ok();
    sent.0 = true;
    Ok(())
}

fn collect(_c: &mut Commands<'_>, from_middle: OutboxReceiver<'_, Msg>, mut collected: ResMut<'_, Collected>) -> Result<()> {
    while let Ok(msg) = from_middle.try_recv() {
        collected.0.push(msg);
    }
    Ok(())
}

#[test]
fn thousand_values_survive_a_two_hop_subapp_pipeline_under_backpressure() {
    let mut leaf = App::default();
    {
        let (schedules, world) = leaf.schedules_and_world_mut();
        schedules.schedule_mut("Update").unwrap().add(leaf_responds.into_system(), world);
    }

    let mut middle = App::default();
    let mut leaf_sub: SubApp<Msg, Msg> = SubApp::new(leaf, 8, 8);
    leaf_sub.start(middle.world_mut()).unwrap();
    {
        let (schedules, world) = middle.schedules_and_world_mut();
        let update = schedules.schedule_mut("Update").unwrap();
        update.add(relay_down.into_system(), world);
        update.add(relay_up.into_system(), world);
    }

    let mut parent = App::default();
    parent.world_mut().insert_resource(Sent(false));
    parent.world_mut().insert_resource(Collected(Vec::new()));
    {
        let (schedules, world) = parent.schedules_and_world_mut();
        let update = schedules.schedule_mut("Update").unwrap();
        update.add(send_all.into_system(), world);
        update.add(collect.into_system(), world);
    }

    let mut middle_sub: SubApp<Msg, Msg> = SubApp::new(middle, 8, 8);
    middle_sub.start(parent.world_mut()).unwrap();

    let expected_len = (COUNT as usize) + 1;
    while parent.world().resource::<Collected>().unwrap().0.len() < expected_len {
        parent.step().unwrap();
    }

    middle_sub.stop(parent.world_mut());

    let collected = &parent.world().resource::<Collected>().unwrap().0;
    assert_eq!(collected.len(), expected_len);
    assert_eq!(collected.last(), Some(&Msg::Done));

    let mut values: Vec<i32> = collected
        .iter()
        .filter_map(|m| match m {
            Msg::Value(n) => Some(*n),
            Msg::Done => None,
        })
        .collect();
    values.sort_unstable();
    let expected: Vec<i32> = (1..=COUNT).collect();
    assert_eq!(values, expected);
}
