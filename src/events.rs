// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Event types: a resource-backed broadcast of values of type `T`, read by
//! any number of systems through an [`EventReader<T>`] and written through
//! an [`EventWriter<T>`].
//!
//! `register_event::<T>` must be called (typically from a plugin's `build`)
//! before any system requests `EventReader<T>`/`EventWriter<T>` for that
//! type — mirroring `spec.md`'s "events must be registered before use".

use std::any::type_name;

use crate::broadcast::{Broadcast, SubscriberId};
use crate::command::Commands;
use crate::error::{EcsError, Result};
use crate::system::{SystemId, SystemParam};
use crate::world::World;

const EVENT_RING_CAPACITY: usize = 1024;

/// The resource backing event type `T`. Holds the shared ring buffer plus
/// the per-system subscriber cursor each `EventReader<T>` attaches on
/// `register`.
pub struct Events<T> {
    broadcast: Broadcast<T>,
    subscriptions: rustc_hash::FxHashMap<SystemId, SubscriberId>,
}

impl<T: Clone + Send + Sync + 'static> Events<T> {
    fn new() -> Self {
        Events {
            broadcast: Broadcast::new(EVENT_RING_CAPACITY),
            subscriptions: rustc_hash::FxHashMap::default(),
        }
    }
}

/// Registers event type `T`, inserting its backing [`Events<T>`] resource if
/// absent. Idempotent.
pub fn register_event<T: Clone + Send + Sync + 'static>(world: &mut World) {
    if !world.has_resource::<Events<T>>() {
        world.insert_resource(Events::<T>::new());
    }
}

/// Publishes values of type `T` to every current and future `EventReader<T>`.
pub struct EventWriter<'w, T: Clone + Send + Sync + 'static> {
    events: &'w Events<T>,
}

impl<T: Clone + Send + Sync + 'static> EventWriter<'_, T> {
    pub fn send(&self, value: T) -> Result<()> {
        self.events.broadcast.push(value)
    }
}

impl<'w, T: Clone + Send + Sync + 'static> SystemParam<'w> for EventWriter<'w, T> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see `system.rs` module docs.
        let world: &'w World = unsafe { &*commands.world_ptr() };
        let events = world
            .resource::<Events<T>>()
            .ok_or(EcsError::EventMustBeRegistered(type_name::<T>()))?;
        Ok(EventWriter { events })
    }
}

/// Reads values of type `T` published since this system's last run.
pub struct EventReader<'w, T: Clone + Send + Sync + 'static> {
    events: &'w Events<T>,
    subscriber: SubscriberId,
}

impl<T: Clone + Send + Sync + 'static> EventReader<'_, T> {
    pub fn read(&self) -> Result<Vec<T>> {
        self.events.broadcast.drain(self.subscriber)
    }
}

impl<'w, T: Clone + Send + Sync + 'static> SystemParam<'w> for EventReader<'w, T> {
    fn register(system: SystemId, world: &mut World) {
        register_event::<T>(world);
        let events = world.resource_mut::<Events<T>>().expect("just registered");
        let subscriber = events.broadcast.subscribe();
        events.subscriptions.insert(system, subscriber);
    }

    fn unregister(system: SystemId, world: &mut World) {
        if let Some(events) = world.resource_mut::<Events<T>>() {
            if let Some(subscriber) = events.subscriptions.remove(&system) {
                events.broadcast.unsubscribe(subscriber);
            }
        }
    }

    fn init(system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see `system.rs` module docs.
        let world: &'w World = unsafe { &*commands.world_ptr() };
        let events = world
            .resource::<Events<T>>()
            .ok_or(EcsError::EventMustBeRegistered(type_name::<T>()))?;
        let subscriber = *events
            .subscriptions
            .get(&system)
            .ok_or(EcsError::EventReaderNotSubscribed)?;
        Ok(EventReader { events, subscriber })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Commands;
    use crate::system::IntoSystem;

    #[derive(Clone, Debug, PartialEq)]
    struct Damage(i32);

    #[test]
    fn writer_and_reader_roundtrip_through_a_system_pair() {
        let mut world = World::new();
        register_event::<Damage>(&mut world);

        let mut writer_system =
            (|_c: &mut Commands<'_>, writer: EventWriter<'_, Damage>| {
                writer.send(Damage(5))?;
                Ok(())
            })
            .into_system();
        let mut reader_system =
            (|_c: &mut Commands<'_>, reader: EventReader<'_, Damage>| {
                let got = reader.read()?;
                assert_eq!(got, vec![Damage(5)]);
                Ok(())
            })
            .into_system();

        writer_system.register(&mut world);
        reader_system.register(&mut world);

        let mut commands = Commands::new(&mut world);
        writer_system.run(&mut commands).unwrap();
        reader_system.run(&mut commands).unwrap();
    }

    #[test]
    fn unregistered_event_type_fails_fast() {
        let mut world = World::new();
        let commands = Commands::new(&mut world);
        let err = EventWriter::<Damage>::init(SystemId::of::<()>(), &commands);
        assert!(matches!(err, Err(EcsError::EventMustBeRegistered(_))));
    }
}
