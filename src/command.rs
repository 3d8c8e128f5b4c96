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

//! Deferred structural mutations: [`CommandBuffer`] queues them, [`Commands`]
//! pairs a buffer with a [`World`] reference for systems to use.
//!
//! A `Command` is modeled as a boxed `FnOnce(&mut World)` rather than the
//! pointer/context-record triple a non-generic language would need — a
//! closure already carries its captured context and Rust drops it (running
//! any captured values' destructors) if the buffer is discarded unflushed,
//! which is this crate's stand-in for the `cleanup`/`destroy` pair.

use std::sync::Arc;

use crate::component::{Bundle, Component, ComponentId};
use crate::entity::EntityId;
use crate::error::Result;
use crate::query::{Query, QueryFilter};
use crate::world::World;

type Command = Box<dyn FnOnce(&mut World) -> Result<()> + Send>;

/// Queues deferred world mutations; `flush` runs them in insertion order.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue<F>(&mut self, cmd: F)
    where
        F: FnOnce(&mut World) -> Result<()> + Send + 'static,
    {
        self.commands.push(Box::new(cmd));
    }

    pub fn flush(&mut self, world: &mut World) -> Result<()> {
        for command in self.commands.drain(..) {
            command(world)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// A deferred-mutation handle combining a [`CommandBuffer`] with a `World`
/// reference. `Schedule::run` constructs one fresh per system invocation and
/// flushes it immediately after the system returns (`spec.md` 4.9).
pub struct Commands<'w> {
    world: &'w mut World,
    buffer: CommandBuffer,
    scope: Option<Arc<dyn Fn(EntityId, &mut World) -> Result<()> + Send + Sync>>,
}

impl<'w> Commands<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Commands {
            world,
            buffer: CommandBuffer::new(),
            scope: None,
        }
    }

    pub fn world(&self) -> &World {
        self.world
    }

    /// Raw pointer to the underlying `World`, for [`crate::system::SystemParam`]
    /// binding. Sound only because schedules run systems strictly
    /// sequentially — see `system.rs`'s module docs.
    pub(crate) fn world_ptr(&self) -> *const World {
        self.world as *const World
    }

    /// Reserves an `EntityId` now, defers writing `bundle` into it (and, if
    /// this handle is `scoped`, tagging it with the scope marker) until
    /// flush.
    pub fn create_entity<B: Bundle>(&mut self, bundle: B) -> EntityId {
        let entity = self.world.reserve_entity();
        self.buffer.queue(move |world| world.populate_reserved_entity(entity, bundle));
        if let Some(scope) = self.scope.clone() {
            self.buffer.queue(move |world| scope(entity, world));
        }
        entity
    }

    pub fn remove_entity(&mut self, entity: EntityId) {
        self.buffer.queue(move |world| world.remove_entity(entity));
    }

    pub fn add_components<B: Bundle>(&mut self, entity: EntityId, extra: B) {
        self.buffer.queue(move |world| world.add_components(entity, extra));
    }

    pub fn remove_components(&mut self, entity: EntityId, ids: Vec<ComponentId>) {
        self.buffer.queue(move |world| world.remove_components(entity, &ids));
    }

    pub fn add_component<T: Component>(&mut self, entity: EntityId, component: T) {
        self.add_components(entity, (component,));
    }

    pub fn remove_component<T: Component>(&mut self, entity: EntityId) {
        self.remove_components(entity, vec![ComponentId::of::<T>()]);
    }

    // -- Immediate operations (not archetype-altering) --------------------

    pub fn insert_resource<T: Send + Sync + 'static>(&mut self, value: T) {
        self.world.insert_resource(value);
    }

    pub fn remove_resource<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.world.remove_resource::<T>()
    }

    pub fn resource<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.world.resource::<T>()
    }

    pub fn query<Spec: QueryFilter>(&self) -> Query<'_, Spec> {
        Query::new(self.world)
    }

    /// Every future `create_entity` call on the returned handle additionally
    /// tags the new entity with `marker`.
    pub fn scoped<M: Component + Clone>(&mut self, marker: M) -> &mut Self {
        self.scope = Some(Arc::new(move |entity, world| {
            world.add_components(entity, (marker.clone(),))
        }));
        self
    }

    pub(crate) fn into_buffer(self) -> CommandBuffer {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    struct Marker;
    impl Component for Marker {}

    #[test]
    fn create_entity_reserves_id_before_flush() {
        let mut world = World::new();
        let mut commands = Commands::new(&mut world);
        let entity = commands.create_entity((Marker,));
        // The id exists immediately (reserved), but its row isn't written
        // until the buffer flushes.
        assert!(commands.world().is_alive(entity));
        let mut buffer = commands.into_buffer();
        buffer.flush(&mut world).unwrap();
        assert!(world.entity(entity).has::<Marker>());
    }

    #[test]
    fn unflushed_buffer_drops_without_executing() {
        let mut world = World::new();
        let entity;
        {
            let mut commands = Commands::new(&mut world);
            entity = commands.create_entity((Marker,));
            // buffer dropped here without flushing: the entity id was
            // reserved synchronously, but its row was never written.
        }
        assert!(!world.entity(entity).has::<Marker>());
    }
}
