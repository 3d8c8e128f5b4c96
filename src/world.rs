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

//! [`World`]: owns the [`Database`] and the [`ResourceManager`], plus a
//! per-frame arena used by query materialization.

use bumpalo::Bump;

use crate::component::{Bundle, Component, ComponentId, DerivedComponent};
use crate::database::Database;
use crate::entity::EntityId;
use crate::error::Result;
use crate::resource::ResourceManager;

pub struct World {
    database: Database,
    resources: ResourceManager,
    arena: Bump,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        World {
            database: Database::new(),
            resources: ResourceManager::new(),
            arena: Bump::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    /// A per-World arena available to `Query::list_alloc`/`sort_alloc`
    /// callers who don't want to own a `Bump` themselves. Reset it between
    /// frames with [`World::reset_arena`] to reclaim memory.
    pub fn arena(&self) -> &Bump {
        &self.arena
    }

    pub fn reset_arena(&mut self) {
        self.arena.reset();
    }

    pub fn create_entity<B: Bundle>(&mut self, bundle: B) -> EntityId {
        self.database.create_entity(bundle)
    }

    pub fn reserve_entity(&mut self) -> EntityId {
        self.database.reserve_entity()
    }

    pub fn populate_reserved_entity<B: Bundle>(&mut self, entity: EntityId, bundle: B) -> Result<()> {
        self.database.populate_reserved_entity(entity, bundle)
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> Result<()> {
        self.database.remove_entity(entity)
    }

    pub fn add_components<B: Bundle>(&mut self, entity: EntityId, extra: B) -> Result<()> {
        self.database.add_components(entity, extra)
    }

    pub fn remove_components(&mut self, entity: EntityId, ids: &[ComponentId]) -> Result<()> {
        self.database.remove_components(entity, ids)
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.database.is_alive(entity)
    }

    pub fn entity(&self, entity: EntityId) -> EntityRef<'_> {
        EntityRef::new(self, entity)
    }

    // -- Resources --------------------------------------------------------

    pub fn insert_resource<T: Send + Sync + 'static>(&mut self, value: T) {
        self.resources.insert(value);
    }

    pub fn remove_resource<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.resources.remove::<T>()
    }

    pub fn resource<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.resources.get::<T>()
    }

    pub fn resource_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.resources.get_mut::<T>()
    }

    pub fn has_resource<T: Send + Sync + 'static>(&self) -> bool {
        self.resources.contains::<T>()
    }
}

/// An entity's identity plus a read/write view into its current row.
#[derive(Clone, Copy)]
pub struct EntityRef<'w> {
    world: &'w World,
    id: EntityId,
}

impl<'w> EntityRef<'w> {
    pub fn new(world: &'w World, id: EntityId) -> Self {
        EntityRef { world, id }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn has<T: Component>(&self) -> bool {
        self.world
            .database()
            .location(self.id)
            .ok()
            .and_then(|loc| self.world.database().archetype(loc.archetype_id))
            .is_some_and(|a| a.has_column(ComponentId::of::<T>()))
    }

    /// Reads component `T` on this entity. For components that declare
    /// themselves derived, use [`EntityRef::derive`] instead — there is no
    /// stored column to read.
    pub fn get<T: Component>(&self) -> Option<&'w T> {
        let loc = self.world.database().location(self.id).ok()?;
        let archetype = self.world.database().archetype(loc.archetype_id)?;
        let ptr = archetype.raw_column_ptr(ComponentId::of::<T>(), loc.archetype_row).ok()?;
        // SAFETY: `ptr` was fetched for this exact row from a column whose
        // id matches `T`, so it points at a live, correctly-typed value for
        // the lifetime of `self.world`.
        Some(unsafe { &*(ptr as *const T) })
    }

    /// Mutable access to component `T`. Sound under this crate's scheduling
    /// model: systems in a schedule run strictly sequentially, so no two
    /// `EntityRef`s are ever live across concurrent mutation of the same
    /// row.
    pub fn get_mut<T: Component>(&self) -> Option<&'w mut T> {
        let loc = self.world.database().location(self.id).ok()?;
        let archetype = self.world.database().archetype(loc.archetype_id)?;
        let ptr = archetype.raw_column_ptr(ComponentId::of::<T>(), loc.archetype_row).ok()?;
        // SAFETY: see above; we additionally rely on the caller not holding
        // another live reference into the same slot.
        Some(unsafe { &mut *(ptr as *mut T) })
    }

    /// Computes a derived component's value by calling its pure `derive`
    /// function against this entity.
    pub fn derive<D: DerivedComponent>(&self) -> Option<D> {
        D::derive(*self)
    }
}
