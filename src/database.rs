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

//! The archetype-partitioned entity/component store.

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::archetype::{Archetype, ArchetypeId};
use crate::component::{Bundle, ComponentId, ComponentSet};
use crate::entity::{EntityId, EntityLocation};
use crate::error::{EcsError, Result};

/// Owns every [`Archetype`] and the entity-id → location map.
#[derive(Default)]
pub struct Database {
    slots: SlotMap<EntityId, EntityLocation>,
    archetypes: FxHashMap<ArchetypeId, Archetype>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archetypes(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.values()
    }

    pub fn archetype(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(&id)
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn location(&self, entity: EntityId) -> Result<EntityLocation> {
        self.slots.get(entity).copied().ok_or(EcsError::EntityNotFound)
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.slots.contains_key(entity)
    }

    pub fn component_ids(&self, entity: EntityId) -> Result<SmallVec<[ComponentId; 8]>> {
        let loc = self.location(entity)?;
        Ok(self.archetypes[&loc.archetype_id].component_ids())
    }

    fn get_or_create_archetype(&mut self, set: &ComponentSet) -> ArchetypeId {
        let id = set.archetype_id();
        self.archetypes
            .entry(id)
            .or_insert_with(|| Archetype::from_component_set(set.clone()));
        id
    }

    fn prune_if_empty(&mut self, id: ArchetypeId) {
        if self.archetypes.get(&id).is_some_and(Archetype::is_empty) {
            self.archetypes.remove(&id);
        }
    }

    /// Fixes up the entity record for whichever entity got swapped into
    /// `row` of `archetype_id` by a prior swap-removal.
    fn fix_up_moved_entity(&mut self, archetype_id: ArchetypeId, row: usize, moved_entity: EntityId) {
        if let Some(loc) = self.slots.get_mut(moved_entity) {
            loc.archetype_id = archetype_id;
            loc.archetype_row = row;
        }
    }

    /// Reserves one uninitialized slot per component in `set` within
    /// `archetype` and returns their pointers in `set.metas` order, ready
    /// for `Bundle::write_components`.
    fn reserve_row(archetype: &mut Archetype, set: &ComponentSet) -> SmallVec<[*mut u8; 8]> {
        set.metas
            .iter()
            .map(|meta| archetype.column_mut(meta.id).unwrap().reserve_slot())
            .collect()
    }

    /// Reserves an `EntityId` with no backing row yet. Pairs with
    /// [`Database::populate_reserved_entity`] so `Commands::create_entity`
    /// can hand back an `EntityId` synchronously while deferring the actual
    /// row write until the command buffer flushes.
    pub fn reserve_entity(&mut self) -> EntityId {
        self.slots.insert(EntityLocation {
            archetype_id: ArchetypeId(0),
            archetype_row: 0,
        })
    }

    /// Populates a previously-[`reserve_entity`](Database::reserve_entity)d
    /// entity with `bundle`'s values.
    pub fn populate_reserved_entity<B: Bundle>(&mut self, entity: EntityId, bundle: B) -> Result<()> {
        if !self.slots.contains_key(entity) {
            return Err(EcsError::EntityNotFound);
        }
        let set = B::component_set();
        let archetype_id = self.get_or_create_archetype(&set);
        let archetype = self.archetypes.get_mut(&archetype_id).unwrap();
        let ptrs = Self::reserve_row(archetype, &set);
        // SAFETY: each pointer was just reserved from the column matching
        // the bundle element at the same position.
        unsafe { bundle.write_components(&ptrs) };
        archetype.push_entity_id(entity);
        let row = archetype.len() - 1;

        self.slots[entity] = EntityLocation { archetype_id, archetype_row: row };
        Ok(())
    }

    /// Builds a `ComponentSet` from `bundle`, spawns an entity into the
    /// matching archetype, and records its location. The `EntityId` is
    /// allocated before the row is populated, matching `spec.md`'s
    /// "reserves an EntityId synchronously" contract for deferred creation.
    pub fn create_entity<B: Bundle>(&mut self, bundle: B) -> EntityId {
        let entity = self.reserve_entity();
        self.populate_reserved_entity(entity, bundle).unwrap();
        entity
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> Result<()> {
        let loc = self.location(entity)?;
        self.slots.remove(entity);
        let archetype = self
            .archetypes
            .get_mut(&loc.archetype_id)
            .ok_or(EcsError::ArchetypeNotFound)?;
        let moved = archetype.remove_entity_by_index(loc.archetype_row)?;
        if moved != entity {
            self.fix_up_moved_entity(loc.archetype_id, loc.archetype_row, moved);
        }
        self.prune_if_empty(loc.archetype_id);
        Ok(())
    }

    /// Migrates `entity` to `dest_set`. Shared columns are byte-copied by
    /// `Archetype::copy_entity_to`; `init_new` fills in any columns the
    /// destination has that the source didn't (newly added components).
    fn migrate(
        &mut self,
        entity: EntityId,
        dest_set: ComponentSet,
        init_new: impl FnOnce(&mut Archetype, usize),
    ) -> Result<()> {
        let loc = self.location(entity)?;
        let dest_id = self.get_or_create_archetype(&dest_set);
        if dest_id == loc.archetype_id {
            return Ok(());
        }

        // Temporarily remove the destination archetype from the map so we
        // can hold `&Archetype` (source) and `&mut Archetype` (dest) at
        // once without a double mutable borrow of `self.archetypes`.
        let mut dest_archetype = self.archetypes.remove(&dest_id).unwrap();
        let new_row = {
            let src = self
                .archetypes
                .get(&loc.archetype_id)
                .ok_or(EcsError::ArchetypeNotFound)?;
            src.copy_entity_to(loc.archetype_row, &mut dest_archetype)?
        };
        init_new(&mut dest_archetype, new_row);
        self.archetypes.insert(dest_id, dest_archetype);

        let src = self.archetypes.get_mut(&loc.archetype_id).unwrap();
        let moved = src.remove_entity_by_index(loc.archetype_row)?;
        if moved != entity {
            self.fix_up_moved_entity(loc.archetype_id, loc.archetype_row, moved);
        }
        self.prune_if_empty(loc.archetype_id);

        self.slots[entity] = EntityLocation {
            archetype_id: dest_id,
            archetype_row: new_row,
        };
        Ok(())
    }

    /// `addComponents`: union of the entity's current set with `extra`'s.
    /// If the union doesn't change the archetype, values are overwritten in
    /// place (running destructors on the old values first); otherwise the
    /// entity migrates to the union archetype.
    pub fn add_components<B: Bundle>(&mut self, entity: EntityId, extra: B) -> Result<()> {
        let loc = self.location(entity)?;
        let extra_set = B::component_set();
        let current = self.archetypes[&loc.archetype_id].component_set().clone();
        let union = current.union(&extra_set);

        if union.archetype_id() == loc.archetype_id {
            let archetype = self.archetypes.get_mut(&loc.archetype_id).unwrap();
            let mut ptrs: SmallVec<[*mut u8; 8]> = SmallVec::new();
            for meta in &extra_set.metas {
                let col = archetype.column_mut(meta.id).ok_or(EcsError::ComponentNotFound)?;
                ptrs.push(col.overwrite_slot(loc.archetype_row)?);
            }
            // SAFETY: each pointer was just freed for overwrite by the
            // matching column at this entity's row.
            unsafe { extra.write_components(&ptrs) };
            return Ok(());
        }

        self.migrate(entity, union, move |dest_archetype, new_row| {
            // These columns exist only in the destination (the components
            // being added), so `copy_entity_to` never touched them — they
            // need a freshly reserved slot, not an overwrite of one.
            let ptrs: SmallVec<[*mut u8; 8]> = extra_set
                .metas
                .iter()
                .map(|meta| {
                    let col = dest_archetype.column_mut(meta.id).unwrap();
                    debug_assert_eq!(col.len(), new_row, "new column should not yet have this row");
                    col.reserve_slot()
                })
                .collect();
            // SAFETY: pointers were just reserved for this row in the
            // columns new to this archetype.
            unsafe { extra.write_components(&ptrs) };
        })
    }

    /// `removeComponents`: difference of the entity's current set minus
    /// `to_remove`. Fails if that would leave the entity with zero
    /// components.
    pub fn remove_components(&mut self, entity: EntityId, to_remove: &[ComponentId]) -> Result<()> {
        let loc = self.location(entity)?;
        let current = self.archetypes[&loc.archetype_id].component_set().clone();
        let difference = current.difference(to_remove);
        if difference.metas.is_empty() {
            return Err(EcsError::CannotRemoveAllComponents);
        }
        if difference.archetype_id() == loc.archetype_id {
            return Ok(());
        }
        self.migrate(entity, difference, |_, _| {})
    }
}
