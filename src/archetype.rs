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

//! Archetypes: a set of component columns shared by every entity with the
//! same exact component-type set.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::{ComponentId, ComponentSet, TraitKind};
use crate::entity::EntityId;
use crate::error::{EcsError, Result};
use crate::storage::ComponentArray;

/// Hash of an archetype's sorted component-id set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub u64);

/// One partition of the component database: every entity stored here has
/// exactly the component set named by `components`.
pub struct Archetype {
    pub id: ArchetypeId,
    components: ComponentSet,
    columns: FxHashMap<ComponentId, ComponentArray>,
    entity_ids: Vec<EntityId>,
}

impl Archetype {
    /// Builds an empty archetype for `set`. Panics if `set` is empty — every
    /// entity must have at least one component.
    pub fn from_component_set(set: ComponentSet) -> Self {
        assert!(!set.metas.is_empty(), "archetype component set must be non-empty");
        let id = set.archetype_id();
        let mut columns = FxHashMap::default();
        for meta in &set.metas {
            columns.insert(meta.id, ComponentArray::new(*meta));
        }
        Archetype {
            id,
            components: set,
            columns,
            entity_ids: Vec::new(),
        }
    }

    pub fn component_set(&self) -> &ComponentSet {
        &self.components
    }

    pub fn component_ids(&self) -> SmallVec<[ComponentId; 8]> {
        self.components.ids().collect()
    }

    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    pub fn entity_at(&self, row: usize) -> Option<EntityId> {
        self.entity_ids.get(row).copied()
    }

    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    pub fn has_components(&self, ids: &[ComponentId]) -> bool {
        self.components.is_superset_of(ids)
    }

    pub fn has_any_components(&self, ids: &[ComponentId]) -> bool {
        !self.components.is_disjoint_with(ids)
    }

    pub fn has_column(&self, id: ComponentId) -> bool {
        self.columns.contains_key(&id)
    }

    /// Looks a column up by its own component id, falling back to matching
    /// any column whose declared trait id equals `id` — this is what lets a
    /// query for a trait type match every component that advertises it.
    pub fn get_column(&self, id: ComponentId) -> Option<&ComponentArray> {
        if let Some(col) = self.columns.get(&id) {
            return Some(col);
        }
        self.columns
            .values()
            .find(|col| col.meta().trait_descriptor.map(|t| t.trait_id) == Some(id))
    }

    pub fn get_column_mut(&mut self, id: ComponentId) -> Option<&mut ComponentArray> {
        if self.columns.contains_key(&id) {
            return self.columns.get_mut(&id);
        }
        self.columns
            .values_mut()
            .find(|col| col.meta().trait_descriptor.map(|t| t.trait_id) == Some(id))
    }

    /// Direct lookup by the column's own component id (no trait fallback).
    /// Every component in `self.component_set()` has exactly one such
    /// column, so this is the accessor structural mutation uses.
    pub fn column_mut(&mut self, id: ComponentId) -> Option<&mut ComponentArray> {
        self.columns.get_mut(&id)
    }

    /// Appends `id` to the parallel entity-id list. Callers must keep this
    /// in lock-step with every column's length (push a slot to every column
    /// before or after calling this).
    pub fn push_entity_id(&mut self, id: EntityId) {
        self.entity_ids.push(id);
    }

    /// Every column whose trait descriptor is `Grouped` under `trait_id`,
    /// paired with its group key. Used by `groupBy`.
    pub fn grouped_columns(&self, trait_id: ComponentId) -> SmallVec<[(ComponentId, i64); 4]> {
        self.columns
            .values()
            .filter_map(|col| {
                col.meta().trait_descriptor.and_then(|t| {
                    if t.trait_id == trait_id {
                        match t.kind {
                            TraitKind::Grouped(key) => Some((col.id(), key)),
                            _ => None,
                        }
                    } else {
                        None
                    }
                })
            })
            .collect()
    }

    pub fn raw_column_ptr(&self, id: ComponentId, row: usize) -> Result<*const u8> {
        self.get_column(id)
            .ok_or(EcsError::ComponentNotFound)?
            .get_ptr(row)
    }

    pub fn raw_column_ptr_mut(&mut self, id: ComponentId, row: usize) -> Result<*mut u8> {
        self.get_column_mut(id)
            .ok_or(EcsError::ComponentNotFound)?
            .get_ptr_mut(row)
    }

    /// Removes row `index` by swapping the last row into its place.
    /// Returns the id of the entity that used to occupy the last row (equal
    /// to the removed entity's id if `index` was already last), which the
    /// caller must use to fix up that entity's recorded row index.
    pub fn remove_entity_by_index(&mut self, index: usize) -> Result<EntityId> {
        if index >= self.entity_ids.len() {
            return Err(EcsError::IndexOutOfBounds);
        }
        for column in self.columns.values_mut() {
            column.swap_remove(index)?;
        }
        let moved_id = *self.entity_ids.last().unwrap();
        self.entity_ids.swap_remove(index);
        Ok(moved_id)
    }

    /// Copies, for every column id shared between `self` and `dst`, row
    /// `src_index`'s bytes to `dst`'s end, and pushes the entity id along.
    /// Caller must separately `remove_entity_by_index(src_index)` on `self`.
    pub fn copy_entity_to(&self, src_index: usize, dst: &mut Archetype) -> Result<usize> {
        if src_index >= self.entity_ids.len() {
            return Err(EcsError::IndexOutOfBounds);
        }
        for (id, src_col) in &self.columns {
            if let Some(dst_col) = dst.columns.get_mut(id) {
                src_col.copy_element_to_end(src_index, dst_col)?;
            }
        }
        dst.entity_ids.push(self.entity_ids[src_index]);
        Ok(dst.entity_ids.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentMeta};
    use slotmap::SlotMap;

    struct Position(f32);
    struct Velocity(f32);
    impl Component for Position {}
    impl Component for Velocity {}

    fn make_set(metas: &[ComponentMeta]) -> ComponentSet {
        ComponentSet::from_metas(metas.iter().copied().collect())
    }

    #[test]
    fn archetype_id_is_order_independent() {
        let a = Archetype::from_component_set(make_set(&[
            ComponentMeta::of::<Position>(),
            ComponentMeta::of::<Velocity>(),
        ]));
        let b = Archetype::from_component_set(make_set(&[
            ComponentMeta::of::<Velocity>(),
            ComponentMeta::of::<Position>(),
        ]));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn add_and_remove_row_keeps_columns_in_sync() {
        let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
        let e0 = sm.insert(());
        let e1 = sm.insert(());

        let mut arch = Archetype::from_component_set(make_set(&[ComponentMeta::of::<Position>()]));
        let pos_id = ComponentId::of::<Position>();
        for (entity, value) in [(e0, Position(1.0)), (e1, Position(2.0))] {
            let ptr = arch.column_mut(pos_id).unwrap().reserve_slot();
            // SAFETY: `ptr` came from `reserve_slot` on the `Position` column.
            unsafe { std::ptr::write(ptr as *mut Position, value) };
            arch.push_entity_id(entity);
        }
        assert_eq!(arch.len(), 2);
        let moved = arch.remove_entity_by_index(0).unwrap();
        assert_eq!(moved, e1);
        assert_eq!(arch.len(), 1);
        assert_eq!(arch.entity_at(0), Some(e1));
    }
}
