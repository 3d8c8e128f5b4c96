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

//! The query engine: include/exclude filters over archetypes, trait
//! matching, grouping, and ordered iteration.

use std::marker::PhantomData;

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use smallvec::SmallVec;

use crate::archetype::ArchetypeId;
use crate::component::{Component, ComponentId};
use crate::entity::EntityId;
use crate::world::{EntityRef, World};

/// One term of a query tuple: contributes to the include set, the exclude
/// set, or neither (derived components, which never filter archetypes).
pub trait QueryTerm {
    fn contribute(include: &mut SmallVec<[ComponentId; 8]>, exclude: &mut SmallVec<[ComponentId; 8]>);
}

impl<T: Component> QueryTerm for T {
    fn contribute(include: &mut SmallVec<[ComponentId; 8]>, _exclude: &mut SmallVec<[ComponentId; 8]>) {
        include.push(ComponentId::of::<T>());
    }
}

/// Excludes archetypes that contain `T`.
pub struct Without<T>(PhantomData<T>);

impl<T: Component> QueryTerm for Without<T> {
    fn contribute(_include: &mut SmallVec<[ComponentId; 8]>, exclude: &mut SmallVec<[ComponentId; 8]>) {
        exclude.push(ComponentId::of::<T>());
    }
}

/// Never filters; present so a derived-component type can sit in a query
/// tuple as documentation of what the system reads.
pub struct Derived<T>(PhantomData<T>);

impl<T: 'static> QueryTerm for Derived<T> {
    fn contribute(_include: &mut SmallVec<[ComponentId; 8]>, _exclude: &mut SmallVec<[ComponentId; 8]>) {}
}

/// An include-set plus an exclude-set of [`ComponentId`]s.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub include: SmallVec<[ComponentId; 8]>,
    pub exclude: SmallVec<[ComponentId; 8]>,
}

/// A tuple of [`QueryTerm`]s. Implemented for tuples up to 8 elements.
pub trait QueryFilter {
    fn spec() -> QuerySpec;
}

macro_rules! impl_query_filter {
    ($($T:ident),*) => {
        impl<$($T: QueryTerm),*> QueryFilter for ($($T,)*) {
            #[allow(unused_mut)]
            fn spec() -> QuerySpec {
                let mut include = SmallVec::new();
                let mut exclude = SmallVec::new();
                $($T::contribute(&mut include, &mut exclude);)*
                QuerySpec { include, exclude }
            }
        }
    };
}

impl_query_filter!(A);
impl_query_filter!(A, B);
impl_query_filter!(A, B, C);
impl_query_filter!(A, B, C, D);
impl_query_filter!(A, B, C, D, E);
impl_query_filter!(A, B, C, D, E, F);
impl_query_filter!(A, B, C, D, E, F, G);
impl_query_filter!(A, B, C, D, E, F, G, H);

fn matching_archetypes(world: &World, spec: &QuerySpec) -> SmallVec<[ArchetypeId; 8]> {
    world
        .database()
        .archetypes()
        .filter(|a| a.has_components(&spec.include) && !a.has_any_components(&spec.exclude))
        .map(|a| a.id)
        .collect()
}

fn matching_archetypes_within(
    world: &World,
    spec: &QuerySpec,
    allowed: &[ArchetypeId],
) -> SmallVec<[ArchetypeId; 8]> {
    allowed
        .iter()
        .filter_map(|id| world.database().archetype(*id))
        .filter(|a| a.has_components(&spec.include) && !a.has_any_components(&spec.exclude))
        .map(|a| a.id)
        .collect()
}

/// The result of executing a `Spec` query against a [`World`] at bind time.
/// Archetype membership is snapshotted once; iteration re-reads archetype
/// contents so changes made earlier in the same system are visible.
pub struct Query<'w, Spec: QueryFilter> {
    world: &'w World,
    archetype_ids: SmallVec<[ArchetypeId; 8]>,
    _marker: PhantomData<Spec>,
}

impl<'w, Spec: QueryFilter> Query<'w, Spec> {
    pub fn new(world: &'w World) -> Self {
        let spec = Spec::spec();
        Query {
            world,
            archetype_ids: matching_archetypes(world, &spec),
            _marker: PhantomData,
        }
    }

    fn restricted(world: &'w World, allowed: &[ArchetypeId]) -> Self {
        let spec = Spec::spec();
        Query {
            world,
            archetype_ids: matching_archetypes_within(world, &spec, allowed),
            _marker: PhantomData,
        }
    }

    pub fn iter(&self) -> QueryIter<'w> {
        QueryIter {
            world: self.world,
            archetype_ids: self.archetype_ids.clone(),
            archetype_index: 0,
            row: 0,
        }
    }

    pub fn count(&self) -> usize {
        self.archetype_ids
            .iter()
            .filter_map(|id| self.world.database().archetype(*id))
            .map(|a| a.len())
            .sum()
    }

    pub fn first(&self) -> Option<EntityRef<'w>> {
        self.iter().next()
    }

    /// Materializes matching entities into an arena-allocated vector.
    pub fn list_alloc<'a>(&self, bump: &'a Bump) -> BumpVec<'a, EntityId> {
        let mut out = BumpVec::with_capacity_in(self.count(), bump);
        out.extend(self.iter().map(|e| e.id()));
        out
    }

    /// Materializes then sorts matching entities in place using
    /// `less_than` as the ordering predicate (pattern-defeating quicksort,
    /// via the standard library's introsort-based unstable sort).
    pub fn sort_alloc<'a>(
        &self,
        bump: &'a Bump,
        less_than: impl Fn(EntityId, EntityId) -> bool,
    ) -> BumpVec<'a, EntityId> {
        let mut out = self.list_alloc(bump);
        out.sort_unstable_by(|a, b| {
            if less_than(*a, *b) {
                std::cmp::Ordering::Less
            } else if less_than(*b, *a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        out
    }

    /// Partitions this query's matching archetypes by the integer group key
    /// recorded in `Trait`'s [`crate::component::TraitKind::Grouped`]
    /// descriptor, ascending by key.
    pub fn group_by<Trait: 'static>(&self) -> Vec<Group<'w>> {
        group_archetypes_by::<Trait>(self.world, &self.archetype_ids)
    }
}

/// Iterates matching entities, archetype by archetype, in insertion order
/// within each archetype.
pub struct QueryIter<'w> {
    world: &'w World,
    archetype_ids: SmallVec<[ArchetypeId; 8]>,
    archetype_index: usize,
    row: usize,
}

impl<'w> Iterator for QueryIter<'w> {
    type Item = EntityRef<'w>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let archetype_id = *self.archetype_ids.get(self.archetype_index)?;
            let archetype = self.world.database().archetype(archetype_id)?;
            match archetype.entity_at(self.row) {
                Some(entity) => {
                    self.row += 1;
                    return Some(EntityRef::new(self.world, entity));
                }
                None => {
                    self.archetype_index += 1;
                    self.row = 0;
                }
            }
        }
    }
}

/// One partition produced by `groupBy`: every archetype whose matched
/// column declares the same integer group key under `Trait`.
pub struct Group<'w> {
    pub component_id: ComponentId,
    pub key: i64,
    world: &'w World,
    archetype_ids: SmallVec<[ArchetypeId; 4]>,
}

impl<'w> Group<'w> {
    pub fn archetype_ids(&self) -> &[ArchetypeId] {
        &self.archetype_ids
    }

    /// Restricts `Spec` to this group's archetypes.
    pub fn query<Spec: QueryFilter>(&self) -> Query<'w, Spec> {
        Query::restricted(self.world, &self.archetype_ids)
    }

    /// Groups this group's own archetypes again, by a different trait.
    pub fn group_by<Trait: 'static>(&self) -> Vec<Group<'w>> {
        group_archetypes_by::<Trait>(self.world, &self.archetype_ids)
    }
}

fn group_archetypes_by<'w, Trait: 'static>(world: &'w World, allowed: &[ArchetypeId]) -> Vec<Group<'w>> {
    let trait_id = ComponentId::of::<Trait>();
    // key -> (representative component id, archetype ids)
    let mut by_key: std::collections::BTreeMap<i64, (ComponentId, SmallVec<[ArchetypeId; 4]>)> =
        std::collections::BTreeMap::new();

    for &archetype_id in allowed {
        let Some(archetype) = world.database().archetype(archetype_id) else {
            continue;
        };
        for (component_id, key) in archetype.grouped_columns(trait_id) {
            let entry = by_key.entry(key).or_insert_with(|| (component_id, SmallVec::new()));
            entry.1.push(archetype_id);
        }
    }

    by_key
        .into_iter()
        .map(|(key, (component_id, archetype_ids))| Group {
            component_id,
            key,
            world,
            archetype_ids,
        })
        .collect()
}

/// Groups the entire database (not restricted to any prior query) by
/// `Trait`'s group key. This is what the `GroupBy<Trait>` system parameter
/// binds to.
pub fn group_by_database<Trait: 'static>(world: &World) -> Vec<Group<'_>> {
    let all: SmallVec<[ArchetypeId; 8]> = world.database().archetypes().map(|a| a.id).collect();
    group_archetypes_by::<Trait>(world, &all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::TraitDescriptor;

    struct Position(f32);
    impl Component for Position {}
    struct Dead;
    impl Component for Dead {}

    #[test]
    fn include_exclude_filters_archetypes() {
        let mut world = World::new();
        let alive = world.create_entity((Position(1.0),));
        let dead = world.create_entity((Position(2.0),));
        world.add_components(dead, (Dead,)).unwrap();

        let query = Query::<(Position, Without<Dead>)>::new(&world);
        let ids: Vec<EntityId> = query.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec![alive]);
    }

    #[test]
    fn group_by_orders_ascending_by_key() {
        struct ViewportTrait;
        struct Viewport0;
        struct Viewport1;
        impl Component for Viewport0 {
            fn trait_descriptor() -> Option<TraitDescriptor> {
                Some(TraitDescriptor::grouped::<ViewportTrait>(0))
            }
        }
        impl Component for Viewport1 {
            fn trait_descriptor() -> Option<TraitDescriptor> {
                Some(TraitDescriptor::grouped::<ViewportTrait>(1))
            }
        }

        let mut world = World::new();
        world.create_entity((Position(1.0), Viewport1));
        world.create_entity((Position(0.0), Viewport0));

        let groups = group_by_database::<ViewportTrait>(&world);
        let keys: Vec<i64> = groups.iter().map(|g| g.key).collect();
        assert_eq!(keys, vec![0, 1]);
    }
}
