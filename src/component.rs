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

//! Component identity and the `Component`/`Bundle` traits.
//!
//! A [`ComponentId`] is a process-stable hash of a type's fully qualified
//! name. Components opt into extra metadata (a trait identity, a destructor
//! beyond plain `Drop`, group keys for [`crate::query::GroupBy`]) by
//! implementing [`Component`] themselves rather than relying on a blanket
//! impl — Rust has no way to ask "did this type customize this trait
//! method" after the fact, so metadata has to be declared up front.

use std::any::type_name;
use std::hash::{Hash, Hasher};

use ahash::AHasher;
use smallvec::SmallVec;

/// Maximum number of components supported by [`Bundle`] tuple impls.
pub const MAX_BUNDLE_COMPONENTS: usize = 8;

/// Process-scoped identity for a component (or trait marker) type.
///
/// Stable for the lifetime of one process; not documented as stable across
/// process restarts or builds (see `spec.md` Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub u64);

impl ComponentId {
    /// Hash of `T`'s fully qualified type name.
    pub fn of<T: 'static>() -> Self {
        let mut hasher = AHasher::default();
        type_name::<T>().hash(&mut hasher);
        ComponentId(hasher.finish())
    }
}

/// The three ways a component can advertise a secondary "trait" identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraitKind {
    /// The trait type is zero-sized; the column carries no extra proof obligation.
    Marker,
    /// The trait type and the component share size, alignment and field layout.
    /// Verified by [`identical_layout`] at the call site that declares it.
    IdenticalLayout,
    /// Carries an integer group key, enabling [`crate::query::GroupBy`].
    Grouped(i64),
}

/// A component's declared secondary identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitDescriptor {
    pub trait_id: ComponentId,
    pub kind: TraitKind,
}

impl TraitDescriptor {
    pub fn marker<Trait: 'static>() -> Self {
        TraitDescriptor {
            trait_id: ComponentId::of::<Trait>(),
            kind: TraitKind::Marker,
        }
    }

    pub fn identical_layout<Trait: 'static>() -> Self {
        TraitDescriptor {
            trait_id: ComponentId::of::<Trait>(),
            kind: TraitKind::IdenticalLayout,
        }
    }

    pub fn grouped<Trait: 'static>(key: i64) -> Self {
        TraitDescriptor {
            trait_id: ComponentId::of::<Trait>(),
            kind: TraitKind::Grouped(key),
        }
    }

    /// Group key if this descriptor's kind is [`TraitKind::Grouped`].
    pub fn group_key(&self) -> Option<i64> {
        match self.kind {
            TraitKind::Grouped(key) => Some(key),
            _ => None,
        }
    }
}

/// Compile-time-ish proof that `Trait` and `Component` share layout.
///
/// `spec.md` 4.2/9 calls for a build-time check that a trait and the
/// component declaring `IdenticalLayout` against it really do share size,
/// alignment and field order. Rust has no portable way to compare field
/// offsets across unrelated types without `#[repr(C)]` and manual
/// bookkeeping, so this only verifies the part the runtime actually relies
/// on (size and alignment, which is what makes it sound to address the same
/// bytes through either type's accessor). Call it from a `const _: () =
/// identical_layout::<A, B>();` at the declaration site so a mismatch is a
/// build failure rather than a runtime one.
pub const fn identical_layout<Component, Trait>() {
    assert!(std::mem::size_of::<Component>() == std::mem::size_of::<Trait>());
    assert!(std::mem::align_of::<Component>() == std::mem::align_of::<Trait>());
}

/// Marker trait for component types.
///
/// Implement it directly (optionally overriding [`Component::trait_descriptor`])
/// rather than relying on a blanket impl, since a blanket impl would make it
/// impossible to opt specific types into trait/group metadata.
pub trait Component: 'static + Send + Sync + Sized {
    /// A secondary identity this component also answers to, if any.
    fn trait_descriptor() -> Option<TraitDescriptor> {
        None
    }
}

/// Implements [`Component`] with no trait metadata for each listed type.
#[macro_export]
macro_rules! impl_component {
    ($($t:ty),* $(,)?) => {
        $(impl $crate::component::Component for $t {})*
    };
}

/// A component whose value is computed on demand from other components
/// rather than stored. Derived types are never part of a [`ComponentSet`]
/// and never match a query's include/exclude filters; access them through
/// [`crate::world::EntityRef::derive`].
pub trait DerivedComponent: 'static + Send + Sync + Sized {
    fn derive(entity: crate::world::EntityRef<'_>) -> Option<Self>;
}

/// Per-type record describing one component's storage shape and metadata.
#[derive(Debug, Clone, Copy)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub size: usize,
    pub align: usize,
    pub stride: usize,
    pub trait_descriptor: Option<TraitDescriptor>,
    pub drop_fn: Option<unsafe fn(*mut u8)>,
}

impl PartialEq for ComponentMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for ComponentMeta {}
impl PartialOrd for ComponentMeta {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ComponentMeta {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl ComponentMeta {
    pub fn of<T: Component>() -> Self {
        let size = std::mem::size_of::<T>();
        let align = std::mem::align_of::<T>().max(1);
        ComponentMeta {
            id: ComponentId::of::<T>(),
            size,
            align,
            stride: crate::utils::align_to(size, align),
            trait_descriptor: T::trait_descriptor(),
            drop_fn: if std::mem::needs_drop::<T>() {
                Some(drop_value::<T>)
            } else {
                None
            },
        }
    }
}

/// # Safety
/// `ptr` must point at a valid, initialized `T` that the caller will not
/// access again afterwards.
unsafe fn drop_value<T>(ptr: *mut u8) {
    std::ptr::drop_in_place(ptr as *mut T);
}

/// A sorted, deduplicated sequence of [`ComponentMeta`].
///
/// Hashing the id list gives an archetype its [`crate::archetype::ArchetypeId`];
/// set union/difference drive `addComponents`/`removeComponents` archetype
/// transitions.
#[derive(Debug, Clone, Default)]
pub struct ComponentSet {
    pub metas: SmallVec<[ComponentMeta; MAX_BUNDLE_COMPONENTS]>,
}

impl ComponentSet {
    pub fn from_metas(mut metas: SmallVec<[ComponentMeta; MAX_BUNDLE_COMPONENTS]>) -> Self {
        metas.sort_unstable_by_key(|m| m.id);
        metas.dedup_by_key(|m| m.id);
        ComponentSet { metas }
    }

    pub fn ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.metas.iter().map(|m| m.id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.metas.binary_search_by_key(&id, |m| m.id).is_ok()
    }

    pub fn is_superset_of(&self, other: &[ComponentId]) -> bool {
        other.iter().all(|id| self.contains(*id))
    }

    pub fn is_disjoint_with(&self, other: &[ComponentId]) -> bool {
        other.iter().all(|id| !self.contains(*id))
    }

    /// Union with `extra`, preferring `extra`'s meta on id collision (used
    /// by `addComponents`, which overwrites existing values in place).
    pub fn union(&self, extra: &ComponentSet) -> ComponentSet {
        let mut merged: SmallVec<[ComponentMeta; MAX_BUNDLE_COMPONENTS]> = self.metas.clone();
        for meta in &extra.metas {
            if let Some(existing) = merged.iter_mut().find(|m| m.id == meta.id) {
                *existing = *meta;
            } else {
                merged.push(*meta);
            }
        }
        ComponentSet::from_metas(merged)
    }

    pub fn difference(&self, remove: &[ComponentId]) -> ComponentSet {
        let metas = self
            .metas
            .iter()
            .filter(|m| !remove.contains(&m.id))
            .copied()
            .collect();
        ComponentSet::from_metas(metas)
    }

    pub fn archetype_id(&self) -> crate::archetype::ArchetypeId {
        let mut hasher = AHasher::default();
        for id in self.ids() {
            id.hash(&mut hasher);
        }
        crate::archetype::ArchetypeId(hasher.finish())
    }
}

/// A tuple of components spawned together. Implemented for tuples up to
/// [`MAX_BUNDLE_COMPONENTS`] elements.
pub trait Bundle: Send + Sync + 'static {
    fn component_set() -> ComponentSet
    where
        Self: Sized;

    /// Write this bundle's values to the given per-component destination
    /// pointers, in the same order as [`Bundle::component_set`].
    ///
    /// # Safety
    /// Each pointer must be valid, aligned, and sized for the corresponding
    /// component type.
    unsafe fn write_components(self, ptrs: &[*mut u8]);
}

macro_rules! impl_bundle {
    ($($T:ident),*) => {
        impl<$($T: Component),*> Bundle for ($($T,)*) {
            fn component_set() -> ComponentSet {
                #[allow(unused_mut)]
                let mut metas: SmallVec<[ComponentMeta; MAX_BUNDLE_COMPONENTS]> = SmallVec::new();
                $(metas.push(ComponentMeta::of::<$T>());)*
                ComponentSet::from_metas(metas)
            }

            #[allow(non_snake_case, unused_variables, unused_mut)]
            unsafe fn write_components(self, ptrs: &[*mut u8]) {
                let ($($T,)*) = self;
                let mut i = 0;
                $(
                    std::ptr::write(ptrs[i] as *mut $T, $T);
                    i += 1;
                )*
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    struct Position {
        #[allow(dead_code)]
        x: f32,
    }
    struct Velocity {
        #[allow(dead_code)]
        x: f32,
    }
    impl_component!(Position, Velocity);

    #[test]
    fn component_id_is_stable_for_a_type() {
        assert_eq!(ComponentId::of::<Position>(), ComponentId::of::<Position>());
        assert_ne!(ComponentId::of::<Position>(), ComponentId::of::<Velocity>());
    }

    #[test]
    fn component_set_order_independent() {
        let set_a = ComponentSet::from_metas(
            [ComponentMeta::of::<Position>(), ComponentMeta::of::<Velocity>()].into(),
        );
        let set_b = ComponentSet::from_metas(
            [ComponentMeta::of::<Velocity>(), ComponentMeta::of::<Position>()].into(),
        );
        assert_eq!(set_a.archetype_id(), set_b.archetype_id());
    }

    #[test]
    fn single_component_bundle() {
        let set = <(Position,)>::component_set();
        assert_eq!(set.metas.len(), 1);
        assert_eq!(set.metas[0].id, ComponentId::of::<Position>());
    }
}
