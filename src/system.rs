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

//! Systems: plain functions whose parameters are bound automatically from
//! the recognized wrapper set (`Res`, `ResMut`, `ResOpt`, `Query`,
//! `GroupBy`, `EventReader`, `EventWriter`), plus a `Commands` handle.
//!
//! Rust has no runtime reflection over a function's parameter list, so
//! unlike the scripting-language original this binds parameters through a
//! `SystemParam` trait implemented per wrapper and a macro over function
//! arities — the same shape `bevy_ecs` uses for its `SystemParam` machinery.
//! Every system function's first parameter is always `&mut Commands<'_>`;
//! the remaining parameters are the `SystemParam`-implementing wrappers.
//!
//! Binding reads through a raw pointer to the `World` behind `Commands`
//! rather than a tracked borrow. This is sound only because a schedule runs
//! its systems strictly sequentially (`spec.md` 5) — no two bound parameters
//! are ever alive across a concurrent mutation of the same `World`.

use std::any::type_name;
use std::marker::PhantomData;

use crate::command::Commands;
use crate::error::{EcsError, Result};
use crate::query::{Group, Query, QueryFilter};
use crate::world::World;

/// Stable identity for a system function, used as the `EventReader`
/// subscription key and as the handle `Schedule::remove` matches against.
/// Grounded on each distinct closure/fn-item having a distinct Rust type:
/// hashing `TypeId::of::<F>()` stands in for "function address" (the
/// original relies on taking a function pointer's address, which doesn't
/// generalize to capturing closures).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SystemId(pub u64);

impl SystemId {
    pub fn of<F: 'static>() -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = ahash::AHasher::default();
        std::any::TypeId::of::<F>().hash(&mut hasher);
        SystemId(hasher.finish())
    }
}

/// One parameter a system function can request. Implemented for `Res`,
/// `ResMut`, `ResOpt`, `Query`, `GroupBy`, `EventReader`, `EventWriter`.
pub trait SystemParam<'w>: Sized {
    /// Called once when the owning system is added to a schedule. Used by
    /// `EventReader` to attach its broadcast subscription.
    fn register(_system: SystemId, _world: &mut World) {}

    /// Called once when the owning system is removed from a schedule (or
    /// the schedule itself is torn down). Releases what `register` attached.
    fn unregister(_system: SystemId, _world: &mut World) {}

    /// Binds this parameter against the current frame's view.
    fn init(system: SystemId, commands: &Commands<'w>) -> Result<Self>;

    /// Releases any per-invocation state (e.g. materialized query storage).
    fn deinit(self) {}
}

/// Resolves a resource of type `T`, failing if it is absent.
pub struct Res<'w, T: Send + Sync + 'static>(&'w T);

impl<T: Send + Sync + 'static> std::ops::Deref for Res<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.0
    }
}

impl<'w, T: Send + Sync + 'static> SystemParam<'w> for Res<'w, T> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see module docs — sequential scheduling means no other
        // live reference into this `World` exists while this system runs.
        let world: &'w World = unsafe { &*commands.world_ptr() };
        world
            .resource::<T>()
            .map(Res)
            .ok_or(EcsError::ResourceNotFound(type_name::<T>()))
    }
}

/// Resolves a resource of type `T` mutably, failing if it is absent.
pub struct ResMut<'w, T: Send + Sync + 'static>(&'w mut T);

impl<T: Send + Sync + 'static> std::ops::Deref for ResMut<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.0
    }
}

impl<T: Send + Sync + 'static> std::ops::DerefMut for ResMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.0
    }
}

impl<'w, T: Send + Sync + 'static> SystemParam<'w> for ResMut<'w, T> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see module docs.
        let world: &'w mut World = unsafe { &mut *commands.world_ptr().cast_mut() };
        world
            .resource_mut::<T>()
            .map(ResMut)
            .ok_or(EcsError::ResourceNotFound(type_name::<T>()))
    }
}

/// Resolves a resource of type `T` optionally; never fails.
pub struct ResOpt<'w, T: Send + Sync + 'static>(Option<&'w T>);

impl<'w, T: Send + Sync + 'static> ResOpt<'w, T> {
    pub fn get(&self) -> Option<&T> {
        self.0
    }
}

impl<'w, T: Send + Sync + 'static> SystemParam<'w> for ResOpt<'w, T> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see module docs.
        let world: &'w World = unsafe { &*commands.world_ptr() };
        Ok(ResOpt(world.resource::<T>()))
    }
}

impl<'w, Spec: QueryFilter + 'static> SystemParam<'w> for Query<'w, Spec> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see module docs.
        let world: &'w World = unsafe { &*commands.world_ptr() };
        Ok(Query::new(world))
    }
}

/// Groups the entire `World` by `Trait`'s group key at bind time.
pub struct GroupBy<'w, Trait: 'static> {
    groups: Vec<Group<'w>>,
    _marker: PhantomData<Trait>,
}

impl<'w, Trait: 'static> GroupBy<'w, Trait> {
    pub fn groups(&self) -> &[Group<'w>] {
        &self.groups
    }
}

impl<'w, Trait: 'static> SystemParam<'w> for GroupBy<'w, Trait> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        // SAFETY: see module docs.
        let world: &'w World = unsafe { &*commands.world_ptr() };
        Ok(GroupBy {
            groups: crate::query::group_by_database::<Trait>(world),
            _marker: PhantomData,
        })
    }
}

/// A single system function, type-erased behind [`BoxedSystem`].
pub trait System: Send + Sync {
    fn id(&self) -> SystemId;
    fn name(&self) -> &'static str;
    fn register(&mut self, world: &mut World);
    fn unregister(&mut self, world: &mut World);
    fn run(&mut self, commands: &mut Commands<'_>) -> Result<()>;
}

pub type BoxedSystem = Box<dyn System>;

struct FunctionSystem<F, Params> {
    func: F,
    id: SystemId,
    name: &'static str,
    _marker: PhantomData<fn() -> Params>,
}

/// Turns a plain function into a [`BoxedSystem`]. Implemented for functions
/// of the shape `fn(&mut Commands, P1, P2, ...) -> Result<()>` where each
/// `Pn` implements [`SystemParam`].
pub trait IntoSystem<Params> {
    fn into_system(self) -> BoxedSystem;
}

macro_rules! impl_into_system {
    ($($P:ident),*) => {
        impl<F, $($P),*> IntoSystem<($($P,)*)> for F
        where
            F: for<'w> FnMut(&mut Commands<'w>, $($P),*) -> Result<()> + Send + Sync + 'static,
            $(for<'w> $P: SystemParam<'w>,)*
        {
            fn into_system(self) -> BoxedSystem {
                Box::new(FunctionSystem {
                    id: SystemId::of::<F>(),
                    name: type_name::<F>(),
                    func: self,
                    _marker: PhantomData,
                })
            }
        }

        #[allow(non_snake_case, unused_variables)]
        impl<F, $($P),*> System for FunctionSystem<F, ($($P,)*)>
        where
            F: for<'w> FnMut(&mut Commands<'w>, $($P),*) -> Result<()> + Send + Sync + 'static,
            $(for<'w> $P: SystemParam<'w>,)*
        {
            fn id(&self) -> SystemId {
                self.id
            }

            fn name(&self) -> &'static str {
                self.name
            }

            fn register(&mut self, world: &mut World) {
                $($P::register(self.id, world);)*
            }

            fn unregister(&mut self, world: &mut World) {
                $($P::unregister(self.id, world);)*
            }

            fn run(&mut self, commands: &mut Commands<'_>) -> Result<()> {
                $(let mut $P: Option<$P> = None;)*
                let mut first_err: Option<EcsError> = None;
                $(
                    if first_err.is_none() {
                        match $P::init(self.id, commands) {
                            Ok(bound) => $P = Some(bound),
                            Err(e) => first_err = Some(e),
                        }
                    }
                )*
                if let Some(e) = first_err {
                    // Tear down every parameter that did bind before this one
                    // failed, per spec's "deinit runs even on error" contract.
                    $(if let Some(bound) = $P { bound.deinit(); })*
                    return Err(e);
                }
                $(let $P = $P.expect("checked above: no param failed to init");)*
                let result = (self.func)(commands, $($P),*);
                $($P.deinit();)*
                result
            }
        }
    };
}

impl_into_system!();
impl_into_system!(A);
impl_into_system!(A, B);
impl_into_system!(A, B, C);
impl_into_system!(A, B, C, D);
impl_into_system!(A, B, C, D, E);
impl_into_system!(A, B, C, D, E, F);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    struct Score(i32);

    #[test]
    fn function_system_reads_and_writes_a_resource() {
        let mut world = World::new();
        world.insert_resource(Score(0));

        let mut system = (|_cmds: &mut Commands<'_>, mut score: ResMut<'_, Score>| {
            score.0 += 1;
            Ok(())
        })
        .into_system();

        system.register(&mut world);
        let mut commands = Commands::new(&mut world);
        system.run(&mut commands).unwrap();
        let buffer = commands.into_buffer();
        drop(buffer);
        assert_eq!(world.resource::<Score>().unwrap().0, 1);
    }

    #[test]
    fn missing_resource_fails_res() {
        let mut world = World::new();
        let mut system =
            (|_cmds: &mut Commands<'_>, _score: Res<'_, Score>| Ok(())).into_system();
        system.register(&mut world);
        let mut commands = Commands::new(&mut world);
        let err = system.run(&mut commands).unwrap_err();
        assert_eq!(err, EcsError::ResourceNotFound(type_name::<Score>()));
    }

    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    struct CountsDeinit<'w>(&'w AtomicUsize);

    impl<'w> SystemParam<'w> for CountsDeinit<'w> {
        fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
            let world: &'w World = unsafe { &*commands.world_ptr() };
            Ok(CountsDeinit(world.resource::<AtomicUsize>().expect("registered")))
        }

        fn deinit(self) {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    #[test]
    fn a_later_params_failed_init_still_deinits_the_earlier_ones() {
        let mut world = World::new();
        world.insert_resource(AtomicUsize::new(0));

        let mut system = (|_cmds: &mut Commands<'_>, _counted: CountsDeinit<'_>, _score: Res<'_, Score>| {
            Ok(())
        })
        .into_system();
        system.register(&mut world);
        let mut commands = Commands::new(&mut world);

        let err = system.run(&mut commands).unwrap_err();
        assert_eq!(err, EcsError::ResourceNotFound(type_name::<Score>()));
        drop(commands.into_buffer());
        assert_eq!(world.resource::<AtomicUsize>().unwrap().load(AtomicOrdering::SeqCst), 1);
    }
}
