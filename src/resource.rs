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

//! Resources: singleton, type-keyed values owned by the [`crate::world::World`].

use std::any::{type_name, Any};
use std::hash::{Hash, Hasher};

use ahash::AHasher;
use rustc_hash::FxHashMap;

/// Process-scoped identity for a resource type: `hash(type name)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

impl ResourceId {
    pub fn of<T: 'static>() -> Self {
        let mut hasher = AHasher::default();
        type_name::<T>().hash(&mut hasher);
        ResourceId(hasher.finish())
    }
}

/// At most one live value per [`ResourceId`]. Dropping the boxed value runs
/// `T`'s own `Drop` impl, which is this crate's mapping of `spec.md`'s
/// resource `deinit` hook (see DESIGN.md).
#[derive(Default)]
pub struct ResourceManager {
    values: FxHashMap<ResourceId, Box<dyn Any + Send + Sync>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the resource of type `T`. Replacing drops the
    /// previous value.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(ResourceId::of::<T>(), Box::new(value));
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.values
            .remove(&ResourceId::of::<T>())
            .map(|boxed| *boxed.downcast::<T>().expect("resource type id collision"))
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&ResourceId::of::<T>())
            .map(|boxed| boxed.downcast_ref::<T>().expect("resource type id collision"))
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.values
            .get_mut(&ResourceId::of::<T>())
            .map(|boxed| boxed.downcast_mut::<T>().expect("resource type id collision"))
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&ResourceId::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_replace_drops_previous_value() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static DROPS: AtomicUsize = AtomicUsize::new(0);
        struct Tracked(#[allow(dead_code)] u32);
        impl Drop for Tracked {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut resources = ResourceManager::new();
        resources.insert(Tracked(1));
        resources.insert(Tracked(2));
        assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        assert_eq!(resources.get::<Tracked>().unwrap().0, 2);
        resources.remove::<Tracked>();
        assert_eq!(DROPS.load(Ordering::SeqCst), 2);
    }
}
