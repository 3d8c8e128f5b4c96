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

//! [`Schedule`]: a label plus an ordered list of systems. [`ScheduleManager`]:
//! a directed graph of schedules (built on [`crate::graph::Graph`]) with a
//! cached topological order per traversal start, invalidated by graph
//! version rather than recomputed on every lookup.

use rustc_hash::FxHashMap;

use crate::command::Commands;
use crate::error::{EcsError, Result};
use crate::graph::{Graph, GraphVersion, NodeIndex};
use crate::system::{BoxedSystem, System, SystemId};
use crate::world::World;

/// A label plus an ordered list of systems. `add`/`remove` call the
/// system's `register`/`unregister` hooks (used by `EventReader` to attach
/// and release its broadcast subscription).
pub struct Schedule {
    label: String,
    systems: Vec<BoxedSystem>,
}

impl Schedule {
    pub fn new(label: impl Into<String>) -> Self {
        Schedule {
            label: label.into(),
            systems: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn add(&mut self, mut system: BoxedSystem, world: &mut World) {
        system.register(world);
        self.systems.push(system);
    }

    /// Finds by invocation-thunk identity and swap-removes, unregistering
    /// first. Returns `false` if no system with that id is present.
    pub fn remove(&mut self, id: SystemId, world: &mut World) -> bool {
        match self.systems.iter().position(|s| s.id() == id) {
            Some(pos) => {
                let mut system = self.systems.swap_remove(pos);
                system.unregister(world);
                true
            }
            None => false,
        }
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Runs every system in insertion order, each against a fresh
    /// `Commands` flushed immediately after that system returns.
    pub fn run(&mut self, world: &mut World) -> Result<()> {
        for system in &mut self.systems {
            let mut commands = Commands::new(world);
            system.run(&mut commands)?;
            let mut buffer = commands.into_buffer();
            buffer.flush(world)?;
        }
        Ok(())
    }
}

struct TopoCacheEntry {
    version: GraphVersion,
    order: Vec<NodeIndex>,
    has_cycles: bool,
}

/// Owns every [`Schedule`] plus a dependency graph over their labels. A
/// cached topological order is kept per traversal start and recomputed only
/// when the underlying graph's version has moved since it was built.
#[derive(Default)]
pub struct ScheduleManager {
    graph: Graph<(), ()>,
    name_to_node: FxHashMap<String, NodeIndex>,
    node_to_index: FxHashMap<NodeIndex, usize>,
    schedules: Vec<Schedule>,
    cache: FxHashMap<String, TopoCacheEntry>,
}

impl ScheduleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_schedule(&mut self, label: impl Into<String>) -> Result<NodeIndex> {
        let label = label.into();
        if self.name_to_node.contains_key(&label) {
            return Err(EcsError::ScheduleAlreadyExists(label));
        }
        let node = self.graph.add_node(());
        let index = self.schedules.len();
        self.schedules.push(Schedule::new(label.clone()));
        self.name_to_node.insert(label, node);
        self.node_to_index.insert(node, index);
        Ok(node)
    }

    pub fn schedule_mut(&mut self, label: &str) -> Option<&mut Schedule> {
        let node = *self.name_to_node.get(label)?;
        let index = *self.node_to_index.get(&node)?;
        self.schedules.get_mut(index)
    }

    pub fn schedule(&self, label: &str) -> Option<&Schedule> {
        let node = *self.name_to_node.get(label)?;
        let index = *self.node_to_index.get(&node)?;
        self.schedules.get(index)
    }

    /// Records that `before` must run before `after` whenever both are
    /// reachable from the same traversal start.
    pub fn order(&mut self, before: &str, after: &str) -> Result<()> {
        let src = *self
            .name_to_node
            .get(before)
            .ok_or_else(|| EcsError::ScheduleNotFound(before.to_string()))?;
        let dst = *self
            .name_to_node
            .get(after)
            .ok_or_else(|| EcsError::ScheduleNotFound(after.to_string()))?;
        self.graph.add_edge(src, dst, ());
        Ok(())
    }

    fn topo_order(&mut self, start: &str) -> Result<Vec<NodeIndex>> {
        let start_node = *self
            .name_to_node
            .get(start)
            .ok_or_else(|| EcsError::ScheduleNotFound(start.to_string()))?;
        let current_version = self.graph.version();

        let stale = match self.cache.get(start) {
            Some(entry) => entry.version != current_version,
            None => true,
        };
        if stale {
            let result = self.graph.topological_sort_from(start_node);
            self.cache.insert(
                start.to_string(),
                TopoCacheEntry {
                    version: current_version,
                    order: result.order,
                    has_cycles: result.has_cycles,
                },
            );
        }

        let entry = self.cache.get(start).expect("just inserted or present");
        if entry.has_cycles {
            return Err(EcsError::CyclicDependency);
        }
        Ok(entry.order.clone())
    }

    /// Runs every schedule reachable from `start`, in dependency order.
    pub fn run_from(&mut self, start: &str, world: &mut World) -> Result<()> {
        let order = self.topo_order(start)?;
        for node in order {
            let index = *self.node_to_index.get(&node).expect("node from live graph");
            self.schedules[index].run(world)?;
        }
        Ok(())
    }

    /// A streaming iterator over schedules reachable from `start`, in
    /// dependency order. Its order is a snapshot copied out of the cache at
    /// construction time, so later graph mutations don't disturb it.
    pub fn iterator(&mut self, start: &str) -> Result<ScheduleIter<'_>> {
        let order = self.topo_order(start)?;
        Ok(ScheduleIter {
            manager: self,
            order,
            pos: 0,
        })
    }
}

pub struct ScheduleIter<'m> {
    manager: &'m mut ScheduleManager,
    order: Vec<NodeIndex>,
    pos: usize,
}

impl ScheduleIter<'_> {
    pub fn next(&mut self) -> Option<&mut Schedule> {
        let node = *self.order.get(self.pos)?;
        self.pos += 1;
        let index = *self.manager.node_to_index.get(&node)?;
        self.manager.schedules.get_mut(index)
    }
}
