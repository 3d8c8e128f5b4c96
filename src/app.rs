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

//! [`App`]: the composition root. Owns a [`World`], a [`ScheduleManager`],
//! and the plugins that were added to it.

use rustc_hash::FxHashSet;

use crate::error::{EcsError, Result};
use crate::plugin::Plugin;
use crate::schedule::ScheduleManager;
use crate::world::World;

/// Present as a resource once a system decides the app loop should end.
/// `App::run` checks for it after every `step`.
pub struct Exit {
    pub code: i32,
}

pub struct App {
    world: World,
    schedules: ScheduleManager,
    plugins: Vec<Box<dyn Plugin>>,
    plugin_names: FxHashSet<&'static str>,
}

impl App {
    /// An app with no pre-populated schedules. Mostly useful for plugin and
    /// schedule-wiring tests; real applications should start from
    /// [`App::default`].
    pub fn empty() -> Self {
        App {
            world: World::new(),
            schedules: ScheduleManager::new(),
            plugins: Vec::new(),
            plugin_names: FxHashSet::default(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn schedules(&self) -> &ScheduleManager {
        &self.schedules
    }

    pub fn schedules_mut(&mut self) -> &mut ScheduleManager {
        &mut self.schedules
    }

    /// Splits the borrow so a plugin's `build` hook can add a system to a
    /// schedule while passing `&mut World` to the same call — borrowing
    /// both through `self` separately would conflict.
    pub fn schedules_and_world_mut(&mut self) -> (&mut ScheduleManager, &mut World) {
        (&mut self.schedules, &mut self.world)
    }

    /// Registers `plugin`, rejecting it if a `is_unique` plugin with the
    /// same `name` was already added.
    pub fn add_plugin<P: Plugin>(&mut self, plugin: P) -> Result<&mut Self> {
        let name = plugin.name();
        if plugin.is_unique() && self.plugin_names.contains(name) {
            return Err(EcsError::PluginAlreadyAdded(name.to_string()));
        }
        plugin.build(self);
        self.plugin_names.insert(name);
        self.plugins.push(Box::new(plugin));
        Ok(self)
    }

    /// Runs every schedule reachable from `BeginFrame`, then — absent an
    /// `Exit` resource — every schedule reachable from `BetweenFrames`.
    pub fn step(&mut self) -> Result<()> {
        self.schedules.run_from("BeginFrame", &mut self.world)?;
        if !self.world.has_resource::<Exit>() {
            self.schedules.run_from("BetweenFrames", &mut self.world)?;
        }
        Ok(())
    }

    /// Runs `PreStartup`, loops on [`App::step`] until a system inserts an
    /// [`Exit`] resource, then runs `PreShutdown`. Returns the exit code.
    pub fn run(&mut self) -> Result<i32> {
        self.schedules.run_from("PreStartup", &mut self.world)?;
        loop {
            self.step()?;
            if self.world.has_resource::<Exit>() {
                break;
            }
        }
        self.schedules.run_from("PreShutdown", &mut self.world)?;
        Ok(self.world.resource::<Exit>().map_or(0, |e| e.code))
    }
}

impl Default for App {
    /// The standard schedule skeleton:
    ///
    /// ```text
    /// PreStartup -> Startup -> PostStartup
    /// PreShutdown -> Shutdown -> PostShutdown
    /// BetweenFrames
    /// BeginFrame -> Update -> Render -> EndFrame
    /// ```
    fn default() -> Self {
        let mut app = App::empty();
        for label in [
            "PreStartup",
            "Startup",
            "PostStartup",
            "PreShutdown",
            "Shutdown",
            "PostShutdown",
            "BetweenFrames",
            "BeginFrame",
            "Update",
            "Render",
            "EndFrame",
        ] {
            app.schedules.add_schedule(label).expect("unique label");
        }
        let chains: &[(&str, &str)] = &[
            ("PreStartup", "Startup"),
            ("Startup", "PostStartup"),
            ("PreShutdown", "Shutdown"),
            ("Shutdown", "PostShutdown"),
            ("BeginFrame", "Update"),
            ("Update", "Render"),
            ("Render", "EndFrame"),
        ];
        for (before, after) in chains {
            app.schedules.order(before, after).expect("schedules exist");
        }
        app
    }
}

impl Drop for App {
    fn drop(&mut self) {
        // Take ownership so iterating the plugin list doesn't alias the
        // `&mut self` each `cleanup` hook needs.
        let plugins = std::mem::take(&mut self.plugins);
        for plugin in &plugins {
            if let Err(e) = plugin.cleanup(self) {
                tracing::error!(plugin = plugin.name(), error = %e, "plugin cleanup failed");
            }
        }
    }
}
