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

//! A general-purpose archetype-based Entity Component System.
//!
//! Entities are rows in per-archetype column storage; components opt in to
//! the framework explicitly (no blanket trait impl). Systems are plain
//! functions whose parameters bind automatically from a small recognized
//! set (`Res`, `Query`, `EventReader`, ...); schedules and apps compose them
//! into a running simulation, with [`subapp::SubApp`] as the one place true
//! concurrency enters the picture.

pub mod app;
pub mod archetype;
pub mod broadcast;
pub mod channel;
pub mod command;
pub mod component;
pub mod database;
pub mod entity;
pub mod error;
pub mod events;
pub mod graph;
pub mod plugin;
pub mod prelude;
pub mod query;
pub mod resource;
pub mod schedule;
pub mod storage;
pub mod subapp;
pub mod system;
pub mod utils;
pub mod world;

pub use app::App;
pub use component::{Bundle, Component, DerivedComponent};
pub use entity::EntityId;
pub use error::{EcsError, Result};
pub use query::{Query, QueryFilter};
pub use system::{BoxedSystem, IntoSystem, System, SystemId};
pub use world::World;
