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

//! Error types

use std::fmt;

/// ECS error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity not found
    EntityNotFound,
    /// Archetype not found
    ArchetypeNotFound,
    /// Component not found on an entity/archetype
    ComponentNotFound,
    /// An operation would leave an entity with zero components
    CannotRemoveAllComponents,
    /// Index outside the bounds of a column or archetype
    IndexOutOfBounds,
    /// A raw-pointer operation targeted a column of the wrong component type
    TypeMismatch,
    /// `copyElementToEnd` between columns whose stride disagrees
    ComponentSizeMismatch,
    /// `addEntity`/bundle write supplied the wrong number of components
    ComponentCountMismatch,

    /// Schedule with this label does not exist
    ScheduleNotFound(String),
    /// Schedule with this label is already registered
    ScheduleAlreadyExists(String),
    /// The schedule DAG contains a cycle reachable from the requested start
    CyclicDependency,

    /// Channel/broadcast endpoint has been closed
    Closed,
    /// `trySend`/`tryPush` found the channel at capacity
    QueueFull,
    /// An operation was attempted on an already-closed queue
    QueueClosed,

    /// A unique plugin was added twice
    PluginAlreadyAdded(String),

    /// A SubApp worker thread panicked or returned an error
    WorkerFailed(String),
    /// `SubApp::start` called on an already-running SubApp
    AlreadyStarted,
    /// The SubApp worker never signalled readiness
    WorkerNeverReady,

    /// A SubApp channel resource was absent from the World
    MissingSubAppResource(&'static str),
    /// `EventReader<T>`/`EventWriter<T>` used without the event type being registered
    EventMustBeRegistered(&'static str),
    /// A system's `EventReader` ran without its subscription being attached
    EventReaderNotSubscribed,

    /// Resource of the requested type is not present
    ResourceNotFound(&'static str),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::EntityNotFound => write!(f, "entity not found"),
            EcsError::ArchetypeNotFound => write!(f, "archetype not found"),
            EcsError::ComponentNotFound => write!(f, "component not found"),
            EcsError::CannotRemoveAllComponents => {
                write!(f, "cannot remove all components from an entity")
            }
            EcsError::IndexOutOfBounds => write!(f, "index out of bounds"),
            EcsError::TypeMismatch => write!(f, "component type mismatch"),
            EcsError::ComponentSizeMismatch => write!(f, "component size mismatch"),
            EcsError::ComponentCountMismatch => write!(f, "component count mismatch"),
            EcsError::ScheduleNotFound(name) => write!(f, "schedule not found: {name}"),
            EcsError::ScheduleAlreadyExists(name) => {
                write!(f, "schedule already exists: {name}")
            }
            EcsError::CyclicDependency => write!(f, "cyclic schedule dependency"),
            EcsError::Closed => write!(f, "channel closed"),
            EcsError::QueueFull => write!(f, "queue full"),
            EcsError::QueueClosed => write!(f, "queue closed"),
            EcsError::PluginAlreadyAdded(name) => write!(f, "plugin already added: {name}"),
            EcsError::WorkerFailed(msg) => write!(f, "sub-app worker failed: {msg}"),
            EcsError::AlreadyStarted => write!(f, "sub-app already started"),
            EcsError::WorkerNeverReady => write!(f, "sub-app worker never became ready"),
            EcsError::MissingSubAppResource(name) => {
                write!(f, "missing sub-app channel resource: {name}")
            }
            EcsError::EventMustBeRegistered(name) => {
                write!(f, "event type must be registered before use: {name}")
            }
            EcsError::EventReaderNotSubscribed => write!(f, "event reader has no subscription"),
            EcsError::ResourceNotFound(name) => write!(f, "resource not found: {name}"),
        }
    }
}

impl std::error::Error for EcsError {}

/// Result type alias
pub type Result<T> = std::result::Result<T, EcsError>;
