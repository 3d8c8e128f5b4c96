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

//! [`SubApp`]: an inner [`App`] run on its own worker thread, connected to
//! the parent by a pair of bounded point-to-point channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::app::{App, Exit};
use crate::channel::{self, Receiver, Sender};
use crate::command::Commands;
use crate::error::{EcsError, Result};
use crate::system::{SystemId, SystemParam};
use crate::world::World;

/// How long `SubApp::start` waits for the worker to signal readiness (i.e.
/// finish `PreStartup`) before giving up with `WorkerNeverReady`.
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL_INTERVAL: Duration = Duration::from_micros(200);

struct ChildInbox<Inbox>(Receiver<Inbox>);
struct ChildOutbox<Outbox>(Sender<Outbox>);
struct ParentInbox<Inbox>(Sender<Inbox>);
struct ParentOutbox<Outbox>(Receiver<Outbox>);

/// An inner [`App`] driven by its own worker thread. `Inbox` flows
/// parent-to-child, `Outbox` flows child-to-parent.
pub struct SubApp<Inbox: Send + 'static, Outbox: Send + 'static> {
    app: Option<App>,
    inbox_capacity: usize,
    outbox_capacity: usize,
    stop_flag: Arc<AtomicBool>,
    ready_flag: Arc<AtomicBool>,
    error_slot: Arc<Mutex<Option<String>>>,
    worker: Option<JoinHandle<()>>,
    parent_inbox_tx: Option<Sender<Inbox>>,
    parent_outbox_rx: Option<Receiver<Outbox>>,
}

impl<Inbox: Send + 'static, Outbox: Send + 'static> SubApp<Inbox, Outbox> {
    pub fn new(app: App, inbox_capacity: usize, outbox_capacity: usize) -> Self {
        SubApp {
            app: Some(app),
            inbox_capacity,
            outbox_capacity,
            stop_flag: Arc::new(AtomicBool::new(false)),
            ready_flag: Arc::new(AtomicBool::new(false)),
            error_slot: Arc::new(Mutex::new(None)),
            worker: None,
            parent_inbox_tx: None,
            parent_outbox_rx: None,
        }
    }

    /// Spawns the worker thread. Installs the child channel ends into the
    /// child `World`'s resources, then runs `PreStartup` before entering
    /// the poll loop; installs the parent ends into `parent_world`.
    ///
    /// Blocks until the worker signals readiness (finishes `PreStartup`),
    /// then surfaces `WorkerFailed` if that run recorded an error, or
    /// `WorkerNeverReady` if the worker never reaches that point within
    /// `READY_TIMEOUT`.
    pub fn start(&mut self, parent_world: &mut World) -> Result<()> {
        if self.worker.is_some() {
            return Err(EcsError::AlreadyStarted);
        }
        let mut app = self.app.take().expect("SubApp::start called twice");

        let (inbox_tx, inbox_rx) = channel::channel::<Inbox>(self.inbox_capacity);
        let (outbox_tx, outbox_rx) = channel::channel::<Outbox>(self.outbox_capacity);

        app.world_mut().insert_resource(ChildInbox(inbox_rx));
        app.world_mut().insert_resource(ChildOutbox(outbox_tx));

        let stop_flag = self.stop_flag.clone();
        stop_flag.store(false, Ordering::SeqCst);
        let ready_flag = self.ready_flag.clone();
        ready_flag.store(false, Ordering::SeqCst);
        let error_slot = self.error_slot.clone();
        *error_slot.lock() = None;

        let worker = std::thread::spawn(move || {
            let pre_startup_failed = match app.schedules_mut().run_from("PreStartup", app.world_mut()) {
                Ok(()) => false,
                Err(e) => {
                    *error_slot.lock() = Some(e.to_string());
                    true
                }
            };
            ready_flag.store(true, Ordering::SeqCst);
            while !pre_startup_failed && !stop_flag.load(Ordering::Relaxed) {
                if app.world().has_resource::<Exit>() {
                    break;
                }
                if let Err(e) = app.step() {
                    *error_slot.lock() = Some(e.to_string());
                    break;
                }
                std::thread::yield_now();
            }
            if let Err(e) = app.schedules_mut().run_from("PreShutdown", app.world_mut()) {
                *error_slot.lock() = Some(e.to_string());
            }
        });

        self.worker = Some(worker);
        self.parent_inbox_tx = Some(inbox_tx.clone());
        self.parent_outbox_rx = Some(outbox_rx.clone());
        parent_world.insert_resource(ParentInbox(inbox_tx));
        parent_world.insert_resource(ParentOutbox(outbox_rx));

        let deadline = Instant::now() + READY_TIMEOUT;
        while !self.ready_flag.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                self.stop(parent_world);
                return Err(EcsError::WorkerNeverReady);
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
        if let Some(msg) = self.error_slot.lock().take() {
            self.stop(parent_world);
            return Err(EcsError::WorkerFailed(msg));
        }
        Ok(())
    }

    /// Sets the stop flag, closes both channels (unblocking anything parked
    /// on `recv` inside the child), and joins the worker.
    pub fn stop(&mut self, parent_world: &mut World) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(tx) = self.parent_inbox_tx.take() {
            tx.close();
        }
        if let Some(rx) = self.parent_outbox_rx.take() {
            rx.close();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        parent_world.remove_resource::<ParentInbox<Inbox>>();
        parent_world.remove_resource::<ParentOutbox<Outbox>>();
    }

    /// Idempotent `stop` — safe to call on a `SubApp` that was never
    /// started or was already stopped.
    pub fn deinit(&mut self, parent_world: &mut World) {
        if self.worker.is_some() {
            self.stop(parent_world);
        }
    }
}

/// Parent-side system parameter: sends values of type `Inbox` to the child.
pub struct InboxSender<'w, Inbox: Send + 'static>(&'w Sender<Inbox>);

impl<Inbox: Send + 'static> InboxSender<'_, Inbox> {
    pub fn send(&self, value: Inbox) -> Result<()> {
        self.0.send(value)
    }
}

impl<'w, Inbox: Send + 'static> SystemParam<'w> for InboxSender<'w, Inbox> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        let world: &'w World = unsafe { &*commands.world_ptr() };
        world
            .resource::<ParentInbox<Inbox>>()
            .map(|r| InboxSender(&r.0))
            .ok_or(EcsError::MissingSubAppResource("ParentInbox"))
    }
}

/// Parent-side system parameter: receives values of type `Outbox` from the
/// child without blocking.
pub struct OutboxReceiver<'w, Outbox: Send + 'static>(&'w Receiver<Outbox>);

impl<Outbox: Send + 'static> OutboxReceiver<'_, Outbox> {
    pub fn try_recv(&self) -> Result<Outbox> {
        self.0.try_recv()
    }
}

impl<'w, Outbox: Send + 'static> SystemParam<'w> for OutboxReceiver<'w, Outbox> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        let world: &'w World = unsafe { &*commands.world_ptr() };
        world
            .resource::<ParentOutbox<Outbox>>()
            .map(|r| OutboxReceiver(&r.0))
            .ok_or(EcsError::MissingSubAppResource("ParentOutbox"))
    }
}

/// Child-side system parameter: receives values of type `Inbox` from the
/// parent without blocking.
pub struct InboxReceiver<'w, Inbox: Send + 'static>(&'w Receiver<Inbox>);

impl<Inbox: Send + 'static> InboxReceiver<'_, Inbox> {
    pub fn try_recv(&self) -> Result<Inbox> {
        self.0.try_recv()
    }
}

impl<'w, Inbox: Send + 'static> SystemParam<'w> for InboxReceiver<'w, Inbox> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        let world: &'w World = unsafe { &*commands.world_ptr() };
        world
            .resource::<ChildInbox<Inbox>>()
            .map(|r| InboxReceiver(&r.0))
            .ok_or(EcsError::MissingSubAppResource("ChildInbox"))
    }
}

/// Child-side system parameter: sends values of type `Outbox` to the parent.
pub struct OutboxSender<'w, Outbox: Send + 'static>(&'w Sender<Outbox>);

impl<Outbox: Send + 'static> OutboxSender<'_, Outbox> {
    pub fn send(&self, value: Outbox) -> Result<()> {
        self.0.send(value)
    }
}

impl<'w, Outbox: Send + 'static> SystemParam<'w> for OutboxSender<'w, Outbox> {
    fn init(_system: SystemId, commands: &Commands<'w>) -> Result<Self> {
        let world: &'w World = unsafe { &*commands.world_ptr() };
        world
            .resource::<ChildOutbox<Outbox>>()
            .map(|r| OutboxSender(&r.0))
            .ok_or(EcsError::MissingSubAppResource("ChildOutbox"))
    }
}
