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

//! A bounded broadcast channel backed by a ring buffer: every subscriber
//! sees every value pushed after it subscribed, unless it falls far enough
//! behind that the ring has overwritten what it hadn't read yet. Used by
//! [`crate::events::Events`] to fan one writer out to many `EventReader`s.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{EcsError, Result};

/// Identifies one subscriber's read cursor within a [`Broadcast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

struct Inner<T> {
    ring: VecDeque<T>,
    /// Sequence number of `ring.front()`; the minimum of all live cursors,
    /// or `head()` when there are no subscribers.
    tail: u64,
    cursors: HashMap<SubscriberId, u64>,
}

impl<T> Inner<T> {
    fn head(&self) -> u64 {
        self.tail + self.ring.len() as u64
    }

    fn get(&self, seq: u64) -> Option<&T> {
        if seq < self.tail {
            return None;
        }
        self.ring.get((seq - self.tail) as usize)
    }

    /// Advances `tail` to the minimum live cursor and drops anything before
    /// it — the slots no subscriber still needs.
    fn retire(&mut self) {
        let floor = self.cursors.values().copied().min().unwrap_or_else(|| self.head());
        while self.tail < floor {
            self.ring.pop_front();
            self.tail += 1;
        }
    }
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    closed: Mutex<bool>,
}

/// A bounded ring-buffer broadcast channel. Cheaply cloneable; every clone
/// shares the same underlying ring and subscriber registry.
pub struct Broadcast<T> {
    shared: Arc<Shared<T>>,
    next_subscriber: Arc<AtomicU64>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Broadcast {
            shared: self.shared.clone(),
            next_subscriber: self.next_subscriber.clone(),
        }
    }
}

impl<T: Clone> Broadcast<T> {
    pub fn new(capacity: usize) -> Self {
        Broadcast {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    ring: VecDeque::with_capacity(capacity),
                    tail: 0,
                    cursors: HashMap::new(),
                }),
                not_full: Condvar::new(),
                not_empty: Condvar::new(),
                capacity,
                closed: Mutex::new(false),
            }),
            next_subscriber: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Blocks while the slowest live subscriber hasn't advanced far enough
    /// to open a slot; fails immediately once the channel is closed.
    pub fn push(&self, value: T) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        loop {
            if *self.shared.closed.lock() {
                return Err(EcsError::Closed);
            }
            if inner.ring.len() < self.shared.capacity {
                inner.ring.push_back(value);
                self.shared.not_empty.notify_all();
                return Ok(());
            }
            self.shared.not_full.wait(&mut inner);
        }
    }

    /// Pushes without blocking; fails if the ring is at capacity or the
    /// channel is closed.
    pub fn try_push(&self, value: T) -> Result<()> {
        if *self.shared.closed.lock() {
            return Err(EcsError::Closed);
        }
        let mut inner = self.shared.inner.lock();
        if inner.ring.len() >= self.shared.capacity {
            return Err(EcsError::QueueFull);
        }
        inner.ring.push_back(value);
        self.shared.not_empty.notify_all();
        Ok(())
    }

    /// Registers a new subscriber whose cursor starts at the current head
    /// (it only sees values pushed from now on).
    pub fn subscribe(&self) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.shared.inner.lock();
        let head = inner.head();
        inner.cursors.insert(id, head);
        inner.retire();
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut inner = self.shared.inner.lock();
        inner.cursors.remove(&id);
        inner.retire();
        drop(inner);
        self.shared.not_full.notify_all();
    }

    /// Drains every value `id` hasn't yet read, oldest first. If the ring
    /// retired entries `id`'s cursor still pointed at, those are silently
    /// skipped and the cursor is snapped forward to the oldest surviving
    /// entry — logged as a warning since it means a slow subscriber missed
    /// events. Once the channel is closed and `id` has caught up to `head`,
    /// further calls fail with `QueueClosed`.
    pub fn drain(&self, id: SubscriberId) -> Result<Vec<T>> {
        let mut inner = self.shared.inner.lock();
        let mut cursor = *inner.cursors.get(&id).unwrap_or(&inner.tail);
        if cursor < inner.tail {
            let missed = inner.tail - cursor;
            tracing::warn!(subscriber = id.0, missed, "BroadcastChannel subscriber dropped {missed} events, advancing cursor");
            cursor = inner.tail;
        }
        let mut out = Vec::new();
        while cursor < inner.head() {
            if let Some(value) = inner.get(cursor) {
                out.push(value.clone());
            }
            cursor += 1;
        }
        inner.cursors.insert(id, cursor);
        inner.retire();
        drop(inner);
        self.shared.not_full.notify_all();
        if out.is_empty() && *self.shared.closed.lock() {
            return Err(EcsError::QueueClosed);
        }
        Ok(out)
    }

    /// Idempotently closes the channel: wakes every thread blocked in
    /// `push`, and causes subsequent `push`/`try_push` to fail with
    /// `Closed` and a fully-drained `drain` to fail with `QueueClosed`.
    pub fn close(&self) {
        *self.shared.closed.lock() = true;
        self.shared.not_full.notify_all();
        self.shared.not_empty.notify_all();
    }

    /// Alias for [`Broadcast::close`], matching the channel-handle release
    /// vocabulary used elsewhere (idempotent, safe to call more than once).
    pub fn deinit(&self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_only_sees_values_pushed_after_subscribe() {
        let bc: Broadcast<i32> = Broadcast::new(4);
        bc.push(1).unwrap();
        let sub = bc.subscribe();
        bc.push(2).unwrap();
        bc.push(3).unwrap();
        assert_eq!(bc.drain(sub).unwrap(), vec![2, 3]);
    }

    #[test]
    fn two_subscribers_each_see_every_value() {
        let bc: Broadcast<i32> = Broadcast::new(4);
        let a = bc.subscribe();
        let b = bc.subscribe();
        bc.push(10).unwrap();
        bc.push(20).unwrap();
        assert_eq!(bc.drain(a).unwrap(), vec![10, 20]);
        assert_eq!(bc.drain(b).unwrap(), vec![10, 20]);
    }

    #[test]
    fn push_blocks_until_the_slowest_subscriber_drains() {
        use std::sync::atomic::AtomicBool;
        use std::time::Duration;

        let bc: Broadcast<i32> = Broadcast::new(2);
        let sub = bc.subscribe();
        bc.push(1).unwrap();
        bc.push(2).unwrap();

        let blocked = bc.clone();
        let done = Arc::new(AtomicBool::new(false));
        let done_writer = done.clone();
        let handle = std::thread::spawn(move || {
            blocked.push(3).unwrap();
            done_writer.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(30));
        assert!(!done.load(Ordering::SeqCst));

        assert_eq!(bc.drain(sub).unwrap(), vec![1, 2]);
        handle.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(bc.drain(sub).unwrap(), vec![3]);
    }

    #[test]
    fn try_push_fails_once_the_slowest_subscriber_fills_the_ring() {
        let bc: Broadcast<i32> = Broadcast::new(2);
        let sub = bc.subscribe();
        bc.try_push(1).unwrap();
        bc.try_push(2).unwrap();
        assert_eq!(bc.try_push(3), Err(EcsError::QueueFull));
        bc.drain(sub).unwrap();
        bc.try_push(3).unwrap();
    }

    #[test]
    fn close_wakes_a_blocked_push_and_fails_it() {
        let bc: Broadcast<i32> = Broadcast::new(1);
        let sub = bc.subscribe();
        bc.push(1).unwrap();

        let blocked = bc.clone();
        let handle = std::thread::spawn(move || blocked.push(2));

        std::thread::sleep(std::time::Duration::from_millis(20));
        bc.close();
        assert_eq!(handle.join().unwrap(), Err(EcsError::Closed));
        assert_eq!(bc.drain(sub).unwrap(), vec![1]);
    }

    #[test]
    fn drain_reports_queue_closed_once_caught_up() {
        let bc: Broadcast<i32> = Broadcast::new(4);
        let sub = bc.subscribe();
        bc.push(1).unwrap();
        bc.close();
        assert_eq!(bc.drain(sub).unwrap(), vec![1]);
        assert_eq!(bc.drain(sub), Err(EcsError::QueueClosed));
    }
}
