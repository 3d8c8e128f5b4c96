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

//! A bounded, multi-producer multi-consumer point-to-point channel, used by
//! [`crate::subapp::SubApp`] to move messages between a `World` and its
//! worker thread. One value delivered to exactly one `recv` caller.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{EcsError, Result};

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    closed: Mutex<bool>,
}

/// The sending half of a [`channel`].
pub struct Sender<T> {
    shared: Arc<Shared<T>>,
}

/// The receiving half of a [`channel`].
pub struct Receiver<T> {
    shared: Arc<Shared<T>>,
}

/// Creates a bounded channel holding at most `capacity` queued values.
pub fn channel<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        capacity,
        closed: Mutex::new(false),
    });
    (
        Sender { shared: shared.clone() },
        Receiver { shared },
    )
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender { shared: self.shared.clone() }
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Receiver { shared: self.shared.clone() }
    }
}

impl<T> Sender<T> {
    /// Blocks until there is room in the queue, then pushes `value`.
    pub fn send(&self, value: T) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        loop {
            if *self.shared.closed.lock() {
                return Err(EcsError::Closed);
            }
            if queue.len() < self.shared.capacity {
                queue.push_back(value);
                self.shared.not_empty.notify_one();
                return Ok(());
            }
            self.shared.not_full.wait(&mut queue);
        }
    }

    /// Pushes `value` without blocking; fails if the queue is full or closed.
    pub fn try_send(&self, value: T) -> Result<()> {
        if *self.shared.closed.lock() {
            return Err(EcsError::Closed);
        }
        let mut queue = self.shared.queue.lock();
        if queue.len() >= self.shared.capacity {
            return Err(EcsError::QueueFull);
        }
        queue.push_back(value);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Closes the channel, waking every blocked sender and receiver. Any
    /// values still queued remain available to `recv`/`try_recv`.
    pub fn close(&self) {
        *self.shared.closed.lock() = true;
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }
}

impl<T> Receiver<T> {
    /// Blocks until a value is available or the channel closes.
    pub fn recv(&self) -> Result<T> {
        let mut queue = self.shared.queue.lock();
        loop {
            if let Some(value) = queue.pop_front() {
                self.shared.not_full.notify_one();
                return Ok(value);
            }
            if *self.shared.closed.lock() {
                return Err(EcsError::Closed);
            }
            self.shared.not_empty.wait(&mut queue);
        }
    }

    /// Pops a queued value without blocking.
    pub fn try_recv(&self) -> Result<T> {
        let mut queue = self.shared.queue.lock();
        if let Some(value) = queue.pop_front() {
            self.shared.not_full.notify_one();
            return Ok(value);
        }
        if *self.shared.closed.lock() {
            Err(EcsError::Closed)
        } else {
            Err(EcsError::QueueFull)
        }
    }

    pub fn close(&self) {
        *self.shared.closed.lock() = true;
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recv_roundtrips() {
        let (tx, rx) = channel::<i32>(4);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(rx.recv().unwrap(), 1);
        assert_eq!(rx.recv().unwrap(), 2);
    }

    #[test]
    fn try_send_fails_when_full() {
        let (tx, _rx) = channel::<i32>(1);
        tx.send(1).unwrap();
        assert_eq!(tx.try_send(2), Err(EcsError::QueueFull));
    }

    #[test]
    fn closed_channel_fails_recv_once_drained() {
        let (tx, rx) = channel::<i32>(2);
        tx.send(7).unwrap();
        tx.close();
        assert_eq!(rx.recv().unwrap(), 7);
        assert_eq!(rx.recv(), Err(EcsError::Closed));
    }
}
