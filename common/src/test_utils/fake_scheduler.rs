// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        time::{Duration, Time},
        timer::{EventId, Scheduler},
    },
    std::{
        cell::RefCell,
        cmp::Reverse,
        collections::{BinaryHeap, HashSet},
        rc::Rc,
    },
};

struct Inner {
    now: Time,
    next_id: u64,
    next_seq: u64,
    // (deadline nanos, scheduling sequence, event id, client tag). The
    // sequence makes equal-deadline events fire in scheduling order.
    heap: BinaryHeap<Reverse<(i64, u64, u64, usize)>>,
    canceled: HashSet<u64>,
}

/// A deterministic virtual clock implementing `Scheduler`.
///
/// Events at distinct deadlines fire in deadline order; events at the same
/// deadline fire in the order they were scheduled. Cancellation is
/// idempotent: canceling a fired or unknown handle is a no-op.
///
/// Cloned handles share one clock. A harness driving several components
/// tags each component's handle with `for_client` and routes fired events
/// back to their owner by tag.
#[derive(Clone)]
pub struct FakeScheduler {
    inner: Rc<RefCell<Inner>>,
    client: usize,
}

impl FakeScheduler {
    pub fn new() -> Self {
        let inner = Inner {
            now: Time::ZERO,
            next_id: 0,
            next_seq: 0,
            heap: BinaryHeap::new(),
            canceled: HashSet::new(),
        };
        Self { inner: Rc::new(RefCell::new(inner)), client: 0 }
    }

    /// Returns a handle to the same clock tagged with `client`.
    pub fn for_client(&self, client: usize) -> FakeScheduler {
        FakeScheduler { inner: Rc::clone(&self.inner), client }
    }

    pub fn set_time(&self, time: Time) {
        self.inner.borrow_mut().now = time;
    }

    pub fn increment_time(&self, duration: Duration) {
        let mut inner = self.inner.borrow_mut();
        inner.now = inner.now + duration;
    }

    /// Pops the next pending event and advances the clock to its deadline.
    /// Returns the owning client tag and the event's handle.
    pub fn next_event(&self) -> Option<(usize, EventId)> {
        let mut inner = self.inner.borrow_mut();
        while let Some(Reverse((deadline, _seq, id, client))) = inner.heap.pop() {
            if inner.canceled.remove(&id) {
                continue;
            }
            if Time::from_nanos(deadline) > inner.now {
                inner.now = Time::from_nanos(deadline);
            }
            return Some((client, EventId(id)));
        }
        None
    }

    /// Deadline of the soonest pending event, if any.
    pub fn next_deadline(&self) -> Option<Time> {
        let inner = self.inner.borrow();
        inner
            .heap
            .iter()
            .filter(|Reverse((_, _, id, _))| !inner.canceled.contains(id))
            .map(|Reverse((deadline, _, _, _))| Time::from_nanos(*deadline))
            .min()
    }

    pub fn pending_event_count(&self) -> usize {
        let inner = self.inner.borrow();
        inner.heap.iter().filter(|Reverse((_, _, id, _))| !inner.canceled.contains(id)).count()
    }
}

impl Scheduler for FakeScheduler {
    fn schedule(&mut self, deadline: Time) -> EventId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        inner.next_seq += 1;
        let id = inner.next_id;
        let seq = inner.next_seq;
        inner.heap.push(Reverse((deadline.into_nanos(), seq, id, self.client)));
        EventId(id)
    }

    fn cancel(&mut self, id: EventId) {
        self.inner.borrow_mut().canceled.insert(id.0);
    }

    fn now(&self) -> Time {
        self.inner.borrow().now
    }
}
