// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::time::{Duration, Time},
    std::collections::HashMap,
};

/// Opaque handle for a scheduled event. Handles are unique for the lifetime
/// of the scheduler that issued them and are never reused.
#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(pub(crate) u64);

/// A scheduler to schedule and cancel timeouts. Implemented by the platform
/// timer service in production and by a virtual clock in tests.
pub trait Scheduler {
    /// Requests to schedule an event. Returns a unique ID used to cancel the
    /// scheduled event.
    fn schedule(&mut self, deadline: Time) -> EventId;

    /// Cancels a previously scheduled event. Canceling an event which already
    /// fired or was already canceled is a no-op.
    fn cancel(&mut self, id: EventId);

    /// The scheduler's current time.
    fn now(&self) -> Time;
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
///
/// Each scheduled event carries a caller-defined payload which is handed back
/// through `triggered` when the deadline fires. An event which was canceled,
/// or already retrieved, yields `None`, so duplicate firings of a stale
/// handle are harmless.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    pub fn now(&self) -> Time {
        self.scheduler.now()
    }

    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_event(&mut self, deadline: Time, event: E) -> EventId {
        let event_id = self.scheduler.schedule(deadline);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn schedule_after(&mut self, duration: Duration, event: E) -> EventId {
        let deadline = self.scheduler.now() + duration;
        self.schedule_event(deadline, event)
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        self.events.remove(&event_id);
        self.scheduler.cancel(event_id);
    }

    pub fn cancel_all(&mut self) {
        for (event_id, _event) in self.events.drain() {
            self.scheduler.cancel(event_id);
        }
    }

    /// Number of events which were scheduled but neither fired nor canceled.
    pub fn scheduled_event_count(&self) -> usize {
        self.events.len()
    }
}
