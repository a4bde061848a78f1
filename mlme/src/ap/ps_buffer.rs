// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    log::debug,
    std::collections::{HashMap, VecDeque},
    wlan_ps_common::{
        mac::{is_group_addr, MacAddr},
        time::{Duration, Time},
    },
};

/// One frame held while its destination sleeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedFrame {
    pub enqueued_at: Time,
    pub dest: MacAddr,
    pub payload: Vec<u8>,
}

/// Bounded power-save buffering: one queue per unicast destination and a
/// single shared queue for group-addressed frames. Overflow and age limits
/// both evict drop-oldest; eviction runs lazily on enqueue rather than on a
/// timer.
pub struct PsBufferManager {
    capacity: usize,
    max_age: Duration,
    unicast: HashMap<MacAddr, VecDeque<BufferedFrame>>,
    multicast: VecDeque<BufferedFrame>,
    evicted_overflow: u64,
    evicted_expired: u64,
}

impl PsBufferManager {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        Self {
            capacity,
            max_age,
            unicast: HashMap::new(),
            multicast: VecDeque::new(),
            evicted_overflow: 0,
            evicted_expired: 0,
        }
    }

    pub fn enqueue(&mut self, dest: MacAddr, payload: Vec<u8>, now: Time) {
        let frame = BufferedFrame { enqueued_at: now, dest, payload };
        let max_age = self.max_age;
        let capacity = self.capacity;
        let (queue, expired, overflowed) = if is_group_addr(&dest) {
            (&mut self.multicast, &mut self.evicted_expired, &mut self.evicted_overflow)
        } else {
            (
                self.unicast.entry(dest).or_insert_with(VecDeque::new),
                &mut self.evicted_expired,
                &mut self.evicted_overflow,
            )
        };
        while let Some(front) = queue.front() {
            if now - front.enqueued_at <= max_age {
                break;
            }
            queue.pop_front();
            *expired += 1;
        }
        while queue.len() >= capacity {
            queue.pop_front();
            *overflowed += 1;
            debug!("PS buffer overflow for {:02x?}; dropped oldest frame", dest);
        }
        queue.push_back(frame);
    }

    /// Pops the oldest buffered unicast frame for `dest`. The returned flag
    /// is true when more frames remain, for the more-data bit.
    pub fn dequeue_one(&mut self, dest: &MacAddr) -> Option<(BufferedFrame, bool)> {
        let queue = self.unicast.get_mut(dest)?;
        let frame = queue.pop_front()?;
        let more = !queue.is_empty();
        if !more {
            self.unicast.remove(dest);
        }
        Some((frame, more))
    }

    pub fn dequeue_all_for(&mut self, dest: &MacAddr) -> Vec<BufferedFrame> {
        match self.unicast.remove(dest) {
            Some(queue) => queue.into(),
            None => vec![],
        }
    }

    /// Drains the shared group queue in full. Multicast delivery right after
    /// a DTIM beacon is atomic; a partial drain is never correct.
    pub fn drain_multicast(&mut self) -> Vec<BufferedFrame> {
        std::mem::take(&mut self.multicast).into()
    }

    pub fn occupancy_bytes(&self, dest: &MacAddr) -> usize {
        self.unicast.get(dest).map_or(0, |q| q.iter().map(|f| f.payload.len()).sum())
    }

    pub fn multicast_pending(&self) -> bool {
        !self.multicast.is_empty()
    }

    pub fn evicted_overflow(&self) -> u64 {
        self.evicted_overflow
    }

    pub fn evicted_expired(&self) -> u64 {
        self.evicted_expired
    }
}
