// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Station-side TWT bookkeeping: the local copies of negotiated agreements
//! and the SP-start/SP-end timers derived from them. Whether an SP start
//! actually wakes the radio depends on the flow type: unannounced flows wake
//! every period, announced flows only when the wake-for-next-SP flag was set
//! beforehand.

use {
    super::ClientTimedEvent,
    crate::twt::{FlowId, TwtAgreement},
    std::collections::HashMap,
    wlan_ps_common::timer::{EventId, Timer},
};

struct SessionEntry {
    agreement: TwtAgreement,
    start_handle: EventId,
    end_handle: Option<EventId>,
    wake_for_next_sp: bool,
}

/// What to do at an SP-start firing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpStart {
    pub agreement: TwtAgreement,
    /// False for an announced flow whose wake flag was not set; the radio
    /// stays down and the period is skipped.
    pub wake: bool,
}

pub struct TwtSession {
    entries: HashMap<FlowId, SessionEntry>,
}

impl TwtSession {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn agreement(&self, flow_id: FlowId) -> Option<&TwtAgreement> {
        self.entries.get(&flow_id).map(|e| &e.agreement)
    }

    /// Installs a local agreement copy and arms its first SP-start timer,
    /// replacing any prior agreement with the same flow id.
    pub fn install(&mut self, timer: &mut Timer<ClientTimedEvent>, agreement: TwtAgreement) {
        let mut first_start = agreement.next_wake_time;
        let now = timer.now();
        while first_start <= now {
            first_start = first_start + agreement.wake_interval;
        }
        if let Some(stale) = self.entries.remove(&agreement.flow_id) {
            timer.cancel_event(stale.start_handle);
            if let Some(end) = stale.end_handle {
                timer.cancel_event(end);
            }
        }
        let start_handle =
            timer.schedule_event(first_start, ClientTimedEvent::SpStart { flow_id: agreement.flow_id });
        self.entries.insert(
            agreement.flow_id,
            SessionEntry { agreement, start_handle, end_handle: None, wake_for_next_sp: false },
        );
    }

    /// Advances the schedule at an SP-start firing. A leftover end handle
    /// from an overlapping previous period is canceled, not doubled.
    pub fn handle_sp_start(
        &mut self,
        timer: &mut Timer<ClientTimedEvent>,
        flow_id: FlowId,
    ) -> Option<SpStart> {
        let entry = self.entries.get_mut(&flow_id)?;
        if let Some(stale_end) = entry.end_handle.take() {
            timer.cancel_event(stale_end);
        }
        entry.end_handle = Some(timer.schedule_after(
            entry.agreement.nominal_wake_duration,
            ClientTimedEvent::SpEnd { flow_id },
        ));
        entry.agreement.next_wake_time =
            entry.agreement.next_wake_time + entry.agreement.wake_interval;
        if entry.agreement.implicit {
            entry.start_handle = timer
                .schedule_event(entry.agreement.next_wake_time, ClientTimedEvent::SpStart { flow_id });
        }
        let wake = entry.agreement.unannounced || entry.wake_for_next_sp;
        entry.wake_for_next_sp = false;
        Some(SpStart { agreement: entry.agreement, wake })
    }

    /// Returns false for an unknown (torn-down) flow.
    pub fn handle_sp_end(&mut self, flow_id: FlowId) -> bool {
        match self.entries.get_mut(&flow_id) {
            Some(entry) => {
                entry.end_handle = None;
                true
            }
            None => false,
        }
    }

    /// For announced flows: request a wake at the next SP start.
    pub fn set_wake_for_next_sp(&mut self, flow_id: FlowId) -> bool {
        match self.entries.get_mut(&flow_id) {
            Some(entry) => {
                entry.wake_for_next_sp = true;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, timer: &mut Timer<ClientTimedEvent>, flow_id: FlowId) -> bool {
        match self.entries.remove(&flow_id) {
            Some(entry) => {
                timer.cancel_event(entry.start_handle);
                if let Some(end) = entry.end_handle {
                    timer.cancel_event(end);
                }
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self, timer: &mut Timer<ClientTimedEvent>) {
        let flow_ids: Vec<_> = self.entries.keys().copied().collect();
        for flow_id in flow_ids {
            self.remove(timer, flow_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::twt::tests::agreement,
        wlan_ps_common::{
            test_utils::fake_scheduler::FakeScheduler,
            time::{DurationNum, Time},
        },
    };

    fn setup() -> (FakeScheduler, Timer<ClientTimedEvent>, TwtSession) {
        let clock = FakeScheduler::new();
        let timer = Timer::new(Box::new(clock.clone()));
        (clock, timer, TwtSession::new())
    }

    #[test]
    fn unannounced_flow_wakes_every_period() {
        let (clock, mut timer, mut session) = setup();
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        session.install(&mut timer, a);

        for _ in 0..3 {
            let (_, id) = clock.next_event().expect("expected SP start");
            match timer.triggered(&id) {
                Some(ClientTimedEvent::SpStart { flow_id }) => {
                    let start =
                        session.handle_sp_start(&mut timer, flow_id).expect("unknown flow");
                    assert!(start.wake);
                }
                Some(ClientTimedEvent::SpEnd { flow_id }) => {
                    assert!(session.handle_sp_end(flow_id));
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn announced_flow_wakes_only_when_flagged() {
        let (clock, mut timer, mut session) = setup();
        let mut a = agreement(1, 0);
        a.unannounced = false;
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        session.install(&mut timer, a);

        let (_, id) = clock.next_event().expect("expected SP start");
        timer.triggered(&id);
        let start = session.handle_sp_start(&mut timer, a.flow_id).expect("unknown flow");
        assert!(!start.wake);

        assert!(session.set_wake_for_next_sp(a.flow_id));
        // Skip the pending SP end, take the next start.
        loop {
            let (_, id) = clock.next_event().expect("expected an event");
            match timer.triggered(&id) {
                Some(ClientTimedEvent::SpEnd { flow_id }) => {
                    session.handle_sp_end(flow_id);
                }
                Some(ClientTimedEvent::SpStart { flow_id }) => {
                    let start =
                        session.handle_sp_start(&mut timer, flow_id).expect("unknown flow");
                    assert!(start.wake);
                    break;
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        // The flag is one-shot.
        let mut saw_start = false;
        while let Some((_, id)) = clock.next_event() {
            if let Some(ClientTimedEvent::SpStart { flow_id }) = timer.triggered(&id) {
                let start = session.handle_sp_start(&mut timer, flow_id).expect("unknown flow");
                assert!(!start.wake);
                saw_start = true;
                break;
            }
        }
        assert!(saw_start);
    }

    #[test]
    fn remove_cancels_timers() {
        let (clock, mut timer, mut session) = setup();
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        session.install(&mut timer, a);
        assert!(session.remove(&mut timer, a.flow_id));
        assert!(session.is_empty());
        assert_eq!(clock.pending_event_count(), 0);
        assert!(session.handle_sp_start(&mut timer, a.flow_id).is_none());
    }

    #[test]
    fn reinstall_replaces_schedule() {
        let (clock, mut timer, mut session) = setup();
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        session.install(&mut timer, a);
        a.next_wake_time = Time::from_nanos(0) + 40.millis();
        session.install(&mut timer, a);
        assert_eq!(clock.pending_event_count(), 1);
        assert_eq!(clock.next_deadline(), Some(Time::from_nanos(0) + 40.millis()));
    }
}
