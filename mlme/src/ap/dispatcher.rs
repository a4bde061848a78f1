// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Mirrors each peer's TWT service-period timeline on the AP side. The first
//! boundary is computed once at setup as the peer's target wake time shifted
//! by the time remaining until the next beacon; every later boundary advances
//! by whole wake intervals, so the two ends stay aligned without any further
//! signaling.

use {
    super::ApTimedEvent,
    crate::twt::{FlowId, TwtAgreement},
    std::collections::HashMap,
    wlan_ps_common::{
        mac::Aid,
        time::{Duration, Time},
        timer::{EventId, Timer},
    },
};

struct SpSchedule {
    next_start: Time,
    start_handle: EventId,
    end_handle: Option<EventId>,
}

pub struct ServicePeriodDispatcher {
    periods: HashMap<(Aid, FlowId), SpSchedule>,
}

impl ServicePeriodDispatcher {
    pub fn new() -> Self {
        Self { periods: HashMap::new() }
    }

    /// Installs the mirrored schedule for a freshly negotiated agreement and
    /// arms the first SP-start timer. `beacon_offset` is the time remaining
    /// until the next beacon at the instant of setup.
    pub fn install(
        &mut self,
        timer: &mut Timer<ApTimedEvent>,
        agreement: &TwtAgreement,
        beacon_offset: Duration,
    ) {
        let mut first_start = agreement.next_wake_time + beacon_offset;
        let now = timer.now();
        while first_start <= now {
            first_start = first_start + agreement.wake_interval;
        }
        let key = (agreement.peer, agreement.flow_id);
        if let Some(stale) = self.periods.remove(&key) {
            timer.cancel_event(stale.start_handle);
            if let Some(end) = stale.end_handle {
                timer.cancel_event(end);
            }
        }
        let start_handle = timer.schedule_event(
            first_start,
            ApTimedEvent::SpStart { peer: agreement.peer, flow_id: agreement.flow_id },
        );
        self.periods
            .insert(key, SpSchedule { next_start: first_start, start_handle, end_handle: None });
    }

    /// Advances the schedule at an SP-start firing: arms the SP-end timer
    /// and, for implicit agreements, the next SP-start. A still-armed end
    /// handle from an overlapping earlier period is canceled first rather
    /// than double-scheduled. Returns false for an unknown (torn-down)
    /// schedule.
    pub fn handle_sp_start(
        &mut self,
        timer: &mut Timer<ApTimedEvent>,
        agreement: &TwtAgreement,
    ) -> bool {
        let key = (agreement.peer, agreement.flow_id);
        let schedule = match self.periods.get_mut(&key) {
            Some(schedule) => schedule,
            None => return false,
        };
        if let Some(stale_end) = schedule.end_handle.take() {
            timer.cancel_event(stale_end);
        }
        schedule.end_handle = Some(timer.schedule_after(
            agreement.nominal_wake_duration,
            ApTimedEvent::SpEnd { peer: agreement.peer, flow_id: agreement.flow_id },
        ));
        if agreement.implicit {
            schedule.next_start = schedule.next_start + agreement.wake_interval;
            schedule.start_handle = timer.schedule_event(
                schedule.next_start,
                ApTimedEvent::SpStart { peer: agreement.peer, flow_id: agreement.flow_id },
            );
        }
        true
    }

    /// Marks the end of the current period. Returns false for an unknown
    /// schedule.
    pub fn handle_sp_end(&mut self, peer: Aid, flow_id: FlowId) -> bool {
        match self.periods.get_mut(&(peer, flow_id)) {
            Some(schedule) => {
                schedule.end_handle = None;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, timer: &mut Timer<ApTimedEvent>, peer: Aid, flow_id: FlowId) {
        if let Some(schedule) = self.periods.remove(&(peer, flow_id)) {
            timer.cancel_event(schedule.start_handle);
            if let Some(end) = schedule.end_handle {
                timer.cancel_event(end);
            }
        }
    }

    pub fn remove_peer(&mut self, timer: &mut Timer<ApTimedEvent>, peer: Aid) {
        let keys: Vec<_> = self.periods.keys().filter(|(aid, _)| *aid == peer).copied().collect();
        for (peer, flow_id) in keys {
            self.remove(timer, peer, flow_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::twt::tests::agreement,
        wlan_ps_common::{test_utils::fake_scheduler::FakeScheduler, time::DurationNum},
    };

    fn setup() -> (FakeScheduler, Timer<ApTimedEvent>, ServicePeriodDispatcher) {
        let clock = FakeScheduler::new();
        let timer = Timer::new(Box::new(clock.clone()));
        (clock, timer, ServicePeriodDispatcher::new())
    }

    #[test]
    fn install_arms_first_start_at_beacon_shifted_boundary() {
        let (clock, mut timer, mut dispatcher) = setup();
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0) + 50.millis();
        dispatcher.install(&mut timer, &a, 30.millis());
        assert_eq!(clock.next_deadline(), Some(Time::from_nanos(0) + 80.millis()));
    }

    #[test]
    fn past_target_wake_time_advances_by_whole_intervals() {
        let (clock, mut timer, mut dispatcher) = setup();
        clock.set_time(Time::from_nanos(0) + 250.millis());
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0);
        dispatcher.install(&mut timer, &a, 0.millis());
        // wake_interval is 100ms; the first future boundary is 300ms.
        assert_eq!(clock.next_deadline(), Some(Time::from_nanos(0) + 300.millis()));
    }

    #[test]
    fn sp_start_arms_end_and_next_start() {
        let (clock, mut timer, mut dispatcher) = setup();
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        dispatcher.install(&mut timer, &a, 0.millis());

        let (_, id) = clock.next_event().expect("expected SP start");
        assert!(matches!(
            timer.triggered(&id),
            Some(ApTimedEvent::SpStart { peer: 1, .. })
        ));
        assert!(dispatcher.handle_sp_start(&mut timer, &a));

        // End fires at start + nominal wake duration (10ms), the next start
        // one wake interval after the previous boundary.
        let (_, id) = clock.next_event().expect("expected SP end");
        assert!(matches!(timer.triggered(&id), Some(ApTimedEvent::SpEnd { peer: 1, .. })));
        assert!(dispatcher.handle_sp_end(1, a.flow_id));
        assert_eq!(clock.next_deadline(), Some(Time::from_nanos(0) + 110.millis()));
    }

    #[test]
    fn overlapping_start_cancels_stale_end() {
        let (clock, mut timer, mut dispatcher) = setup();
        let mut a = agreement(1, 0);
        // Duration equal to the interval: the next start coincides with the
        // pending end.
        a.nominal_wake_duration = a.wake_interval;
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        dispatcher.install(&mut timer, &a, 0.millis());

        let (_, id) = clock.next_event().expect("expected first start");
        timer.triggered(&id);
        dispatcher.handle_sp_start(&mut timer, &a);
        // Both the end and the next start are armed for the same instant;
        // handling the second start must cancel the stale end.
        let (_, id) = clock.next_event().expect("expected an event");
        if matches!(timer.triggered(&id), Some(ApTimedEvent::SpStart { .. })) {
            dispatcher.handle_sp_start(&mut timer, &a);
        } else {
            dispatcher.handle_sp_end(1, a.flow_id);
            let (_, id) = clock.next_event().expect("expected next start");
            timer.triggered(&id);
            dispatcher.handle_sp_start(&mut timer, &a);
        }
        // Exactly one end and one start remain armed.
        assert_eq!(timer.scheduled_event_count(), 2);
    }

    #[test]
    fn remove_cancels_all_handles() {
        let (clock, mut timer, mut dispatcher) = setup();
        let mut a = agreement(1, 0);
        a.next_wake_time = Time::from_nanos(0) + 10.millis();
        dispatcher.install(&mut timer, &a, 0.millis());
        dispatcher.remove(&mut timer, 1, a.flow_id);
        assert_eq!(timer.scheduled_event_count(), 0);
        assert_eq!(clock.pending_event_count(), 0);
        assert!(!dispatcher.handle_sp_end(1, a.flow_id));
    }
}
