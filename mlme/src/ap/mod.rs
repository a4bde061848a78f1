// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The AP half: association table, power-save buffering with TIM/DTIM
//! signaling, the TWT setup responder, the mirrored service-period
//! dispatcher, and the multi-user scheduler front end.

mod dispatcher;
mod ps_buffer;
mod remote_client;
mod scheduler;
mod twt_store;

pub use {
    ps_buffer::{BufferedFrame, PsBufferManager},
    remote_client::{PowerBelief, RemoteClient},
    scheduler::{
        CandidateFrame, MuScheduler, SchedulingCandidate, StationView, TriggerVariant, TxFormat,
    },
    twt_store::TwtAgreementStore,
};

use {
    crate::{
        buffer_status::{BufferStatusMap, StationOccupancy},
        config::Config,
        device::DeviceOps,
        error::Error,
        twt::{FlowId, TwtAgreement},
    },
    dispatcher::ServicePeriodDispatcher,
    log::{debug, info, warn},
    wlan_ps_common::{
        ie::{
            tim::{self, TimElement},
            twt::{SetupCommand, TwtElement},
            twt_info::TwtInfo,
        },
        mac::{Aid, MacAddr, Tid},
        time::Time,
        timer::{EventId, Scheduler, Timer},
    },
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApTimedEvent {
    SpStart { peer: Aid, flow_id: FlowId },
    SpEnd { peer: Aid, flow_id: FlowId },
}

pub struct AccessPoint<D> {
    config: Config,
    device: D,
    timer: Timer<ApTimedEvent>,
    // Insertion order is scheduling tie-break order.
    clients: Vec<RemoteClient>,
    twt_store: TwtAgreementStore,
    ps_buffer: PsBufferManager,
    bsr: BufferStatusMap,
    dispatcher: ServicePeriodDispatcher,
    scheduler: MuScheduler,
    dtim_count: u8,
    next_beacon_time: Time,
    // Trigger-based peers left awake with nothing queued; each entry is one
    // outstanding channel-access request so a trigger can still be issued.
    access_requests: Vec<Aid>,
}

impl<D: DeviceOps> AccessPoint<D> {
    pub fn new(config: Config, device: D, scheduler: Box<dyn Scheduler>) -> Self {
        let timer = Timer::new(scheduler);
        let next_beacon_time = timer.now() + config.beacon_interval_duration();
        Self {
            ps_buffer: PsBufferManager::new(config.ps_buffer_capacity, config.ps_buffer_max_age()),
            bsr: BufferStatusMap::new(config.bsr_expiry()),
            scheduler: MuScheduler::new(config.min_exchange_time(), config.max_ru_per_trigger),
            config,
            device,
            timer,
            clients: vec![],
            twt_store: TwtAgreementStore::new(),
            dispatcher: ServicePeriodDispatcher::new(),
            dtim_count: 0,
            next_beacon_time,
            access_requests: vec![],
        }
    }

    pub fn device(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn associate(&mut self, aid: Aid, addr: MacAddr) -> Result<(), Error> {
        if aid == 0 || aid > wlan_ps_common::mac::MAX_AID {
            return Err(Error::OutOfRange("AID outside 1..=2007"));
        }
        if self.clients.iter().any(|c| c.aid == aid) {
            return Err(Error::InvalidState("AID already associated"));
        }
        info!("associated AID {}", aid);
        self.clients.push(RemoteClient::new(aid, addr));
        Ok(())
    }

    pub fn disassociate(&mut self, aid: Aid) -> Result<(), Error> {
        let idx = self
            .clients
            .iter()
            .position(|c| c.aid == aid)
            .ok_or(Error::NotAssociated(aid))?;
        let addr = self.clients[idx].addr;
        self.clients.remove(idx);
        self.twt_store.remove_all_for(aid);
        self.dispatcher.remove_peer(&mut self.timer, aid);
        self.bsr.clear_station(aid);
        let dropped = self.ps_buffer.dequeue_all_for(&addr);
        if !dropped.is_empty() {
            debug!("dropped {} buffered frames for departing AID {}", dropped.len(), aid);
        }
        self.access_requests.retain(|peer| *peer != aid);
        Ok(())
    }

    fn client(&self, aid: Aid) -> Result<&RemoteClient, Error> {
        self.clients.iter().find(|c| c.aid == aid).ok_or(Error::NotAssociated(aid))
    }

    fn client_mut(&mut self, aid: Aid) -> Result<&mut RemoteClient, Error> {
        self.clients.iter_mut().find(|c| c.aid == aid).ok_or(Error::NotAssociated(aid))
    }

    /// A downlink frame arrived for `aid`. Awake stations get it
    /// immediately; dozing stations get it buffered and announced in the
    /// next TIM.
    pub fn on_frame_enqueued_for_station(&mut self, aid: Aid, payload: Vec<u8>) -> Result<(), Error> {
        let client = self.client(aid)?;
        let addr = client.addr;
        if client.is_awake() {
            self.device.transmit_frame(addr, &payload, false, false);
        } else {
            self.ps_buffer.enqueue(addr, payload, self.timer.now());
        }
        Ok(())
    }

    pub fn enqueue_group_frame(&mut self, dest: MacAddr, payload: Vec<u8>) {
        self.ps_buffer.enqueue(dest, payload, self.timer.now());
    }

    /// Builds the TIM for the beacon about to go out, delivers group
    /// traffic when this beacon is a DTIM, and advances the DTIM countdown.
    pub fn on_beacon_about_to_be_built(&mut self) -> Result<TimElement, Error> {
        let is_dtim = self.dtim_count == 0;
        let group_pending = is_dtim && self.ps_buffer.multicast_pending();
        let buffered: Vec<Aid> = self
            .clients
            .iter()
            .filter(|c| c.ps_mode() && self.ps_buffer.occupancy_bytes(&c.addr) > 0)
            .map(|c| c.aid)
            .collect();
        let element =
            tim::encode(self.dtim_count, self.config.dtim_period, group_pending, buffered)?;

        if group_pending {
            let frames = self.ps_buffer.drain_multicast();
            let last = frames.len().saturating_sub(1);
            for (i, frame) in frames.iter().enumerate() {
                self.device.transmit_frame(frame.dest, &frame.payload, i < last, false);
            }
        }

        self.dtim_count =
            if self.dtim_count == 0 { self.config.dtim_period - 1 } else { self.dtim_count - 1 };
        self.next_beacon_time = self.next_beacon_time + self.config.beacon_interval_duration();
        Ok(element)
    }

    /// Legacy retrieval poll: releases exactly one buffered frame, with the
    /// more-data bit telling the station whether to poll again. A poll with
    /// an empty queue is answered with an empty frame so the station can go
    /// back to sleep.
    pub fn handle_ps_poll(&mut self, aid: Aid) -> Result<(), Error> {
        let addr = self.client(aid)?.addr;
        // The station slept since its last report; whatever occupancy we
        // still hold for it is stale.
        self.bsr.clear_station(aid);
        // A poll proves the station is listening right now, but it stays in
        // power-save mode.
        match self.ps_buffer.dequeue_one(&addr) {
            Some((frame, more)) => self.device.transmit_frame(addr, &frame.payload, more, false),
            None => self.device.transmit_frame(addr, &[], false, false),
        }
        Ok(())
    }

    /// Power-management bit of any received data/management frame. Leaving
    /// power save flushes everything buffered for the station; for a dozing
    /// delivery-enabled station any frame is the trigger starting an
    /// unscheduled service period, released in full with the more-data bit
    /// clear on the last frame as the end-of-period indication.
    pub fn handle_frame_rx(&mut self, aid: Aid, power_management: bool) -> Result<(), Error> {
        let client = self.client_mut(aid)?;
        let was_dozing = !client.is_awake();
        client.update_from_pm_bit(power_management);
        let addr = client.addr;
        let woke_up = was_dozing && client.is_awake();
        let apsd_trigger =
            client.apsd() && power_management && was_dozing && !client.is_awake();
        if woke_up || apsd_trigger {
            let frames = self.ps_buffer.dequeue_all_for(&addr);
            if frames.is_empty() && apsd_trigger {
                // Nothing buffered: end the period at once so the station
                // can go back to sleep.
                self.device.transmit_frame(addr, &[], false, false);
            }
            let last = frames.len().saturating_sub(1);
            for (i, frame) in frames.iter().enumerate() {
                self.device.transmit_frame(addr, &frame.payload, i < last, false);
            }
        }
        Ok(())
    }

    pub fn set_apsd(&mut self, aid: Aid, apsd: bool) -> Result<(), Error> {
        self.client_mut(aid)?.set_apsd(apsd)
    }

    /// A buffer status report from `aid`, as carried in a QoS control field
    /// or a BSR poll response.
    pub fn handle_buffer_status_report(&mut self, aid: Aid, tid: Tid, code: u8) -> Result<(), Error> {
        self.client(aid)?;
        let now = self.timer.now();
        self.bsr.report(aid, tid, code, now);
        Ok(())
    }

    /// Responder side of the TWT setup handshake. Acceptable requests and
    /// suggestions are accepted as-is; a suggestion with a wake duration
    /// longer than its interval is answered with a clamped alternate; a
    /// demand that cannot be honored, and any structurally invalid element,
    /// is rejected.
    pub fn handle_twt_setup(&mut self, aid: Aid, element: &TwtElement) -> Result<TwtElement, Error> {
        self.client(aid)?;
        let command = element.request_type.setup_command();
        if command.is_response() {
            return Err(Error::InvalidState("setup response received by responder"));
        }
        let flow_id = FlowId::new(element.request_type.flow_id())?;
        let mut agreement = TwtAgreement {
            peer: aid,
            flow_id,
            initiator: false,
            implicit: element.request_type.implicit(),
            unannounced: element.request_type.is_unannounced(),
            trigger_based: element.request_type.trigger(),
            broadcast: element.control.negotiation_type() >= 2,
            channel: element.channel,
            wake_interval: element.wake_interval(),
            nominal_wake_duration: element.nominal_wake_duration(),
            next_wake_time: Time::from_nanos(element.target_wake_time as i64 * 1_000),
        };

        let mut response = *element;
        response.request_type.set_twt_request(false);
        let command_out = match agreement.validate() {
            Ok(()) => SetupCommand::AcceptTwt,
            Err(_) if command == SetupCommand::DemandTwt => SetupCommand::RejectTwt,
            Err(_) if agreement.nominal_wake_duration > agreement.wake_interval => {
                // Clamp the duration and offer the result back.
                agreement.nominal_wake_duration = agreement.wake_interval;
                let interval_units = agreement.wake_interval.into_micros()
                    / wlan_ps_common::ie::twt::WAKE_DURATION_UNIT_MICROS;
                response.control.set_wake_duration_unit(false);
                response.nominal_wake_duration = interval_units.min(u8::MAX as i64) as u8;
                SetupCommand::AlternateTwt
            }
            Err(_) => SetupCommand::RejectTwt,
        };
        response.request_type.set_setup_command(command_out);
        if command_out == SetupCommand::RejectTwt {
            warn!("rejecting TWT setup from AID {} flow {}", aid, flow_id.value());
            return Ok(response);
        }

        // An alternate is an offer, not an agreement; only accepts install.
        if command_out == SetupCommand::AcceptTwt {
            let beacon_offset = self.next_beacon_time - self.timer.now();
            self.twt_store.insert(agreement)?;
            self.dispatcher.install(&mut self.timer, &agreement, beacon_offset);
            info!(
                "TWT agreement with AID {} flow {}: interval {:?} duration {:?}",
                aid,
                flow_id.value(),
                agreement.wake_interval,
                agreement.nominal_wake_duration
            );
        }
        Ok(response)
    }

    pub fn handle_twt_teardown(&mut self, aid: Aid, flow_id: FlowId) -> Result<(), Error> {
        self.client(aid)?;
        self.twt_store.remove(aid, flow_id);
        self.dispatcher.remove(&mut self.timer, aid, flow_id);
        let client = self.client_mut(aid)?;
        client.expecting_trigger = false;
        client.awaiting_sp_evidence = false;
        if client.belief == PowerBelief::TwtSpAwake {
            client.belief = if client.ps_mode() { PowerBelief::Dozing } else { PowerBelief::Awake };
        }
        Ok(())
    }

    /// Explicit next-TWT update via a TWT Information frame: rebases the
    /// mirrored schedule onto the announced boundary.
    pub fn handle_twt_info(&mut self, aid: Aid, info: &TwtInfo) -> Result<(), Error> {
        self.client(aid)?;
        let flow_id = FlowId::new(info.header.flow_id())?;
        let mut agreement = *self
            .twt_store
            .lookup(aid, flow_id)
            .ok_or(Error::InvalidState("TWT info for unknown agreement"))?;
        if let Some(next_twt) = info.next_twt {
            agreement.next_wake_time = Time::from_nanos(next_twt as i64 * 1_000);
            let beacon_offset = self.next_beacon_time - self.timer.now();
            self.twt_store.insert(agreement)?;
            self.dispatcher.install(&mut self.timer, &agreement, beacon_offset);
        }
        Ok(())
    }

    pub fn handle_timeout(&mut self, event_id: EventId) -> Result<(), Error> {
        let event = match self.timer.triggered(&event_id) {
            Some(event) => event,
            // Stale handle of a canceled or superseded schedule.
            None => return Ok(()),
        };
        match event {
            ApTimedEvent::SpStart { peer, flow_id } => self.handle_sp_start(peer, flow_id),
            ApTimedEvent::SpEnd { peer, flow_id } => self.handle_sp_end(peer, flow_id),
        }
    }

    fn handle_sp_start(&mut self, peer: Aid, flow_id: FlowId) -> Result<(), Error> {
        let agreement = match self.twt_store.lookup(peer, flow_id) {
            Some(agreement) => *agreement,
            None => return Ok(()),
        };
        if !self.dispatcher.handle_sp_start(&mut self.timer, &agreement) {
            return Ok(());
        }
        // Occupancy knowledge from before the station slept is worthless;
        // force a fresh solicitation this period.
        self.bsr.clear_station(peer);
        let client = self.client_mut(peer)?;
        if !agreement.unannounced {
            // An announced flow only wakes when the station asked to, and
            // this side cannot see that flag. Hold the window open and wait
            // for the station to transmit before believing it is awake.
            client.awaiting_sp_evidence = true;
            client.sp_trigger_based = agreement.trigger_based;
            return Ok(());
        }
        client.belief = PowerBelief::TwtSpAwake;
        client.expecting_trigger = agreement.trigger_based;
        let addr = client.addr;

        let mut sent_any = false;
        while let Some((frame, more)) = self.ps_buffer.dequeue_one(&addr) {
            self.device.transmit_frame(addr, &frame.payload, more, false);
            sent_any = true;
        }
        if agreement.trigger_based && !sent_any {
            // Nothing to send, but the peer is awake expecting a trigger;
            // ask for channel access so one can still go out.
            self.access_requests.push(peer);
        }
        Ok(())
    }

    fn handle_sp_end(&mut self, peer: Aid, flow_id: FlowId) -> Result<(), Error> {
        if !self.dispatcher.handle_sp_end(peer, flow_id) {
            return Ok(());
        }
        let client = self.client_mut(peer)?;
        client.expecting_trigger = false;
        client.awaiting_sp_evidence = false;
        if client.belief == PowerBelief::TwtSpAwake {
            client.belief = PowerBelief::Dozing;
        }
        Ok(())
    }

    /// One transmission opportunity. Snapshots the association table in
    /// insertion order, lets the scheduler pick a format, and marks
    /// solicited peers as no longer expecting a trigger.
    pub fn on_scheduling_opportunity(&mut self) -> TxFormat {
        let now = self.timer.now();
        let views: Vec<StationView> = self
            .clients
            .iter()
            .map(|c| StationView {
                aid: c.aid,
                has_twt: self.twt_store.count_for(c.aid) > 0,
                twt_sp_awake: c.belief == PowerBelief::TwtSpAwake,
                expecting_trigger: c.expecting_trigger,
                occupancy: self.bsr.station_occupancy(c.aid, now),
                queued_downlink: self.ps_buffer.occupancy_bytes(&c.addr) > 0,
            })
            .collect();
        let format = self.scheduler.decide(&views, self.config.opportunity_budget());
        if let TxFormat::UplinkMuTx(variant, candidates) = &format {
            // A buffer-status poll is only a preamble; the peer still
            // expects its data trigger afterwards.
            if *variant == TriggerVariant::Basic {
                for candidate in candidates {
                    if let Ok(client) = self.client_mut(candidate.aid) {
                        client.expecting_trigger = false;
                    }
                }
            }
            self.access_requests
                .retain(|peer| !candidates.iter().any(|c| c.aid == *peer));
        }
        format
    }

    /// Drains the outstanding channel-access requests raised by SP starts
    /// with nothing queued.
    pub fn take_access_requests(&mut self) -> Vec<Aid> {
        std::mem::take(&mut self.access_requests)
    }

    pub fn station_occupancy(&self, aid: Aid) -> StationOccupancy {
        self.bsr.station_occupancy(aid, self.timer.now())
    }

    pub fn agreement(&self, aid: Aid, flow_id: FlowId) -> Option<&TwtAgreement> {
        self.twt_store.lookup(aid, flow_id)
    }

    pub fn power_belief(&self, aid: Aid) -> Result<PowerBelief, Error> {
        Ok(self.client(aid)?.belief)
    }

    pub fn buffered_bytes_for(&self, aid: Aid) -> Result<usize, Error> {
        Ok(self.ps_buffer.occupancy_bytes(&self.client(aid)?.addr))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::device::FakeDevice,
        wlan_ps_common::{
            assert_variant,
            ie::twt::RequestType,
            test_utils::fake_scheduler::FakeScheduler,
            time::DurationNum,
        },
    };

    const STA1: MacAddr = [2, 0, 0, 0, 0, 1];
    const STA2: MacAddr = [2, 0, 0, 0, 0, 2];

    fn ap_with_clock() -> (AccessPoint<FakeDevice>, FakeScheduler) {
        let clock = FakeScheduler::new();
        let ap = AccessPoint::new(Config::default(), FakeDevice::new(), Box::new(clock.clone()));
        (ap, clock)
    }

    fn setup_element(flow_id: u8, trigger: bool) -> TwtElement {
        let mut request_type = RequestType::default();
        request_type.set_twt_request(true);
        request_type.set_setup_command(SetupCommand::SuggestTwt);
        request_type.set_trigger(trigger);
        request_type.set_implicit(true);
        request_type.set_flow_type(true);
        request_type.set_flow_id(flow_id);
        request_type.set_wake_interval_exponent(10);
        TwtElement {
            control: Default::default(),
            request_type,
            target_wake_time: 200_000,
            nominal_wake_duration: 32, // 8192 us
            wake_interval_mantissa: 100, // 102400 us
            channel: 0,
        }
    }

    #[test]
    fn frames_for_awake_station_bypass_buffering() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![0xAA]).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dest, STA1);
        assert_eq!(ap.buffered_bytes_for(1).unwrap(), 0);
    }

    #[test]
    fn dozing_station_gets_buffered_and_tim_bit() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.associate(2, STA2).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![0xAA, 0xBB]).unwrap();
        assert!(ap.device().take_tx_records().is_empty());
        assert_eq!(ap.buffered_bytes_for(1).unwrap(), 2);

        let tim = ap.on_beacon_about_to_be_built().unwrap();
        assert!(tim.is_traffic_buffered(1));
        assert!(!tim.is_traffic_buffered(2));
    }

    #[test]
    fn tim_bit_requires_power_save_mode() {
        // An awake station's frames go straight out, so its bit never sets;
        // and a PS station with nothing buffered stays clear too.
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        let tim = ap.on_beacon_about_to_be_built().unwrap();
        assert!(!tim.is_traffic_buffered(1));
    }

    #[test]
    fn ps_poll_releases_one_frame_with_more_data() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![1]).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![2]).unwrap();

        ap.handle_ps_poll(1).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, vec![1]);
        assert!(records[0].more_data);

        ap.handle_ps_poll(1).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records[0].payload, vec![2]);
        assert!(!records[0].more_data);
    }

    #[test]
    fn ps_poll_invalidates_buffer_status() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.handle_buffer_status_report(1, 0, 4).unwrap();
        assert_eq!(ap.station_occupancy(1), StationOccupancy::Bytes(1024));
        ap.handle_ps_poll(1).unwrap();
        assert_eq!(ap.station_occupancy(1), StationOccupancy::Unknown);
    }

    #[test]
    fn apsd_trigger_releases_buffer_with_end_of_period() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.set_apsd(1, true).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![1]).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![2]).unwrap();

        // Any frame from the dozing station starts the delivery period.
        ap.handle_frame_rx(1, true).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].more_data);
        // The last delivery carries the end-of-period indication.
        assert!(!records[1].more_data);
        assert_eq!(ap.power_belief(1).unwrap(), PowerBelief::Dozing);

        // An empty period is ended immediately.
        ap.handle_frame_rx(1, true).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 1);
        assert!(records[0].payload.is_empty());
        assert!(!records[0].more_data);
    }

    #[test]
    fn leaving_power_save_flushes_buffer() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![1]).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![2]).unwrap();
        ap.handle_frame_rx(1, false).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].more_data);
        assert!(!records[1].more_data);
    }

    #[test]
    fn multicast_delivered_only_after_dtim() {
        let (mut ap, _clock) = ap_with_clock();
        ap.enqueue_group_frame(wlan_ps_common::mac::BCAST_ADDR, vec![9]);

        // dtim_count starts at 0: the first beacon is a DTIM.
        let tim = ap.on_beacon_about_to_be_built().unwrap();
        assert!(tim.group_traffic_buffered());
        assert_eq!(ap.device().take_tx_records().len(), 1);

        // The following beacon is not a DTIM; newly queued group traffic
        // waits.
        ap.enqueue_group_frame(wlan_ps_common::mac::BCAST_ADDR, vec![9]);
        let tim = ap.on_beacon_about_to_be_built().unwrap();
        assert!(!tim.group_traffic_buffered());
        assert!(ap.device().take_tx_records().is_empty());
    }

    #[test]
    fn dtim_count_cycles() {
        let (mut ap, _clock) = ap_with_clock();
        let counts: Vec<u8> = (0..4)
            .map(|_| ap.on_beacon_about_to_be_built().unwrap().header.dtim_count)
            .collect();
        // dtim_period defaults to 3.
        assert_eq!(counts, vec![0, 2, 1, 0]);
    }

    #[test]
    fn twt_setup_accept_installs_agreement_and_schedule() {
        let (mut ap, clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        let response = ap.handle_twt_setup(1, &setup_element(0, true)).unwrap();
        assert_eq!(response.request_type.setup_command(), SetupCommand::AcceptTwt);
        assert!(!response.request_type.twt_request());
        let agreement = ap.agreement(1, FlowId::new(0).unwrap()).expect("expected agreement");
        assert_eq!(agreement.wake_interval, 102_400.micros());
        assert!(agreement.trigger_based);
        assert!(clock.next_deadline().is_some());
    }

    #[test]
    fn twt_demand_with_bad_params_is_rejected() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        let mut element = setup_element(0, true);
        element.request_type.set_setup_command(SetupCommand::DemandTwt);
        // Duration of 255 * 256us exceeds a 2^0 * 100us interval.
        element.nominal_wake_duration = 255;
        element.request_type.set_wake_interval_exponent(0);
        let response = ap.handle_twt_setup(1, &element).unwrap();
        assert_eq!(response.request_type.setup_command(), SetupCommand::RejectTwt);
        assert!(ap.agreement(1, FlowId::new(0).unwrap()).is_none());
    }

    #[test]
    fn twt_suggest_with_long_duration_gets_alternate() {
        let (mut ap, _clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        let mut element = setup_element(0, true);
        element.nominal_wake_duration = 255;
        element.request_type.set_wake_interval_exponent(0);
        let response = ap.handle_twt_setup(1, &element).unwrap();
        assert_eq!(response.request_type.setup_command(), SetupCommand::AlternateTwt);
        // An alternate is only an offer; nothing is installed yet.
        assert!(ap.agreement(1, FlowId::new(0).unwrap()).is_none());
    }

    #[test]
    fn sp_start_sets_belief_and_requests_access_when_idle() {
        let (mut ap, clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_twt_setup(1, &setup_element(0, true)).unwrap();

        let (_, id) = clock.next_event().expect("expected SP start");
        ap.handle_timeout(id).unwrap();
        assert_eq!(ap.power_belief(1).unwrap(), PowerBelief::TwtSpAwake);
        assert_eq!(ap.take_access_requests(), vec![1]);

        let (_, id) = clock.next_event().expect("expected SP end");
        ap.handle_timeout(id).unwrap();
        assert_eq!(ap.power_belief(1).unwrap(), PowerBelief::Dozing);
    }

    #[test]
    fn sp_start_drains_buffered_frames() {
        let (mut ap, clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.handle_twt_setup(1, &setup_element(0, true)).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![1]).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![2]).unwrap();

        let (_, id) = clock.next_event().expect("expected SP start");
        ap.handle_timeout(id).unwrap();
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 2);
        assert!(records[0].more_data);
        assert!(!records[1].more_data);
        // Nothing was left pending, yet the peer expects a trigger only via
        // the scheduler, not an extra access request.
        assert!(ap.take_access_requests().is_empty());
    }

    #[test]
    fn announced_sp_waits_for_station_evidence() {
        let (mut ap, clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        let mut element = setup_element(0, true);
        element.request_type.set_flow_type(false);
        ap.handle_twt_setup(1, &element).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![9]).unwrap();

        let (_, id) = clock.next_event().expect("expected SP start");
        ap.handle_timeout(id).unwrap();
        // The boundary alone is no proof of a listener: nothing goes out
        // and the scheduler leaves the station alone.
        assert_eq!(ap.power_belief(1).unwrap(), PowerBelief::Dozing);
        assert!(ap.device().take_tx_records().is_empty());
        assert_eq!(ap.on_scheduling_opportunity(), TxFormat::NoTx);
        assert!(ap.take_access_requests().is_empty());

        // The station transmitting inside the window is the proof it woke.
        ap.handle_frame_rx(1, true).unwrap();
        assert_eq!(ap.power_belief(1).unwrap(), PowerBelief::TwtSpAwake);
        let records = ap.device().take_tx_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload, vec![9]);
        assert_variant!(
            ap.on_scheduling_opportunity(),
            TxFormat::UplinkMuTx(TriggerVariant::BufferStatusPoll, _)
        );

        // The period closing withdraws the belief again.
        let (_, id) = clock.next_event().expect("expected SP end");
        ap.handle_timeout(id).unwrap();
        assert_eq!(ap.power_belief(1).unwrap(), PowerBelief::Dozing);
    }

    #[test]
    fn scheduling_polls_unknown_occupancy_inside_sp() {
        let (mut ap, clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_twt_setup(1, &setup_element(0, true)).unwrap();
        let (_, id) = clock.next_event().expect("expected SP start");
        ap.handle_timeout(id).unwrap();

        let format = ap.on_scheduling_opportunity();
        assert_variant!(format, TxFormat::UplinkMuTx(TriggerVariant::BufferStatusPoll, _));

        // Once occupancy is known and non-zero, a basic trigger follows and
        // consumes the expecting-trigger flag.
        ap.handle_buffer_status_report(1, 0, 4).unwrap();
        let format = ap.on_scheduling_opportunity();
        assert_variant!(format, TxFormat::UplinkMuTx(TriggerVariant::Basic, _));
        let format = ap.on_scheduling_opportunity();
        assert_variant!(format, TxFormat::SingleUserTx(_));
    }

    #[test]
    fn disassociation_tears_down_everything() {
        let (mut ap, clock) = ap_with_clock();
        ap.associate(1, STA1).unwrap();
        ap.handle_frame_rx(1, true).unwrap();
        ap.handle_twt_setup(1, &setup_element(0, true)).unwrap();
        ap.on_frame_enqueued_for_station(1, vec![1]).unwrap();
        ap.disassociate(1).unwrap();
        assert!(ap.agreement(1, FlowId::new(0).unwrap()).is_none());
        assert_eq!(clock.pending_event_count(), 0);
        assert_variant!(ap.handle_ps_poll(1), Err(Error::NotAssociated(1)));
    }
}
