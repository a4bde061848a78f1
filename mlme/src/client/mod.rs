// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The station half: the power state machine, beacon tracking with TIM
//! evaluation, legacy PS-Poll and APSD retrieval, TWT session timers, and
//! the uplink-while-asleep buffer.

mod beacon_liveness;
mod power_state;
mod twt_session;

pub use {
    beacon_liveness::BeaconLivenessTracker,
    power_state::{AwakeReason, PowerState},
    twt_session::{SpStart, TwtSession},
};

use {
    crate::{
        config::Config,
        device::{DeviceOps, RadioPower},
        error::Error,
        twt::{FlowId, TwtAgreement},
    },
    log::{debug, info, warn},
    std::collections::VecDeque,
    wlan_ps_common::{
        ie::{
            self,
            twt::{RequestType, SetupCommand, TwtControl, TwtElement},
        },
        mac::{Aid, MacAddr, PsPoll},
        time::Time,
        timer::{EventId, Scheduler, Timer},
    },
    zerocopy::AsBytes,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClientTimedEvent {
    /// Wake ahead of the next expected beacon.
    PreBeaconWake,
    /// The expected beacon did not arrive within the miss margin.
    BeaconTimeout,
    SpStart { flow_id: FlowId },
    SpEnd { flow_id: FlowId },
}

pub struct Station<D> {
    config: Config,
    device: D,
    timer: Timer<ClientTimedEvent>,
    addr: MacAddr,
    bssid: MacAddr,
    aid: Aid,
    state: PowerState,
    // Buffered downlink is retrieved automatically (trigger frame plus
    // end-of-period indication) instead of by PS-Poll.
    apsd: bool,
    liveness: BeaconLivenessTracker,
    twt: TwtSession,
    // Uplink frames queued while the radio was down for TWT; flushed at the
    // next service-period wake.
    uplink_buffer: VecDeque<Vec<u8>>,
    tx_in_flight: bool,
    // Sleep-after-ack: a sleep decision taken while a transmission is in
    // flight is deferred to its completion.
    sleep_pending: bool,
    pre_beacon_handle: Option<EventId>,
    beacon_timeout_handle: Option<EventId>,
    next_beacon_time: Time,
    unicast_pending_after_mcast: bool,
}

impl<D: DeviceOps> Station<D> {
    pub fn new(config: Config, device: D, scheduler: Box<dyn Scheduler>, addr: MacAddr) -> Self {
        let liveness = BeaconLivenessTracker::new(config.lost_beacon_limit);
        Self {
            config,
            device,
            timer: Timer::new(scheduler),
            addr,
            bssid: [0; 6],
            aid: 0,
            state: PowerState::Unassociated,
            apsd: false,
            liveness,
            twt: TwtSession::new(),
            uplink_buffer: VecDeque::new(),
            tx_in_flight: false,
            sleep_pending: false,
            pre_beacon_handle: None,
            beacon_timeout_handle: None,
            next_beacon_time: Time::ZERO,
            unicast_pending_after_mcast: false,
        }
    }

    pub fn device(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn aid(&self) -> Aid {
        self.aid
    }

    pub fn agreement(&self, flow_id: FlowId) -> Option<&TwtAgreement> {
        self.twt.agreement(flow_id)
    }

    pub fn uplink_buffered_count(&self) -> usize {
        self.uplink_buffer.len()
    }

    pub fn associate(&mut self, aid: Aid, bssid: MacAddr) -> Result<(), Error> {
        if self.state.is_associated() {
            return Err(Error::InvalidState("already associated"));
        }
        if aid == 0 || aid > wlan_ps_common::mac::MAX_AID {
            return Err(Error::OutOfRange("AID outside 1..=2007"));
        }
        self.aid = aid;
        self.bssid = bssid;
        self.state = PowerState::Cam;
        self.liveness = BeaconLivenessTracker::new(self.config.lost_beacon_limit);
        self.device.set_radio_power(RadioPower::Awake);
        self.next_beacon_time = self.timer.now() + self.config.beacon_interval_duration();
        self.arm_beacon_timeout();
        info!("associated to {:02x?} as AID {}", bssid, aid);
        Ok(())
    }

    /// Drops the association from any state: all timers are canceled, TWT
    /// schedules destroyed, and the radio left awake for discovery.
    pub fn disassociate(&mut self) {
        self.timer.cancel_all();
        self.twt = TwtSession::new();
        self.pre_beacon_handle = None;
        self.beacon_timeout_handle = None;
        self.uplink_buffer.clear();
        self.tx_in_flight = false;
        self.sleep_pending = false;
        self.unicast_pending_after_mcast = false;
        self.apsd = false;
        self.state = PowerState::Unassociated;
        self.device.set_radio_power(RadioPower::Awake);
    }

    /// Enters legacy power save. The AP is told via the PM bit of a null
    /// frame before the radio goes down.
    pub fn enter_power_save(&mut self) -> Result<(), Error> {
        match self.state {
            PowerState::Cam => {}
            PowerState::Unassociated => {
                return Err(Error::InvalidState("power save requires an association"))
            }
            _ => return Err(Error::InvalidState("already in a power-save mode")),
        }
        self.device.transmit_frame(self.bssid, &[], false, true);
        self.arm_pre_beacon_wake();
        self.go_to_sleep(PowerState::PsmAsleep);
        Ok(())
    }

    pub fn leave_power_save(&mut self) -> Result<(), Error> {
        if !self.state.in_psm() {
            return Err(Error::InvalidState("not in legacy power save"));
        }
        self.device.set_radio_power(RadioPower::Awake);
        self.device.transmit_frame(self.bssid, &[], false, false);
        self.state = PowerState::Cam;
        self.sleep_pending = false;
        if let Some(handle) = self.pre_beacon_handle.take() {
            self.timer.cancel_event(handle);
        }
        Ok(())
    }

    /// Selects automatic (APSD-style) delivery for buffered downlink in
    /// place of PS-Poll retrieval. The mechanism can only change while
    /// constantly awake; the two retrieval styles never layer.
    pub fn set_apsd(&mut self, enabled: bool) -> Result<(), Error> {
        match self.state {
            PowerState::Unassociated => Err(Error::InvalidState("not associated")),
            PowerState::Cam => {
                self.apsd = enabled;
                Ok(())
            }
            _ => Err(Error::InvalidState("delivery mode change while power saving")),
        }
    }

    /// Uplink data from the local stack. Awake states transmit immediately;
    /// legacy sleep wakes the radio for the frame; TWT sleep buffers it for
    /// the next service period.
    pub fn send_frame(&mut self, payload: Vec<u8>) -> Result<(), Error> {
        match self.state {
            PowerState::Unassociated => Err(Error::InvalidState("not associated")),
            PowerState::TwtSpAsleep => {
                self.uplink_buffer.push_back(payload);
                Ok(())
            }
            PowerState::PsmAsleep => {
                self.device.set_radio_power(RadioPower::Awake);
                self.state = PowerState::PsmAwake(AwakeReason::LocalData);
                self.transmit_data(&payload, false);
                // Return to sleep once the transmission completes.
                self.sleep_pending = true;
                Ok(())
            }
            _ => {
                self.transmit_data(&payload, false);
                Ok(())
            }
        }
    }

    /// The MAC below finished the outstanding transmission (final ack or
    /// retry exhaustion). Releases any deferred sleep.
    pub fn on_tx_complete(&mut self) {
        self.tx_in_flight = false;
        if self.sleep_pending {
            self.sleep_pending = false;
            let target =
                if self.state.in_twt() { PowerState::TwtSpAsleep } else { PowerState::PsmAsleep };
            self.go_to_sleep(target);
        }
    }

    /// A beacon arrived. Resets liveness, realigns the beacon timers, and
    /// evaluates the TIM: group traffic pending on a DTIM holds the radio
    /// up through multicast delivery, a set AID bit starts PS-Poll
    /// retrieval, and otherwise a power-saving station goes straight back
    /// down.
    pub fn handle_beacon(&mut self, ies: &[u8]) -> Result<(), Error> {
        if !self.state.is_associated() {
            return Err(Error::InvalidState("beacon before association"));
        }
        self.liveness.on_beacon();
        self.next_beacon_time = self.timer.now() + self.config.beacon_interval_duration();
        if !self.state.in_twt() {
            self.arm_beacon_timeout();
        }

        let mut tim = None;
        for (id, body) in ie::Reader::new(ies) {
            if id == ie::Id::TIM {
                tim = Some(ie::tim::decode(body)?);
            }
        }
        let tim = match tim {
            Some(tim) => tim,
            None => {
                debug!("beacon without TIM element");
                return Ok(());
            }
        };

        if !self.state.in_psm() {
            return Ok(());
        }
        let unicast_pending = tim.is_traffic_buffered(self.aid);
        let group_pending = tim.group_traffic_buffered() && tim.header.dtim_count == 0;
        if group_pending {
            self.device.set_radio_power(RadioPower::Awake);
            self.state = PowerState::PsmAwake(AwakeReason::Multicast);
            self.unicast_pending_after_mcast = unicast_pending;
        } else if unicast_pending {
            if self.apsd {
                self.start_apsd_delivery();
            } else {
                self.start_retrieval();
            }
        } else {
            self.arm_pre_beacon_wake();
            self.go_to_sleep(PowerState::PsmAsleep);
        }
        Ok(())
    }

    /// A buffered unicast frame delivered in response to a PS-Poll or within
    /// an APSD service period. Legacy retrieval polls again while the
    /// more-data bit is set and sleeps when it clears; an APSD period holds
    /// the radio up until the end-of-period indication (more-data clear)
    /// arrives.
    pub fn handle_delivered_frame(&mut self, more_data: bool) -> Result<(), Error> {
        match self.state {
            PowerState::PsmAwake(AwakeReason::RetrievingBuffered) => {
                if more_data {
                    self.send_ps_poll();
                } else {
                    self.arm_pre_beacon_wake();
                    self.go_to_sleep(PowerState::PsmAsleep);
                }
                Ok(())
            }
            PowerState::ApsdAwaitingEndOfPeriod => {
                if !more_data {
                    self.arm_pre_beacon_wake();
                    self.go_to_sleep(PowerState::PsmAsleep);
                }
                Ok(())
            }
            // Deliveries in other awake states need no reaction here.
            _ if !self.state.is_asleep() => Ok(()),
            _ => Err(Error::InvalidState("frame delivered while asleep")),
        }
    }

    /// A group-addressed frame after a DTIM. When the burst ends the
    /// deferred unicast condition from the beacon is evaluated.
    pub fn handle_group_frame(&mut self, more_data: bool) -> Result<(), Error> {
        if self.state != PowerState::PsmAwake(AwakeReason::Multicast) {
            // Group traffic also reaches CAM and TWT-awake stations; nothing
            // to do.
            return Ok(());
        }
        if more_data {
            return Ok(());
        }
        if self.unicast_pending_after_mcast {
            self.unicast_pending_after_mcast = false;
            self.start_retrieval();
        } else {
            self.arm_pre_beacon_wake();
            self.go_to_sleep(PowerState::PsmAsleep);
        }
        Ok(())
    }

    /// Builds the requester's element for a TWT setup handshake.
    pub fn build_twt_request(
        &self,
        flow_id: FlowId,
        wake_interval_mantissa: u16,
        wake_interval_exponent: u8,
        wake_duration_units: u8,
        target_wake_time_micros: u64,
        trigger: bool,
        unannounced: bool,
    ) -> TwtElement {
        let mut request_type = RequestType::default();
        request_type.set_twt_request(true);
        request_type.set_setup_command(SetupCommand::SuggestTwt);
        request_type.set_trigger(trigger);
        request_type.set_implicit(true);
        request_type.set_flow_type(unannounced);
        request_type.set_flow_id(flow_id.value());
        request_type.set_wake_interval_exponent(wake_interval_exponent);
        TwtElement {
            control: TwtControl::default(),
            request_type,
            target_wake_time: target_wake_time_micros,
            nominal_wake_duration: wake_duration_units,
            wake_interval_mantissa,
            channel: 0,
        }
    }

    /// Responder's answer to our setup request. An accept installs the
    /// local agreement copy and moves the station onto the TWT schedule,
    /// asleep until the first service period. An alternate is returned to
    /// the caller as a counter-offer; a reject is an error.
    pub fn handle_twt_setup_response(
        &mut self,
        element: &TwtElement,
    ) -> Result<Option<TwtAgreement>, Error> {
        if !self.state.is_associated() {
            return Err(Error::InvalidState("not associated"));
        }
        let command = element.request_type.setup_command();
        match command {
            SetupCommand::AcceptTwt | SetupCommand::DictateTwt => {}
            SetupCommand::AlternateTwt => return Ok(None),
            SetupCommand::RejectTwt => {
                return Err(Error::TwtSetupRejected("responder rejected the setup"))
            }
            _ => return Err(Error::InvalidState("setup request received by initiator")),
        }
        let agreement = TwtAgreement {
            peer: self.aid,
            flow_id: FlowId::new(element.request_type.flow_id())?,
            initiator: true,
            implicit: element.request_type.implicit(),
            unannounced: element.request_type.is_unannounced(),
            trigger_based: element.request_type.trigger(),
            broadcast: element.control.negotiation_type() >= 2,
            channel: element.channel,
            wake_interval: element.wake_interval(),
            nominal_wake_duration: element.nominal_wake_duration(),
            next_wake_time: Time::from_nanos(element.target_wake_time as i64 * 1_000),
        };
        agreement.validate()?;
        self.twt.install(&mut self.timer, agreement);
        // Off the legacy beacon cadence and onto the TWT schedule: liveness
        // is carried by SP activity while the station sleeps past beacons.
        if let Some(handle) = self.pre_beacon_handle.take() {
            self.timer.cancel_event(handle);
        }
        if let Some(handle) = self.beacon_timeout_handle.take() {
            self.timer.cancel_event(handle);
        }
        self.go_to_sleep(PowerState::TwtSpAsleep);
        Ok(Some(agreement))
    }

    pub fn teardown_twt(&mut self, flow_id: FlowId) -> Result<(), Error> {
        if !self.twt.remove(&mut self.timer, flow_id) {
            return Err(Error::InvalidState("teardown of unknown TWT flow"));
        }
        if self.twt.is_empty() && self.state.in_twt() {
            self.device.set_radio_power(RadioPower::Awake);
            self.state = PowerState::Cam;
            self.sleep_pending = false;
            // Back onto the beacon cadence.
            self.next_beacon_time = self.timer.now() + self.config.beacon_interval_duration();
            self.arm_beacon_timeout();
        }
        Ok(())
    }

    /// For announced flows: arrange to be awake at the next SP start.
    pub fn request_wake_for_next_sp(&mut self, flow_id: FlowId) -> Result<(), Error> {
        if self.twt.set_wake_for_next_sp(flow_id) {
            Ok(())
        } else {
            Err(Error::InvalidState("unknown TWT flow"))
        }
    }

    pub fn handle_timeout(&mut self, event_id: EventId) -> Result<(), Error> {
        let event = match self.timer.triggered(&event_id) {
            Some(event) => event,
            None => return Ok(()),
        };
        match event {
            ClientTimedEvent::PreBeaconWake => {
                self.pre_beacon_handle = None;
                if self.state == PowerState::PsmAsleep {
                    self.device.set_radio_power(RadioPower::Awake);
                    self.state = PowerState::PsmAwake(AwakeReason::PreBeacon);
                }
                Ok(())
            }
            ClientTimedEvent::BeaconTimeout => self.handle_missed_beacon(),
            ClientTimedEvent::SpStart { flow_id } => {
                let start = match self.twt.handle_sp_start(&mut self.timer, flow_id) {
                    Some(start) => start,
                    None => return Ok(()),
                };
                if start.wake {
                    self.device.set_radio_power(RadioPower::Awake);
                    self.state = PowerState::TwtSpAwake;
                    self.flush_uplink_buffer();
                }
                Ok(())
            }
            ClientTimedEvent::SpEnd { flow_id } => {
                if !self.twt.handle_sp_end(flow_id) {
                    return Ok(());
                }
                if self.state == PowerState::TwtSpAwake {
                    // The period is over whether or not more data was
                    // expected; only an in-flight transmission defers the
                    // sleep.
                    self.go_to_sleep(PowerState::TwtSpAsleep);
                }
                Ok(())
            }
        }
    }

    fn handle_missed_beacon(&mut self) -> Result<(), Error> {
        self.beacon_timeout_handle = None;
        if self.liveness.on_missed_beacon() {
            let missed = self.liveness.missed_count();
            warn!("lost {} consecutive beacons; dropping association", missed);
            // Forced awake before anything else so discovery can start.
            self.disassociate();
            return Err(Error::AssociationLost(missed));
        }
        debug!("missed beacon ({} consecutive)", self.liveness.missed_count());
        self.next_beacon_time = self.next_beacon_time + self.config.beacon_interval_duration();
        self.arm_beacon_timeout();
        if self.state == PowerState::PsmAsleep {
            // Stay up for the next attempt rather than oscillating.
            self.device.set_radio_power(RadioPower::Awake);
            self.state = PowerState::PsmAwake(AwakeReason::PreBeacon);
        }
        Ok(())
    }

    fn start_retrieval(&mut self) {
        self.device.set_radio_power(RadioPower::Awake);
        self.state = PowerState::PsmAwake(AwakeReason::RetrievingBuffered);
        self.send_ps_poll();
    }

    fn start_apsd_delivery(&mut self) {
        self.device.set_radio_power(RadioPower::Awake);
        self.state = PowerState::ApsdAwaitingEndOfPeriod;
        // Any uplink frame triggers the delivery period; with nothing to
        // send, an empty null frame does.
        self.device.transmit_frame(self.bssid, &[], false, true);
    }

    fn send_ps_poll(&mut self) {
        let poll = PsPoll::new(self.aid, self.bssid, self.addr);
        self.device.transmit_frame(self.bssid, poll.as_bytes(), false, true);
    }

    fn transmit_data(&mut self, payload: &[u8], more_data: bool) {
        let pm = self.state.in_psm() || self.state.in_twt();
        self.device.transmit_frame(self.bssid, payload, more_data, pm);
        self.tx_in_flight = true;
    }

    fn flush_uplink_buffer(&mut self) {
        while let Some(payload) = self.uplink_buffer.pop_front() {
            let more = !self.uplink_buffer.is_empty();
            self.transmit_data(&payload, more);
        }
    }

    fn go_to_sleep(&mut self, target: PowerState) {
        if self.tx_in_flight {
            self.sleep_pending = true;
            return;
        }
        self.device.set_radio_power(RadioPower::Asleep);
        self.state = target;
    }

    fn arm_beacon_timeout(&mut self) {
        if let Some(handle) = self.beacon_timeout_handle.take() {
            self.timer.cancel_event(handle);
        }
        let deadline = self.next_beacon_time + self.config.beacon_miss_margin();
        self.beacon_timeout_handle =
            Some(self.timer.schedule_event(deadline, ClientTimedEvent::BeaconTimeout));
    }

    fn arm_pre_beacon_wake(&mut self) {
        if let Some(handle) = self.pre_beacon_handle.take() {
            self.timer.cancel_event(handle);
        }
        let deadline = self.next_beacon_time - self.config.pre_beacon_lead_time();
        if deadline <= self.timer.now() {
            return;
        }
        self.pre_beacon_handle =
            Some(self.timer.schedule_event(deadline, ClientTimedEvent::PreBeaconWake));
    }
}
