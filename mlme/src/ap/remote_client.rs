// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::error::Error,
    wlan_ps_common::mac::{Aid, MacAddr},
};

/// What the AP currently believes about a remote station's radio. The belief
/// is driven by the power-management bit of received frames and by the AP's
/// own mirror of the station's TWT service-period boundaries; it can lag the
/// station's true state but must never claim awake for a dozing station.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PowerBelief {
    Awake,
    Dozing,
    /// Inside a TWT service period the AP itself computed.
    TwtSpAwake,
}

/// AP-side record of one associated station.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    pub aid: Aid,
    pub addr: MacAddr,
    ps_mode: bool,
    apsd: bool,
    pub belief: PowerBelief,
    /// Set while the station expects a trigger in its current service
    /// period; cleared when one is sent or the period ends.
    pub expecting_trigger: bool,
    /// Set at an announced flow's service-period boundary until the station
    /// transmits something. An announced flow only wakes when the station
    /// asked to, so the boundary alone is no proof it is listening.
    pub awaiting_sp_evidence: bool,
    /// Whether the service period awaiting evidence belongs to a
    /// trigger-based flow.
    pub sp_trigger_based: bool,
}

impl RemoteClient {
    pub fn new(aid: Aid, addr: MacAddr) -> Self {
        Self {
            aid,
            addr,
            ps_mode: false,
            apsd: false,
            belief: PowerBelief::Awake,
            expecting_trigger: false,
            awaiting_sp_evidence: false,
            sp_trigger_based: false,
        }
    }

    pub fn ps_mode(&self) -> bool {
        self.ps_mode
    }

    pub fn apsd(&self) -> bool {
        self.apsd
    }

    /// Selects automatic (APSD-style) delivery instead of PS-Poll retrieval.
    /// A station gets one delivery mechanism at a time and may only switch
    /// while it is not dozing in a power-save cycle.
    pub fn set_apsd(&mut self, apsd: bool) -> Result<(), Error> {
        if apsd && self.ps_mode {
            return Err(Error::InvalidState("APSD requested while in legacy power save"));
        }
        self.apsd = apsd;
        Ok(())
    }

    /// Applies the power-management bit of a received frame. Any frame from
    /// the station proves it is awake at this instant; the bit tells us
    /// whether it will doze again afterwards. Inside a service period the
    /// computed SP boundary, not the PM bit, decides when the station goes
    /// back down.
    pub fn update_from_pm_bit(&mut self, power_management: bool) {
        self.ps_mode = power_management;
        if self.awaiting_sp_evidence {
            // The station transmitted inside an announced service period;
            // that is the proof it woke for it.
            self.awaiting_sp_evidence = false;
            self.belief = PowerBelief::TwtSpAwake;
            self.expecting_trigger = self.sp_trigger_based;
            return;
        }
        self.belief = match (power_management, self.belief) {
            (true, PowerBelief::TwtSpAwake) => PowerBelief::TwtSpAwake,
            (true, _) => PowerBelief::Dozing,
            (false, _) => PowerBelief::Awake,
        };
    }

    pub fn is_awake(&self) -> bool {
        matches!(self.belief, PowerBelief::Awake | PowerBelief::TwtSpAwake)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pm_bit_drives_belief() {
        let mut client = RemoteClient::new(1, [2, 0, 0, 0, 0, 1]);
        assert!(client.is_awake());
        client.update_from_pm_bit(true);
        assert!(client.ps_mode());
        assert_eq!(client.belief, PowerBelief::Dozing);
        client.update_from_pm_bit(false);
        assert!(!client.ps_mode());
        assert!(client.is_awake());
    }

    #[test]
    fn apsd_cannot_be_enabled_while_dozing() {
        let mut client = RemoteClient::new(1, [2, 0, 0, 0, 0, 1]);
        client.update_from_pm_bit(true);
        assert!(client.set_apsd(true).is_err());
        client.update_from_pm_bit(false);
        client.set_apsd(true).expect("APSD should be allowed while not in PS");
        assert!(client.apsd());
    }

    #[test]
    fn frame_inside_announced_sp_promotes_belief() {
        let mut client = RemoteClient::new(1, [2, 0, 0, 0, 0, 1]);
        client.update_from_pm_bit(true);
        client.awaiting_sp_evidence = true;
        client.sp_trigger_based = true;
        client.update_from_pm_bit(true);
        assert_eq!(client.belief, PowerBelief::TwtSpAwake);
        assert!(client.expecting_trigger);
        assert!(!client.awaiting_sp_evidence);
    }
}
