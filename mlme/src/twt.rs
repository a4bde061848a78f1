// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The negotiated TWT agreement model shared by both ends: the AP and each
//! station hold independent copies of the same logical agreement, installed
//! by the setup handshake and destroyed by teardown or disassociation.

use {
    crate::error::Error,
    wlan_ps_common::{
        mac::Aid,
        time::{Duration, Time},
    },
};

/// A 3-bit TWT flow identifier. At most 8 agreements can be live per peer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowId(u8);

impl FlowId {
    pub const MAX: u8 = 7;

    pub fn new(value: u8) -> Result<Self, Error> {
        if value > Self::MAX {
            Err(Error::OutOfRange("TWT flow id exceeds 3 bits"))
        } else {
            Ok(FlowId(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TwtAgreement {
    pub peer: Aid,
    pub flow_id: FlowId,
    /// Whether the local end initiated the setup handshake.
    pub initiator: bool,
    pub implicit: bool,
    /// Flow type: an unannounced agreement wakes at every SP start; an
    /// announced one only when the wake-for-next-SP flag was set.
    pub unannounced: bool,
    pub trigger_based: bool,
    pub broadcast: bool,
    /// Reserved, always 0.
    pub channel: u8,
    pub wake_interval: Duration,
    pub nominal_wake_duration: Duration,
    /// Absolute start of the next service period.
    pub next_wake_time: Time,
}

impl TwtAgreement {
    pub fn validate(&self) -> Result<(), Error> {
        if self.nominal_wake_duration > self.wake_interval {
            return Err(Error::TwtSetupRejected("wake duration exceeds wake interval"));
        }
        if self.wake_interval <= Duration::ZERO {
            return Err(Error::TwtSetupRejected("wake interval must be positive"));
        }
        if self.channel != 0 {
            return Err(Error::TwtSetupRejected("TWT channel field is reserved"));
        }
        if self.broadcast && !self.trigger_based {
            // A non-trigger-based agreement cannot solicit more than one
            // station in the same service period.
            return Err(Error::TwtSetupRejected(
                "non-trigger-based agreement limited to a single solicited station",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {super::*, wlan_ps_common::time::DurationNum};

    pub(crate) fn agreement(peer: Aid, flow_id: u8) -> TwtAgreement {
        TwtAgreement {
            peer,
            flow_id: FlowId::new(flow_id).unwrap(),
            initiator: false,
            implicit: true,
            unannounced: true,
            trigger_based: true,
            broadcast: false,
            channel: 0,
            wake_interval: 100.millis(),
            nominal_wake_duration: 10.millis(),
            next_wake_time: Time::ZERO,
        }
    }

    #[test]
    fn flow_id_bounds() {
        assert!(FlowId::new(7).is_ok());
        assert!(matches!(FlowId::new(8), Err(Error::OutOfRange(_))));
    }

    #[test]
    fn validate_rejects_duration_above_interval() {
        let mut a = agreement(1, 0);
        a.nominal_wake_duration = a.wake_interval + 1.nanos();
        assert!(matches!(a.validate(), Err(Error::TwtSetupRejected(_))));
    }

    #[test]
    fn validate_rejects_nonzero_channel() {
        let mut a = agreement(1, 0);
        a.channel = 2;
        assert!(matches!(a.validate(), Err(Error::TwtSetupRejected(_))));
    }

    #[test]
    fn validate_rejects_broadcast_without_trigger() {
        let mut a = agreement(1, 0);
        a.broadcast = true;
        a.trigger_based = false;
        assert!(matches!(a.validate(), Err(Error::TwtSetupRejected(_))));
    }
}
