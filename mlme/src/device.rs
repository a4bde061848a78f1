// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use wlan_ps_common::mac::{Aid, MacAddr, Tid};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RadioPower {
    Awake,
    Asleep,
}

/// The interfaces this MLME consumes from the driver/PHY layer. Radio
/// control, frame transmission, and queue-occupancy queries are provided by
/// out-of-scope collaborators; frame retry policy lives below this boundary.
pub trait DeviceOps {
    fn set_radio_power(&mut self, power: RadioPower);

    /// Hands one frame to the transmit path. `more_data` and
    /// `power_management` map to the equally named header bits.
    fn transmit_frame(&mut self, dest: MacAddr, payload: &[u8], more_data: bool, power_management: bool);

    /// Returns the occupancy code of the local queue for (station, TID).
    /// See [`crate::buffer_status`] for the encoding.
    fn query_buffer_status(&mut self, station: Aid, tid: Tid) -> u8;
}

/// Record of one `transmit_frame` call, including the radio power at the
/// time of the call so tests can assert no transmission happened asleep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRecord {
    pub dest: MacAddr,
    pub payload: Vec<u8>,
    pub more_data: bool,
    pub power_management: bool,
    pub radio: RadioPower,
}

/// An in-memory device for tests.
pub struct FakeDevice {
    pub radio: RadioPower,
    pub tx_records: Vec<TxRecord>,
    pub power_transitions: Vec<RadioPower>,
    pub buffer_status: std::collections::HashMap<(Aid, Tid), u8>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self {
            radio: RadioPower::Awake,
            tx_records: vec![],
            power_transitions: vec![],
            buffer_status: std::collections::HashMap::new(),
        }
    }

    pub fn take_tx_records(&mut self) -> Vec<TxRecord> {
        std::mem::take(&mut self.tx_records)
    }
}

impl DeviceOps for FakeDevice {
    fn set_radio_power(&mut self, power: RadioPower) {
        if self.radio != power {
            self.power_transitions.push(power);
        }
        self.radio = power;
    }

    fn transmit_frame(&mut self, dest: MacAddr, payload: &[u8], more_data: bool, power_management: bool) {
        self.tx_records.push(TxRecord {
            dest,
            payload: payload.to_vec(),
            more_data,
            power_management,
            radio: self.radio,
        });
    }

    fn query_buffer_status(&mut self, station: Aid, tid: Tid) -> u8 {
        *self
            .buffer_status
            .get(&(station, tid))
            .unwrap_or(&crate::buffer_status::BUFFER_STATUS_UNKNOWN)
    }
}
