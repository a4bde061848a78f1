// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Why a power-saving station is currently holding its radio awake. Each
/// reason has its own exit condition; collapsing them into one boolean was
/// the source of several subtle bugs, so every legal combination is a
/// distinct state instead.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AwakeReason {
    /// Woke ahead of an expected beacon to catch the TIM.
    PreBeacon,
    /// Polling buffered downlink until the more-data bit clears.
    RetrievingBuffered,
    /// Local uplink data forced a wake.
    LocalData,
    /// Waiting out group-frame delivery after a DTIM.
    Multicast,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PowerState {
    Unassociated,
    /// Constantly-awake mode: power save disabled.
    Cam,
    PsmAwake(AwakeReason),
    PsmAsleep,
    /// Inside an agreed TWT service period.
    TwtSpAwake,
    /// Outside its own TWT service periods.
    TwtSpAsleep,
    /// Delivery-enabled (APSD-style) station waiting for the AP to signal
    /// the end of a delivery period.
    ApsdAwaitingEndOfPeriod,
}

impl PowerState {
    pub fn is_asleep(&self) -> bool {
        matches!(self, PowerState::PsmAsleep | PowerState::TwtSpAsleep)
    }

    pub fn is_associated(&self) -> bool {
        !matches!(self, PowerState::Unassociated)
    }

    /// Whether the station is operating under legacy power save, asleep or
    /// not.
    pub fn in_psm(&self) -> bool {
        matches!(self, PowerState::PsmAsleep | PowerState::PsmAwake(_))
    }

    pub fn in_twt(&self) -> bool {
        matches!(self, PowerState::TwtSpAwake | PowerState::TwtSpAsleep)
    }
}
