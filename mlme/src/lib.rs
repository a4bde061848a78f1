// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Power-save coordination between an 802.11 AP and its associated stations:
//! Target Wake Time (TWT) negotiation and service-period scheduling, legacy
//! power-save buffering with TIM/DTIM signaling, and a trigger-based
//! multi-user scheduler which only solicits uplink from stations it can
//! prove are awake. The implementation is divided between the [`ap`] and
//! [`client`] halves, with shared state-machine and codec infrastructure in
//! the `wlan-ps-common` crate.
//!
//! All state transitions run as callbacks of a single-threaded event loop
//! driven by a [`wlan_ps_common::timer::Scheduler`]; there is no internal
//! locking.
//!
//! [`ap`]: crate::ap
//! [`client`]: crate::client

pub mod ap;
pub mod buffer_status;
pub mod client;
pub mod config;
pub mod device;
pub mod error;
pub mod twt;

pub use {config::Config, error::Error, wlan_ps_common as common};
