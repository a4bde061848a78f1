// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Common types shared between the AP and station halves of the power-save
//! MLME: monotonic time and timers with cancellable handles, MAC constants,
//! and the wire codecs for the TIM, TWT, and TWT Information elements.

pub mod error;
pub mod ie;
pub mod mac;
pub mod test_utils;
pub mod time;
pub mod timer;

pub use time::TimeUnit;
