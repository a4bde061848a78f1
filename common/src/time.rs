// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ops;

/// A point on the MAC's monotonic clock, in nanoseconds. The clock may be a
/// real OS clock or a test harness's virtual clock; components never assume
/// which one is driving them.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(i64);

impl Time {
    pub const ZERO: Self = Time(0);

    pub fn from_nanos(nanos: i64) -> Self {
        Time(nanos)
    }

    pub fn into_nanos(self) -> i64 {
        self.0
    }
}

/// A signed span of time, in nanoseconds.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

impl Duration {
    pub const ZERO: Self = Duration(0);

    pub fn from_nanos(nanos: i64) -> Self {
        Duration(nanos)
    }

    pub fn from_micros(micros: i64) -> Self {
        Duration(micros * 1_000)
    }

    pub fn from_millis(millis: i64) -> Self {
        Duration(millis * 1_000_000)
    }

    pub fn from_seconds(secs: i64) -> Self {
        Duration(secs * 1_000_000_000)
    }

    pub fn into_nanos(self) -> i64 {
        self.0
    }

    pub fn into_micros(self) -> i64 {
        self.0 / 1_000
    }
}

impl ops::Add<Duration> for Time {
    type Output = Time;
    fn add(self, rhs: Duration) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl ops::AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl ops::Sub<Duration> for Time {
    type Output = Time;
    fn sub(self, rhs: Duration) -> Time {
        Time(self.0 - rhs.0)
    }
}

impl ops::Sub<Time> for Time {
    type Output = Duration;
    fn sub(self, rhs: Time) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl ops::Add<Duration> for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl ops::AddAssign<Duration> for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl ops::Sub<Duration> for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl ops::Mul<i64> for Duration {
    type Output = Duration;
    fn mul(self, rhs: i64) -> Duration {
        Duration(self.0 * rhs)
    }
}

/// Convenience constructors mirroring the scalar suffix style used by the
/// rest of the codebase, e.g. `5.millis()`.
pub trait DurationNum {
    fn nanos(self) -> Duration;
    fn micros(self) -> Duration;
    fn millis(self) -> Duration;
    fn seconds(self) -> Duration;
}

impl DurationNum for i64 {
    fn nanos(self) -> Duration {
        Duration::from_nanos(self)
    }

    fn micros(self) -> Duration {
        Duration::from_micros(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }

    fn seconds(self) -> Duration {
        Duration::from_seconds(self)
    }
}

/// Representation of N IEEE 802.11 TimeUnits.
/// A TimeUnit is defined as 1024 micro seconds.
/// Note: Be careful with arithmetic operations on a TimeUnit. A TimeUnit is
/// limited to 2 octets and can easily overflow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeUnit(pub u16);

impl TimeUnit {
    pub const DEFAULT_BEACON_INTERVAL: Self = TimeUnit(100);
    pub const MICROS_PER_TIME_UNIT: i64 = 1024;

    pub fn into_micros(self) -> i64 {
        self.0 as i64 * Self::MICROS_PER_TIME_UNIT
    }
}

impl From<TimeUnit> for Duration {
    fn from(tu: TimeUnit) -> Duration {
        Duration::from_micros(tu.into_micros())
    }
}

impl ops::Mul<u16> for TimeUnit {
    type Output = TimeUnit;
    fn mul(self, rhs: u16) -> TimeUnit {
        TimeUnit(self.0 * rhs)
    }
}
