// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Buffer status reports (BSRs): a station's self-reported uplink queue
//! occupancy, tracked per (station, TID) with a freshness deadline. Stale
//! knowledge reverts to unknown so the scheduler re-solicits instead of
//! acting on outdated reports.

use {
    std::collections::HashMap,
    wlan_ps_common::{
        mac::{Aid, Tid},
        time::{Duration, Time},
    },
};

/// Occupancy code: 255 = unknown, 254 = larger than the largest encodable
/// value, otherwise units of 256 octets (rounded up).
pub const BUFFER_STATUS_UNKNOWN: u8 = 255;
pub const BUFFER_STATUS_UNBOUNDED: u8 = 254;
pub const BUFFER_STATUS_UNIT_BYTES: usize = 256;
pub const BUFFER_STATUS_MAX_CODE: u8 = 253;

pub fn encode_occupancy(bytes: usize) -> u8 {
    let units = (bytes + BUFFER_STATUS_UNIT_BYTES - 1) / BUFFER_STATUS_UNIT_BYTES;
    if units > BUFFER_STATUS_MAX_CODE as usize {
        BUFFER_STATUS_UNBOUNDED
    } else {
        units as u8
    }
}

/// A station's occupancy aggregated over all TIDs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StationOccupancy {
    /// No fresh report on any TID.
    Unknown,
    /// At least one TID reported more data than the code can express.
    Unbounded,
    /// Upper-bound of buffered octets summed over freshly reported TIDs.
    Bytes(usize),
}

#[derive(Debug, Copy, Clone)]
struct Entry {
    code: u8,
    updated: Time,
}

/// Per-(station, TID) buffer status knowledge with expiry. The AP is the
/// sole writer; the scheduler only reads.
pub struct BufferStatusMap {
    expiry: Duration,
    entries: HashMap<(Aid, Tid), Entry>,
}

impl BufferStatusMap {
    pub fn new(expiry: Duration) -> Self {
        Self { expiry, entries: HashMap::new() }
    }

    /// Records a report. A report of `BUFFER_STATUS_UNKNOWN` erases the
    /// entry instead of storing it.
    pub fn report(&mut self, station: Aid, tid: Tid, code: u8, now: Time) {
        if code == BUFFER_STATUS_UNKNOWN {
            self.entries.remove(&(station, tid));
        } else {
            self.entries.insert((station, tid), Entry { code, updated: now });
        }
    }

    /// Occupancy code for one (station, TID); expired entries read as
    /// unknown.
    pub fn occupancy(&self, station: Aid, tid: Tid, now: Time) -> u8 {
        match self.entries.get(&(station, tid)) {
            Some(entry) if now - entry.updated <= self.expiry => entry.code,
            _ => BUFFER_STATUS_UNKNOWN,
        }
    }

    /// Aggregates fresh per-TID knowledge into a station-level value.
    pub fn station_occupancy(&self, station: Aid, now: Time) -> StationOccupancy {
        let mut any_fresh = false;
        let mut total = 0usize;
        for ((aid, _tid), entry) in &self.entries {
            if *aid != station || now - entry.updated > self.expiry {
                continue;
            }
            any_fresh = true;
            if entry.code == BUFFER_STATUS_UNBOUNDED {
                return StationOccupancy::Unbounded;
            }
            total += entry.code as usize * BUFFER_STATUS_UNIT_BYTES;
        }
        if any_fresh {
            StationOccupancy::Bytes(total)
        } else {
            StationOccupancy::Unknown
        }
    }

    /// Erases all knowledge about a station, forcing the scheduler to
    /// solicit a fresh report.
    pub fn clear_station(&mut self, station: Aid) {
        self.entries.retain(|(aid, _), _| *aid != station);
    }
}
