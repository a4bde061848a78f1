// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-opportunity transmission format selection. The scheduler owns no
//! station state; it reads a snapshot of the association table (in insertion
//! order) plus buffer-status knowledge and picks one format. Wrong picks
//! against stale awake/asleep assumptions waste the whole opportunity, so
//! stations with a live TWT agreement are only ever solicited while inside a
//! service period the AP computed itself.

use {
    crate::buffer_status::StationOccupancy,
    wlan_ps_common::{mac::Aid, time::Duration},
};

/// Snapshot of one associated station, taken at the start of an opportunity.
#[derive(Debug, Copy, Clone)]
pub struct StationView {
    pub aid: Aid,
    pub has_twt: bool,
    pub twt_sp_awake: bool,
    pub expecting_trigger: bool,
    pub occupancy: StationOccupancy,
    /// Downlink frames buffered at the AP for this station.
    pub queued_downlink: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TriggerVariant {
    Basic,
    BufferStatusPoll,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CandidateFrame {
    /// A frame already queued for the station.
    Buffered,
    /// A minimal synthetic exchange carrying no user payload, used to reach
    /// a station whose queue knowledge must be refreshed.
    SyntheticProbe,
}

/// Ephemeral per-opportunity assignment. Never persisted past the decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SchedulingCandidate {
    pub aid: Aid,
    /// Resource-unit width in tones.
    pub ru_tones: u16,
    pub frame: CandidateFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxFormat {
    NoTx,
    SingleUserTx(SchedulingCandidate),
    DownlinkMuTx(Vec<SchedulingCandidate>),
    UplinkMuTx(TriggerVariant, Vec<SchedulingCandidate>),
}

/// Equal-size RU groupings of a 20 MHz channel: (stations, tones each,
/// leftover 26-tone units). IEEE Std 802.11ax-2021, 27.3.2.2.
const RU_GROUPINGS: [(usize, u16, usize); 4] = [(1, 242, 0), (2, 106, 1), (4, 52, 1), (9, 26, 0)];

/// Smallest grouping that seats `n` stations; `n` above the widest grouping
/// is capped to it.
fn ru_grouping(n: usize) -> (usize, u16) {
    for &(seats, tones, _leftover) in RU_GROUPINGS.iter() {
        if n <= seats {
            return (seats, tones);
        }
    }
    let (seats, tones, _) = RU_GROUPINGS[RU_GROUPINGS.len() - 1];
    (seats, tones)
}

pub struct MuScheduler {
    min_exchange_time: Duration,
    max_ru_per_trigger: usize,
    rr_cursor: usize,
}

impl MuScheduler {
    pub fn new(min_exchange_time: Duration, max_ru_per_trigger: usize) -> Self {
        Self { min_exchange_time, max_ru_per_trigger, rr_cursor: 0 }
    }

    /// Picks a transmission format for one opportunity with `budget` time
    /// remaining. `stations` must be in association insertion order so ties
    /// break deterministically.
    pub fn decide(&mut self, stations: &[StationView], budget: Duration) -> TxFormat {
        // A truncated exchange is worse than none; defer when the minimum
        // viable exchange does not fit.
        if budget < self.min_exchange_time {
            return TxFormat::NoTx;
        }

        // 1. Buffered downlink wins. TWT stations outside their SP are
        //    unreachable and excluded.
        let downlink: Vec<_> =
            stations.iter().filter(|s| s.queued_downlink && Self::reachable(s)).collect();
        if !downlink.is_empty() {
            return self.downlink_mu(&downlink, CandidateFrame::Buffered);
        }

        // 2. Triggerable stations with unknown occupancy get a buffer-status
        //    poll before anything else is considered.
        let triggerable: Vec<_> = stations
            .iter()
            .filter(|s| s.has_twt && s.twt_sp_awake && s.expecting_trigger)
            .collect();
        let unknown: Vec<_> = triggerable
            .iter()
            .filter(|s| s.occupancy == StationOccupancy::Unknown)
            .copied()
            .collect();
        if !unknown.is_empty() {
            let (_seats, tones) = ru_grouping(unknown.len().min(self.max_ru_per_trigger));
            let candidates = unknown
                .iter()
                .take(self.max_ru_per_trigger)
                .map(|s| SchedulingCandidate {
                    aid: s.aid,
                    ru_tones: tones,
                    frame: CandidateFrame::SyntheticProbe,
                })
                .collect();
            return TxFormat::UplinkMuTx(TriggerVariant::BufferStatusPoll, candidates);
        }

        // 3. Basic-trigger uplink solicitation of stations known to hold
        //    data, widest queues first. `sort_by_key` is stable, so equal
        //    occupancies keep insertion order.
        if !triggerable.is_empty() {
            let mut solicited: Vec<_> = triggerable
                .iter()
                .filter(|s| match s.occupancy {
                    StationOccupancy::Bytes(n) => n > 0,
                    StationOccupancy::Unbounded => true,
                    StationOccupancy::Unknown => false,
                })
                .copied()
                .collect();
            if !solicited.is_empty() {
                solicited.sort_by_key(|s| match s.occupancy {
                    StationOccupancy::Unbounded => std::cmp::Reverse(usize::MAX),
                    StationOccupancy::Bytes(n) => std::cmp::Reverse(n),
                    StationOccupancy::Unknown => std::cmp::Reverse(0),
                });
                let (_seats, tones) = ru_grouping(solicited.len().min(self.max_ru_per_trigger));
                let candidates = solicited
                    .iter()
                    .take(self.max_ru_per_trigger)
                    .map(|s| SchedulingCandidate {
                        aid: s.aid,
                        ru_tones: tones,
                        frame: CandidateFrame::Buffered,
                    })
                    .collect();
                return TxFormat::UplinkMuTx(TriggerVariant::Basic, candidates);
            }
        }

        // 4. Round-robin downlink across every reachable station.
        let eligible: Vec<_> = stations.iter().filter(|s| Self::reachable(s)).collect();
        if eligible.is_empty() {
            return TxFormat::NoTx;
        }
        let start = self.rr_cursor % eligible.len();
        self.rr_cursor = self.rr_cursor.wrapping_add(1);
        let rotated: Vec<_> =
            eligible.iter().cycle().skip(start).take(eligible.len()).copied().collect();
        self.downlink_mu(&rotated, CandidateFrame::SyntheticProbe)
    }

    fn reachable(station: &StationView) -> bool {
        !station.has_twt || station.twt_sp_awake
    }

    fn downlink_mu(&self, stations: &[&StationView], frame: CandidateFrame) -> TxFormat {
        let n = stations.len().min(self.max_ru_per_trigger);
        let (_seats, tones) = ru_grouping(n);
        let candidates: Vec<_> = stations
            .iter()
            .take(n)
            .map(|s| SchedulingCandidate { aid: s.aid, ru_tones: tones, frame })
            .collect();
        match candidates.len() {
            1 => TxFormat::SingleUserTx(candidates[0]),
            _ => TxFormat::DownlinkMuTx(candidates),
        }
    }
}
