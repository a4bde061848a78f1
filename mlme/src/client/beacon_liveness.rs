// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Counts consecutive missed beacons. Any received beacon resets the count;
/// reaching the configured limit is fatal to the association.
pub struct BeaconLivenessTracker {
    limit: u32,
    missed: u32,
}

impl BeaconLivenessTracker {
    pub fn new(limit: u32) -> Self {
        Self { limit, missed: 0 }
    }

    pub fn on_beacon(&mut self) {
        self.missed = 0;
    }

    /// Records one missed beacon. Returns true when the association is
    /// considered lost.
    pub fn on_missed_beacon(&mut self) -> bool {
        self.missed = self.missed.saturating_add(1);
        self.missed >= self.limit
    }

    pub fn missed_count(&self) -> u32 {
        self.missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaches_limit_after_consecutive_misses() {
        let mut tracker = BeaconLivenessTracker::new(3);
        assert!(!tracker.on_missed_beacon());
        assert!(!tracker.on_missed_beacon());
        assert!(tracker.on_missed_beacon());
        assert_eq!(tracker.missed_count(), 3);
    }

    #[test]
    fn beacon_resets_count() {
        let mut tracker = BeaconLivenessTracker::new(2);
        assert!(!tracker.on_missed_beacon());
        tracker.on_beacon();
        assert!(!tracker.on_missed_beacon());
        assert!(tracker.on_missed_beacon());
    }
}
