// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        error::Error,
        twt::{FlowId, TwtAgreement},
    },
    std::collections::HashMap,
    wlan_ps_common::mac::Aid,
};

/// Holds the negotiated TWT agreements, keyed by (peer, flow id). Pure data
/// and lookup; no timers. The per-peer live-agreement count is bounded by
/// the 3-bit flow id space.
pub struct TwtAgreementStore {
    agreements: HashMap<(Aid, FlowId), TwtAgreement>,
    live_count: HashMap<Aid, u8>,
}

impl TwtAgreementStore {
    pub fn new() -> Self {
        Self { agreements: HashMap::new(), live_count: HashMap::new() }
    }

    /// Inserts an agreement, atomically superseding any existing entry with
    /// the same (peer, flow id) key. Returns the superseded agreement, if
    /// any. The per-peer counter is decremented for a superseded entry and
    /// incremented for the new one.
    pub fn insert(&mut self, agreement: TwtAgreement) -> Result<Option<TwtAgreement>, Error> {
        agreement.validate()?;
        let key = (agreement.peer, agreement.flow_id);
        let superseded = self.agreements.insert(key, agreement);
        if superseded.is_none() {
            *self.live_count.entry(agreement.peer).or_insert(0) += 1;
        }
        Ok(superseded)
    }

    pub fn lookup(&self, peer: Aid, flow_id: FlowId) -> Option<&TwtAgreement> {
        self.agreements.get(&(peer, flow_id))
    }

    pub fn remove(&mut self, peer: Aid, flow_id: FlowId) -> Option<TwtAgreement> {
        let removed = self.agreements.remove(&(peer, flow_id));
        if removed.is_some() {
            match self.live_count.get_mut(&peer) {
                Some(count) if *count > 1 => *count -= 1,
                _ => {
                    self.live_count.remove(&peer);
                }
            }
        }
        removed
    }

    /// Destroys every agreement with `peer`, as on disassociation.
    pub fn remove_all_for(&mut self, peer: Aid) -> Vec<TwtAgreement> {
        self.live_count.remove(&peer);
        let keys: Vec<_> =
            self.agreements.keys().filter(|(aid, _)| *aid == peer).copied().collect();
        keys.iter().filter_map(|key| self.agreements.remove(key)).collect()
    }

    pub fn count_for(&self, peer: Aid) -> u8 {
        self.live_count.get(&peer).copied().unwrap_or(0)
    }

    pub fn agreements_for(&self, peer: Aid) -> impl Iterator<Item = &TwtAgreement> {
        self.agreements.values().filter(move |a| a.peer == peer)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::twt::tests::agreement, wlan_ps_common::time::DurationNum};

    #[test]
    fn insert_lookup_remove() {
        let mut store = TwtAgreementStore::new();
        let a = agreement(1, 3);
        assert!(store.insert(a).expect("insert failed").is_none());
        assert_eq!(store.lookup(1, a.flow_id), Some(&a));
        assert_eq!(store.count_for(1), 1);
        assert_eq!(store.remove(1, a.flow_id), Some(a));
        assert_eq!(store.lookup(1, a.flow_id), None);
        assert_eq!(store.count_for(1), 0);
    }

    #[test]
    fn insert_supersedes_same_key() {
        let mut store = TwtAgreementStore::new();
        let first = agreement(1, 3);
        let mut second = agreement(1, 3);
        second.wake_interval = 200.millis();
        store.insert(first).expect("insert failed");
        let superseded = store.insert(second).expect("insert failed");
        // Exactly one live entry remains and the counter is unchanged.
        assert_eq!(superseded, Some(first));
        assert_eq!(store.lookup(1, second.flow_id), Some(&second));
        assert_eq!(store.count_for(1), 1);
    }

    #[test]
    fn count_tracks_distinct_flows_per_peer() {
        let mut store = TwtAgreementStore::new();
        for flow in 0..=FlowId::MAX {
            store.insert(agreement(7, flow)).expect("insert failed");
        }
        assert_eq!(store.count_for(7), 8);
        store.remove(7, FlowId::new(2).unwrap());
        assert_eq!(store.count_for(7), 7);
    }

    #[test]
    fn remove_all_for_peer() {
        let mut store = TwtAgreementStore::new();
        store.insert(agreement(1, 0)).expect("insert failed");
        store.insert(agreement(1, 1)).expect("insert failed");
        store.insert(agreement(2, 0)).expect("insert failed");
        let removed = store.remove_all_for(1);
        assert_eq!(removed.len(), 2);
        assert_eq!(store.count_for(1), 0);
        assert_eq!(store.count_for(2), 1);
    }

    #[test]
    fn insert_rejects_invalid_agreement() {
        let mut store = TwtAgreementStore::new();
        let mut bad = agreement(1, 0);
        bad.nominal_wake_duration = bad.wake_interval + 1.nanos();
        assert!(store.insert(bad).is_err());
        assert_eq!(store.count_for(1), 0);
    }
}
