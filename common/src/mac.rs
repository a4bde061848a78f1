// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use zerocopy::{
    byteorder::{LittleEndian, U16},
    AsBytes, FromBytes, FromZeroes, Unaligned,
};

pub type MacAddr = [u8; 6];

pub const BCAST_ADDR: MacAddr = [0xff; 6];

/// Group bit (I/G) of the first address octet. Covers broadcast as well as
/// multicast addresses.
pub fn is_group_addr(addr: &MacAddr) -> bool {
    addr[0] & 0x01 != 0
}

/// Association ID. IEEE Std 802.11-2016, 9.4.1.8: valid AIDs fall in
/// 1..=2007. AID 0 is reserved for group traffic in the TIM bitmap.
pub type Aid = u16;

pub const MAX_AID: Aid = 2007;

/// Traffic identifier, IEEE Std 802.11-2016, 9.2.4.5.2.
pub type Tid = u8;

pub const NUM_TIDS: usize = 8;

/// PS-Poll control frame body after the frame control field.
/// IEEE Std 802.11-2016, 9.3.1.5. The AID is carried with its two high bits
/// forced to 1.
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct PsPoll {
    pub masked_aid: U16<LittleEndian>,
    pub bssid: MacAddr,
    pub ta: MacAddr,
}

const PS_POLL_AID_MASK: u16 = 0xc000;

impl PsPoll {
    pub fn new(aid: Aid, bssid: MacAddr, ta: MacAddr) -> Self {
        Self { masked_aid: U16::new(aid | PS_POLL_AID_MASK), bssid, ta }
    }

    pub fn aid(&self) -> Aid {
        self.masked_aid.get() & !PS_POLL_AID_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ps_poll_masks_aid() {
        let poll = PsPoll::new(5, [1; 6], [2; 6]);
        assert_eq!(poll.masked_aid.get(), 0xc005);
        assert_eq!(poll.aid(), 5);
        let parsed = PsPoll::read_from(poll.as_bytes()).expect("failed parsing PS-Poll");
        assert_eq!(parsed, poll);
    }

    #[test]
    fn group_bit() {
        assert!(is_group_addr(&BCAST_ADDR));
        assert!(is_group_addr(&[0x01, 0x00, 0x5e, 0, 0, 1]));
        assert!(!is_group_addr(&[0x02, 0, 0, 0, 0, 1]));
    }
}
