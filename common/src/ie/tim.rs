// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        error::{FrameParseError, FrameWriteError},
        mac::{Aid, MAX_AID},
    },
    bitfield::bitfield,
    std::mem::size_of,
    zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned},
};

/// The virtual bitmap covers AIDs 0..=2007, i.e. 2008 bits.
/// IEEE Std 802.11-2016, 9.4.2.6.
pub const TIM_BITMAP_LEN: usize = 251;

bitfield! {
    #[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct BitmapControl(u8);
    impl Debug;
    pub group_traffic, set_group_traffic: 0;
    // Bitmap Offset: N1 / 2, where N1 is the first encoded octet's index.
    pub u8, offset, set_offset: 7, 1;
}

// IEEE Std 802.11-2016, 9.4.2.6: the three fixed octets preceding the
// partial virtual bitmap.
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct TimHeader {
    pub dtim_count: u8,
    pub dtim_period: u8,
    pub bmp_ctrl: BitmapControl,
}

/// A decoded (or to-be-encoded) TIM element. Holds the full virtual bitmap;
/// only the span `n1..=n2` is emitted on the wire. Built fresh for every
/// beacon, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimElement {
    pub header: TimHeader,
    bitmap: [u8; TIM_BITMAP_LEN],
    n1: usize,
    n2: usize,
}

impl TimElement {
    /// Whether the AID's bit is set in the virtual bitmap.
    pub fn is_traffic_buffered(&self, aid: Aid) -> bool {
        if aid > MAX_AID {
            return false;
        }
        self.bitmap[aid as usize / 8] & (1 << (aid % 8)) != 0
    }

    pub fn group_traffic_buffered(&self) -> bool {
        self.header.bmp_ctrl.group_traffic()
    }

    /// The encoded octets `N1..=N2` of the virtual bitmap.
    pub fn partial_virtual_bitmap(&self) -> &[u8] {
        &self.bitmap[self.n1..=self.n2]
    }

    /// Serializes the element body (without the element header).
    pub fn write_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.header.as_bytes());
        buf.extend_from_slice(self.partial_virtual_bitmap());
    }

    pub fn body_len(&self) -> usize {
        size_of::<TimHeader>() + (self.n2 - self.n1 + 1)
    }
}

/// Builds a TIM element from the set of AIDs with buffered unicast traffic.
///
/// N1 is the largest even octet index such that all preceding octets of the
/// virtual bitmap are zero; N2 is the smallest octet index such that all
/// following octets are zero. With no buffered traffic a single zero octet
/// is still emitted, with a bitmap offset of zero.
pub fn encode(
    dtim_count: u8,
    dtim_period: u8,
    group_traffic_buffered: bool,
    buffered_aids: impl IntoIterator<Item = Aid>,
) -> Result<TimElement, FrameWriteError> {
    if dtim_period == 0 {
        return Err(FrameWriteError::InvalidData("DTIM period must be non-zero"));
    }
    if dtim_count >= dtim_period {
        return Err(FrameWriteError::InvalidData("DTIM count must be less than DTIM period"));
    }

    let mut bitmap = [0u8; TIM_BITMAP_LEN];
    for aid in buffered_aids {
        if aid > MAX_AID {
            return Err(FrameWriteError::InvalidData("AID exceeds TIM bitmap capacity"));
        }
        bitmap[aid as usize / 8] |= 1 << (aid % 8);
    }

    let (n1, n2) = match bitmap.iter().position(|&b| b != 0) {
        // Round the first non-zero octet down to an even index.
        Some(first) => (first & !1, bitmap.iter().rposition(|&b| b != 0).unwrap()),
        None => (0, 0),
    };

    let mut bmp_ctrl = BitmapControl(0);
    bmp_ctrl.set_group_traffic(group_traffic_buffered);
    bmp_ctrl.set_offset((n1 / 2) as u8);
    Ok(TimElement { header: TimHeader { dtim_count, dtim_period, bmp_ctrl }, bitmap, n1, n2 })
}

/// Parses a TIM element body (without the element header).
pub fn decode(body: &[u8]) -> Result<TimElement, FrameParseError> {
    if body.len() < size_of::<TimHeader>() + 1 {
        return Err(FrameParseError::BufferTooShort {
            expected: size_of::<TimHeader>() + 1,
            actual: body.len(),
        });
    }
    // Unwrap is OK because we checked the length above.
    let header = TimHeader::read_from_prefix(body).unwrap();
    let partial = &body[size_of::<TimHeader>()..];

    if header.dtim_period == 0 {
        return Err(FrameParseError::MalformedElement("DTIM period is zero"));
    }
    if header.dtim_count >= header.dtim_period {
        return Err(FrameParseError::MalformedElement("DTIM count not less than DTIM period"));
    }
    let n1 = header.bmp_ctrl.offset() as usize * 2;
    if n1 + partial.len() > TIM_BITMAP_LEN {
        return Err(FrameParseError::MalformedElement(
            "partial virtual bitmap inconsistent with bitmap offset",
        ));
    }

    let mut bitmap = [0u8; TIM_BITMAP_LEN];
    bitmap[n1..n1 + partial.len()].copy_from_slice(partial);
    Ok(TimElement { header, bitmap, n1, n2: n1 + partial.len() - 1 })
}
