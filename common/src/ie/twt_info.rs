// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::error::{FrameParseError, FrameWriteError},
    bitfield::bitfield,
};

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct TwtInfoHeader(u8);
    impl Debug;
    pub u8, flow_id, set_flow_id: 2, 0;
    pub response_requested, set_response_requested: 3;
    pub next_twt_request, set_next_twt_request: 4;
    pub u8, next_twt_subfield_size, set_next_twt_subfield_size: 6, 5;
    pub all_twt, set_all_twt: 7;
}

impl Default for TwtInfoHeader {
    fn default() -> Self {
        TwtInfoHeader(0)
    }
}

/// Octet width of the next-TWT subfield for each subfield-size code.
fn next_twt_width(size_code: u8) -> usize {
    match size_code & 0x3 {
        0 => 0,
        1 => 4,
        2 => 6,
        _ => 8,
    }
}

/// A decoded TWT Information action frame body
/// (IEEE Std 802.11ax, 9.6.24.12).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TwtInfo {
    pub header: TwtInfoHeader,
    /// Present iff the subfield-size code is non-zero. Microseconds.
    pub next_twt: Option<u64>,
}

impl TwtInfo {
    pub fn parse(body: &[u8]) -> Result<Self, FrameParseError> {
        if body.is_empty() {
            return Err(FrameParseError::BufferTooShort { expected: 1, actual: 0 });
        }
        let header = TwtInfoHeader(body[0]);
        let width = next_twt_width(header.next_twt_subfield_size());
        if body.len() != 1 + width {
            return Err(FrameParseError::MalformedElement(
                "next-TWT subfield inconsistent with declared size",
            ));
        }
        let next_twt = if width == 0 {
            None
        } else {
            let mut value = [0u8; 8];
            value[..width].copy_from_slice(&body[1..]);
            Some(u64::from_le_bytes(value))
        };
        Ok(TwtInfo { header, next_twt })
    }

    pub fn write_body(&self, buf: &mut Vec<u8>) -> Result<(), FrameWriteError> {
        let width = next_twt_width(self.header.next_twt_subfield_size());
        match (width, self.next_twt) {
            (0, None) => {
                buf.push(self.header.0);
            }
            (0, Some(_)) | (_, None) => {
                return Err(FrameWriteError::InvalidData(
                    "next-TWT presence inconsistent with declared size",
                ));
            }
            (_, Some(value)) => {
                if width < 8 && value >> (width * 8) != 0 {
                    return Err(FrameWriteError::InvalidData(
                        "next-TWT value does not fit declared size",
                    ));
                }
                buf.push(self.header.0);
                buf.extend_from_slice(&value.to_le_bytes()[..width]);
            }
        }
        Ok(())
    }
}
