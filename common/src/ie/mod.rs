// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod reader;
pub mod tim;
pub mod twt;
pub mod twt_info;

pub use reader::Reader;

use {
    crate::error::FrameWriteError,
    zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned},
};

// IEEE Std 802.11-2016, 9.4.2.1
#[derive(
    FromZeroes, FromBytes, AsBytes, Unaligned, Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd,
)]
#[repr(C, packed)]
pub struct Id(pub u8);

impl Id {
    pub const TIM: Id = Id(5);
    pub const TWT: Id = Id(216);
}

#[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C, packed)]
pub struct Header {
    pub id: Id,
    pub body_len: u8,
}

/// Appends one element (header + body) to `buf`.
pub fn write_ie(buf: &mut Vec<u8>, id: Id, body: &[u8]) -> Result<(), FrameWriteError> {
    if body.len() > u8::MAX as usize {
        return Err(FrameWriteError::InvalidData("element body exceeds 255 octets"));
    }
    buf.push(id.0);
    buf.push(body.len() as u8);
    buf.extend_from_slice(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_ie_appends_header_and_body() {
        let mut buf = vec![];
        write_ie(&mut buf, Id::TIM, &[1, 2, 3]).expect("failed writing IE");
        assert_eq!(&buf[..], &[5, 3, 1, 2, 3]);
    }

    #[test]
    fn write_ie_rejects_oversized_body() {
        let mut buf = vec![];
        let body = [0u8; 256];
        assert_eq!(
            write_ie(&mut buf, Id::TIM, &body[..]),
            Err(FrameWriteError::InvalidData("element body exceeds 255 octets"))
        );
    }
}
