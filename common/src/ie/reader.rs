// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    super::{Header, Id},
    std::mem::size_of,
    zerocopy::FromBytes,
};

/// Iterates over the information elements of a management frame body,
/// yielding `(Id, body)` for each complete element. Iteration stops at the
/// first truncated element.
pub struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader(bytes)
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = (Id, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let header = Header::read_from_prefix(self.0)?;
        let body_len = header.body_len as usize;
        if self.0.len() < size_of::<Header>() + body_len {
            None
        } else {
            let body = &self.0[size_of::<Header>()..size_of::<Header>() + body_len];
            self.0 = &self.0[size_of::<Header>() + body_len..];
            Some((header.id, body))
        }
    }
}
