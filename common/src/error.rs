// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

/// Errors raised while parsing a received frame or element. Parse failures
/// are always recoverable: the offending frame is dropped and logged, never
/// allowed to crash the decoder.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum FrameParseError {
    #[error("malformed element: {0}")]
    MalformedElement(&'static str),
    #[error("buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
    #[error("unexpected element id: {0}")]
    UnexpectedElementId(u8),
}

/// Errors raised while serializing a frame or element.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum FrameWriteError {
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("attempted to write invalid data: {0}")]
    InvalidData(&'static str),
}
