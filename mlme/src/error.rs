// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    thiserror::Error,
    wlan_ps_common::{
        error::{FrameParseError, FrameWriteError},
        mac::Aid,
    },
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("value out of range: {0}")]
    OutOfRange(&'static str),
    #[error("error parsing frame: {0}")]
    ParsingFrame(#[from] FrameParseError),
    #[error("error writing frame: {0}")]
    WritingFrame(#[from] FrameWriteError),
    #[error("station {0} is not associated")]
    NotAssociated(Aid),
    #[error("station is not in a state where the request is allowed: {0}")]
    InvalidState(&'static str),
    #[error("TWT setup rejected: {0}")]
    TwtSetupRejected(&'static str),
    #[error("association lost after missing {0} consecutive beacons")]
    AssociationLost(u32),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
