// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use {
    crate::{
        error::{FrameParseError, FrameWriteError},
        time::Duration,
    },
    bitfield::bitfield,
    zerocopy::{
        byteorder::{LittleEndian, U16, U64},
        AsBytes, FromBytes, FromZeroes, Unaligned,
    },
};

/// Nominal minimum wake duration is expressed in units of 256 us unless the
/// wake-duration-unit bit of the control field selects TUs (1024 us).
pub const WAKE_DURATION_UNIT_MICROS: i64 = 256;
pub const WAKE_DURATION_TU_MICROS: i64 = 1024;

bitfield! {
    #[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Clone, Copy, PartialEq, Eq)]
    #[repr(C)]
    pub struct TwtControl(u8);
    impl Debug;
    pub ndp_paging_indicator, set_ndp_paging_indicator: 0;
    pub responder_pm_mode, set_responder_pm_mode: 1;
    pub u8, negotiation_type, set_negotiation_type: 3, 2;
    pub info_frame_disabled, set_info_frame_disabled: 4;
    pub wake_duration_unit, set_wake_duration_unit: 5;
    // Bits 6-7 reserved.
}

bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct RequestType(u16);
    impl Debug;
    pub twt_request, set_twt_request: 0;
    pub u8, setup_command_raw, set_setup_command_raw: 3, 1;
    pub trigger, set_trigger: 4;
    pub implicit, set_implicit: 5;
    // Flow type: false = announced, true = unannounced.
    pub flow_type, set_flow_type: 6;
    pub u8, flow_id, set_flow_id: 9, 7;
    pub u8, wake_interval_exponent, set_wake_interval_exponent: 14, 10;
    pub protection, set_protection: 15;
}

impl Default for TwtControl {
    fn default() -> Self {
        TwtControl(0)
    }
}

impl Default for RequestType {
    fn default() -> Self {
        RequestType(0)
    }
}

impl RequestType {
    pub fn raw(&self) -> u16 {
        self.0
    }

    pub fn setup_command(&self) -> SetupCommand {
        SetupCommand::from_raw(self.setup_command_raw())
    }

    pub fn set_setup_command(&mut self, cmd: SetupCommand) {
        self.set_setup_command_raw(cmd as u8);
    }

    pub fn is_unannounced(&self) -> bool {
        self.flow_type()
    }
}

// IEEE Std 802.11ax, Table 9-262k (TWT Setup Command field).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum SetupCommand {
    RequestTwt = 0,
    SuggestTwt = 1,
    DemandTwt = 2,
    TwtGrouping = 3,
    AcceptTwt = 4,
    AlternateTwt = 5,
    DictateTwt = 6,
    RejectTwt = 7,
}

impl SetupCommand {
    fn from_raw(raw: u8) -> Self {
        match raw & 0x7 {
            0 => SetupCommand::RequestTwt,
            1 => SetupCommand::SuggestTwt,
            2 => SetupCommand::DemandTwt,
            3 => SetupCommand::TwtGrouping,
            4 => SetupCommand::AcceptTwt,
            5 => SetupCommand::AlternateTwt,
            6 => SetupCommand::DictateTwt,
            _ => SetupCommand::RejectTwt,
        }
    }

    /// Whether this command appears in a responder's element.
    pub fn is_response(&self) -> bool {
        (*self as u8) >= SetupCommand::AcceptTwt as u8
    }
}

// Individual TWT element body. All multi-octet fields are little-endian.
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned, Copy, Clone, Debug)]
#[repr(C, packed)]
struct TwtFields {
    control: TwtControl,
    request_type: U16<LittleEndian>,
    target_wake_time: U64<LittleEndian>,
    nominal_wake_duration: u8,
    wake_interval_mantissa: U16<LittleEndian>,
    channel: u8,
}

/// A decoded individual TWT element (IEEE Std 802.11ax, 9.4.2.199).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TwtElement {
    pub control: TwtControl,
    pub request_type: RequestType,
    /// Absolute target wake time in microseconds of the shared timebase.
    pub target_wake_time: u64,
    /// Units of 256 us (or one TU if `control.wake_duration_unit()`).
    pub nominal_wake_duration: u8,
    pub wake_interval_mantissa: u16,
    /// Reserved by this implementation; always transmitted as zero.
    pub channel: u8,
}

impl TwtElement {
    /// Wake interval is mantissa * 2^exponent microseconds.
    pub fn wake_interval(&self) -> Duration {
        let micros = (self.wake_interval_mantissa as i64)
            << self.request_type.wake_interval_exponent() as i64;
        Duration::from_micros(micros)
    }

    pub fn nominal_wake_duration(&self) -> Duration {
        let unit = if self.control.wake_duration_unit() {
            WAKE_DURATION_TU_MICROS
        } else {
            WAKE_DURATION_UNIT_MICROS
        };
        Duration::from_micros(self.nominal_wake_duration as i64 * unit)
    }

    pub fn parse(body: &[u8]) -> Result<Self, FrameParseError> {
        let fields = TwtFields::read_from(body)
            .ok_or(FrameParseError::MalformedElement("TWT element length"))?;
        Ok(TwtElement {
            control: fields.control,
            request_type: RequestType(fields.request_type.get()),
            target_wake_time: fields.target_wake_time.get(),
            nominal_wake_duration: fields.nominal_wake_duration,
            wake_interval_mantissa: fields.wake_interval_mantissa.get(),
            channel: fields.channel,
        })
    }

    pub fn write_body(&self, buf: &mut Vec<u8>) -> Result<(), FrameWriteError> {
        if self.channel != 0 {
            return Err(FrameWriteError::InvalidData("TWT channel field is reserved"));
        }
        let fields = TwtFields {
            control: self.control,
            request_type: U16::new(self.request_type.0),
            target_wake_time: U64::new(self.target_wake_time),
            nominal_wake_duration: self.nominal_wake_duration,
            wake_interval_mantissa: U16::new(self.wake_interval_mantissa),
            channel: self.channel,
        };
        buf.extend_from_slice(fields.as_bytes());
        Ok(())
    }
}
