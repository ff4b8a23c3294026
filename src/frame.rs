//! T.018 information-field and frame assembly.
//!
//! The 202-bit information field, in transmission order (0-indexed offsets;
//! the T.018 tables number the same bits from 1):
//!
//! | Offset | Width | Content |
//! |--------|-------|---------|
//! | 0      | 16    | Type-approval certificate number |
//! | 16     | 14    | Production serial |
//! | 30     | 10    | Country code |
//! | 40     | 3     | Protocol flags (homing, RLS, test) |
//! | 43     | 23    | Encoded latitude |
//! | 66     | 24    | Encoded longitude |
//! | 90     | 47    | Aircraft/vessel ID |
//! | 137    | 3     | Beacon type |
//! | 140    | 14    | Spare (all-ones iff CANCEL) |
//! | 154    | 4     | Rotating-field tag |
//! | 158    | 44    | Rotating-field payload |
//!
//! The full 252-bit frame prepends the 2-bit spreading-code selection header
//! and appends the 48-bit BCH parity.

use chrono::{Datelike, Timelike};
use num_traits::float::FloatCore;

use crate::{
    bch,
    bits::BitBuffer,
    error::{BeaconError, Result},
    state::{BeaconIdentity, GpsFix, Mode, RotatingField, RotatingKind},
};

pub const INFO_BITS: usize = 202;
pub const INFO_BYTES: usize = 26;
pub const FRAME_BITS: usize = 252;
pub const FRAME_BYTES: usize = 32;

/// 202-bit information field.
pub type InfoField = BitBuffer<INFO_BYTES>;
/// 252-bit frame: `[header(2) | info(202) | parity(48)]`.
pub type FrameBuffer = BitBuffer<FRAME_BYTES>;

const TAC_START: usize = 0;
const TAC_BITS: usize = 16;
const SERIAL_START: usize = 16;
const SERIAL_BITS: usize = 14;
const COUNTRY_START: usize = 30;
const COUNTRY_BITS: usize = 10;
const PROTOCOL_START: usize = 40;
const PROTOCOL_BITS: usize = 3;
const LAT_START: usize = 43;
const LAT_BITS: usize = 23;
const LON_START: usize = 66;
const LON_BITS: usize = 24;
const VESSEL_START: usize = 90;
const VESSEL_BITS: usize = 47;
const BEACON_TYPE_START: usize = 137;
const BEACON_TYPE_BITS: usize = 3;
const SPARE_START: usize = 140;
const SPARE_BITS: usize = 14;
const ROTATING_TAG_START: usize = 154;
const ROTATING_TAG_BITS: usize = 4;
const ROTATING_PAYLOAD_START: usize = 158;
const ROTATING_PAYLOAD_BITS: usize = 44;

/// Frame offset of the information field, past the 2-bit header.
pub const FRAME_INFO_START: usize = 2;
const FRAME_PARITY_START: usize = FRAME_INFO_START + INFO_BITS;

const SPARE_CANCEL: u64 = 0x3FFF;

const LAT_SCALE: u32 = 1 << LAT_BITS;
const LON_SCALE: u32 = 1 << LON_BITS;

pub const ALT_MIN_M: f64 = -1_500.0;
pub const ALT_MAX_M: f64 = 17_000.0;

/// Latitude to its 23-bit wire code: `round((lat + 90) * 2^23 / 180) mod 2^23`.
/// The shift to non-negative happens before scaling, so no two's-complement
/// handling is needed; +90° wraps to 0 by construction.
pub fn encode_lat(lat_deg: f64) -> u32 {
    let scaled = (lat_deg.clamp(-90.0, 90.0) + 90.0) * f64::from(LAT_SCALE) / 180.0;
    (FloatCore::round(scaled) as u32) & (LAT_SCALE - 1)
}

/// Longitude to its 24-bit wire code: `round((lon + 180) * 2^24 / 360) mod 2^24`.
pub fn encode_lon(lon_deg: f64) -> u32 {
    let scaled = (lon_deg.clamp(-180.0, 180.0) + 180.0) * f64::from(LON_SCALE) / 360.0;
    (FloatCore::round(scaled) as u32) & (LON_SCALE - 1)
}

/// 10-bit altitude code: clamp to [-1500, +17000] m, then scale the 18.5 km
/// span onto 0..=1023 with integer rounding.
pub fn altitude_code(alt_m: f64) -> u16 {
    let clamped = FloatCore::round(alt_m.clamp(ALT_MIN_M, ALT_MAX_M)) as i32;
    let span = (clamped + 1_500) as u32;
    ((span * 1_023 + 9_250) / 18_500) as u16
}

/// Rotating-field time word: day-of-month, hour and minute of the last
/// position update, packed 5/5/6.
pub fn time_value(fix: &GpsFix) -> u16 {
    let day = fix.datetime.day() & 0x1F;
    let hour = fix.datetime.hour() & 0x1F;
    let minute = fix.datetime.minute() & 0x3F;
    ((day << 11) | (hour << 6) | minute) as u16
}

/// Re-derive the dynamic members of a rotating-field choice from the fix
/// used for this frame. RLS and CANCEL payloads are static configuration.
pub fn refresh_rotating(choice: &RotatingField, fix: &GpsFix) -> RotatingField {
    match *choice {
        RotatingField::G008 { .. } => RotatingField::G008 {
            time_value: time_value(fix),
            altitude_code: altitude_code(fix.alt_m),
        },
        RotatingField::EltDt { .. } => RotatingField::EltDt {
            time_value: time_value(fix),
            altitude_code: altitude_code(fix.alt_m),
        },
        other => other,
    }
}

fn rotating_payload(rotating: &RotatingField) -> u64 {
    match *rotating {
        RotatingField::G008 { time_value, altitude_code }
        | RotatingField::EltDt { time_value, altitude_code } => {
            // time(16) | altitude(10) | spare(18) = 0
            (u64::from(time_value) << 28) | (u64::from(altitude_code & 0x3FF) << 18)
        }
        RotatingField::Rls { provider, data } => {
            (u64::from(provider) << 36) | (data & ((1 << 36) - 1))
        }
        RotatingField::Cancel { deactivation_method } => {
            (u64::from(deactivation_method & 0b11) << 42) | 0x3FF_FFFF_FFFF
        }
    }
}

/// Assemble the 202-bit information field.
pub fn build_info(
    identity: &BeaconIdentity,
    fix: &GpsFix,
    rotating: &RotatingField,
) -> Result<InfoField> {
    let mut info = InfoField::new();
    info.set(TAC_START, TAC_BITS, u64::from(identity.tac))?;
    info.set(SERIAL_START, SERIAL_BITS, u64::from(identity.serial))?;
    info.set(COUNTRY_START, COUNTRY_BITS, u64::from(identity.country))?;
    info.set(PROTOCOL_START, PROTOCOL_BITS, u64::from(identity.protocol_code))?;
    info.set(LAT_START, LAT_BITS, u64::from(encode_lat(fix.lat_deg)))?;
    info.set(LON_START, LON_BITS, u64::from(encode_lon(fix.lon_deg)))?;
    info.set(VESSEL_START, VESSEL_BITS, identity.vessel_id)?;
    info.set(BEACON_TYPE_START, BEACON_TYPE_BITS, u64::from(identity.beacon_type))?;
    let spare = if rotating.kind() == RotatingKind::Cancel {
        SPARE_CANCEL
    } else {
        0
    };
    info.set(SPARE_START, SPARE_BITS, spare)?;
    info.set(ROTATING_TAG_START, ROTATING_TAG_BITS, u64::from(u8::from(rotating.kind())))?;
    info.set(ROTATING_PAYLOAD_START, ROTATING_PAYLOAD_BITS, rotating_payload(rotating))?;
    Ok(info)
}

/// Build the full 252-bit frame: header, information field, BCH parity.
/// Header bit 0 flags the self-test spreading code family in TEST mode.
pub fn build_frame(info: &InfoField, mode: Mode) -> Result<FrameBuffer> {
    let mut frame = FrameBuffer::new();
    frame.set(0, 1, u64::from(mode == Mode::Test))?;
    frame.set(1, 1, 0)?;
    for (offset, width) in [(0usize, 64usize), (64, 64), (128, 64), (192, 10)] {
        frame.set(FRAME_INFO_START + offset, width, info.get(offset, width)?)?;
    }
    frame.set(FRAME_PARITY_START, bch::PARITY_BITS, bch::parity_of(info))?;
    Ok(frame)
}

/// Rotating-field tag read back from an assembled information field, for
/// status and log output.
pub fn rotating_kind_of(info: &InfoField) -> Result<RotatingKind> {
    let tag = info.get(ROTATING_TAG_START, ROTATING_TAG_BITS)? as u8;
    RotatingKind::try_from(tag).map_err(|_| BeaconError::Config)
}

/// 23-character hexadecimal beacon identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HexId(pub [u8; 23]);

impl HexId {
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.0).unwrap_or("")
    }
}

fn render_hex(ident: u128) -> HexId {
    let mut out = [0u8; 23];
    for (k, byte) in out.iter_mut().enumerate() {
        let nibble = ((ident >> (4 * (22 - k))) & 0xF) as u8;
        *byte = if nibble < 10 {
            b'0' + nibble
        } else {
            b'A' + nibble - 10
        };
    }
    HexId(out)
}

/// 23-HEX identifier from an assembled information field.
///
/// 92 bits, in order: fixed 1, country code, fixed 101, TAC, serial,
/// test-protocol flag, beacon type, first 44 bits of the vessel ID.
pub fn hex_id_from_info(info: &InfoField) -> Result<HexId> {
    let mut ident: u128 = 1;
    ident = (ident << COUNTRY_BITS) | u128::from(info.get(COUNTRY_START, COUNTRY_BITS)?);
    ident = (ident << 3) | 0b101;
    ident = (ident << TAC_BITS) | u128::from(info.get(TAC_START, TAC_BITS)?);
    ident = (ident << SERIAL_BITS) | u128::from(info.get(SERIAL_START, SERIAL_BITS)?);
    ident = (ident << 1) | u128::from(info.get(PROTOCOL_START + 2, 1)?);
    ident = (ident << BEACON_TYPE_BITS)
        | u128::from(info.get(BEACON_TYPE_START, BEACON_TYPE_BITS)?);
    ident = (ident << 44) | u128::from(info.get(VESSEL_START, 44)?);
    Ok(render_hex(ident))
}

/// 23-HEX identifier straight from the identity fields. Must agree with
/// [`hex_id_from_info`] over the assembled frame for any valid identity.
pub fn hex_id_from_identity(identity: &BeaconIdentity) -> HexId {
    let mut ident: u128 = 1;
    ident = (ident << COUNTRY_BITS) | u128::from(identity.country);
    ident = (ident << 3) | 0b101;
    ident = (ident << TAC_BITS) | u128::from(identity.tac);
    ident = (ident << SERIAL_BITS) | u128::from(identity.serial);
    ident = (ident << 1) | u128::from(identity.protocol_code & 1);
    ident = (ident << BEACON_TYPE_BITS) | u128::from(identity.beacon_type);
    ident = (ident << 44) | u128::from(identity.vessel_id >> 3);
    render_hex(ident)
}
