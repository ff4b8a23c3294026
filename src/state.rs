//! Shared data model: beacon identity, GPS fix snapshot, rotating-field
//! variants, ELT cadence state, and the status/config surface.

use bitflags::bitflags;
use chrono::NaiveDateTime;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    error::{BeaconError, Result},
    frame::HexId,
};

/// Test-mode type-approval code, fixed by the certification procedure.
pub const TEST_TAC: u16 = 9_999;
/// Operational TACs are allocated strictly above this value.
pub const OPERATIONAL_TAC_MIN: u16 = 10_000;

pub const SERIAL_MAX: u16 = (1 << 14) - 1;
pub const COUNTRY_MAX: u16 = (1 << 10) - 1;
pub const PROTOCOL_MAX: u8 = (1 << 3) - 1;
pub const BEACON_TYPE_MAX: u8 = (1 << 3) - 1;
pub const VESSEL_ID_MAX: u64 = (1 << 47) - 1;

/// Beacon identity, loaded once at boot from the integrator's storage.
///
/// `protocol_code` packs the three T.018 flag bits (homing, RLS function,
/// test protocol); the low bit is the test-protocol flag that also appears
/// in the 23-HEX identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeaconIdentity {
    pub tac: u16,
    /// 14-bit production serial.
    pub serial: u16,
    /// 10-bit MID country code.
    pub country: u16,
    /// 3-bit protocol flags.
    pub protocol_code: u8,
    /// 3-bit beacon type.
    pub beacon_type: u8,
    /// 47-bit aircraft/vessel identification.
    pub vessel_id: u64,
}

impl BeaconIdentity {
    /// Range-check every field against its wire width, and the TAC against
    /// the mode convention: exactly 9999 in TEST, above 10000 otherwise.
    pub fn validate(&self, mode: Mode) -> Result<()> {
        if self.serial > SERIAL_MAX
            || self.country > COUNTRY_MAX
            || self.protocol_code > PROTOCOL_MAX
            || self.beacon_type > BEACON_TYPE_MAX
            || self.vessel_id > VESSEL_ID_MAX
        {
            return Err(BeaconError::Config);
        }
        let tac_ok = match mode {
            Mode::Test => self.tac == TEST_TAC,
            Mode::Exercise => self.tac > OPERATIONAL_TAC_MIN,
        };
        if !tac_ok {
            return Err(BeaconError::Config);
        }
        Ok(())
    }
}

/// One validated GNSS fix. Snapshots are passed by reference; the core never
/// owns the receiver. When `valid` is false the configured fallback position
/// is substituted at frame assembly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GpsFix {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub valid: bool,
    /// UTC timestamp; day-of-month, hour and minute feed the rotating field.
    pub datetime: NaiveDateTime,
    pub satellites: u8,
    pub fix_quality: u8,
}

/// Rotating-field tag as it appears on the wire (info bits 155-158).
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RotatingKind {
    G008 = 0,
    EltDt = 1,
    Rls = 2,
    Cancel = 3,
}

/// 48-bit rotating section of the information field. The wire tag is derived
/// from the variant, never stored alongside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotatingField {
    G008 { time_value: u16, altitude_code: u16 },
    EltDt { time_value: u16, altitude_code: u16 },
    Rls { provider: u8, data: u64 },
    Cancel { deactivation_method: u8 },
}

impl RotatingField {
    pub fn kind(&self) -> RotatingKind {
        match self {
            Self::G008 { .. } => RotatingKind::G008,
            Self::EltDt { .. } => RotatingKind::EltDt,
            Self::Rls { .. } => RotatingKind::Rls,
            Self::Cancel { .. } => RotatingKind::Cancel,
        }
    }
}

/// Operating mode, read once at boot from the mode switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Test,
    Exercise,
}

/// ELT cadence phase. Phase 3 is terminal until `stop_elt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EltPhase {
    Phase1,
    Phase2,
    Phase3,
}

/// ELT cadence bookkeeping. Created on EXERCISE entry and kept for as long
/// as EXERCISE holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EltState {
    pub phase: EltPhase,
    pub tx_count_in_phase: u16,
    pub phase_start_ms: u64,
    pub last_tx_ms: u64,
    pub active: bool,
}

bitflags! {
    /// Non-fatal fault latches surfaced through [`Status`]. A set flag never
    /// stops transmission; availability wins over diagnostics.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FaultFlags: u8 {
        const BCH_SELF_TEST = 1 << 0;
        const PRN_SELF_TEST = 1 << 1;
        const RF_FAULT = 1 << 2;
    }
}

/// RF output power command passed through to the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerLevel {
    Low,
    High,
}

/// Snapshot of the core for the integrator's status/debug surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Status {
    pub transmitting: bool,
    pub mode: Mode,
    pub phase: Option<EltPhase>,
    /// Frames completed since boot.
    pub tx_count: u32,
    pub tx_count_in_phase: u16,
    pub last_tx_ms: u64,
    pub last_hex_id: HexId,
    pub faults: FaultFlags,
}

/// Boot configuration. The fallback fix doubles as the fixed TEST-mode
/// position; the default is the Grenoble reference site used during
/// decoder validation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    pub fallback: GpsFix,
    pub frequency_hz: u32,
    pub power: PowerLevel,
    /// Explicit rotating-field choice. `None` selects G.008 in TEST and
    /// ELT(DT) in EXERCISE.
    pub rotating: Option<RotatingField>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fallback: GpsFix {
                lat_deg: 45.1885,
                lon_deg: 5.7245,
                alt_m: 214.0,
                valid: true,
                datetime: NaiveDateTime::UNIX_EPOCH,
                satellites: 0,
                fix_quality: 0,
            },
            frequency_hz: 406_050_000,
            power: PowerLevel::Low,
            rotating: None,
        }
    }
}
