//! Mock collaborators and fixture builders shared by the test modules.

use chrono::NaiveDateTime;

use crate::{
    drivers::{GpsSource, ModeInput, RfDriver},
    state::{BeaconIdentity, GpsFix, Mode, PowerLevel},
};

/// Recording RF front end.
#[derive(Default)]
pub struct MockRf {
    pub chips: Vec<(i8, i8)>,
    pub amplifier_on: bool,
    pub amplifier_transitions: Vec<bool>,
    pub power: Option<PowerLevel>,
    pub frequency_hz: Option<u32>,
    pub calibrated: bool,
}

impl RfDriver for MockRf {
    fn emit_chip(&mut self, i: i8, q: i8) {
        self.chips.push((i, q));
    }

    fn set_power(&mut self, level: PowerLevel) {
        self.power = Some(level);
    }

    fn enable_amplifier(&mut self, on: bool) {
        self.amplifier_on = on;
        self.amplifier_transitions.push(on);
    }

    fn set_frequency_hz(&mut self, hz: u32) {
        self.frequency_hz = Some(hz);
    }

    fn apply_iq_calibration(&mut self) {
        self.calibrated = true;
    }
}

/// GNSS source returning a scripted snapshot.
#[derive(Default)]
pub struct ScriptedGps {
    pub fix: Option<GpsFix>,
}

impl GpsSource for ScriptedGps {
    fn current_fix(&mut self) -> Option<GpsFix> {
        self.fix
    }
}

/// Mode switch pinned to one position.
pub struct FixedMode(pub Mode);

impl ModeInput for FixedMode {
    fn read(&mut self) -> Mode {
        self.0
    }
}

/// Certification test identity (TAC 9999).
pub fn test_identity() -> BeaconIdentity {
    BeaconIdentity {
        tac: 9_999,
        serial: 1,
        country: 228,
        protocol_code: 2,
        beacon_type: 1,
        vessel_id: 0x1234_5678_9ABC,
    }
}

/// Operational identity for EXERCISE runs.
pub fn exercise_identity() -> BeaconIdentity {
    BeaconIdentity {
        tac: 10_042,
        ..test_identity()
    }
}

/// The Grenoble reference site used by the default fallback configuration.
pub fn grenoble_fix() -> GpsFix {
    GpsFix {
        lat_deg: 45.1885,
        lon_deg: 5.7245,
        alt_m: 214.0,
        valid: true,
        datetime: NaiveDateTime::UNIX_EPOCH,
        satellites: 0,
        fix_quality: 0,
    }
}

/// A valid live fix distinct from the fallback.
pub fn live_fix() -> GpsFix {
    GpsFix {
        lat_deg: -33.8568,
        lon_deg: 151.2153,
        alt_m: 58.0,
        valid: true,
        datetime: chrono::NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(14, 32, 41)
            .unwrap(),
        satellites: 9,
        fix_quality: 1,
    }
}
