//! Collaborator interfaces the core consumes.
//!
//! The core emits chip pairs and power commands; the integrator's device
//! drivers own DAC codewords, PLL registers, NMEA parsing and pin muxing.
//! The monotonic millisecond counter is likewise the integrator's: a
//! single-writer atomic incremented from the 1 ms tick ISR and handed to
//! [`crate::Beacon::on_millis_tick`] by value.

use crate::state::{GpsFix, Mode, PowerLevel};

/// I/Q front end: dual DAC plus PLL synthesizer behind one seam.
pub trait RfDriver {
    /// One OQPSK chip pair. Values are in {-1, +1}, or 0 for the centered
    /// (carrier-only) codeword at the trailing half chip and on stop.
    fn emit_chip(&mut self, i: i8, q: i8);

    fn set_power(&mut self, level: PowerLevel);

    fn enable_amplifier(&mut self, on: bool);

    fn set_frequency_hz(&mut self, hz: u32);

    /// Opaque I/Q balance correction applied by the driver ahead of DAC
    /// scaling. Default: uncalibrated.
    fn apply_iq_calibration(&mut self) {}
}

/// Validated GNSS fix source. `None` or an invalid snapshot makes the core
/// fall back to its configured position.
pub trait GpsSource {
    fn current_fix(&mut self) -> Option<GpsFix>;
}

/// Mode switch, sampled once at boot.
pub trait ModeInput {
    fn read(&mut self) -> Mode;
}
