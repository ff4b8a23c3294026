//! Transmit core for second-generation COSPAS-SARSAT 406 MHz distress
//! beacons (C/S T.018).
//!
//! Given a beacon identity, a (possibly invalid) GNSS fix and an operating
//! mode, this crate periodically assembles and spreads a 250-bit coded
//! frame for the 406 MHz downlink: 202-bit information field, BCH(250,202)
//! parity, dual-LFSR DSSS spreading at 256 chips per bit and OQPSK chip
//! scheduling at 38.400 kchips/s.
//!
//! [C/S T.018](https://www.cospas-sarsat.int/en/documents-pro/system-documents)
//! is the governing document; bit numbering in the module docs follows its
//! Appendix E tables.
//!
//! Hardware stays on the other side of three small traits: an I/Q front end
//! ([`RfDriver`]), a GNSS snapshot source ([`GpsSource`]) and the boot mode
//! switch ([`ModeInput`]). The integrator owns the two clock ISRs and the
//! monotonic millisecond counter, and calls [`Beacon::on_millis_tick`] /
//! [`Beacon::on_chip_tick`]; see the `beacon` module docs for the
//! concurrency contract.

#![cfg_attr(not(test), no_std)]

pub mod bch;
pub mod beacon;
pub mod bits;
pub mod drivers;
pub mod error;
pub mod frame;
pub mod modulator;
pub mod prn;
pub mod scheduler;
pub mod state;

cfg_if::cfg_if! {
    if #[cfg(test)] {
        pub mod test_utils;
    }
}

pub use beacon::Beacon;
pub use drivers::{GpsSource, ModeInput, RfDriver};
pub use error::{BeaconError, Result, SelfTestKind};
pub use frame::{FrameBuffer, HexId, InfoField};
pub use state::{
    BeaconIdentity, Config, EltPhase, EltState, FaultFlags, GpsFix, Mode, PowerLevel,
    RotatingField, RotatingKind, Status,
};
