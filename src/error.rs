//! Crate-wide error taxonomy.
//!
//! Errors here are values to log and recover from; a distress beacon must
//! keep trying, so nothing in the transmit path panics. Init is the only
//! place an error is allowed to halt progress (the integrator then drives
//! the fault indicator).

/// Which power-on self-check mismatched its reference output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelfTestKind {
    BchTestVector,
    PrnTestVector,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeaconError {
    /// An identity field is out of range, or a bit-field access runs past
    /// the end of its buffer.
    Config,
    /// A frame was requested while the modulator is mid-transmission. The
    /// ongoing transmission is never pre-empted; the slot is dropped.
    Busy,
    /// GPS fix absent or flagged invalid; the fallback position is used.
    FixUnavailable,
    /// A power-on self-check failed. Raised as a status flag; transmission
    /// continues regardless.
    SelfTest(SelfTestKind),
    /// Surfaced by the RF driver status callback. The amplifier is shut
    /// down and the next scheduled frame re-attempts.
    RfFault,
}

pub type Result<T> = core::result::Result<T, BeaconError>;
