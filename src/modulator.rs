//! DSSS spreading and OQPSK chip scheduling.
//!
//! The modulator drives the RF front end one chip pair per tick of the
//! hardware 38.400 kHz chip clock. Each of the 300 air symbols (50 preamble
//! bits, 202 information bits, 48 parity bits) is spread over 256 chips per
//! arm by the PRN generators; the data bit flips the chip polarity. The Q
//! arm is emitted one half chip late, which is what bounds the envelope
//! variation through the amplifier.
//!
//! Everything on the tick path is bounded-time and allocation-free: one
//! buffer bit read, two LFSR steps, one driver call.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::{
    drivers::RfDriver,
    error::{BeaconError, Result},
    frame::FrameBuffer,
    prn::{Lfsr, I_SEED, Q_SEED},
};

pub const CHIP_RATE_HZ: u32 = 38_400;
pub const CHIPS_PER_SYMBOL: u16 = 256;
pub const PREAMBLE_SYMBOLS: u16 = 50;
/// 50 preamble + 202 information + 48 parity.
pub const FRAME_SYMBOLS: u16 = 300;
/// Chip ticks consumed per frame, `start` to idle.
pub const CHIPS_PER_FRAME: u32 = FRAME_SYMBOLS as u32 * CHIPS_PER_SYMBOL as u32;

/// Chip-stream state machine: Idle -> Transmitting -> Idle.
///
/// `transmitting` is the only field the chip-tick ISR observes before
/// touching the rest; `start` writes the frame snapshot and chip state
/// first and publishes last.
pub struct Modulator {
    transmitting: AtomicBool,
    stop_requested: AtomicBool,
    tx_complete: AtomicBool,
    frame: FrameBuffer,
    bit_idx: u16,
    chip_idx: u16,
    lfsr_i: Lfsr,
    lfsr_q: Lfsr,
    prev_q_chip: i8,
}

impl Modulator {
    pub const fn new() -> Self {
        Self {
            transmitting: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            tx_complete: AtomicBool::new(false),
            frame: FrameBuffer::new(),
            bit_idx: 0,
            chip_idx: 0,
            lfsr_i: Lfsr::new(I_SEED),
            lfsr_q: Lfsr::new(Q_SEED),
            prev_q_chip: 0,
        }
    }

    #[inline]
    pub fn is_transmitting(&self) -> bool {
        self.transmitting.load(Ordering::Acquire)
    }

    /// Single-producer completion flag, set by the tick path when the final
    /// half chip goes out; cleared by this read. The main loop drains it
    /// before cadence bookkeeping.
    pub fn take_complete(&self) -> bool {
        self.tx_complete.swap(false, Ordering::Acquire)
    }

    /// Snapshot the frame and begin emission; chip #0 goes out immediately.
    /// Rejected while a transmission is in flight - an ongoing frame is
    /// never pre-empted.
    pub fn start<R: RfDriver>(&mut self, frame: &FrameBuffer, rf: &mut R) -> Result<()> {
        if self.is_transmitting() {
            return Err(BeaconError::Busy);
        }
        self.frame = *frame;
        self.bit_idx = 0;
        self.chip_idx = 0;
        self.lfsr_i = Lfsr::new(I_SEED);
        self.lfsr_q = Lfsr::new(Q_SEED);
        self.prev_q_chip = 0;
        self.stop_requested.store(false, Ordering::Relaxed);
        rf.enable_amplifier(true);
        self.emit_current(rf);
        self.transmitting.store(true, Ordering::Release);
        Ok(())
    }

    /// Called from the 38.4 kHz chip-clock ISR context. Ignored while idle.
    pub fn on_chip_tick<R: RfDriver>(&mut self, rf: &mut R) {
        if !self.is_transmitting() {
            return;
        }
        if self.stop_requested.swap(false, Ordering::Acquire) {
            // The chip already in flight completed on the previous tick;
            // center the outputs and go idle at this boundary.
            rf.emit_chip(0, 0);
            rf.enable_amplifier(false);
            self.transmitting.store(false, Ordering::Release);
            return;
        }
        if self.bit_idx == FRAME_SYMBOLS {
            // Trailing half chip: the delayed Q arm finishes one half-chip
            // after the last I chip.
            rf.emit_chip(0, self.prev_q_chip);
            self.prev_q_chip = 0;
            rf.enable_amplifier(false);
            self.transmitting.store(false, Ordering::Release);
            self.tx_complete.store(true, Ordering::Release);
            return;
        }
        self.emit_current(rf);
    }

    /// Request a stop; honored at the next tick boundary, never mid-chip.
    pub fn stop(&self) {
        if self.is_transmitting() {
            self.stop_requested.store(true, Ordering::Release);
        }
    }

    fn emit_current<R: RfDriver>(&mut self, rf: &mut R) {
        let bit = self.symbol(self.bit_idx);
        let i_raw = if bit { self.lfsr_i.chip() } else { -self.lfsr_i.chip() };
        let q_raw = if bit { self.lfsr_q.chip() } else { -self.lfsr_q.chip() };
        rf.emit_chip(i_raw, self.prev_q_chip);
        self.prev_q_chip = q_raw;
        self.lfsr_i.step();
        self.lfsr_q.step();
        self.chip_idx += 1;
        if self.chip_idx == CHIPS_PER_SYMBOL {
            self.chip_idx = 0;
            self.bit_idx += 1;
        }
    }

    /// Symbol `k` of the 300-bit air stream: alternating preamble starting
    /// with 0, then the frame content past the 2-bit code-selection header
    /// (the header rides in the buffer but is not spread onto the air).
    fn symbol(&self, k: u16) -> bool {
        if k < PREAMBLE_SYMBOLS {
            k & 1 == 1
        } else {
            self.frame.bit(2 + usize::from(k - PREAMBLE_SYMBOLS))
        }
    }
}

impl Default for Modulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameBuffer;
    use crate::test_utils::MockRf;

    fn any_frame() -> FrameBuffer {
        let mut frame = FrameBuffer::new();
        frame.set(0, 2, 0b10).unwrap();
        frame.set(2, 64, 0xDEAD_BEEF_0123_4567).unwrap();
        frame.set(200, 52, 0xA5A5_A5A5_A5A5).unwrap();
        frame
    }

    #[test]
    fn busy_start_is_rejected_without_side_effects() {
        let mut rf = MockRf::default();
        let mut modulator = Modulator::new();
        modulator.start(&any_frame(), &mut rf).unwrap();
        let chips_after_start = rf.chips.len();
        assert_eq!(
            modulator.start(&any_frame(), &mut rf),
            Err(BeaconError::Busy)
        );
        assert_eq!(rf.chips.len(), chips_after_start);
        // First transmission still completes normally.
        for _ in 0..CHIPS_PER_FRAME {
            modulator.on_chip_tick(&mut rf);
        }
        assert!(!modulator.is_transmitting());
        assert!(modulator.take_complete());
    }

    #[test]
    fn frame_consumes_exactly_76800_ticks() {
        let mut rf = MockRf::default();
        let mut modulator = Modulator::new();
        modulator.start(&any_frame(), &mut rf).unwrap();
        for tick in 0..CHIPS_PER_FRAME {
            assert!(
                modulator.is_transmitting(),
                "went idle early at tick {tick}"
            );
            modulator.on_chip_tick(&mut rf);
        }
        assert!(!modulator.is_transmitting());
        // start() emission + (CHIPS_PER_FRAME - 1) data ticks + trailing flush.
        assert_eq!(rf.chips.len(), CHIPS_PER_FRAME as usize + 1);
        assert!(!rf.amplifier_on);
        // Extra ticks while idle are ignored.
        modulator.on_chip_tick(&mut rf);
        assert_eq!(rf.chips.len(), CHIPS_PER_FRAME as usize + 1);
    }

    #[test]
    fn oqpsk_q_lags_by_one_chip() {
        let mut rf = MockRf::default();
        let mut modulator = Modulator::new();
        let frame = any_frame();
        modulator.start(&frame, &mut rf).unwrap();
        for _ in 0..CHIPS_PER_FRAME {
            modulator.on_chip_tick(&mut rf);
        }

        // Reference spreader, one tick ahead on the Q arm.
        let mut lfsr_i = Lfsr::new(I_SEED);
        let mut lfsr_q = Lfsr::new(Q_SEED);
        let mut expected_prev_q: i8 = 0;
        for (tick, &(i, q)) in rf.chips.iter().enumerate() {
            if tick == CHIPS_PER_FRAME as usize {
                assert_eq!((i, q), (0, expected_prev_q), "trailing half chip");
                break;
            }
            let symbol_idx = (tick / CHIPS_PER_SYMBOL as usize) as u16;
            let bit = if symbol_idx < PREAMBLE_SYMBOLS {
                symbol_idx & 1 == 1
            } else {
                frame.bit(2 + usize::from(symbol_idx - PREAMBLE_SYMBOLS))
            };
            let i_raw = if bit { lfsr_i.chip() } else { -lfsr_i.chip() };
            let q_raw = if bit { lfsr_q.chip() } else { -lfsr_q.chip() };
            assert_eq!(i, i_raw, "I chip at tick {tick}");
            assert_eq!(q, expected_prev_q, "Q chip at tick {tick}");
            expected_prev_q = q_raw;
            lfsr_i.step();
            lfsr_q.step();
        }
    }

    #[test]
    fn preamble_alternates_starting_low() {
        let mut rf = MockRf::default();
        let mut modulator = Modulator::new();
        modulator.start(&any_frame(), &mut rf).unwrap();
        // Symbol 0 is a 0 bit: every I chip in the first block is the
        // negated PRN chip.
        let mut lfsr = Lfsr::new(I_SEED);
        for tick in 0..CHIPS_PER_SYMBOL as usize - 1 {
            modulator.on_chip_tick(&mut rf);
            assert_eq!(rf.chips[tick].0, -lfsr.chip());
            lfsr.step();
        }
    }

    #[test]
    fn stop_centers_outputs_at_tick_boundary() {
        let mut rf = MockRf::default();
        let mut modulator = Modulator::new();
        modulator.start(&any_frame(), &mut rf).unwrap();
        for _ in 0..100 {
            modulator.on_chip_tick(&mut rf);
        }
        modulator.stop();
        modulator.on_chip_tick(&mut rf);
        assert!(!modulator.is_transmitting());
        assert_eq!(*rf.chips.last().unwrap(), (0, 0));
        assert!(!rf.amplifier_on);
        // A stop is not a completion.
        assert!(!modulator.take_complete());
    }

    #[test]
    fn stop_while_idle_does_not_poison_next_frame() {
        let mut rf = MockRf::default();
        let mut modulator = Modulator::new();
        modulator.stop();
        modulator.start(&any_frame(), &mut rf).unwrap();
        for _ in 0..CHIPS_PER_FRAME {
            modulator.on_chip_tick(&mut rf);
        }
        assert!(modulator.take_complete());
    }
}
