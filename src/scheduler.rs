//! Transmission cadence: fixed-interval TEST and the three-phase ELT
//! profile used in EXERCISE.
//!
//! Phase 1 and 2 run at exact intervals for fixed frame counts; phase 3 is
//! terminal and dwells a randomized 28.5 s +/- 1.5 s between frames so
//! co-located beacons decorrelate on the channel. Phase advances happen
//! after a completed emission, never at launch; a slot missed because the
//! modulator was busy is dropped and the cadence resumes from now.

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::state::{EltPhase, EltState, Mode};

pub const TEST_INTERVAL_MS: u64 = 10_000;

pub const PHASE1_INTERVAL_MS: u64 = 5_000;
pub const PHASE1_FRAMES: u16 = 24;
pub const PHASE2_INTERVAL_MS: u64 = 10_000;
pub const PHASE2_FRAMES: u16 = 18;
pub const PHASE3_NOMINAL_MS: u64 = 28_500;
pub const PHASE3_JITTER_MS: u64 = 1_500;

pub struct Scheduler {
    mode: Mode,
    elt: Option<EltState>,
    last_tx_ms: u64,
    current_interval_ms: u64,
    tx_total: u32,
    // Dwell decorrelation only; nothing cryptographic rides on this.
    rng: SmallRng,
}

impl Scheduler {
    pub fn new(mode: Mode, seed: u64) -> Self {
        let mut scheduler = Self {
            mode,
            elt: None,
            last_tx_ms: 0,
            current_interval_ms: TEST_INTERVAL_MS,
            tx_total: 0,
            rng: SmallRng::seed_from_u64(seed),
        };
        if mode == Mode::Exercise {
            scheduler.start_elt(0);
        }
        scheduler
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Option<EltPhase> {
        self.elt.as_ref().map(|elt| elt.phase)
    }

    pub fn tx_count_in_phase(&self) -> u16 {
        self.elt.as_ref().map_or(0, |elt| elt.tx_count_in_phase)
    }

    pub fn tx_total(&self) -> u32 {
        self.tx_total
    }

    pub fn last_tx_ms(&self) -> u64 {
        self.last_tx_ms
    }

    pub fn current_interval_ms(&self) -> u64 {
        self.current_interval_ms
    }

    /// Switch mode. Entering EXERCISE (re)starts the ELT sequence; leaving
    /// it discards the ELT state.
    pub fn set_mode(&mut self, mode: Mode, now_ms: u64) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        match mode {
            Mode::Exercise => self.start_elt(now_ms),
            Mode::Test => {
                self.elt = None;
                self.current_interval_ms = TEST_INTERVAL_MS;
            }
        }
    }

    fn start_elt(&mut self, now_ms: u64) {
        self.elt = Some(EltState {
            phase: EltPhase::Phase1,
            tx_count_in_phase: 0,
            phase_start_ms: now_ms,
            last_tx_ms: now_ms,
            active: true,
        });
        self.current_interval_ms = PHASE1_INTERVAL_MS;
    }

    /// Halt the ELT sequence. Phase 3 is otherwise terminal.
    pub fn stop_elt(&mut self) {
        if let Some(elt) = self.elt.as_mut() {
            elt.active = false;
        }
    }

    /// A frame is due iff the modulator is free and the current interval has
    /// elapsed since the last launch.
    pub fn should_transmit(&self, now_ms: u64, transmitting: bool) -> bool {
        if transmitting {
            return false;
        }
        if self.mode == Mode::Exercise && !self.elt.map_or(false, |elt| elt.active) {
            return false;
        }
        now_ms.wrapping_sub(self.last_tx_ms) >= self.current_interval_ms
    }

    /// Pin the cadence to the slot actually used. Called at frame launch.
    pub fn record_launch(&mut self, now_ms: u64) {
        self.last_tx_ms = now_ms;
        if let Some(elt) = self.elt.as_mut() {
            elt.last_tx_ms = now_ms;
        }
    }

    /// Advance counters and phase after the chip path reports a completed
    /// emission.
    pub fn record_completion(&mut self, now_ms: u64) {
        self.tx_total = self.tx_total.saturating_add(1);
        if self.mode != Mode::Exercise {
            return;
        }
        let Some(elt) = self.elt.as_mut() else {
            return;
        };
        elt.tx_count_in_phase += 1;
        match elt.phase {
            EltPhase::Phase1 if elt.tx_count_in_phase >= PHASE1_FRAMES => {
                elt.phase = EltPhase::Phase2;
                elt.tx_count_in_phase = 0;
                elt.phase_start_ms = now_ms;
                self.current_interval_ms = PHASE2_INTERVAL_MS;
            }
            EltPhase::Phase2 if elt.tx_count_in_phase >= PHASE2_FRAMES => {
                elt.phase = EltPhase::Phase3;
                elt.tx_count_in_phase = 0;
                elt.phase_start_ms = now_ms;
                self.current_interval_ms = self
                    .rng
                    .gen_range(PHASE3_NOMINAL_MS - PHASE3_JITTER_MS..=PHASE3_NOMINAL_MS + PHASE3_JITTER_MS);
            }
            EltPhase::Phase3 => {
                self.current_interval_ms = self
                    .rng
                    .gen_range(PHASE3_NOMINAL_MS - PHASE3_JITTER_MS..=PHASE3_NOMINAL_MS + PHASE3_JITTER_MS);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_frame(scheduler: &mut Scheduler, now_ms: &mut u64) {
        *now_ms += scheduler.current_interval_ms();
        assert!(scheduler.should_transmit(*now_ms, false));
        scheduler.record_launch(*now_ms);
        // Airtime is ~2 s; completion is drained on a later millis tick.
        scheduler.record_completion(*now_ms + 2_000);
    }

    #[test]
    fn test_mode_uses_fixed_ten_second_interval() {
        let mut scheduler = Scheduler::new(Mode::Test, 1);
        assert!(!scheduler.should_transmit(9_999, false));
        assert!(scheduler.should_transmit(10_000, false));
        assert!(!scheduler.should_transmit(10_000, true), "modulator busy");
        scheduler.record_launch(10_000);
        scheduler.record_completion(12_000);
        assert_eq!(scheduler.phase(), None);
        assert_eq!(scheduler.tx_total(), 1);
        assert!(!scheduler.should_transmit(19_999, false));
        assert!(scheduler.should_transmit(20_000, false));
    }

    #[test]
    fn elt_phase_rollover() {
        let mut scheduler = Scheduler::new(Mode::Exercise, 7);
        assert_eq!(scheduler.phase(), Some(EltPhase::Phase1));
        assert_eq!(scheduler.current_interval_ms(), PHASE1_INTERVAL_MS);

        let mut now = 0u64;
        for n in 1..=PHASE1_FRAMES {
            assert_eq!(scheduler.phase(), Some(EltPhase::Phase1), "frame {n}");
            complete_frame(&mut scheduler, &mut now);
        }
        // Phase 2 entered immediately after the 24th frame.
        assert_eq!(scheduler.phase(), Some(EltPhase::Phase2));
        assert_eq!(scheduler.current_interval_ms(), PHASE2_INTERVAL_MS);
        assert_eq!(scheduler.tx_count_in_phase(), 0);

        for _ in 0..PHASE2_FRAMES {
            complete_frame(&mut scheduler, &mut now);
        }
        assert_eq!(scheduler.phase(), Some(EltPhase::Phase3));
        assert_eq!(scheduler.tx_total(), (PHASE1_FRAMES + PHASE2_FRAMES) as u32);
    }

    #[test]
    fn phase3_dwell_is_randomized_within_bounds() {
        let mut scheduler = Scheduler::new(Mode::Exercise, 42);
        let mut now = 0u64;
        for _ in 0..(PHASE1_FRAMES + PHASE2_FRAMES) {
            complete_frame(&mut scheduler, &mut now);
        }
        assert_eq!(scheduler.phase(), Some(EltPhase::Phase3));

        let mut seen_distinct = false;
        let mut previous = None;
        for _ in 0..200 {
            let dwell = scheduler.current_interval_ms();
            assert!((27_000..=30_000).contains(&dwell), "dwell {dwell}");
            if previous.is_some() && previous != Some(dwell) {
                seen_distinct = true;
            }
            previous = Some(dwell);
            complete_frame(&mut scheduler, &mut now);
            // Phase 3 is terminal.
            assert_eq!(scheduler.phase(), Some(EltPhase::Phase3));
        }
        assert!(seen_distinct, "dwell never varied over 200 frames");
    }

    #[test]
    fn stop_elt_halts_the_sequence() {
        let mut scheduler = Scheduler::new(Mode::Exercise, 3);
        assert!(scheduler.should_transmit(PHASE1_INTERVAL_MS, false));
        scheduler.stop_elt();
        assert!(!scheduler.should_transmit(u64::MAX / 2, false));
    }

    #[test]
    fn mode_switch_rebuilds_elt_state() {
        let mut scheduler = Scheduler::new(Mode::Test, 9);
        assert_eq!(scheduler.phase(), None);
        scheduler.set_mode(Mode::Exercise, 30_000);
        assert_eq!(scheduler.phase(), Some(EltPhase::Phase1));
        assert_eq!(scheduler.current_interval_ms(), PHASE1_INTERVAL_MS);
        scheduler.set_mode(Mode::Test, 60_000);
        assert_eq!(scheduler.phase(), None);
        assert_eq!(scheduler.current_interval_ms(), TEST_INTERVAL_MS);
    }

    #[test]
    fn missed_slots_resume_from_launch_time() {
        let mut scheduler = Scheduler::new(Mode::Test, 5);
        // Slot at 10 s is missed (busy until 14 s); the launch at 14 s pins
        // the next slot to 24 s, not 20 s.
        assert!(scheduler.should_transmit(14_000, false));
        scheduler.record_launch(14_000);
        assert!(!scheduler.should_transmit(23_999, false));
        assert!(scheduler.should_transmit(24_000, false));
    }
}
