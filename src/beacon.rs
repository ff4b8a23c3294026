//! Public façade: owns the protocol stack end to end.
//!
//! One `Beacon` aggregate replaces the previous generation's file-scope
//! globals. The integrator wires two ISRs to it - the 1 ms system tick
//! (which owns the monotonic `now_ms` counter) calls [`Beacon::on_millis_tick`]
//! from the main loop, and the 38.400 kHz chip clock calls
//! [`Beacon::on_chip_tick`]. Cross-context state is confined to the
//! modulator's single-writer atomics; everything else mutates in the main
//! loop only.

use log::{debug, info, warn};

use crate::{
    bch,
    drivers::{GpsSource, ModeInput, RfDriver},
    error::{BeaconError, Result, SelfTestKind},
    frame::{self, HexId},
    modulator::Modulator,
    prn,
    scheduler::Scheduler,
    state::{BeaconIdentity, Config, FaultFlags, GpsFix, Mode, RotatingField, Status},
};

pub struct Beacon<R: RfDriver, G: GpsSource> {
    identity: BeaconIdentity,
    config: Config,
    rf: R,
    gps: G,
    scheduler: Scheduler,
    modulator: Modulator,
    faults: FaultFlags,
    last_hex_id: HexId,
}

impl<R: RfDriver, G: GpsSource> Beacon<R, G> {
    /// Validate the identity, run the power-on self-checks and program the
    /// RF front end. Identity violations fail init (the integrator then
    /// drives the fault indicator); self-check mismatches only raise status
    /// flags - availability beats diagnostics.
    pub fn new(
        identity: BeaconIdentity,
        config: Config,
        mut rf: R,
        gps: G,
        mode_input: &mut impl ModeInput,
    ) -> Result<Self> {
        let mode = mode_input.read();
        identity.validate(mode)?;

        let mut faults = FaultFlags::empty();
        if !bch::self_test() {
            warn!(
                "self-test failed: {:?}; continuing",
                BeaconError::SelfTest(SelfTestKind::BchTestVector)
            );
            faults |= FaultFlags::BCH_SELF_TEST;
        }
        if !prn::self_test() {
            warn!(
                "self-test failed: {:?}; continuing",
                BeaconError::SelfTest(SelfTestKind::PrnTestVector)
            );
            faults |= FaultFlags::PRN_SELF_TEST;
        }

        rf.set_frequency_hz(config.frequency_hz);
        rf.set_power(config.power);
        rf.enable_amplifier(false);
        rf.apply_iq_calibration();

        // Per-unit dwell decorrelation seed; any stable identity mix works.
        let seed = identity.vessel_id
            ^ (u64::from(identity.serial) << 47)
            ^ (u64::from(identity.tac) << 32);

        info!(
            "beacon init: mode {:?}, 23-HEX {}",
            mode,
            frame::hex_id_from_identity(&identity).as_str()
        );

        Ok(Self {
            last_hex_id: frame::hex_id_from_identity(&identity),
            identity,
            config,
            rf,
            gps,
            scheduler: Scheduler::new(mode, seed),
            modulator: Modulator::new(),
            faults,
        })
    }

    /// Explicit mode change; the boot switch is only read once.
    pub fn set_mode(&mut self, mode: Mode, now_ms: u64) -> Result<()> {
        self.identity.validate(mode)?;
        self.scheduler.set_mode(mode, now_ms);
        Ok(())
    }

    /// Halt the terminal ELT phase.
    pub fn stop_elt(&mut self) {
        self.scheduler.stop_elt();
    }

    /// Main-loop entry, driven from the 1 ms system tick: drain the
    /// completion flag, then launch a frame if one is due. Run-to-completion,
    /// bounded by one frame assembly.
    pub fn on_millis_tick(&mut self, now_ms: u64) {
        if self.modulator.take_complete() {
            self.scheduler.record_completion(now_ms);
        }
        if self
            .scheduler
            .should_transmit(now_ms, self.modulator.is_transmitting())
        {
            match self.launch_frame(now_ms) {
                Ok(()) => {}
                // Lost the race against an in-flight frame; the slot is
                // dropped and the cadence retries from the next tick.
                Err(BeaconError::Busy) => {}
                Err(e) => warn!("frame launch failed: {e:?}"),
            }
        }
    }

    /// Chip-clock ISR entry. Bounded-time, allocation-free, silent while
    /// idle.
    #[inline]
    pub fn on_chip_tick(&mut self) {
        self.modulator.on_chip_tick(&mut self.rf);
    }

    /// Driver status callback: kill the amplifier, latch the fault, let the
    /// next scheduled frame re-attempt.
    pub fn on_rf_fault(&mut self) {
        warn!("RF fault reported; amplifier off until next slot");
        self.modulator.stop();
        self.rf.enable_amplifier(false);
        self.faults |= FaultFlags::RF_FAULT;
    }

    /// Abort any in-flight transmission at the next chip boundary.
    pub fn stop(&mut self) {
        self.modulator.stop();
    }

    #[cfg(test)]
    pub(crate) fn rf(&self) -> &R {
        &self.rf
    }

    pub fn status(&self) -> Status {
        Status {
            transmitting: self.modulator.is_transmitting(),
            mode: self.scheduler.mode(),
            phase: self.scheduler.phase(),
            tx_count: self.scheduler.tx_total(),
            tx_count_in_phase: self.scheduler.tx_count_in_phase(),
            last_tx_ms: self.scheduler.last_tx_ms(),
            last_hex_id: self.last_hex_id,
            faults: self.faults,
        }
    }

    /// Fix for this frame. TEST always transmits the fixed reference
    /// position; EXERCISE uses the live fix and falls back when it is
    /// missing or invalid.
    fn frame_fix(&mut self) -> GpsFix {
        if self.scheduler.mode() == Mode::Test {
            return self.config.fallback;
        }
        match self.gps.current_fix() {
            Some(fix) if fix.valid => fix,
            _ => {
                debug!(
                    "{:?}: using fallback position",
                    BeaconError::FixUnavailable
                );
                self.config.fallback
            }
        }
    }

    fn launch_frame(&mut self, now_ms: u64) -> Result<()> {
        let fix = self.frame_fix();
        let choice = self.config.rotating.unwrap_or(match self.scheduler.mode() {
            Mode::Test => RotatingField::G008 { time_value: 0, altitude_code: 0 },
            Mode::Exercise => RotatingField::EltDt { time_value: 0, altitude_code: 0 },
        });
        let rotating = frame::refresh_rotating(&choice, &fix);
        let info = frame::build_info(&self.identity, &fix, &rotating)?;
        let hex_id = frame::hex_id_from_info(&info)?;
        let frame_buf = frame::build_frame(&info, self.scheduler.mode())?;

        // Publish-last: the frame buffer is complete before the modulator
        // raises `transmitting` for the chip ISR.
        self.modulator.start(&frame_buf, &mut self.rf)?;
        self.scheduler.record_launch(now_ms);
        self.last_hex_id = hex_id;
        info!(
            "frame launched at {} ms, 23-HEX {}, rotating {:?}",
            now_ms,
            hex_id.as_str(),
            rotating.kind()
        );
        Ok(())
    }
}
