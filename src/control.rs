//! Foreground orchestration: power-up, the per-half-cycle regulation step and
//! the shutdown/restart path.

use crate::board::{Board, Channel, MeasurementSnapshot, TelemetryFrame};
use crate::bridge::Bridge;
use crate::config::InverterConfig;
use crate::error::Fault;
use crate::pid::{Correction, PidController};
use crate::protection::{ProtectionStateMachine, StandbyOutcome, StopOutcome};
use crate::shared::SharedState;

/// What one call to [`ControlLoop::cycle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Normal half-cycle. `amplitude` is the command applied at its start.
    Regulated {
        amplitude: u16,
        correction: Correction,
    },
    /// Low-power mode with no load: the standby test ran to completion.
    StandbyTested(StandbyOutcome),
}

pub struct ControlLoop<'a, B> {
    config: InverterConfig,
    bridge: Bridge<'a, B>,
    pid: PidController,
    protection: ProtectionStateMachine,
    /// Voltage reference sampled at power-up.
    error_reference: u8,
    /// Amplitude computed by the previous cycle, applied at the next one.
    next_amplitude: u16,
    last_snapshot: MeasurementSnapshot,
}

impl<'a, B: Board> ControlLoop<'a, B> {
    pub fn new(config: InverterConfig, board: B, shared: &'a SharedState) -> Self {
        Self {
            bridge: Bridge::new(board, shared),
            pid: PidController::new(config.pid),
            protection: ProtectionStateMachine::new(&config),
            error_reference: 0,
            next_amplitude: config.ramp.maximum,
            last_snapshot: MeasurementSnapshot::default(),
            config,
        }
    }

    pub fn board(&mut self) -> &mut B {
        self.bridge.board()
    }

    pub fn bridge(&mut self) -> &mut Bridge<'a, B> {
        &mut self.bridge
    }

    pub fn protection(&self) -> &ProtectionStateMachine {
        &self.protection
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn error_reference(&self) -> u8 {
        self.error_reference
    }

    pub fn next_amplitude(&self) -> u16 {
        self.next_amplitude
    }

    pub fn last_snapshot(&self) -> &MeasurementSnapshot {
        &self.last_snapshot
    }

    /// Releases the disable latch, samples the voltage reference and
    /// soft-starts the bridge.
    pub fn power_up(&mut self) -> Result<(), Fault> {
        self.bridge.board().set_disable_latch(false);
        self.bridge.reset_latch();

        self.error_reference = self.bridge.read(Channel::BatteryReference);
        self.next_amplitude = self.config.ramp.maximum;
        debug!("power-up, reference {}", self.error_reference);

        self.protection.soft_start(&mut self.bridge)
    }

    /// One regulated half-cycle.
    ///
    /// Applies the amplitude computed last time, samples, computes the next
    /// amplitude, checks protections, handles low-power mode, sends telemetry
    /// and waits for the half-cycle to end.
    pub fn cycle(&mut self) -> Result<CycleOutcome, Fault> {
        let shared = self.bridge.shared();
        let amplitude = shared.set_amplitude(self.next_amplitude);

        let snapshot = self.bridge.sample();
        self.last_snapshot = snapshot;

        let correction = self.pid.evaluate(
            u16::from(self.error_reference),
            u16::from(snapshot.output_voltage),
        );
        self.next_amplitude = correction
            .apply_to(self.config.amplitude_reference)
            .min(shared.amplitude_limit());

        let report = self.protection.evaluate_cycle(&snapshot);
        self.protection.apply_outputs(&mut self.bridge);
        if let Some(fault) = report.fault() {
            self.protection.send_status(&mut self.bridge, &snapshot);
            return Err(fault);
        }

        if self.bridge.board().low_power_requested() {
            self.protection.set_low_power_mode(true);
            let load_reference = self.bridge.read(Channel::LowPowerLoadReference);
            if snapshot.output_current < load_reference {
                self.protection.wait_half_cycle(&mut self.bridge)?;
                let outcome = self
                    .protection
                    .standby_test(&mut self.bridge, load_reference)?;
                self.next_amplitude = self.config.ramp.maximum;
                return Ok(CycleOutcome::StandbyTested(outcome));
            }
        } else {
            self.protection.set_low_power_mode(false);
        }

        let frame = TelemetryFrame::new(&snapshot, self.protection.status());
        self.bridge.board().send_telemetry(&frame);

        self.protection.wait_half_cycle(&mut self.bridge)?;
        Ok(CycleOutcome::Regulated {
            amplitude,
            correction,
        })
    }

    /// Soft-stops the bridge and blocks until it may be restarted.
    pub fn shutdown(&mut self, fault: Fault) -> StopOutcome {
        warn!("shutdown: {:?}", fault);
        let stop = self.protection.soft_stop(&mut self.bridge);
        self.protection.rearm(&mut self.bridge, stop);
        self.next_amplitude = self.config.ramp.maximum;
        stop
    }

    /// Regulates until a fault, shuts down, restarts; forever.
    pub fn run(&mut self) -> ! {
        loop {
            let fault = match self.power_up() {
                Ok(()) => self.run_until_fault(),
                Err(fault) => fault,
            };
            error!("fault: {}", fault);
            self.shutdown(fault);
        }
    }

    fn run_until_fault(&mut self) -> Fault {
        loop {
            if let Err(fault) = self.cycle() {
                return fault;
            }
        }
    }
}
