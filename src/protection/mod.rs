//! Protection supervision and the amplitude ramps built on it.
//!
//! [`ProtectionStateMachine::evaluate_cycle`] is pure: it turns one
//! measurement snapshot into updated [`Pending`] and [`Status`] registers.
//! The ramps in [`ramp`] and the standby test in [`standby`] drive the board
//! and the shared amplitude through a [`Bridge`](crate::bridge::Bridge).

mod overcurrent;
mod ramp;
mod registers;
mod standby;
mod thermal;

pub use overcurrent::OvercurrentCounter;
pub use ramp::StopOutcome;
pub use registers::{Pending, Status};
pub use standby::StandbyOutcome;
pub use thermal::{ThermalChannel, ThermalState};

use crate::board::{Board, Indicator, MeasurementSnapshot, TelemetryFrame};
use crate::bridge::Bridge;
use crate::config::{InverterConfig, RampConfig, StandbyConfig};
use crate::error::Fault;

/// Registers after one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtectionReport {
    pub pending: Pending,
    pub status: Status,
}

impl ProtectionReport {
    pub fn fault(&self) -> Option<Fault> {
        self.pending.fault()
    }
}

/// Digital outputs that follow the protection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtectionOutputs {
    pub fan: bool,
    pub overcurrent_indicator: bool,
    pub heatsink_indicator: bool,
    pub transformer_indicator: bool,
}

pub struct ProtectionStateMachine {
    pending: Pending,
    status: Status,
    overcurrent: OvercurrentCounter,
    heatsink: ThermalChannel,
    transformer: ThermalChannel,
    ramp: RampConfig,
    standby: StandbyConfig,
}

impl ProtectionStateMachine {
    pub fn new(config: &InverterConfig) -> Self {
        Self {
            pending: Pending::empty(),
            status: Status::empty(),
            overcurrent: OvercurrentCounter::new(config.overcurrent),
            heatsink: ThermalChannel::new(config.heatsink),
            transformer: ThermalChannel::new(config.transformer),
            ramp: config.ramp,
            standby: config.standby,
        }
    }

    pub fn pending(&self) -> Pending {
        self.pending
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn report(&self) -> ProtectionReport {
        ProtectionReport {
            pending: self.pending,
            status: self.status,
        }
    }

    pub fn heatsink(&self) -> &ThermalChannel {
        &self.heatsink
    }

    pub fn transformer(&self) -> &ThermalChannel {
        &self.transformer
    }

    /// Runs every protection check against one snapshot.
    pub fn evaluate_cycle(&mut self, snapshot: &MeasurementSnapshot) -> ProtectionReport {
        self.check_hardware_enable(snapshot.enable);
        self.check_overcurrent(snapshot.output_current);
        self.check_thermal(
            snapshot.heatsink_temperature,
            snapshot.transformer_temperature,
        );
        self.check_battery(snapshot.battery_present);
        self.report()
    }

    pub fn check_hardware_enable(&mut self, enabled: bool) {
        if enabled {
            self.pending.remove(Pending::HARDWARE_DISABLE);
            self.status.remove(Status::HARDWARE_DISABLE);
        } else {
            self.flag_hardware_disable();
        }
    }

    pub fn check_overcurrent(&mut self, current: u8) {
        let was_tripped = self.pending.overcurrent();
        let tripped = self.overcurrent.update(current);
        if tripped && !was_tripped {
            warn!(
                "overcurrent: {} samples at or above threshold, last {}",
                self.overcurrent.consecutive(),
                current
            );
        }
        self.pending.set(Pending::OVERCURRENT, tripped);
        self.status.set(Status::OVERCURRENT, tripped);
    }

    pub fn check_thermal(&mut self, heatsink: u8, transformer: u8) {
        let before = (self.heatsink.state(), self.transformer.state());
        let heatsink_state = self.heatsink.update(heatsink);
        let transformer_state = self.transformer.update(transformer);
        if (heatsink_state, transformer_state) != before {
            info!(
                "thermal: heatsink {:?} ({}), transformer {:?} ({})",
                heatsink_state,
                heatsink,
                transformer_state,
                transformer
            );
        }

        self.pending.set(Pending::HEATSINK_TRIP, heatsink_state.is_tripped());
        self.status.set(Status::HEATSINK_FAN, heatsink_state.is_tripped());
        self.pending.set(Pending::TRANSFORMER_TRIP, transformer_state.is_tripped());
        self.status.set(Status::TRANSFORMER_FAN, transformer_state.is_tripped());
    }

    pub fn check_battery(&mut self, present: bool) {
        if !present && !self.pending.battery_low() {
            warn!("battery low");
        }
        self.pending.set(Pending::BATTERY_LOW, !present);
        self.status.set(Status::BATTERY_LOW, !present);
    }

    /// Whether thermal and battery conditions allow the bridge to restart.
    pub fn restart_permitted(&self) -> bool {
        !self.pending.intersects(
            Pending::HEATSINK_TRIP | Pending::TRANSFORMER_TRIP | Pending::BATTERY_LOW,
        )
    }

    pub fn set_low_power_mode(&mut self, requested: bool) {
        self.status.set(Status::LOW_POWER_MODE, requested);
        if !requested {
            self.status.remove(Status::LOW_POWER_ACTIVE);
        }
    }

    pub fn outputs(&self) -> ProtectionOutputs {
        ProtectionOutputs {
            fan: self.heatsink.state().fan_on() || self.transformer.state().fan_on(),
            overcurrent_indicator: self.status.overcurrent(),
            heatsink_indicator: self.status.heatsink_fan(),
            transformer_indicator: self.status.transformer_fan(),
        }
    }

    /// Drives the fan and fault indicators from the current state.
    pub fn apply_outputs<B: Board>(&self, bridge: &mut Bridge<'_, B>) {
        let outputs = self.outputs();
        let board = bridge.board();
        board.set_fan(outputs.fan);
        board.set_indicator(Indicator::Overcurrent, outputs.overcurrent_indicator);
        board.set_indicator(Indicator::HeatsinkAlarm, outputs.heatsink_indicator);
        board.set_indicator(Indicator::TransformerAlarm, outputs.transformer_indicator);
    }

    /// Sends a telemetry frame carrying the current status register.
    pub fn send_status<B: Board>(
        &self,
        bridge: &mut Bridge<'_, B>,
        snapshot: &MeasurementSnapshot,
    ) {
        let frame = TelemetryFrame::new(snapshot, self.status);
        bridge.board().send_telemetry(&frame);
    }

    /// Samples, evaluates and drives outputs, failing on any pending fault.
    ///
    /// A failing check reports its status over telemetry before returning.
    pub fn check_cycle<B: Board>(
        &mut self,
        bridge: &mut Bridge<'_, B>,
    ) -> Result<MeasurementSnapshot, Fault> {
        let snapshot = bridge.sample();
        let report = self.evaluate_cycle(&snapshot);
        self.apply_outputs(bridge);
        match report.fault() {
            Some(fault) => {
                self.send_status(bridge, &snapshot);
                Err(fault)
            }
            None => Ok(snapshot),
        }
    }

    /// Waits for the next half-cycle, flagging a hardware disable if the
    /// enable line drops meanwhile.
    pub fn wait_half_cycle<B: Board>(&mut self, bridge: &mut Bridge<'_, B>) -> Result<(), Fault> {
        bridge.wait_half_cycle().inspect_err(|_| self.flag_hardware_disable())
    }

    /// Fails with [`Fault::HardwareDisable`] if the enable line is low.
    fn require_enable<B: Board>(&mut self, bridge: &mut Bridge<'_, B>) -> Result<(), Fault> {
        if bridge.board().enable_sensed() {
            self.status.remove(Status::HARDWARE_DISABLE);
            Ok(())
        } else {
            self.flag_hardware_disable();
            Err(Fault::HardwareDisable)
        }
    }

    fn flag_hardware_disable(&mut self) {
        if !self.pending.hardware_disable() {
            warn!("bridge enable line dropped");
        }
        self.pending.insert(Pending::HARDWARE_DISABLE);
        self.status.insert(Status::HARDWARE_DISABLE);
    }
}
