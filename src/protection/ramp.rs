//! Soft-start, soft-stop and the rearm handshake.

use super::{Pending, ProtectionStateMachine, Status};
use crate::board::Board;
use crate::bridge::Bridge;
use crate::error::Fault;

/// How a blocking soft-stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopOutcome {
    /// Ramped down and confirmed the disable latch.
    Completed,
    /// The enable line dropped mid-ramp; the bridge was already off.
    HardwareTripped,
}

impl ProtectionStateMachine {
    fn ramp_step(&self) -> u16 {
        self.ramp.step.max(1)
    }

    /// Ramps the amplitude from the initial value to the configured maximum,
    /// one step per half-cycle, checking every protection along the way.
    ///
    /// On failure the amplitude is left at its last value and the matching
    /// [`Pending`] bit is set.
    pub fn soft_start<B: Board>(&mut self, bridge: &mut Bridge<'_, B>) -> Result<(), Fault> {
        let shared = bridge.shared();
        let step = self.ramp_step();
        let target = self.ramp.maximum.min(shared.amplitude_limit());

        shared.set_amplitude(self.ramp.initial.min(target));
        bridge.board().start_modulation();

        loop {
            self.require_enable(bridge)?;
            let amplitude = shared.update_amplitude(|a| a.saturating_add(step).min(target));
            self.check_cycle(bridge)?;
            if amplitude >= target {
                info!("soft-start complete at {}", amplitude);
                return Ok(());
            }
            self.wait_half_cycle(bridge)?;
        }
    }

    /// Ramps the amplitude down one step per half-cycle, then trips the
    /// disable latch and waits for the bridge to confirm.
    ///
    /// Turns the buzzer on; [`ProtectionStateMachine::rearm`] turns it off.
    pub fn soft_stop<B: Board>(&mut self, bridge: &mut Bridge<'_, B>) -> StopOutcome {
        let shared = bridge.shared();
        let step = self.ramp_step();
        bridge.board().set_buzzer(true);

        loop {
            if self.require_enable(bridge).is_err() {
                bridge.board().stop_modulation();
                shared.set_amplitude(0);
                return StopOutcome::HardwareTripped;
            }

            let amplitude = shared.amplitude();
            if amplitude <= step {
                bridge.hard_disable();
                info!("soft-stop complete");
                return StopOutcome::Completed;
            }
            shared.set_amplitude(amplitude - step);

            // A dropped enable line is picked up at the top of the loop.
            let _ = self.wait_half_cycle(bridge);
        }
    }

    /// Ramps the amplitude down to zero without touching the disable latch.
    pub fn soft_stop_to_zero<B: Board>(&mut self, bridge: &mut Bridge<'_, B>) -> Result<(), Fault> {
        let shared = bridge.shared();
        let step = self.ramp_step();

        loop {
            self.require_enable(bridge)?;
            let amplitude = shared.amplitude();
            if amplitude <= step {
                shared.set_amplitude(0);
                return Ok(());
            }
            shared.set_amplitude(amplitude - step);
            self.wait_half_cycle(bridge)?;
        }
    }

    /// Blocks until the bridge may be restarted, then resets the disable
    /// latch.
    ///
    /// A hardware trip or an overcurrent shutdown first waits for the
    /// operator reset. Then thermal and battery conditions are polled until
    /// clear, sending a status frame on every poll.
    pub fn rearm<B: Board>(&mut self, bridge: &mut Bridge<'_, B>, stop: StopOutcome) {
        if stop == StopOutcome::HardwareTripped || self.pending.overcurrent() {
            info!("waiting for operator reset after {:?}", stop);
            bridge.wait_until(|board| board.reset_confirmed());
            self.overcurrent.reset();
            self.pending.remove(Pending::OVERCURRENT);
            self.status.remove(Status::OVERCURRENT);
        }

        loop {
            let snapshot = bridge.sample();
            self.check_thermal(
                snapshot.heatsink_temperature,
                snapshot.transformer_temperature,
            );
            self.check_battery(snapshot.battery_present);
            self.apply_outputs(bridge);
            self.send_status(bridge, &snapshot);
            if self.restart_permitted() {
                break;
            }
            bridge.board().relax();
        }

        bridge.board().set_buzzer(false);
        bridge.reset_latch();
        self.pending.remove(Pending::HARDWARE_DISABLE);
        self.status.remove(Status::HARDWARE_DISABLE);
        info!("rearmed");
    }
}
