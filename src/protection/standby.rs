//! Low-power load testing.
//!
//! While idling in low-power mode the output is periodically stopped, the
//! standby timing capacitor is allowed to recharge, and the bridge is brought
//! back to full output for a fixed number of half-cycles to see whether a
//! load has reappeared.

use super::{ProtectionStateMachine, Status};
use crate::board::{Board, Channel};
use crate::bridge::Bridge;
use crate::error::Fault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StandbyOutcome {
    /// Output current reached the load reference during the test.
    pub load_detected: bool,
    /// Capacitor reads taken before it charged past the threshold, in the
    /// last round of the test.
    pub charge_polls: u32,
}

impl ProtectionStateMachine {
    /// Runs load-test rounds until a load shows up or low-power mode is
    /// switched off.
    ///
    /// Any protection trip aborts the test with the fault and clears
    /// [`Status::LOW_POWER_ACTIVE`]; the caller is expected to shut down.
    pub fn standby_test<B: Board>(
        &mut self,
        bridge: &mut Bridge<'_, B>,
        load_reference: u8,
    ) -> Result<StandbyOutcome, Fault> {
        self.status.insert(Status::LOW_POWER_ACTIVE);
        self.standby_rounds(bridge, load_reference)
            .inspect_err(|_| self.status.remove(Status::LOW_POWER_ACTIVE))
    }

    fn standby_rounds<B: Board>(
        &mut self,
        bridge: &mut Bridge<'_, B>,
        load_reference: u8,
    ) -> Result<StandbyOutcome, Fault> {
        loop {
            bridge.board().set_standby_discharge(true);
            self.soft_stop_to_zero(bridge)?;
            bridge.board().stop_modulation();
            bridge.board().set_standby_discharge(false);

            let charge_polls = self.wait_for_charge(bridge)?;
            self.soft_start(bridge)?;
            let load_detected = self.hold_full_output(bridge, load_reference)?;

            let outcome = StandbyOutcome {
                load_detected,
                charge_polls,
            };
            debug!(
                "standby round: load {}, charge polls {}",
                load_detected,
                charge_polls
            );

            if load_detected {
                self.status.remove(Status::LOW_POWER_ACTIVE);
                return Ok(outcome);
            }
            if !bridge.board().low_power_requested() {
                self.set_low_power_mode(false);
                return Ok(outcome);
            }
        }
    }

    fn wait_for_charge<B: Board>(&mut self, bridge: &mut Bridge<'_, B>) -> Result<u32, Fault> {
        let threshold = self.standby.charge_threshold;
        let mut polls = 0u32;
        loop {
            self.require_enable(bridge)?;
            if bridge.read(Channel::StandbyCapacitor) > threshold {
                return Ok(polls);
            }
            polls = polls.saturating_add(1);
            bridge.board().relax();
        }
    }

    /// Holds the maximum amplitude for the test length, returning whether the
    /// output current ever met `load_reference`.
    fn hold_full_output<B: Board>(
        &mut self,
        bridge: &mut Bridge<'_, B>,
        load_reference: u8,
    ) -> Result<bool, Fault> {
        bridge.shared().set_amplitude(self.ramp.maximum);

        let mut load_detected = false;
        for _ in 0..self.standby.test_half_cycles {
            self.require_enable(bridge)?;
            let snapshot = self.check_cycle(bridge)?;
            if snapshot.output_current >= load_reference {
                load_detected = true;
            }
            self.wait_half_cycle(bridge)?;
        }
        Ok(load_detected)
    }
}
