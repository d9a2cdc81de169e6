//! Foreground access to the board and the shared modulation state.
//!
//! All waits here are busy loops that call
//! [`relax`](crate::board::DigitalLines::relax) on every iteration. None of
//! them has a timeout: a handshake line that never changes blocks forever, as
//! there is no watchdog in this core. The only wait that can be interrupted
//! is [`Bridge::wait_half_cycle`], which gives up when the bridge enable line
//! drops.

use crate::board::{Board, Channel, MeasurementSnapshot};
use crate::error::Fault;
use crate::shared::SharedState;

pub struct Bridge<'a, B> {
    board: B,
    shared: &'a SharedState,
}

impl<'a, B: Board> Bridge<'a, B> {
    pub fn new(board: B, shared: &'a SharedState) -> Self {
        Self { board, shared }
    }

    pub fn board(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn shared(&self) -> &'a SharedState {
        self.shared
    }

    pub fn into_board(self) -> B {
        self.board
    }

    pub fn read(&mut self, channel: Channel) -> u8 {
        self.board.read_channel(channel)
    }

    /// Samples every input the protections and the regulator need.
    pub fn sample(&mut self) -> MeasurementSnapshot {
        MeasurementSnapshot {
            output_voltage: self.board.read_channel(Channel::OutputVoltage),
            output_current: self.board.read_channel(Channel::OutputCurrent),
            heatsink_temperature: self.board.read_channel(Channel::HeatsinkTemperature),
            transformer_temperature: self.board.read_channel(Channel::TransformerTemperature),
            battery_present: self.board.battery_present(),
            enable: self.board.enable_sensed(),
        }
    }

    /// Blocks until the modulation tick completes the current half-cycle.
    ///
    /// Returns [`Fault::HardwareDisable`] as soon as the enable line drops.
    pub fn wait_half_cycle(&mut self) -> Result<(), Fault> {
        let start = self.shared.phase().half_cycles;
        loop {
            if !self.board.enable_sensed() {
                return Err(Fault::HardwareDisable);
            }
            if self.shared.phase().half_cycles != start {
                return Ok(());
            }
            self.board.relax();
        }
    }

    /// Blocks until `done` returns true. Not cancellable.
    pub fn wait_until(&mut self, mut done: impl FnMut(&mut B) -> bool) {
        while !done(&mut self.board) {
            self.board.relax();
        }
    }

    /// Pulses the latch reset and waits for the enable line to confirm it.
    pub fn reset_latch(&mut self) {
        self.board.set_latch_reset(true);
        self.wait_until(|board| board.enable_sensed());
        self.board.set_latch_reset(false);
    }

    /// Trips the disable latch, waits for the enable line to drop, then
    /// releases the latch input. The latch itself holds the bridge off until
    /// [`Bridge::reset_latch`].
    pub fn hard_disable(&mut self) {
        self.board.set_disable_latch(true);
        self.wait_until(|board| !board.enable_sensed());
        self.board.set_disable_latch(false);
        self.board.stop_modulation();
        self.shared.set_amplitude(0);
    }
}
