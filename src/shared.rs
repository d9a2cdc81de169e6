//! State shared between the modulation tick and the control loop.
//!
//! The amplitude command is written by the control loop and read by the tick;
//! the phase is written by the tick and read by the control loop. Both are
//! wider than a single byte, so every access goes through a critical section
//! that masks the tick for its duration.

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

/// Which leg of the half-bridge is driven during the current half-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Leg {
    #[default]
    A,
    B,
}

impl Leg {
    pub fn other(self) -> Self {
        match self {
            Leg::A => Leg::B,
            Leg::B => Leg::A,
        }
    }
}

/// Position in the sine table plus the active leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Phase {
    pub index: u8,
    pub leg: Leg,
    /// Number of completed half-cycles, wrapping.
    pub half_cycles: u16,
}

pub struct SharedState {
    amplitude: Mutex<Cell<u16>>,
    amplitude_limit: u16,
    phase: Mutex<Cell<Phase>>,
}

impl SharedState {
    pub const fn new(amplitude_limit: u16) -> Self {
        Self {
            amplitude: Mutex::new(Cell::new(0)),
            amplitude_limit,
            phase: Mutex::new(Cell::new(Phase {
                index: 0,
                leg: Leg::A,
                half_cycles: 0,
            })),
        }
    }

    pub fn amplitude_limit(&self) -> u16 {
        self.amplitude_limit
    }

    pub fn amplitude(&self) -> u16 {
        critical_section::with(|cs| self.amplitude.borrow(cs).get())
    }

    /// Stores a new amplitude command, clamped to the amplitude limit.
    pub fn set_amplitude(&self, amplitude: u16) -> u16 {
        let amplitude = amplitude.min(self.amplitude_limit);
        critical_section::with(|cs| self.amplitude.borrow(cs).set(amplitude));
        amplitude
    }

    /// Read-modify-write of the amplitude under a single critical section.
    pub fn update_amplitude(&self, f: impl FnOnce(u16) -> u16) -> u16 {
        critical_section::with(|cs| {
            let cell = self.amplitude.borrow(cs);
            let amplitude = f(cell.get()).min(self.amplitude_limit);
            cell.set(amplitude);
            amplitude
        })
    }

    pub fn phase(&self) -> Phase {
        critical_section::with(|cs| self.phase.borrow(cs).get())
    }

    pub(crate) fn amplitude_in(&self, cs: CriticalSection<'_>) -> u16 {
        self.amplitude.borrow(cs).get()
    }

    pub(crate) fn phase_in(&self, cs: CriticalSection<'_>) -> Phase {
        self.phase.borrow(cs).get()
    }

    pub(crate) fn set_phase_in(&self, cs: CriticalSection<'_>, phase: Phase) {
        self.phase.borrow(cs).set(phase);
    }
}
