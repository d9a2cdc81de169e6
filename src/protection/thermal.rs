//! Three-tier thermal supervision with hysteresis.

use crate::config::ThermalThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThermalState {
    #[default]
    Normal,
    /// Fan running, bridge still allowed to run.
    PreTrip,
    /// Bridge must shut down.
    Tripped,
}

impl ThermalState {
    pub fn fan_on(self) -> bool {
        self != ThermalState::Normal
    }

    pub fn is_tripped(self) -> bool {
        self == ThermalState::Tripped
    }
}

/// One temperature channel (heatsink or transformer).
///
/// Rising transitions use `fan_on` and `trip`; falling transitions use
/// `trip_clear` and `fan_off`. A reading equal to a threshold never causes a
/// transition.
#[derive(Debug, Clone)]
pub struct ThermalChannel {
    thresholds: ThermalThresholds,
    state: ThermalState,
    reading: u8,
}

impl ThermalChannel {
    pub fn new(thresholds: ThermalThresholds) -> Self {
        Self {
            thresholds,
            state: ThermalState::Normal,
            reading: 0,
        }
    }

    pub fn state(&self) -> ThermalState {
        self.state
    }

    pub fn reading(&self) -> u8 {
        self.reading
    }

    pub fn update(&mut self, reading: u8) -> ThermalState {
        let t = &self.thresholds;
        self.reading = reading;
        self.state = match self.state {
            ThermalState::Normal if reading > t.trip => ThermalState::Tripped,
            ThermalState::Normal if reading > t.fan_on => ThermalState::PreTrip,
            ThermalState::Normal => ThermalState::Normal,

            ThermalState::PreTrip if reading > t.trip => ThermalState::Tripped,
            ThermalState::PreTrip if reading < t.fan_off => ThermalState::Normal,
            ThermalState::PreTrip => ThermalState::PreTrip,

            ThermalState::Tripped if reading < t.fan_off => ThermalState::Normal,
            ThermalState::Tripped if reading < t.trip_clear => ThermalState::PreTrip,
            ThermalState::Tripped => ThermalState::Tripped,
        };
        self.state
    }
}
