//! Power-up configuration.
//!
//! All values are volatile and rebuilt from these defaults at every reset.
//! Analog quantities are raw 8-bit ADC counts; amplitudes are in duty units
//! (the same scale [`crate::pwm`] multiplies by the sine table).

/// Soft-start initial amplitude.
pub const DEFAULT_INITIAL_AMPLITUDE: u16 = 0x0064;
/// Amplitude change per half-cycle while ramping up or down.
pub const DEFAULT_RAMP_STEP: u16 = 20;
/// Amplitude at which soft-start completes.
pub const DEFAULT_MAX_AMPLITUDE: u16 = 0x02A3;
/// Amplitude reference the PID correction is applied to.
pub const DEFAULT_AMPLITUDE_REFERENCE: u16 = 0x02A4;

pub const DEFAULT_KP: u8 = 62;
pub const DEFAULT_KI: u8 = 54;
pub const DEFAULT_KD: u8 = 0;
/// Scales the percent error (0..=100) into the 16-bit error word.
pub const DEFAULT_ERROR_GAIN: u8 = 100;
/// Divisor applied to the combined PID terms.
pub const DEFAULT_OUTPUT_DIVISOR: u16 = 0x1F40;
/// Ceiling of the PID output magnitude.
pub const DEFAULT_OUTPUT_LIMIT: u16 = 340;
/// Derivative is resampled every this many evaluations.
pub const DEFAULT_DERIVATIVE_PERIOD: u8 = 1;

/// Ceiling enforced on every write to the shared amplitude command.
pub const DEFAULT_AMPLITUDE_LIMIT: u16 = DEFAULT_AMPLITUDE_REFERENCE + DEFAULT_OUTPUT_LIMIT;

pub const DEFAULT_OVERCURRENT_THRESHOLD: u8 = 242;
pub const DEFAULT_OVERCURRENT_SAMPLES: u8 = 5;

/// Standby capacitor reading that ends the recharge wait.
pub const DEFAULT_STANDBY_CHARGE_THRESHOLD: u8 = 140;
/// Half-cycles of full output while probing for a load.
pub const DEFAULT_STANDBY_TEST_HALF_CYCLES: u8 = 10;

/// Rising and falling thresholds of one thermal channel.
///
/// Readings rise with temperature. Valid thresholds satisfy
/// `fan_off < fan_on` and `trip_clear < trip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermalThresholds {
    /// Above this, the fan is switched on.
    pub fan_on: u8,
    /// Above this, the bridge must shut down.
    pub trip: u8,
    /// A tripped channel drops back to fan-only once below this.
    pub trip_clear: u8,
    /// A fan-only channel returns to normal once below this.
    pub fan_off: u8,
}

impl ThermalThresholds {
    pub const HEATSINK: Self = Self {
        fan_on: 120,
        trip: 210,
        trip_clear: 170,
        fan_off: 80,
    };

    pub const TRANSFORMER: Self = Self {
        fan_on: 60,
        trip: 170,
        trip_clear: 130,
        fan_off: 20,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampConfig {
    pub initial: u16,
    pub step: u16,
    pub maximum: u16,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_AMPLITUDE,
            step: DEFAULT_RAMP_STEP,
            maximum: DEFAULT_MAX_AMPLITUDE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidConfig {
    pub kp: u8,
    pub ki: u8,
    pub kd: u8,
    pub error_gain: u8,
    pub output_divisor: u16,
    pub output_limit: u16,
    pub derivative_period: u8,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: DEFAULT_KP,
            ki: DEFAULT_KI,
            kd: DEFAULT_KD,
            error_gain: DEFAULT_ERROR_GAIN,
            output_divisor: DEFAULT_OUTPUT_DIVISOR,
            output_limit: DEFAULT_OUTPUT_LIMIT,
            derivative_period: DEFAULT_DERIVATIVE_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OvercurrentConfig {
    /// Samples at or above this count as overcurrent.
    pub threshold: u8,
    /// Consecutive overcurrent samples needed to trip.
    pub max_consecutive: u8,
}

impl Default for OvercurrentConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_OVERCURRENT_THRESHOLD,
            max_consecutive: DEFAULT_OVERCURRENT_SAMPLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StandbyConfig {
    pub charge_threshold: u8,
    pub test_half_cycles: u8,
}

impl Default for StandbyConfig {
    fn default() -> Self {
        Self {
            charge_threshold: DEFAULT_STANDBY_CHARGE_THRESHOLD,
            test_half_cycles: DEFAULT_STANDBY_TEST_HALF_CYCLES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InverterConfig {
    pub ramp: RampConfig,
    pub pid: PidConfig,
    pub amplitude_reference: u16,
    pub amplitude_limit: u16,
    pub overcurrent: OvercurrentConfig,
    pub heatsink: ThermalThresholds,
    pub transformer: ThermalThresholds,
    pub standby: StandbyConfig,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            ramp: RampConfig::default(),
            pid: PidConfig::default(),
            amplitude_reference: DEFAULT_AMPLITUDE_REFERENCE,
            amplitude_limit: DEFAULT_AMPLITUDE_LIMIT,
            overcurrent: OvercurrentConfig::default(),
            heatsink: ThermalThresholds::HEATSINK,
            transformer: ThermalThresholds::TRANSFORMER,
            standby: StandbyConfig::default(),
        }
    }
}
