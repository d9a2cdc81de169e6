//! Interfaces to the hardware around the control core.
//!
//! The core never touches registers directly. A board support crate
//! implements [`AnalogInput`], [`TelemetryLink`] and [`DigitalLines`] and gets
//! [`Board`] for free.

use serde::{Deserialize, Serialize};

use crate::protection::Status;

/// Analog inputs sampled by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    OutputVoltage,
    OutputCurrent,
    HeatsinkTemperature,
    /// Reference the output voltage is regulated against.
    BatteryReference,
    TransformerTemperature,
    /// Minimum current that counts as a load in low-power mode.
    LowPowerLoadReference,
    /// Timing capacitor of the standby load test.
    StandbyCapacitor,
}

impl Channel {
    /// ADC input number on the reference board.
    pub const fn number(self) -> u8 {
        match self {
            Channel::OutputVoltage => 0,
            Channel::OutputCurrent => 1,
            Channel::HeatsinkTemperature => 2,
            Channel::BatteryReference => 3,
            Channel::TransformerTemperature => 4,
            Channel::LowPowerLoadReference => 8,
            Channel::StandbyCapacitor => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Indicator {
    Overcurrent,
    HeatsinkAlarm,
    TransformerAlarm,
}

pub trait AnalogInput {
    /// Blocking conversion of one channel, returning the top 8 bits.
    fn read_channel(&mut self, channel: Channel) -> u8;
}

pub trait TelemetryLink {
    /// Blocking transmission of one frame. No acknowledgement, no retry.
    fn send_telemetry(&mut self, frame: &TelemetryFrame);
}

pub trait DigitalLines {
    /// Bridge enable line. Low when the disable latch is set or an external
    /// protection has fired.
    fn enable_sensed(&mut self) -> bool;

    /// Drives the hardware disable latch.
    fn set_disable_latch(&mut self, active: bool);

    /// Drives the latch reset request. The enable line rises once the reset
    /// has taken effect.
    fn set_latch_reset(&mut self, active: bool);

    /// Operator reset pulse, required before restarting after an overcurrent.
    fn reset_confirmed(&mut self) -> bool;

    fn battery_present(&mut self) -> bool;

    /// Operator request for low-power (standby) operation.
    fn low_power_requested(&mut self) -> bool;

    fn set_fan(&mut self, on: bool);

    fn set_buzzer(&mut self, on: bool);

    fn set_indicator(&mut self, indicator: Indicator, on: bool);

    /// Holds the standby timing capacitor discharged while active.
    fn set_standby_discharge(&mut self, active: bool);

    /// Starts the periodic modulation tick.
    fn start_modulation(&mut self);

    /// Stops the periodic modulation tick.
    fn stop_modulation(&mut self);

    /// Called on every iteration of a busy wait.
    fn relax(&mut self) {
        core::hint::spin_loop();
    }
}

pub trait Board: AnalogInput + TelemetryLink + DigitalLines {}

impl<T: AnalogInput + TelemetryLink + DigitalLines> Board for T {}

/// Measurements taken once per half-cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MeasurementSnapshot {
    pub output_voltage: u8,
    pub output_current: u8,
    pub heatsink_temperature: u8,
    pub transformer_temperature: u8,
    pub battery_present: bool,
    pub enable: bool,
}

/// Status frame sent over the serial link.
///
/// Encodes to exactly five bytes, in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryFrame {
    pub output_voltage: u8,
    pub output_current: u8,
    pub heatsink_temperature: u8,
    pub transformer_temperature: u8,
    pub status: u8,
}

impl TelemetryFrame {
    pub const ENCODED_LEN: usize = 5;

    pub fn new(snapshot: &MeasurementSnapshot, status: Status) -> Self {
        Self {
            output_voltage: snapshot.output_voltage,
            output_current: snapshot.output_current,
            heatsink_temperature: snapshot.heatsink_temperature,
            transformer_temperature: snapshot.transformer_temperature,
            status: status.bits(),
        }
    }

    pub fn encode<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], postcard::Error> {
        postcard::to_slice(self, buffer)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    pub fn status(&self) -> Status {
        Status::from_bits(self.status)
    }
}
