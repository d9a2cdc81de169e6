use std::collections::VecDeque;

use inverter_core::board::{
    AnalogInput, Channel, DigitalLines, Indicator, TelemetryFrame, TelemetryLink,
};
use inverter_core::config::{InverterConfig, DEFAULT_AMPLITUDE_LIMIT, DEFAULT_MAX_AMPLITUDE};
use inverter_core::fixed_point::Sign;
use inverter_core::pid::Correction;
use inverter_core::protection::{StandbyOutcome, Status, StopOutcome};
use inverter_core::pwm::WaveformGenerator;
use inverter_core::sine_table::{DEFAULT_TABLE, DEFAULT_TABLE_LEN};
use inverter_core::{ControlLoop, CycleOutcome, Fault, SharedState};

const POLL_LIMIT: u32 = 500_000;

/// Single-threaded board model. Every busy-wait poll stands in for one
/// modulation interrupt while the timer is running.
struct MockBoard<'a> {
    generator: WaveformGenerator<'a, DEFAULT_TABLE_LEN>,
    modulating: bool,
    polls: u32,

    voltage: u8,
    current: u8,
    current_script: VecDeque<u8>,
    current_reads: usize,
    heatsink: u8,
    transformer: u8,
    battery_reference: u8,
    load_reference: u8,
    capacitor: u8,
    discharging: bool,
    discharge_pulses: usize,
    battery: bool,

    latched: bool,
    external_trip: bool,
    operator_reset: bool,
    reset_queries: usize,
    low_power: VecDeque<bool>,
    low_power_default: bool,

    drop_enable_at: Option<u32>,
    reset_at: Option<u32>,
    cool_down_at: Option<u32>,

    fan: bool,
    buzzer: bool,
    overcurrent_indicator: bool,
    wire: Vec<u8>,
    frames: Vec<TelemetryFrame>,
}

impl<'a> MockBoard<'a> {
    fn new(shared: &'a SharedState) -> Self {
        Self {
            generator: WaveformGenerator::new(shared, &DEFAULT_TABLE),
            modulating: false,
            polls: 0,
            voltage: 128,
            current: 0,
            current_script: VecDeque::new(),
            current_reads: 0,
            heatsink: 30,
            transformer: 10,
            battery_reference: 128,
            load_reference: 50,
            capacitor: 0,
            discharging: false,
            discharge_pulses: 0,
            battery: true,
            latched: false,
            external_trip: false,
            operator_reset: false,
            reset_queries: 0,
            low_power: VecDeque::new(),
            low_power_default: false,
            drop_enable_at: None,
            reset_at: None,
            cool_down_at: None,
            fan: false,
            buzzer: false,
            overcurrent_indicator: false,
            wire: Vec::new(),
            frames: Vec::new(),
        }
    }

    fn after(&self, polls: u32) -> Option<u32> {
        Some(self.polls + polls)
    }
}

impl AnalogInput for MockBoard<'_> {
    fn read_channel(&mut self, channel: Channel) -> u8 {
        match channel {
            Channel::OutputVoltage => self.voltage,
            Channel::OutputCurrent => {
                self.current_reads += 1;
                self.current_script.pop_front().unwrap_or(self.current)
            }
            Channel::HeatsinkTemperature => self.heatsink,
            Channel::BatteryReference => self.battery_reference,
            Channel::TransformerTemperature => self.transformer,
            Channel::LowPowerLoadReference => self.load_reference,
            Channel::StandbyCapacitor => self.capacitor,
        }
    }
}

impl TelemetryLink for MockBoard<'_> {
    fn send_telemetry(&mut self, frame: &TelemetryFrame) {
        let mut buffer = [0; 8];
        let bytes = frame.encode(&mut buffer).expect("frame fits");
        self.wire.extend_from_slice(bytes);
        self.frames.push(*frame);
    }
}

impl DigitalLines for MockBoard<'_> {
    fn enable_sensed(&mut self) -> bool {
        !self.latched && !self.external_trip
    }

    fn set_disable_latch(&mut self, active: bool) {
        if active {
            self.latched = true;
        }
    }

    fn set_latch_reset(&mut self, active: bool) {
        if active {
            self.latched = false;
            self.external_trip = false;
        }
    }

    fn reset_confirmed(&mut self) -> bool {
        self.reset_queries += 1;
        self.operator_reset
    }

    fn battery_present(&mut self) -> bool {
        self.battery
    }

    fn low_power_requested(&mut self) -> bool {
        self.low_power.pop_front().unwrap_or(self.low_power_default)
    }

    fn set_fan(&mut self, on: bool) {
        self.fan = on;
    }

    fn set_buzzer(&mut self, on: bool) {
        self.buzzer = on;
    }

    fn set_indicator(&mut self, indicator: Indicator, on: bool) {
        if indicator == Indicator::Overcurrent {
            self.overcurrent_indicator = on;
        }
    }

    fn set_standby_discharge(&mut self, active: bool) {
        if active && !self.discharging {
            self.discharge_pulses += 1;
        }
        self.discharging = active;
        if active {
            self.capacitor = 0;
        }
    }

    fn start_modulation(&mut self) {
        self.modulating = true;
    }

    fn stop_modulation(&mut self) {
        self.modulating = false;
    }

    fn relax(&mut self) {
        self.polls += 1;
        assert!(self.polls < POLL_LIMIT, "busy wait never finished");

        if self.drop_enable_at.is_some_and(|at| self.polls >= at) {
            self.drop_enable_at = None;
            self.external_trip = true;
        }
        if self.reset_at.is_some_and(|at| self.polls >= at) {
            self.operator_reset = true;
        }
        if self.cool_down_at.is_some_and(|at| self.polls >= at) {
            self.heatsink = 30;
        }
        if !self.discharging {
            self.capacitor = self.capacitor.saturating_add(1);
        }

        if self.modulating {
            let tick = self.generator.on_tick();
            assert!(
                tick.duty.leg_a.is_zero() || tick.duty.leg_b.is_zero(),
                "both legs driven"
            );
        }
    }
}

fn control(shared: &SharedState) -> ControlLoop<'_, MockBoard<'_>> {
    ControlLoop::new(InverterConfig::default(), MockBoard::new(shared), shared)
}

#[track_caller]
fn assert_regulated(outcome: Result<CycleOutcome, Fault>) -> (u16, Correction) {
    match outcome {
        Ok(CycleOutcome::Regulated {
            amplitude,
            correction,
        }) => (amplitude, correction),
        other => panic!("expected a regulated cycle, got {other:?}"),
    }
}

#[test]
fn soft_start_reaches_maximum() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);

    assert_eq!(control.power_up(), Ok(()));
    assert_eq!(shared.amplitude(), DEFAULT_MAX_AMPLITUDE);
    // ceil((0x02A3 - 100) / 20) ramp steps, one sample each
    assert_eq!(control.board().current_reads, 29);
    assert!(control.board().modulating);
    assert!(control.protection().pending().is_empty());
}

#[test]
fn soft_start_aborts_on_overcurrent() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().current_script = [0, 0, 0, 0, 0, 250, 250, 250, 250, 250].into();

    assert_eq!(control.power_up(), Err(Fault::Overcurrent));
    assert_eq!(control.board().current_reads, 10);
    assert_eq!(shared.amplitude(), 100 + 10 * 20);
    assert!(control.protection().pending().overcurrent());
    assert!(control.protection().status().overcurrent());
    assert!(control.board().overcurrent_indicator);
}

#[test]
fn soft_start_aborts_on_enable_drop() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().drop_enable_at = Some(500);

    assert_eq!(control.power_up(), Err(Fault::HardwareDisable));
    assert!(control.protection().pending().hardware_disable());
    assert!(shared.amplitude() < DEFAULT_MAX_AMPLITUDE);
}

#[test]
fn regulated_cycles_apply_previous_correction() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().battery_reference = 200;
    control.board().voltage = 100;
    control.power_up().unwrap();
    assert_eq!(control.error_reference(), 200);

    let (amplitude, correction) = assert_regulated(control.cycle());
    assert_eq!(amplitude, DEFAULT_MAX_AMPLITUDE);
    assert_eq!(correction, Correction::new(145, Sign::Positive));
    assert_eq!(control.next_amplitude(), 0x02A4 + 145);

    let (amplitude, correction) = assert_regulated(control.cycle());
    assert_eq!(amplitude, 0x02A4 + 145);
    assert_eq!(shared.amplitude(), 0x02A4 + 145);
    assert_eq!(correction.magnitude(), 212);

    let board = control.board();
    assert_eq!(board.frames.len(), 2);
    assert_eq!(board.wire.len(), 2 * TelemetryFrame::ENCODED_LEN);
    assert_eq!(&board.wire[..5], &[100, 0, 30, 10, 0]);
}

#[test]
fn measurement_above_reference_lowers_amplitude() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().battery_reference = 100;
    control.board().voltage = 150;
    control.power_up().unwrap();

    let (_, correction) = assert_regulated(control.cycle());
    assert_eq!(correction.sign(), Sign::Negative);
    assert!(control.next_amplitude() < 0x02A4);
}

#[test]
fn overcurrent_shutdown_waits_for_operator_reset() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.power_up().unwrap();

    control.board().current = 250;
    for _ in 1..5 {
        assert_regulated(control.cycle());
    }
    assert_eq!(control.cycle(), Err(Fault::Overcurrent));

    control.board().current = 0;
    let reset_at = control.board().after(5_000);
    control.board().reset_at = reset_at;

    assert_eq!(control.shutdown(Fault::Overcurrent), StopOutcome::Completed);
    let board = control.board();
    assert!(board.polls >= 5_000);
    assert!(board.reset_queries > 1);
    assert!(!board.latched);
    assert!(!board.buzzer);
    assert!(!board.modulating);
    assert_eq!(shared.amplitude(), 0);
    assert!(control.protection().pending().is_empty());
    assert!(!control.protection().status().overcurrent());

    assert_eq!(control.power_up(), Ok(()));
    assert_eq!(shared.amplitude(), DEFAULT_MAX_AMPLITUDE);
}

#[test]
fn thermal_shutdown_rearms_without_reset() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.power_up().unwrap();

    control.board().heatsink = 220;
    assert_eq!(control.cycle(), Err(Fault::HeatsinkOverTemperature));
    assert!(control.protection().status().heatsink_fan());
    assert!(control.board().fan);

    let cool_down_at = control.board().after(8_000);
    control.board().cool_down_at = cool_down_at;

    assert_eq!(
        control.shutdown(Fault::HeatsinkOverTemperature),
        StopOutcome::Completed
    );
    let board = control.board();
    assert_eq!(board.reset_queries, 0);
    assert_eq!(board.heatsink, 30);
    assert!(!board.fan);
    assert!(!board.latched);
    assert!(control.protection().pending().is_empty());
}

#[test]
fn enable_drop_mid_cycle_shuts_down() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.power_up().unwrap();

    let drop_at = control.board().after(10);
    control.board().drop_enable_at = drop_at;
    assert_eq!(control.cycle(), Err(Fault::HardwareDisable));
    assert!(control.protection().status().hardware_disable());

    let reset_at = control.board().after(1_000);
    control.board().reset_at = reset_at;
    assert_eq!(
        control.shutdown(Fault::HardwareDisable),
        StopOutcome::HardwareTripped
    );
    let board = control.board();
    assert!(board.reset_queries > 0);
    assert!(!board.modulating);
    assert!(board.enable_sensed());
    assert!(control.protection().pending().is_empty());
}

#[test]
fn low_power_with_load_reports_mode() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().low_power_default = true;
    control.board().current = 60;
    control.power_up().unwrap();

    assert_regulated(control.cycle());
    let frame = control.board().frames[0];
    assert_eq!(frame.status(), Status::LOW_POWER_MODE);
    assert_eq!(frame.output_current, 60);
}

#[test]
fn standby_exits_when_load_appears() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().low_power_default = true;
    control.board().current = 60;
    control.power_up().unwrap();

    // No load at the cycle sample; the load is back by the time of the test.
    control.board().current_script = [10].into();
    let outcome = control.cycle();
    assert_eq!(
        outcome,
        Ok(CycleOutcome::StandbyTested(StandbyOutcome {
            load_detected: true,
            charge_polls: 141,
        }))
    );

    let status = control.protection().status();
    assert!(status.low_power_mode());
    assert!(!status.low_power_active());
    assert_eq!(control.next_amplitude(), DEFAULT_MAX_AMPLITUDE);
    assert_eq!(shared.amplitude(), DEFAULT_MAX_AMPLITUDE);
    assert_eq!(control.board().discharge_pulses, 1);
    assert!(!control.board().discharging);
    assert!(control.board().modulating);
    // No frame is sent on a standby cycle.
    assert!(control.board().frames.is_empty());
}

#[test]
fn standby_repeats_then_leaves_low_power() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().current = 10;
    control.power_up().unwrap();

    // Requested at the cycle and after the first round, then switched off.
    control.board().low_power = [true, true, false].into();
    let outcome = control.cycle();
    assert_eq!(
        outcome,
        Ok(CycleOutcome::StandbyTested(StandbyOutcome {
            load_detected: false,
            charge_polls: 141,
        }))
    );
    assert_eq!(control.board().discharge_pulses, 2);

    let status = control.protection().status();
    assert!(!status.low_power_mode());
    assert!(!status.low_power_active());

    assert_regulated(control.cycle());
    assert_eq!(control.board().frames[0].status, 0);
}

#[test]
fn trip_during_standby_test_clears_active_flag() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().low_power_default = true;
    control.board().current = 10;
    control.power_up().unwrap();

    // Light load at the cycle sample, a short circuit once the test restarts.
    control.board().current_script = [10].into();
    control.board().current = 250;
    assert_eq!(control.cycle(), Err(Fault::Overcurrent));

    let status = control.protection().status();
    assert!(status.overcurrent());
    assert!(status.low_power_mode());
    assert!(!status.low_power_active());
    assert_eq!(control.board().discharge_pulses, 1);

    // The trip itself was reported while the test was still active.
    let frame = *control.board().frames.last().unwrap();
    assert!(frame.status().overcurrent());
    assert!(frame.status().low_power_active());
}

#[test]
fn cycle_fault_reaches_telemetry() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.power_up().unwrap();

    control.board().current = 250;
    for _ in 1..5 {
        assert_regulated(control.cycle());
    }
    assert_eq!(control.board().frames.len(), 4);
    assert!(control.board().frames.iter().all(|frame| frame.status == 0));

    assert_eq!(control.cycle(), Err(Fault::Overcurrent));
    let board = control.board();
    assert_eq!(board.frames.len(), 5);
    assert_eq!(board.frames[4].status(), Status::OVERCURRENT);
    assert_eq!(board.frames[4].output_current, 250);
    assert_eq!(board.wire.len(), 5 * TelemetryFrame::ENCODED_LEN);
}

#[test]
fn soft_start_fault_reaches_telemetry() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.board().current_script = [0, 0, 0, 0, 0, 250, 250, 250, 250, 250].into();

    assert_eq!(control.power_up(), Err(Fault::Overcurrent));
    let board = control.board();
    assert_eq!(board.frames.len(), 1);
    assert!(board.frames[0].status().overcurrent());
}

#[test]
fn blocked_rearm_keeps_reporting_thermal_trip() {
    let shared = SharedState::new(DEFAULT_AMPLITUDE_LIMIT);
    let mut control = control(&shared);
    control.power_up().unwrap();

    control.board().heatsink = 220;
    assert_eq!(control.cycle(), Err(Fault::HeatsinkOverTemperature));
    assert_eq!(control.board().frames.len(), 1);
    assert!(control.board().frames[0].status().heatsink_fan());

    let cool_down_at = control.board().after(8_000);
    control.board().cool_down_at = cool_down_at;
    control.shutdown(Fault::HeatsinkOverTemperature);

    let board = control.board();
    let (last, waiting) = board.frames.split_last().unwrap();
    assert!(waiting.len() > 1);
    assert!(waiting.iter().all(|frame| frame.status().heatsink_fan()));
    assert!(waiting.iter().all(|frame| frame.heatsink_temperature == 220));
    // The poll that sees the heatsink cool reports the cleared status.
    assert!(!last.status().heatsink_fan());
    assert_eq!(last.heatsink_temperature, 30);
}
