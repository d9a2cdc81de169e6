//! Runs the control loop against a simulated bridge and records every
//! modulation tick to `out.mcap` for inspection in Foxglove.

use std::{collections::BTreeMap, fs::File, io::BufWriter, sync::Arc};

use inverter_core::board::{
    AnalogInput, Channel, DigitalLines, Indicator, TelemetryFrame, TelemetryLink,
};
use inverter_core::config::InverterConfig;
use inverter_core::pwm::WaveformGenerator;
use inverter_core::shared::Leg;
use inverter_core::sine_table::{DEFAULT_TABLE, DEFAULT_TABLE_LEN};
use inverter_core::{ControlLoop, CycleOutcome, SharedState};
use serde::Serialize;

/// 50 Hz line, one table step per tick, two half-cycles per period.
const TICK_NS: u64 = 1_000_000_000 / (50 * 2 * DEFAULT_TABLE_LEN as u64);
const CYCLES: usize = 200;

#[derive(Serialize)]
struct Values {
    time_ns: u64,
    amplitude: u16,
    phase_index: u8,
    leg_b_active: bool,
    duty: [u16; 2],
    /// Leg A minus leg B, the differential drive seen by the transformer.
    output: i32,
}

#[derive(Serialize)]
struct Telemetry {
    time_ns: u64,
    frame: TelemetryFrame,
    encoded: Vec<u8>,
}

struct SimulatedBoard<'a> {
    shared: &'a SharedState,
    generator: WaveformGenerator<'a, DEFAULT_TABLE_LEN>,
    modulating: bool,
    latched: bool,
    time_ns: u64,
    /// Output voltage as seen by the ADC, following the amplitude with lag.
    voltage: f32,
    ticks: Vec<Values>,
    telemetry: Vec<Telemetry>,
}

impl<'a> SimulatedBoard<'a> {
    fn new(shared: &'a SharedState) -> Self {
        Self {
            shared,
            generator: WaveformGenerator::new(shared, &DEFAULT_TABLE),
            modulating: false,
            latched: false,
            time_ns: 0,
            voltage: 0.,
            ticks: Vec::new(),
            telemetry: Vec::new(),
        }
    }
}

impl AnalogInput for SimulatedBoard<'_> {
    fn read_channel(&mut self, channel: Channel) -> u8 {
        match channel {
            Channel::OutputVoltage => self.voltage as u8,
            Channel::OutputCurrent => 90,
            Channel::HeatsinkTemperature => 60,
            Channel::BatteryReference => 128,
            Channel::TransformerTemperature => 30,
            Channel::LowPowerLoadReference => 20,
            Channel::StandbyCapacitor => 255,
        }
    }
}

impl TelemetryLink for SimulatedBoard<'_> {
    fn send_telemetry(&mut self, frame: &TelemetryFrame) {
        let mut buffer = [0; TelemetryFrame::ENCODED_LEN];
        let encoded = frame
            .encode(&mut buffer)
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default();
        self.telemetry.push(Telemetry {
            time_ns: self.time_ns,
            frame: *frame,
            encoded,
        });
    }
}

impl DigitalLines for SimulatedBoard<'_> {
    fn enable_sensed(&mut self) -> bool {
        !self.latched
    }

    fn set_disable_latch(&mut self, active: bool) {
        if active {
            self.latched = true;
        }
    }

    fn set_latch_reset(&mut self, active: bool) {
        if active {
            self.latched = false;
        }
    }

    fn reset_confirmed(&mut self) -> bool {
        true
    }

    fn battery_present(&mut self) -> bool {
        true
    }

    fn low_power_requested(&mut self) -> bool {
        false
    }

    fn set_fan(&mut self, _on: bool) {}

    fn set_buzzer(&mut self, _on: bool) {}

    fn set_indicator(&mut self, _indicator: Indicator, _on: bool) {}

    fn set_standby_discharge(&mut self, _active: bool) {}

    fn start_modulation(&mut self) {
        self.modulating = true;
    }

    fn stop_modulation(&mut self) {
        self.modulating = false;
    }

    fn relax(&mut self) {
        if !self.modulating {
            return;
        }

        let phase = self.shared.phase();
        let amplitude = self.shared.amplitude();
        let tick = self.generator.on_tick();
        let duty = [tick.duty.leg_a.duty(), tick.duty.leg_b.duty()];

        // First-order lag towards 0.2 counts per amplitude unit.
        let target = f32::from(amplitude) * 0.2;
        self.voltage += (target - self.voltage) * 0.002;

        self.ticks.push(Values {
            time_ns: self.time_ns,
            amplitude,
            phase_index: phase.index,
            leg_b_active: phase.leg == Leg::B,
            duty,
            output: i32::from(duty[0]) - i32::from(duty[1]),
        });
        self.time_ns += TICK_NS;
    }
}

fn cbor_channel(topic: &str) -> mcap::Channel<'static> {
    mcap::Channel {
        topic: topic.to_owned(),
        schema: Some(Arc::new(mcap::Schema {
            name: "".to_owned(),
            encoding: "".to_owned(),
            data: std::borrow::Cow::default(),
        })),
        message_encoding: "cbor".to_owned(),
        metadata: BTreeMap::default(),
    }
}

fn main() -> Result<(), anyhow::Error> {
    let shared = SharedState::new(InverterConfig::default().amplitude_limit);
    let mut control = ControlLoop::new(
        InverterConfig::default(),
        SimulatedBoard::new(&shared),
        &shared,
    );

    control.power_up()?;
    for _ in 0..CYCLES {
        if let CycleOutcome::Regulated {
            amplitude,
            correction,
        } = control.cycle()?
        {
            println!(
                "amplitude {amplitude:4} correction {:?} {}",
                correction.sign(),
                correction.magnitude()
            );
        }
    }

    let mut writer = mcap::Writer::new(BufWriter::new(File::create("out.mcap")?))?;
    let ticks_id = writer.add_channel(&cbor_channel("inverter/ticks"))?;
    let telemetry_id = writer.add_channel(&cbor_channel("inverter/telemetry"))?;

    let board = control.board();
    let mut buffer = Vec::with_capacity(128);
    for values in &board.ticks {
        buffer.clear();
        ciborium::into_writer(values, &mut buffer)?;
        writer.write_to_known_channel(
            &mcap::records::MessageHeader {
                channel_id: ticks_id,
                sequence: 0,
                log_time: values.time_ns,
                publish_time: values.time_ns,
            },
            &buffer,
        )?;
    }
    for telemetry in &board.telemetry {
        buffer.clear();
        ciborium::into_writer(telemetry, &mut buffer)?;
        writer.write_to_known_channel(
            &mcap::records::MessageHeader {
                channel_id: telemetry_id,
                sequence: 0,
                log_time: telemetry.time_ns,
                publish_time: telemetry.time_ns,
            },
            &buffer,
        )?;
    }

    writer.finish()?;

    Ok(())
}
