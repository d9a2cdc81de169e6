//! Sine-weighted duty generation for the two legs of the half-bridge.
//!
//! [`WaveformGenerator::on_tick`] is the only entry point meant to run in the
//! periodic interrupt. Each tick weights the current amplitude command by the
//! sine table entry at the current phase, drives the active leg and holds the
//! other leg at zero.

use crate::shared::{Leg, Phase, SharedState};
use crate::sine_table::SineTable;

/// Largest duty the 10-bit compare registers accept.
pub const MAX_DUTY: u16 = 0x03FF;

/// A 10-bit duty split the way the compare registers hold it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DutyRegister {
    /// Upper 8 bits.
    pub coarse: u8,
    /// Lower 2 bits.
    pub fine: u8,
}

impl DutyRegister {
    pub const ZERO: Self = Self { coarse: 0, fine: 0 };

    pub fn from_duty(duty: u16) -> Self {
        let duty = duty.min(MAX_DUTY);
        Self {
            coarse: (duty >> 2) as u8,
            fine: (duty & 0b11) as u8,
        }
    }

    pub fn duty(self) -> u16 {
        u16::from(self.coarse) << 2 | u16::from(self.fine & 0b11)
    }

    pub fn is_zero(self) -> bool {
        self.duty() == 0
    }
}

/// Duty values for both legs. At most one is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeDuty {
    pub leg_a: DutyRegister,
    pub leg_b: DutyRegister,
}

impl BridgeDuty {
    /// Mirrors `duty` to both legs, then zeroes the one not driving.
    pub fn for_leg(active: Leg, duty: DutyRegister) -> Self {
        let mut bridge = Self {
            leg_a: duty,
            leg_b: duty,
        };
        match active {
            Leg::A => bridge.leg_b = DutyRegister::ZERO,
            Leg::B => bridge.leg_a = DutyRegister::ZERO,
        }
        bridge
    }
}

/// Fired when the phase counter wraps, once per half-cycle of line voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleBoundary {
    /// Leg that drives the half-cycle just starting.
    pub leg: Leg,
    pub half_cycles: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Tick {
    pub duty: BridgeDuty,
    pub boundary: Option<CycleBoundary>,
}

/// `amplitude * fraction >> 14`, saturated to [`MAX_DUTY`].
pub fn sine_duty(amplitude: u16, fraction_bits: u16) -> u16 {
    let product = u32::from(amplitude) * u32::from(fraction_bits);
    (product >> 14).min(u32::from(MAX_DUTY)) as u16
}

pub struct WaveformGenerator<'a, const N: usize> {
    shared: &'a SharedState,
    table: &'a SineTable<N>,
}

impl<'a, const N: usize> WaveformGenerator<'a, N> {
    pub fn new(shared: &'a SharedState, table: &'a SineTable<N>) -> Self {
        Self { shared, table }
    }

    /// Computes the duty for the current phase step and advances the phase.
    pub fn on_tick(&self) -> Tick {
        critical_section::with(|cs| {
            let phase = self.shared.phase_in(cs);
            let amplitude = self.shared.amplitude_in(cs);

            let fraction = self.table.fraction(phase.index);
            let duty = DutyRegister::from_duty(sine_duty(amplitude, fraction.to_bits()));
            let duty = BridgeDuty::for_leg(phase.leg, duty);

            let (next, boundary) = advance(phase, N);
            self.shared.set_phase_in(cs, next);

            Tick { duty, boundary }
        })
    }
}

fn advance(phase: Phase, len: usize) -> (Phase, Option<CycleBoundary>) {
    let index = usize::from(phase.index) + 1;
    if index < len {
        let next = Phase {
            index: index as u8,
            ..phase
        };
        return (next, None);
    }

    let next = Phase {
        index: 0,
        leg: phase.leg.other(),
        half_cycles: phase.half_cycles.wrapping_add(1),
    };
    let boundary = CycleBoundary {
        leg: next.leg,
        half_cycles: next.half_cycles,
    };
    (next, Some(boundary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sine_table::{DEFAULT_TABLE, DEFAULT_TABLE_LEN};

    #[test]
    fn duty_register_split() {
        let duty = DutyRegister::from_duty(0x2D7);
        assert_eq!(duty.coarse, 0xB5);
        assert_eq!(duty.fine, 0b11);
        assert_eq!(duty.duty(), 0x2D7);
        assert_eq!(DutyRegister::from_duty(0xFFFF).duty(), MAX_DUTY);
    }

    #[test]
    fn sine_duty_scaling() {
        // 0x02A3 * 776 = 523800, >> 14 = 31
        assert_eq!(sine_duty(0x02A3, 776), 31);
        assert_eq!(sine_duty(0, 776), 0);
        assert_eq!(sine_duty(u16::MAX, 0xFFFF), MAX_DUTY);
    }

    #[test]
    fn full_traversal() {
        let shared = SharedState::new(u16::MAX);
        shared.set_amplitude(20_000);
        let generator = WaveformGenerator::new(&shared, &DEFAULT_TABLE);

        let mut toggles = 0;
        for half in 0..2 {
            let leg = shared.phase().leg;
            let mut seen = [false; DEFAULT_TABLE_LEN];
            for _ in 0..DEFAULT_TABLE_LEN {
                let index = usize::from(shared.phase().index);
                assert!(!seen[index], "index {index} visited twice in half {half}");
                seen[index] = true;

                let tick = generator.on_tick();
                assert!(
                    tick.duty.leg_a.is_zero() || tick.duty.leg_b.is_zero(),
                    "both legs driven at index {index}"
                );
                match leg {
                    Leg::A => assert!(tick.duty.leg_b.is_zero()),
                    Leg::B => assert!(tick.duty.leg_a.is_zero()),
                }
                if let Some(boundary) = tick.boundary {
                    toggles += 1;
                    assert_eq!(boundary.leg, leg.other());
                }
            }
            assert!(seen.iter().all(|&s| s));
        }

        assert_eq!(toggles, 2);
        assert_eq!(shared.phase().leg, Leg::A);
        assert_eq!(shared.phase().half_cycles, 2);
    }

    #[test]
    fn duty_follows_table() {
        let shared = SharedState::new(u16::MAX);
        shared.set_amplitude(20_000);
        let generator = WaveformGenerator::new(&shared, &DEFAULT_TABLE);

        for _ in 0..48 {
            generator.on_tick();
        }
        let tick = generator.on_tick();
        // 20000 * 776 >> 14 = 947
        assert_eq!(tick.duty.leg_a.duty(), 947);
        assert!(tick.duty.leg_b.is_zero());
    }

    #[test]
    fn amplitude_change_seen_on_next_tick() {
        let shared = SharedState::new(u16::MAX);
        let generator = WaveformGenerator::new(&shared, &DEFAULT_TABLE);
        for _ in 0..10 {
            generator.on_tick();
        }
        assert!(generator.on_tick().duty.leg_a.is_zero());

        shared.set_amplitude(20_000);
        assert!(!generator.on_tick().duty.leg_a.is_zero());
    }
}
