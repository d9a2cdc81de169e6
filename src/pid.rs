//! Output voltage PID controller in sign-magnitude integer arithmetic.

use crate::config::PidConfig;
use crate::fixed_point::{div24x16, mul16x16, mul24x16, resolve_sign, Sign, SignedMagnitude};

/// Percent error saturates here.
pub const MAX_PERCENT_ERROR: u8 = 100;

/// Signed amplitude correction produced by one PID evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Correction {
    magnitude: u16,
    sign: Sign,
}

impl Correction {
    pub fn new(magnitude: u16, sign: Sign) -> Self {
        let sign = if magnitude == 0 { Sign::Positive } else { sign };
        Self { magnitude, sign }
    }

    pub fn magnitude(self) -> u16 {
        self.magnitude
    }

    pub fn sign(self) -> Sign {
        self.sign
    }

    /// Adds or subtracts the correction from `reference`, saturating at the
    /// bounds of `u16`.
    pub fn apply_to(self, reference: u16) -> u16 {
        match self.sign {
            Sign::Positive => reference.saturating_add(self.magnitude),
            Sign::Negative => reference.saturating_sub(self.magnitude),
        }
    }
}

/// Intermediate values of the most recent evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidTerms {
    pub percent_error: u8,
    /// Percent error times the error gain, with the error sign.
    pub error: SignedMagnitude,
    pub proportional: SignedMagnitude,
    pub integral: SignedMagnitude,
    pub derivative: SignedMagnitude,
    pub combined: SignedMagnitude,
    pub output: Correction,
}

pub struct PidController {
    k_p: u8,
    error_gain: u8,
    output_divisor: u16,
    output_limit: u16,
    integral: IntegralComponent,
    derivative: DerivativeComponent,
    terms: PidTerms,
}

impl PidController {
    pub fn new(config: PidConfig) -> Self {
        Self {
            k_p: config.kp,
            error_gain: config.error_gain,
            output_divisor: config.output_divisor,
            output_limit: config.output_limit,
            integral: IntegralComponent::new(config.ki),
            derivative: DerivativeComponent::new(config.kd, config.derivative_period),
            terms: PidTerms::default(),
        }
    }

    /// Computes the amplitude correction that drives `measured` towards
    /// `reference`.
    ///
    /// A measurement above the reference yields a negative correction. The
    /// integral memory and derivative history only advance on a non-zero
    /// error, but the integral term still contributes on every call.
    pub fn evaluate(&mut self, reference: u16, measured: u16) -> Correction {
        let (percent_error, sign) = percent_error(reference, measured);
        let scaled = u16::from(self.error_gain) * u16::from(percent_error);
        let error = SignedMagnitude::new(u32::from(scaled), sign);

        if !error.is_zero() {
            self.integral.accumulate(error);
            self.derivative.sample(error);
        }

        let proportional = SignedMagnitude::new(mul16x16(u16::from(self.k_p), scaled), sign);
        let integral = self.integral.term();
        let derivative = self.derivative.take_term();

        let combined = resolve_sign(resolve_sign(proportional, integral), derivative);
        let magnitude = div24x16(combined.magnitude(), self.output_divisor)
            .min(u32::from(self.output_limit)) as u16;
        let output = Correction::new(magnitude, combined.sign());

        self.terms = PidTerms {
            percent_error,
            error,
            proportional,
            integral,
            derivative,
            combined,
            output,
        };
        trace!(
            "pid: err={}% out={} {:?}",
            percent_error,
            output.magnitude(),
            output.sign()
        );

        output
    }

    pub fn terms(&self) -> &PidTerms {
        &self.terms
    }

    /// Clears integral and derivative memory.
    pub fn reset(&mut self) {
        self.integral.reset();
        self.derivative.reset();
        self.terms = PidTerms::default();
    }
}

/// `|reference - measured|` saturated to [`MAX_PERCENT_ERROR`], negative when
/// the measurement is above the reference.
pub fn percent_error(reference: u16, measured: u16) -> (u8, Sign) {
    let sign = if measured > reference {
        Sign::Negative
    } else {
        Sign::Positive
    };
    let difference = reference.abs_diff(measured);
    let percent = difference.min(u16::from(MAX_PERCENT_ERROR)) as u8;
    (percent, sign)
}

struct IntegralComponent {
    k_i: u8,
    accumulated: SignedMagnitude,
}

impl IntegralComponent {
    fn new(k_i: u8) -> Self {
        Self {
            k_i,
            accumulated: SignedMagnitude::ZERO,
        }
    }

    fn accumulate(&mut self, error: SignedMagnitude) {
        self.accumulated = self.accumulated.saturating_accumulate(error);
    }

    fn term(&self) -> SignedMagnitude {
        if self.accumulated.is_zero() {
            return SignedMagnitude::ZERO;
        }
        SignedMagnitude::new(
            mul24x16(self.accumulated.magnitude(), u16::from(self.k_i)),
            self.accumulated.sign(),
        )
    }

    fn reset(&mut self) {
        self.accumulated = SignedMagnitude::ZERO;
    }
}

struct DerivativeComponent {
    k_d: u8,
    period: u8,
    countdown: u8,
    previous: SignedMagnitude,
    delta: Option<SignedMagnitude>,
}

impl DerivativeComponent {
    fn new(k_d: u8, period: u8) -> Self {
        let period = period.max(1);
        Self {
            k_d,
            period,
            countdown: period,
            previous: SignedMagnitude::ZERO,
            delta: None,
        }
    }

    /// Records a new delta once every `period` samples.
    fn sample(&mut self, error: SignedMagnitude) {
        self.countdown -= 1;
        if self.countdown == 0 {
            self.delta = Some(resolve_sign(error, self.previous.negate()));
            self.previous = error;
            self.countdown = self.period;
        }
    }

    fn take_term(&mut self) -> SignedMagnitude {
        match self.delta.take() {
            Some(delta) if !delta.is_zero() => {
                // Both errors fit in 16 bits, so their difference fits in 17;
                // clamp so the 16x16 multiply sees a valid operand.
                let delta_magnitude = delta.magnitude().min(u32::from(u16::MAX)) as u16;
                SignedMagnitude::new(mul16x16(u16::from(self.k_d), delta_magnitude), delta.sign())
            }
            _ => SignedMagnitude::ZERO,
        }
    }

    fn reset(&mut self) {
        self.countdown = self.period;
        self.previous = SignedMagnitude::ZERO;
        self.delta = None;
    }
}
