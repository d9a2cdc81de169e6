#![no_std]
#![forbid(unsafe_code)]

//! Closed-loop control core of a single-phase sine inverter.
//!
//! A periodic tick ([`pwm::WaveformGenerator::on_tick`]) turns the shared
//! amplitude command into sine-weighted duty for the two legs of a
//! half-bridge. The foreground [`control::ControlLoop`] regulates that
//! amplitude once per half-cycle with a [`pid::PidController`] and
//! supervises overcurrent, temperature, battery and the hardware enable line
//! through a [`protection::ProtectionStateMachine`].

// Ahead of `fmt` so the `error!` macro is not in scope next to `#[error]`.
pub mod error;

mod fmt;

pub mod board;
pub mod bridge;
pub mod config;
pub mod control;
pub mod fixed_point;
pub mod pid;
pub mod protection;
pub mod pwm;
pub mod shared;
pub mod sine_table;

pub use control::{ControlLoop, CycleOutcome};
pub use error::Fault;
pub use shared::SharedState;
