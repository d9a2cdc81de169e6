use thiserror::Error;

/// A protection condition that requires a controlled shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    #[error("output overcurrent")]
    Overcurrent,
    #[error("heatsink over temperature")]
    HeatsinkOverTemperature,
    #[error("transformer over temperature")]
    TransformerOverTemperature,
    #[error("battery low or absent")]
    BatteryLow,
    #[error("bridge disabled by hardware")]
    HardwareDisable,
}
