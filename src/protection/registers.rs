//! Fault and status bit registers.

use crate::error::Fault;

macro_rules! bit_register {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$flag_meta:meta])* ($flag:ident, $bit:literal, $getter:ident)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Default)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        pub struct $name(u8);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self(1 << $bit);
            )+

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn from_bits(bits: u8) -> Self {
                Self(bits)
            }

            pub const fn bits(self) -> u8 {
                self.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }

            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }

            pub fn set(&mut self, other: Self, value: bool) {
                if value {
                    self.insert(other);
                } else {
                    self.remove(other);
                }
            }

            $(
                pub const fn $getter(self) -> bool {
                    self.contains(Self::$flag)
                }
            )+
        }

        impl core::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl core::fmt::Debug for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut set = f.debug_set();
                $(
                    if self.contains(Self::$flag) {
                        set.entry(&stringify!($flag));
                    }
                )+
                set.finish()
            }
        }
    };
}

bit_register! {
    /// Conditions requesting a controlled shutdown.
    ///
    /// A bit is only set while its condition is confirmed by the debounce or
    /// hysteresis rule of the owning check.
    Pending {
        (OVERCURRENT, 0, overcurrent),
        (HEATSINK_TRIP, 1, heatsink_trip),
        (TRANSFORMER_TRIP, 2, transformer_trip),
        (BATTERY_LOW, 3, battery_low),
        (HARDWARE_DISABLE, 4, hardware_disable),
    }
}

bit_register! {
    /// Externally reported fault and mode flags.
    ///
    /// The layout is the status byte of the telemetry frame.
    Status {
        /// Low-power mode requested by the operator.
        (LOW_POWER_MODE, 0, low_power_mode),
        /// Output is idling in standby, probing for a load.
        (LOW_POWER_ACTIVE, 1, low_power_active),
        /// Transformer channel tripped; its fan alarm is raised.
        (TRANSFORMER_FAN, 2, transformer_fan),
        /// Heatsink channel tripped; its fan alarm is raised.
        (HEATSINK_FAN, 3, heatsink_fan),
        (OVERCURRENT, 4, overcurrent),
        (BATTERY_LOW, 5, battery_low),
        (HARDWARE_DISABLE, 6, hardware_disable),
    }
}

impl Pending {
    /// The highest-priority fault among the pending bits, if any.
    pub fn fault(self) -> Option<Fault> {
        if self.overcurrent() {
            Some(Fault::Overcurrent)
        } else if self.heatsink_trip() {
            Some(Fault::HeatsinkOverTemperature)
        } else if self.transformer_trip() {
            Some(Fault::TransformerOverTemperature)
        } else if self.battery_low() {
            Some(Fault::BatteryLow)
        } else if self.hardware_disable() {
            Some(Fault::HardwareDisable)
        } else {
            None
        }
    }
}

impl From<Fault> for Pending {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Overcurrent => Pending::OVERCURRENT,
            Fault::HeatsinkOverTemperature => Pending::HEATSINK_TRIP,
            Fault::TransformerOverTemperature => Pending::TRANSFORMER_TRIP,
            Fault::BatteryLow => Pending::BATTERY_LOW,
            Fault::HardwareDisable => Pending::HARDWARE_DISABLE,
        }
    }
}
