use crate::config::OvercurrentConfig;

/// Debounced overcurrent detector.
///
/// Counts consecutive samples at or above the threshold and trips once the
/// count reaches the configured maximum. Any in-range sample clears both the
/// count and the trip.
#[derive(Debug, Clone)]
pub struct OvercurrentCounter {
    config: OvercurrentConfig,
    consecutive: u8,
    tripped: bool,
}

impl OvercurrentCounter {
    pub fn new(config: OvercurrentConfig) -> Self {
        Self {
            config,
            consecutive: 0,
            tripped: false,
        }
    }

    /// Feeds one current sample, returning whether the detector is tripped.
    pub fn update(&mut self, current: u8) -> bool {
        if current < self.config.threshold {
            self.consecutive = 0;
            self.tripped = false;
        } else {
            self.consecutive = self.consecutive.saturating_add(1);
            self.tripped = self.consecutive >= self.config.max_consecutive;
        }
        self.tripped
    }

    pub fn consecutive(&self) -> u8 {
        self.consecutive
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.tripped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: OvercurrentConfig = OvercurrentConfig {
        threshold: 242,
        max_consecutive: 5,
    };

    #[test]
    fn one_short_of_max_never_trips() {
        let mut counter = OvercurrentCounter::new(CONFIG);
        for _ in 0..CONFIG.max_consecutive - 1 {
            assert!(!counter.update(CONFIG.threshold));
        }
        assert!(!counter.update(CONFIG.threshold - 1));
        assert_eq!(counter.consecutive(), 0);

        for _ in 0..CONFIG.max_consecutive - 1 {
            assert!(!counter.update(255));
        }
    }

    #[test]
    fn trips_on_max_consecutive_sample() {
        let mut counter = OvercurrentCounter::new(CONFIG);
        for sample in 1..=CONFIG.max_consecutive {
            let tripped = counter.update(250);
            assert_eq!(tripped, sample == CONFIG.max_consecutive, "sample {sample}");
        }
        // Stays tripped while the condition persists.
        assert!(counter.update(250));
        assert!(!counter.update(0));
        assert!(!counter.is_tripped());
    }
}
