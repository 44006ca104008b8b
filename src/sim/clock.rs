use super::config::SimulationConfig;

/// One tick handed out by the [`Clock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Tick index, starting from 0.
    pub index: usize,
    /// Simulated time at the start of the tick (s).
    pub time_s: f64,
}

/// A simulation clock that hands out ticks over a fixed horizon.
///
/// Time is computed as `start + index · step` rather than accumulated, so
/// long runs do not drift.
///
/// # Examples
///
/// ```
/// use energy_system_sim::sim::clock::Clock;
/// use energy_system_sim::sim::config::SimulationConfig;
///
/// let mut clock = Clock::new(&SimulationConfig::new(0.0, 1.5, 0.5));
/// let mut times = Vec::new();
///
/// while let Some(tick) = clock.tick() {
///     times.push(tick.time_s);
/// }
/// assert_eq!(times, vec![0.0, 1800.0, 3600.0]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Index of the next tick
    current: usize,
    /// Total ticks in the run
    total: usize,
    start_s: f64,
    step_s: f64,
}

impl Clock {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            current: 0,
            total: config.total_ticks(),
            start_s: config.time_start_s(),
            step_s: config.time_step_s(),
        }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some(tick)` - The tick to simulate next
    /// * `None` - If the clock has passed the configured end
    pub fn tick(&mut self) -> Option<Tick> {
        if self.current < self.total {
            let index = self.current;
            self.current += 1;
            Some(Tick {
                index,
                time_s: self.start_s + index as f64 * self.step_s,
            })
        } else {
            None
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock() {
        let clock = Clock::new(&SimulationConfig::new(0.0, 5.0, 1.0));
        assert_eq!(clock.current, 0);
        assert_eq!(clock.total, 5);
    }

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(&SimulationConfig::new(1.0, 3.0, 1.0));
        assert_eq!(
            clock.tick(),
            Some(Tick {
                index: 0,
                time_s: 3600.0
            })
        );
        assert_eq!(clock.tick().map(|t| t.index), Some(1));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_tick_times_do_not_drift() {
        let mut clock = Clock::new(&SimulationConfig::new(0.0, 1.0, 0.1));
        let mut seen = Vec::new();
        while let Some(t) = clock.tick() {
            seen.push(t.time_s);
        }
        assert_eq!(seen.len(), 10);
        assert!((seen[9] - 3240.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(&SimulationConfig::new(2.0, 2.0, 1.0));
        assert_eq!(clock.total(), 0);
        assert_eq!(clock.tick(), None);
    }
}
