//! Pre-parsed profile arrays and their resampling to the simulation tick.

use crate::error::SimError;

/// How a quantity behaves when the sampling interval changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// A rate or ratio (power, capacity factor, temperature): values are
    /// interpolated.
    Intensive,
    /// An amount per interval (energy, volume): the cumulative integral is
    /// preserved.
    Extensive,
}

/// Evenly sampled series starting at simulated time zero.
///
/// Sample `i` covers the interval `[i·step, (i + 1)·step)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    step_s: f64,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Creates a series sampled every `step_h` hours.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidTimeSeries`] if `step_h` is not a finite,
    /// strictly positive number.
    pub fn new(step_h: f64, values: Vec<f64>) -> Result<Self, SimError> {
        if !(step_h > 0.0 && step_h.is_finite()) {
            return Err(SimError::InvalidTimeSeries(format!(
                "step must be > 0 h, got {step_h}"
            )));
        }
        Ok(Self {
            step_s: step_h * 3600.0,
            values,
        })
    }

    pub fn step_s(&self) -> f64 {
        self.step_s
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Simulated time covered by the series (s).
    pub fn span_s(&self) -> f64 {
        self.values.len() as f64 * self.step_s
    }

    /// Sample covering `time_s`, if the series reaches that far.
    pub fn at_time(&self, time_s: f64) -> Option<f64> {
        if time_s < 0.0 {
            return None;
        }
        let idx = (time_s / self.step_s + 1e-9).floor() as usize;
        self.values.get(idx).copied()
    }

    /// Resamples to `step_s` over `[0, horizon_s)`.
    ///
    /// Returns `None` if the series does not cover the horizon.
    pub fn resample(&self, step_s: f64, horizon_s: f64, kind: Aggregation) -> Option<TimeSeries> {
        if step_s <= 0.0 || horizon_s > self.span_s() + 1e-6 || self.values.is_empty() {
            return None;
        }
        let n = ((horizon_s / step_s) - 1e-9).ceil().max(0.0) as usize;
        let values = match kind {
            Aggregation::Intensive => (0..n).map(|j| self.interpolate(j as f64 * step_s)).collect(),
            Aggregation::Extensive => (0..n)
                .map(|j| {
                    let start = j as f64 * step_s;
                    let end = (start + step_s).min(self.span_s());
                    self.cumulative(end) - self.cumulative(start)
                })
                .collect(),
        };
        Some(TimeSeries { step_s, values })
    }

    fn interpolate(&self, time_s: f64) -> f64 {
        let x = time_s / self.step_s;
        let i = (x.floor() as usize).min(self.values.len() - 1);
        let frac = (x - i as f64).clamp(0.0, 1.0);
        let next = self.values.get(i + 1).copied().unwrap_or(self.values[i]);
        self.values[i] + (next - self.values[i]) * frac
    }

    /// Integral of the piecewise-constant series (in sample units) up to `time_s`.
    fn cumulative(&self, time_s: f64) -> f64 {
        let x = (time_s / self.step_s).clamp(0.0, self.values.len() as f64);
        let full = x.floor() as usize;
        let whole: f64 = self.values[..full].iter().sum();
        let partial = self
            .values
            .get(full)
            .map_or(0.0, |v| v * (x - full as f64));
        whole + partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn step_must_be_positive(#[case] step_h: f64) {
        assert!(matches!(
            TimeSeries::new(step_h, vec![1.0]),
            Err(SimError::InvalidTimeSeries(_))
        ));
    }

    #[test]
    fn lookup_by_time() {
        let ts = TimeSeries::new(1.0, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(ts.at_time(0.0), Some(1.0));
        assert_eq!(ts.at_time(3599.0), Some(1.0));
        assert_eq!(ts.at_time(3600.0), Some(2.0));
        assert_eq!(ts.at_time(3.0 * 3600.0), None);
    }

    #[test]
    fn extensive_upsampling_splits_amounts() {
        let ts = TimeSeries::new(1.0, vec![2.0, 4.0]).unwrap();
        let r = ts.resample(1800.0, 7200.0, Aggregation::Extensive).unwrap();
        assert_eq!(r.values(), &[1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn extensive_downsampling_preserves_total() {
        let ts = TimeSeries::new(0.25, vec![1.0, 2.0, 3.0, 4.0, 0.5, 0.5, 0.5, 0.5]).unwrap();
        let r = ts.resample(3600.0, 7200.0, Aggregation::Extensive).unwrap();
        assert_relative_eq!(r.values()[0], 10.0);
        assert_relative_eq!(r.values()[1], 2.0);
        let total: f64 = r.values().iter().sum();
        assert_relative_eq!(total, ts.values().iter().sum::<f64>());
    }

    #[test]
    fn intensive_upsampling_interpolates() {
        let ts = TimeSeries::new(1.0, vec![0.0, 1.0]).unwrap();
        let r = ts.resample(900.0, 7200.0, Aggregation::Intensive).unwrap();
        assert_eq!(r.len(), 8);
        assert_relative_eq!(r.values()[0], 0.0);
        assert_relative_eq!(r.values()[2], 0.5);
        assert_relative_eq!(r.values()[7], 1.0);
    }

    #[test]
    fn short_series_cannot_cover_horizon() {
        let ts = TimeSeries::new(1.0, vec![1.0; 24]).unwrap();
        assert!(ts.resample(1800.0, 25.0 * 3600.0, Aggregation::Intensive).is_none());
    }
}
