//! Interval-gated exponential moving average.
//!
//! Per §9's design note, "is initialized" is not a separate boolean next to
//! the value — that shape invites torn reads. Instead [`Ema`] is a sum type:
//! either [`Ema::Uninitialized`] or [`Ema::Initialized`] holding both the
//! value and the last accepted sample time together, so there is no
//! intermediate state where one is set and the other isn't.

use chrono::{DateTime, Duration, Utc};

/// A single time-gated EMA series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ema {
    Uninitialized,
    Initialized { value: f64, last_update: DateTime<Utc> },
}

impl Ema {
    pub fn new() -> Self {
        Ema::Uninitialized
    }

    /// Current value, or `0.0` if no sample has been applied yet — matching
    /// the record field contract ("`0` until first sample applied").
    pub fn value(&self) -> f64 {
        match self {
            Ema::Uninitialized => 0.0,
            Ema::Initialized { value, .. } => *value,
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, Ema::Initialized { .. })
    }

    /// Resets to the uninitialized state.
    pub fn reset(&mut self) {
        *self = Ema::Uninitialized;
    }
}

impl Default for Ema {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the two independent EMAs the Compute stage maintains: one over
/// trade price, one over mid-price. Both share the same `interval`/`alpha`.
pub struct EmaEngine {
    interval: Duration,
    alpha: f64,
    price: Ema,
    mid_price: Ema,
}

/// Default sampling interval: 5 seconds, per §3.
pub const DEFAULT_INTERVAL_SECS: i64 = 5;

impl EmaEngine {
    pub fn new(interval: Duration) -> Self {
        let alpha = 2.0 / (interval.num_milliseconds() as f64 / 1000.0 + 1.0);
        Self {
            interval,
            alpha,
            price: Ema::new(),
            mid_price: Ema::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn price(&self) -> &Ema {
        &self.price
    }

    pub fn mid_price(&self) -> &Ema {
        &self.mid_price
    }

    /// Applies a new trade-price sample at `now`, returning the resulting
    /// (possibly unchanged) value.
    pub fn update_price(&mut self, sample: f64, now: DateTime<Utc>) -> f64 {
        update(&mut self.price, self.alpha, self.interval, sample, now)
    }

    /// Applies a new mid-price sample at `now`, returning the resulting
    /// (possibly unchanged) value.
    pub fn update_mid_price(&mut self, sample: f64, now: DateTime<Utc>) -> f64 {
        update(&mut self.mid_price, self.alpha, self.interval, sample, now)
    }

    /// Resets both EMAs to uninitialized.
    pub fn reset(&mut self) {
        self.price.reset();
        self.mid_price.reset();
    }
}

/// The update rule shared by both series (§4.3):
///
/// 1. Not yet initialized: adopt the sample as-is.
/// 2. Initialized but within one interval of the last accepted sample: the
///    time gate drops the sample, state is unchanged.
/// 3. Initialized and at least one interval has elapsed: apply the
///    recurrence `value <- alpha * sample + (1 - alpha) * value`.
fn update(
    ema: &mut Ema,
    alpha: f64,
    interval: Duration,
    sample: f64,
    now: DateTime<Utc>,
) -> f64 {
    match *ema {
        Ema::Uninitialized => {
            *ema = Ema::Initialized {
                value: sample,
                last_update: now,
            };
            sample
        }
        Ema::Initialized { value, last_update } => {
            if now - last_update < interval {
                value
            } else {
                let next = alpha * sample + (1.0 - alpha) * value;
                *ema = Ema::Initialized {
                    value: next,
                    last_update: now,
                };
                next
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn first_sample_is_adopted_identically() {
        let mut engine = EmaEngine::new(Duration::seconds(5));
        let value = engine.update_price(123.456, t(0));
        assert_eq!(value, 123.456);
        assert!(engine.price().is_initialized());
    }

    #[test]
    fn alpha_matches_two_over_n_plus_one() {
        let engine = EmaEngine::new(Duration::seconds(5));
        assert!((engine.alpha() - (2.0 / 6.0)).abs() < 1e-12);
    }

    #[test]
    fn sample_within_interval_is_dropped_and_state_unchanged() {
        let mut engine = EmaEngine::new(Duration::seconds(5));
        engine.update_price(100.0, t(0));
        let value = engine.update_price(200.0, t(0) + Duration::milliseconds(100));
        assert_eq!(value, 100.0);
        assert_eq!(engine.price().value(), 100.0);
    }

    #[test]
    fn sample_past_interval_applies_recurrence() {
        let mut engine = EmaEngine::new(Duration::seconds(5));
        engine.update_price(100.0, t(0));
        let value = engine.update_price(200.0, t(6));
        // alpha = 2/6 = 1/3: (1/3)*200 + (2/3)*100 = 133.333...
        assert!((value - 133.33333333333334).abs() < 1e-8);
    }

    #[test]
    fn reset_clears_both_series() {
        let mut engine = EmaEngine::new(Duration::seconds(5));
        engine.update_price(1.0, t(0));
        engine.update_mid_price(2.0, t(0));
        engine.reset();
        assert!(!engine.price().is_initialized());
        assert!(!engine.mid_price().is_initialized());
        assert_eq!(engine.price().value(), 0.0);
    }

    #[test]
    fn the_two_series_are_independent() {
        let mut engine = EmaEngine::new(Duration::seconds(5));
        engine.update_price(10.0, t(0));
        assert!(!engine.mid_price().is_initialized());
        engine.update_mid_price(20.0, t(0));
        assert_eq!(engine.price().value(), 10.0);
        assert_eq!(engine.mid_price().value(), 20.0);
    }
}
