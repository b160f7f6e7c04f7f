//! Linear gain automation.
//!
//! A voice's loudness is always described by exactly one [`GainRamp`]. A new
//! ramp replaces the previous one; callers capture the current value with
//! [`GainRamp::value_at`] first so the new ramp starts where the old one was,
//! which keeps every transition free of jumps.

#[cfg(test)]
#[path = "envelope_test.rs"]
mod envelope_test;

/// A linear ramp from `from` to `to` between `start` and `end` (context seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub from: f64,
    pub to: f64,
    pub start: f64,
    pub end: f64,
}

impl GainRamp {
    /// Ramp from `from` to `to` starting at `now` and lasting `duration` seconds.
    #[must_use]
    pub fn linear(from: f64, to: f64, now: f64, duration: f64) -> Self {
        Self { from, to, start: now, end: now + duration.max(0.0) }
    }

    /// A constant level.
    #[must_use]
    pub fn hold(level: f64, now: f64) -> Self {
        Self { from: level, to: level, start: now, end: now }
    }

    /// Gain at context time `t`.
    #[must_use]
    pub fn value_at(&self, t: f64) -> f64 {
        if t >= self.end {
            return self.to;
        }
        if t <= self.start {
            return self.from;
        }
        let frac = (t - self.start) / (self.end - self.start);
        self.from + (self.to - self.from) * frac
    }

    /// Whether the ramp has reached its target at time `t`.
    #[must_use]
    pub fn is_settled(&self, t: f64) -> bool {
        t >= self.end
    }
}
