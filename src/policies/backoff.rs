//! # Backoff between spawn attempts.
//!
//! [`BackoffPolicy`] spaces out the attempts the process supervisor makes when a
//! program fails to spawn. The delay before retry `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`, then randomized per [`JitterPolicy`].
//! The base is always derived from the attempt number, never from a previous
//! jittered value.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use sessionvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(200),
//!     max: Duration::from_secs(2),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.delay(0), Duration::from_millis(200));
//! assert_eq!(backoff.delay(2), Duration::from_millis(800));
//! assert_eq!(backoff.delay(8), Duration::from_secs(2));
//! ```

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Randomization applied on top of the computed delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JitterPolicy {
    /// Exact delays.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay/2 + uniform[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies this jitter to `delay`.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + rand::rng().random_range(0..=ms - half))
            }
        }
    }
}

/// Delay policy for spawn retries.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    #[serde(rename = "first_ms", deserialize_with = "crate::config::millis")]
    pub first: Duration,
    /// Upper bound for any delay.
    #[serde(rename = "max_ms", deserialize_with = "crate::config::millis")]
    pub max: Duration,
    /// Growth factor per attempt (`1.0` = constant).
    pub factor: f64,
    /// Randomization.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 500ms`, `max = 5s`, `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A policy that never waits; useful in tests.
    pub fn immediate() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);
        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn grows_then_saturates() {
        let p = policy(JitterPolicy::None);
        assert_eq!(p.delay(0), Duration::from_millis(100));
        assert_eq!(p.delay(1), Duration::from_millis(200));
        assert_eq!(p.delay(3), Duration::from_millis(800));
        assert_eq!(p.delay(4), Duration::from_secs(1));
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn first_above_max_is_clamped() {
        let p = BackoffPolicy {
            first: Duration::from_secs(10),
            ..policy(JitterPolicy::None)
        };
        assert_eq!(p.delay(0), Duration::from_secs(1));
    }

    #[test]
    fn equal_jitter_stays_in_upper_half() {
        let p = policy(JitterPolicy::Equal);
        for attempt in 0..20 {
            let base = policy(JitterPolicy::None).delay(attempt);
            let d = p.delay(attempt);
            assert!(d >= base / 2, "attempt {attempt}: {d:?} < {:?}", base / 2);
            assert!(d <= base, "attempt {attempt}: {d:?} > {base:?}");
        }
    }

    #[test]
    fn full_jitter_never_exceeds_base() {
        let p = policy(JitterPolicy::Full);
        for attempt in 0..20 {
            assert!(p.delay(attempt) <= policy(JitterPolicy::None).delay(attempt));
        }
    }

    #[test]
    fn immediate_is_zero() {
        assert_eq!(BackoffPolicy::immediate().delay(7), Duration::ZERO);
    }
}
