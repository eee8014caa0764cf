//! Backoff policies for retry delays.

use std::time::Duration;

use rand::Rng;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
  /// Fixed delay between attempts.
  Constant { delay: Duration },
  /// `base * attempt_number`.
  Linear { base: Duration },
  /// `base * 2^(attempt_number - 1)`.
  Exponential { base: Duration },
}

/// Retry configuration: attempt budget, backoff shape, optional jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub backoff: Backoff,
  /// Fraction of the delay used as a uniform random perturbation, e.g.
  /// `0.2` draws from `delay ± 20%`. Spreads out synchronized retry storms
  /// across concurrent callers.
  pub jitter: Option<f64>,
}

impl RetryPolicy {
  pub fn constant(max_attempts: u32, delay: Duration) -> Self {
    Self {
      max_attempts,
      backoff: Backoff::Constant { delay },
      jitter: None,
    }
  }

  pub fn linear(max_attempts: u32, base: Duration) -> Self {
    Self {
      max_attempts,
      backoff: Backoff::Linear { base },
      jitter: None,
    }
  }

  pub fn exponential(max_attempts: u32, base: Duration) -> Self {
    Self {
      max_attempts,
      backoff: Backoff::Exponential { base },
      jitter: None,
    }
  }

  pub fn with_jitter(mut self, fraction: f64) -> Self {
    self.jitter = Some(fraction);
    self
  }

  /// Delay to wait after attempt `attempt` failed (attempts number from 1).
  pub fn delay_after(&self, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let raw = match self.backoff {
      Backoff::Constant { delay } => delay,
      Backoff::Linear { base } => base.checked_mul(attempt).unwrap_or(Duration::MAX),
      Backoff::Exponential { base } => {
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        base.checked_mul(factor).unwrap_or(Duration::MAX)
      }
    };
    self.apply_jitter(raw)
  }

  fn apply_jitter(&self, raw: Duration) -> Duration {
    let Some(fraction) = self.jitter else {
      return raw;
    };
    let spread = raw.as_secs_f64() * fraction.abs();
    if spread <= 0.0 {
      return raw;
    }
    let offset = rand::rng().random_range(-spread..=spread);
    Duration::from_secs_f64((raw.as_secs_f64() + offset).max(0.0))
  }
}
