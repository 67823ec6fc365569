//! Retry policy and backoff (§4.K).
//!
//! `delay(attempt) = min(initialMs * factor^(attempt-1), maxMs)`, attempts counted
//! from 1. With jitter on, the delay is scaled by a uniform draw from `[0.5, 1.5)`
//! before rounding to the nearest millisecond.

use rand::Rng;

/// Exponential backoff with an optional jitter multiplier, plus a maximum attempt count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_ms: f64,
    pub factor: f64,
    pub max_ms: f64,
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_ms: f64, factor: f64, max_ms: f64, jitter: bool) -> Self {
        Self {
            max_attempts,
            initial_ms,
            factor,
            max_ms,
            jitter,
        }
    }

    /// Look up one of the five named presets.
    pub fn preset(name: &str) -> Self {
        match name {
            "none" => Self::new(1, 0.0, 1.0, 0.0, false),
            "aggressive" => Self::new(5, 500.0, 2.0, 60_000.0, true),
            "linear" => Self::new(3, 500.0, 1.0, 60_000.0, true),
            "patient" => Self::new(3, 2_000.0, 3.0, 60_000.0, true),
            _ => Self::standard(),
        }
    }

    pub fn standard() -> Self {
        Self::new(5, 200.0, 2.0, 60_000.0, true)
    }

    /// `maxAttempts = node.maxRetries + 1`, everything else from `standard`.
    pub fn for_node_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries + 1,
            ..Self::standard()
        }
    }

    /// `delay(attempt)`, 1-indexed: `attempt == 1` is the delay before the *second*
    /// handler invocation.
    pub fn delay_ms(&self, attempt: u32) -> f64 {
        let base = self.initial_ms * self.factor.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_ms).max(0.0);
        if self.jitter {
            let mult: f64 = rand::thread_rng().gen_range(0.5..1.5);
            (capped * mult).round()
        } else {
            capped.round()
        }
    }
}

/// Default transient-error predicate: substring matches over the error message.
///
/// The heuristic is intentionally narrow (§9 open question) — richer classification
/// needs a structured error channel from handler capabilities, which is out of scope.
pub fn is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    const PERMANENT_MARKERS: [&str; 4] = ["400", "401", "403", "bad request"];
    if PERMANENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    const TRANSIENT_MARKERS: [&str; 4] = ["429", "rate limit", "network", "timeout"];
    if TRANSIENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }
    true
}
