//! Token usage accumulation for a single agent run.
//!
//! `Usage` is monotonically accumulated across the LLM calls of one run (see
//! `RunState::Usage` and `RunState::accumulate_usage`) and never decreases;
//! it is not a provider-wire type, just the core's running total.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token counters accumulated across LLM calls within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt/input across all calls in the run.
    #[serde(default)]
    pub input_tokens: u64,
    /// Tokens produced as output across all calls in the run.
    #[serde(default)]
    pub output_tokens: u64,
    /// Of `input_tokens`, how many were served from a prompt cache.
    #[serde(default)]
    pub cached_input_tokens: u64,
    /// Running total (`input_tokens + output_tokens`), tracked explicitly
    /// since providers don't always agree that the identity holds.
    #[serde(default)]
    pub total_tokens: u64,
}

impl Usage {
    /// The zero usage record, used when constructing a fresh `RunState`.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            cached_input_tokens: 0,
            total_tokens: 0,
        }
    }

    /// Whether no tokens have been recorded yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_tokens == 0
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            cached_input_tokens: self.cached_input_tokens + rhs.cached_input_tokens,
            total_tokens: self.total_tokens + rhs.total_tokens,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

#[cfg(test)]
mod tests {
    use super::Usage;

    #[test]
    fn accumulates_monotonically() {
        let mut total = Usage::zero();
        total += Usage {
            input_tokens: 5,
            output_tokens: 1,
            cached_input_tokens: 0,
            total_tokens: 6,
        };
        total += Usage {
            input_tokens: 10,
            output_tokens: 2,
            cached_input_tokens: 3,
            total_tokens: 12,
        };
        assert_eq!(total.input_tokens, 15);
        assert_eq!(total.output_tokens, 3);
        assert_eq!(total.cached_input_tokens, 3);
        assert_eq!(total.total_tokens, 18);
        assert!(!total.is_empty());
    }
}
