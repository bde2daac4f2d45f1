// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Exponential backoff with full jitter.
//!
//! The delay before attempt `n + 1` is drawn uniformly from
//! `[0, min(cap, base * 2^(n - 1))]`.

use std::time::Duration;

use crate::configuration::Config;
use crate::constants;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Deadline applied to each individual outbound call.
    pub per_call_deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::MAX_ATTEMPTS,
            base_delay: constants::BACKOFF_BASE,
            max_delay: constants::BACKOFF_CAP,
            per_call_deadline: constants::DEFAULT_PER_CALL_DEADLINE,
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            per_call_deadline: config.per_call_deadline,
            ..Default::default()
        }
    }
}

impl RetryPolicy {
    /// Upper bound of the backoff window after `attempt` (1-based) failed.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Full-jitter delay to sleep after `attempt` (1-based) failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = u64::try_from(self.ceiling(attempt).as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(fastrand::u64(..=ceiling))
    }
}
