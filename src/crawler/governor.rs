//! Rate governor for dispatch pacing
//!
//! This module handles:
//! - The base dispatch interval and its random jitter
//! - Per-domain request counting with tiered delays
//! - Computing when the next dispatch may happen

use crate::config::CrawlerConfig;
use crate::state::DomainState;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Per-domain delay multiplier for a session request count
fn tier_multiplier(request_count: u32) -> f64 {
    match request_count {
        0..=9 => 1.0,
        10..=49 => 1.5,
        50..=99 => 2.0,
        _ => 3.0,
    }
}

fn scale_millis(ms: u64, factor: f64) -> Duration {
    Duration::from_millis((ms as f64 * factor).max(0.0).round() as u64)
}

/// Discount applied to domains that are new or have been idle for a while
const IDLE_DISCOUNT: f64 = 0.7;

/// Paces dispatches globally and per domain
#[derive(Debug)]
pub struct RateGovernor {
    interval: Duration,
    jitter: f64,
    base_domain_delay_ms: u64,
    domain_idle: Duration,

    /// Gap chosen after the last completed dispatch
    current_gap: Duration,

    last_dispatch: Option<Instant>,
    domain_states: HashMap<String, DomainState>,
}

impl RateGovernor {
    pub fn new(config: &CrawlerConfig) -> Self {
        let interval = Duration::from_millis(config.request_interval_ms);
        Self {
            interval,
            jitter: config.jitter,
            base_domain_delay_ms: config.base_domain_delay_ms,
            domain_idle: Duration::from_millis(config.domain_idle_ms),
            current_gap: interval,
            last_dispatch: None,
            domain_states: HashMap::new(),
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
        self.current_gap = interval;
    }

    /// Draws a new gap uniformly from `interval * (1 ± jitter)`
    ///
    /// The drawn gap is remembered and used by [`RateGovernor::gate`] until the next draw.
    pub fn next_gap(&mut self) -> Duration {
        self.current_gap = if self.jitter > 0.0 {
            let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
            scale_millis(self.interval.as_millis() as u64, factor)
        } else {
            self.interval
        };
        self.current_gap
    }

    /// Delay owed to a domain before it may be requested again
    ///
    /// # Delay Tiers
    ///
    /// | Session requests | Multiplier |
    /// |------------------|------------|
    /// | < 10             | ×1         |
    /// | 10–49            | ×1.5       |
    /// | 50–99            | ×2         |
    /// | ≥ 100            | ×3         |
    ///
    /// A domain never requested, or idle for longer than `domain-idle-ms`,
    /// gets a further ×0.7.
    pub fn domain_delay(&self, domain: &str, now: Instant) -> Duration {
        let (count, idle) = match self.domain_states.get(domain) {
            Some(state) => (state.request_count, state.is_idle(now, self.domain_idle)),
            None => (0, true),
        };

        let mut multiplier = tier_multiplier(count);
        if idle {
            multiplier *= IDLE_DISCOUNT;
        }
        scale_millis(self.base_domain_delay_ms, multiplier)
    }

    /// Earliest instant a request to `domain` may be dispatched
    ///
    /// Held until `max(gap, domain delay)` has elapsed since the previous
    /// dispatch. The first dispatch of a session is never held.
    pub fn gate(&self, domain: Option<&str>, now: Instant) -> Instant {
        let Some(last) = self.last_dispatch else {
            return now;
        };

        let domain_delay = domain
            .map(|d| self.domain_delay(d, now))
            .unwrap_or(Duration::ZERO);
        last + self.current_gap.max(domain_delay)
    }

    /// Records a dispatch to `domain` at `now`
    pub fn record_dispatch(&mut self, domain: Option<&str>, now: Instant) {
        self.last_dispatch = Some(now);
        if let Some(domain) = domain {
            self.domain_states
                .entry(domain.to_string())
                .or_default()
                .record_request(now);
        }
    }
}
