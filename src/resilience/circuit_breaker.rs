//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: exchange assumed down, calls fail fast
//! - Half-Open: a single probe tests whether the exchange recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow() after cooldown (caller becomes the probe)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (cooldown restarts)
//! Half-Open, non-probe outcome: counters only
//! ```
//!
//! # Design Decisions
//! - One breaker per exchange, created lazily, never removed
//! - Decision and transition happen under the same map entry lock, so only
//!   one caller can claim the probe
//! - In-memory only; resets on restart

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer to "may I call upstream".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Breaker closed; call normally.
    Proceed,
    /// Caller holds the single half-open trial slot.
    ProceedAsProbe,
    /// Do not call upstream.
    Reject,
}

/// Threshold and cooldown for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Breaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    last_failure_at: Option<DateTime<Utc>>,
    trips: u64,
    settings: BreakerSettings,
}

impl Breaker {
    fn new(settings: BreakerSettings) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
            last_failure_at: None,
            trips: 0,
            settings,
        }
    }

    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = false;
        self.trips += 1;
    }

    fn allow_at(&mut self, now: Instant) -> Decision {
        match self.state {
            CircuitState::Closed => Decision::Proceed,
            CircuitState::Open => {
                let cooled_down = match self.opened_at {
                    Some(opened_at) => {
                        now.saturating_duration_since(opened_at) >= self.settings.cooldown
                    }
                    None => true,
                };
                if cooled_down {
                    self.state = CircuitState::HalfOpen;
                    self.probe_in_flight = true;
                    Decision::ProceedAsProbe
                } else {
                    Decision::Reject
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    Decision::Reject
                } else {
                    self.probe_in_flight = true;
                    Decision::ProceedAsProbe
                }
            }
        }
    }

    /// Returns the new state if the call caused a transition.
    ///
    /// Only the probe's own outcome moves a half-open breaker; calls admitted
    /// before the trip update counters and nothing else.
    fn on_success(&mut self, probe: bool) -> Option<CircuitState> {
        self.consecutive_failures = 0;
        match self.state {
            CircuitState::HalfOpen if probe => {
                self.state = CircuitState::Closed;
                self.opened_at = None;
                self.probe_in_flight = false;
                Some(CircuitState::Closed)
            }
            CircuitState::HalfOpen | CircuitState::Open | CircuitState::Closed => None,
        }
    }

    fn on_failure(&mut self, now: Instant, probe: bool) -> Option<CircuitState> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(Utc::now());
        match self.state {
            CircuitState::Closed if self.consecutive_failures >= self.settings.failure_threshold => {
                self.trip(now);
                Some(CircuitState::Open)
            }
            CircuitState::HalfOpen if probe => {
                self.trip(now);
                Some(CircuitState::Open)
            }
            CircuitState::Closed | CircuitState::HalfOpen | CircuitState::Open => None,
        }
    }

    fn snapshot(&self, exchange: &str, now: Instant) -> BreakerSnapshot {
        BreakerSnapshot {
            exchange: exchange.to_string(),
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            open_for_secs: self
                .opened_at
                .filter(|_| self.state != CircuitState::Closed)
                .map(|opened_at| now.saturating_duration_since(opened_at).as_secs_f64()),
            probe_in_flight: self.probe_in_flight,
            last_failure_at: self.last_failure_at,
            trips: self.trips,
        }
    }
}

/// Read-only view of one breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub exchange: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub open_for_secs: Option<f64>,
    pub probe_in_flight: bool,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub trips: u64,
}

/// Registry owning one breaker per exchange key.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Breaker>,
    defaults: BreakerSettings,
    overrides: HashMap<String, BreakerSettings>,
}

impl CircuitBreakerRegistry {
    /// Create a registry where every exchange uses `defaults`.
    pub fn new(defaults: BreakerSettings) -> Self {
        Self::with_overrides(defaults, HashMap::new())
    }

    /// Create a registry with per-exchange settings overrides.
    pub fn with_overrides(
        defaults: BreakerSettings,
        overrides: HashMap<String, BreakerSettings>,
    ) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            overrides,
        }
    }

    /// Settings in effect for an exchange.
    pub fn settings_for(&self, exchange: &str) -> BreakerSettings {
        self.overrides.get(exchange).copied().unwrap_or(self.defaults)
    }

    fn with_breaker<R>(&self, exchange: &str, f: impl FnOnce(&mut Breaker) -> R) -> R {
        if let Some(mut breaker) = self.breakers.get_mut(exchange) {
            return f(&mut breaker);
        }
        let settings = self.settings_for(exchange);
        let mut breaker = self
            .breakers
            .entry(exchange.to_string())
            .or_insert_with(|| Breaker::new(settings));
        f(&mut breaker)
    }

    /// Decide whether a call to the exchange may proceed.
    pub fn allow(&self, exchange: &str) -> Decision {
        let (decision, entered_half_open) = self.with_breaker(exchange, |breaker| {
            let before = breaker.state;
            let decision = breaker.allow_at(Instant::now());
            (decision, before == CircuitState::Open && breaker.state == CircuitState::HalfOpen)
        });

        if entered_half_open {
            tracing::info!(exchange = %exchange, "Circuit breaker half-open, admitting probe");
            metrics::record_breaker_transition(exchange, CircuitState::HalfOpen);
        } else if decision == Decision::Reject {
            tracing::debug!(exchange = %exchange, "Circuit breaker rejected call");
        }
        decision
    }

    /// Record a successful upstream call admitted with `decision`.
    pub fn record_success(&self, exchange: &str, decision: Decision) {
        let probe = decision == Decision::ProceedAsProbe;
        if let Some(state) = self.with_breaker(exchange, |breaker| breaker.on_success(probe)) {
            tracing::info!(exchange = %exchange, state = %state, "Circuit breaker closed after successful probe");
            metrics::record_breaker_transition(exchange, state);
        }
    }

    /// Record a failed or timed-out upstream call admitted with `decision`.
    pub fn record_failure(&self, exchange: &str, decision: Decision) {
        let now = Instant::now();
        let probe = decision == Decision::ProceedAsProbe;
        let (transition, failures) = self.with_breaker(exchange, |breaker| {
            (breaker.on_failure(now, probe), breaker.consecutive_failures)
        });

        match transition {
            Some(state) => {
                tracing::warn!(
                    exchange = %exchange,
                    state = %state,
                    consecutive_failures = failures,
                    "Circuit breaker opened"
                );
                metrics::record_breaker_transition(exchange, state);
            }
            None => {
                tracing::debug!(exchange = %exchange, consecutive_failures = failures, "Upstream failure recorded");
            }
        }
    }

    /// Give back a probe slot whose call was cancelled before completing.
    ///
    /// The breaker stays half-open so the next caller becomes the probe.
    pub fn release_probe(&self, exchange: &str) {
        let released = self.with_breaker(exchange, |breaker| {
            let held = breaker.state == CircuitState::HalfOpen && breaker.probe_in_flight;
            if held {
                breaker.probe_in_flight = false;
            }
            held
        });
        if released {
            tracing::debug!(exchange = %exchange, "Cancelled probe released");
        }
    }

    /// Current state; unknown exchanges are closed.
    pub fn state(&self, exchange: &str) -> CircuitState {
        self.breakers
            .get(exchange)
            .map(|breaker| breaker.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn consecutive_failures(&self, exchange: &str) -> u32 {
        self.breakers
            .get(exchange)
            .map(|breaker| breaker.consecutive_failures)
            .unwrap_or(0)
    }

    /// Snapshot of one exchange, whether or not it has been referenced yet.
    pub fn snapshot_for(&self, exchange: &str) -> BreakerSnapshot {
        let now = Instant::now();
        match self.breakers.get(exchange) {
            Some(breaker) => breaker.snapshot(exchange, now),
            None => Breaker::new(self.settings_for(exchange)).snapshot(exchange, now),
        }
    }

    /// Snapshots of all referenced exchanges, sorted by key.
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let now = Instant::now();
        let mut out: Vec<BreakerSnapshot> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot(entry.key(), now))
            .collect();
        out.sort_by(|a, b| a.exchange.cmp(&b.exchange));
        out
    }

    /// Return an exchange to the closed state.
    pub fn reset(&self, exchange: &str) {
        if let Some(mut breaker) = self.breakers.get_mut(exchange) {
            let settings = breaker.settings;
            *breaker = Breaker::new(settings);
            tracing::info!(exchange = %exchange, "Circuit breaker reset");
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}
