//! Circuit breaker gating calls to the remote engine.
//!
//! Closed: calls pass, failures are counted. Reaching the threshold opens
//! the circuit. Open: calls are refused until the cooldown elapses, then a
//! single probe is let through (HalfOpen). Probe success closes the circuit
//! and raises a one-shot "restored" flag; probe failure reopens it and
//! restarts the cooldown.

use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Monotonic time source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    state: CircuitState,
    failures: u32,
    threshold: u32,
    cooldown: Duration,
    opened_at: Option<Instant>,
    just_restored: bool,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            threshold: threshold.max(1),
            cooldown,
            opened_at: None,
            just_restored: false,
            clock,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_COOLDOWN, Arc::new(SystemClock))
    }

    /// Whether a remote call may be attempted now. Moves Open to HalfOpen
    /// once the cooldown has elapsed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map_or(Duration::MAX, |t| self.clock.now().saturating_duration_since(t));
                if elapsed >= self.cooldown {
                    log::info!("circuit half-open, probing remote engine");
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state != CircuitState::Closed {
            log::info!("remote engine restored, circuit closed");
            self.just_restored = true;
        }
        self.state = CircuitState::Closed;
        self.failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
        let reopen = self.state == CircuitState::HalfOpen;
        if reopen || self.failures >= self.threshold {
            if self.state != CircuitState::Open {
                log::warn!(
                    "circuit open after {} failures, cooldown {:?}",
                    self.failures,
                    self.cooldown
                );
            }
            self.state = CircuitState::Open;
            self.opened_at = Some(self.clock.now());
        }
    }

    /// One-shot: true once after a probe closed the circuit.
    pub fn take_restored(&mut self) -> bool {
        std::mem::take(&mut self.just_restored)
    }

    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state)
            .field("failures", &self.failures)
            .field("threshold", &self.threshold)
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}
