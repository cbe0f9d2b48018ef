//! Gate configuration.

use std::time::Duration;

use crate::error::{GateError, Result};

/// Configuration for a [`SequenceGate`](crate::SequenceGate).
///
/// The defaults reproduce the plain reassembly behaviour: unbounded inboxes
/// and lanes that live for the lifetime of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Maximum stanzas parked per principal. `None` = unbounded.
    pub max_pending_per_principal: Option<usize>,
    /// Lanes untouched for this long are evicted by the sweeper. `None` = never.
    pub idle_timeout: Option<Duration>,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_pending_per_principal: None,
            idle_timeout: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl GateConfig {
    /// Bound each principal's inbox.
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending_per_principal = Some(max);
        self
    }

    /// Evict lanes idle for longer than `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set the sweeper period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Reject settings that would make the gate useless.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_per_principal == Some(0) {
            return Err(GateError::InvalidConfig(
                "max_pending_per_principal must be at least 1".into(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(GateError::InvalidConfig(
                "sweep_interval must be non-zero".into(),
            ));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(GateError::InvalidConfig(
                "idle_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
