//! Background eviction of idle lanes.
//!
//! A principal whose gap never closes keeps its inbox forever. The sweeper
//! bounds that by periodically calling [`SequenceGate::evict_idle`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::delivery::Delivery;
use crate::gate::SequenceGate;

/// Spawn the idle-lane sweeper on the current tokio runtime.
///
/// Returns `None` when the gate has no `idle_timeout` configured. The task
/// holds only a weak reference and exits once the gate is dropped.
pub fn spawn_sweeper<R, P, D>(gate: &Arc<SequenceGate<R, P, D>>) -> Option<JoinHandle<()>>
where
    R: Send + 'static,
    P: Send + 'static,
    D: Delivery<R, P> + 'static,
{
    let idle_timeout = gate.config().idle_timeout?;
    let period = gate.config().sweep_interval;

    Some(tokio::spawn(sweep_task(Arc::downgrade(gate), period, idle_timeout)))
}

async fn sweep_task<R, P, D>(
    gate: Weak<SequenceGate<R, P, D>>,
    period: Duration,
    max_idle: Duration,
) where
    D: Delivery<R, P>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let Some(gate) = gate.upgrade() else {
            debug!("gate dropped, stopping sweeper");
            return;
        };

        let evicted = gate.evict_idle(max_idle);
        if evicted > 0 {
            info!(evicted, remaining = gate.len(), "swept idle sequencing lanes");
        }
    }
}
