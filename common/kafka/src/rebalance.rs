use std::sync::{Arc, Condvar, Mutex};

use rdkafka::consumer::{ConsumerContext, Rebalance};
use rdkafka::error::KafkaResult;
use rdkafka::{ClientContext, TopicPartitionList};
use tracing::{debug, info, warn};

/// Defers partition reassignment while a batch is in flight.
///
/// Offset bookkeeping for a batch is only valid while the partitions it was
/// fetched from stay assigned to this consumer. The gate is acquired when a
/// batch is handed out and released when the batch is dropped, so the group
/// protocol can only move partitions between cycles.
#[derive(Clone, Default)]
pub struct RebalanceGate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    paused: Mutex<bool>,
    released: Condvar,
}

impl RebalanceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds group rebalancing back until the returned guard is dropped.
    pub fn pause(&self) -> RebalancePause {
        let mut paused = self.inner.paused.lock().expect("poisoned rebalance gate");
        *paused = true;
        RebalancePause {
            gate: Some(self.inner.clone()),
        }
    }

    /// Parks the caller until no batch is in flight. Runs on the rdkafka
    /// callback thread, never on the consumer loop itself.
    pub fn wait_until_released(&self) {
        let mut paused = self.inner.paused.lock().expect("poisoned rebalance gate");
        while *paused {
            paused = self
                .inner
                .released
                .wait(paused)
                .expect("poisoned rebalance gate");
        }
    }
}

/// RAII guard over the rebalance gate. Dropping it releases the gate on
/// every exit path, error paths included.
pub struct RebalancePause {
    gate: Option<Arc<GateInner>>,
}

impl RebalancePause {
    /// A pause that guards nothing, for sources without a rebalance protocol.
    pub fn disabled() -> Self {
        Self { gate: None }
    }
}

impl Drop for RebalancePause {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            let mut paused = gate.paused.lock().expect("poisoned rebalance gate");
            *paused = false;
            gate.released.notify_all();
        }
    }
}

/// Consumer context that blocks rebalances on the gate and logs group
/// protocol activity and commit outcomes.
pub struct BatchConsumerContext {
    gate: RebalanceGate,
}

impl BatchConsumerContext {
    pub fn new(gate: RebalanceGate) -> Self {
        Self { gate }
    }
}

impl ClientContext for BatchConsumerContext {}

impl ConsumerContext for BatchConsumerContext {
    fn pre_rebalance(&self, rebalance: &Rebalance<'_>) {
        self.gate.wait_until_released();
        match rebalance {
            Rebalance::Assign(tpl) => info!("rebalance: assigning {} partitions", tpl.count()),
            Rebalance::Revoke(tpl) => info!("rebalance: revoking {} partitions", tpl.count()),
            Rebalance::Error(err) => warn!("rebalance error: {}", err),
        }
    }

    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        if let Rebalance::Assign(tpl) = rebalance {
            info!("rebalance complete, {} partitions assigned", tpl.count());
        }
    }

    fn commit_callback(&self, result: KafkaResult<()>, _offsets: &TopicPartitionList) {
        match result {
            Ok(()) => debug!("offsets committed"),
            Err(err) => warn!("offset commit failed: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn wait_passes_when_gate_is_free() {
        let gate = RebalanceGate::new();
        // Returns immediately, nothing is paused.
        gate.wait_until_released();
    }

    #[test]
    fn dropping_the_pause_releases_waiters() {
        let gate = RebalanceGate::new();
        let pause = gate.pause();

        let released = Arc::new(AtomicBool::new(false));
        let waiter = {
            let gate = gate.clone();
            let released = released.clone();
            std::thread::spawn(move || {
                gate.wait_until_released();
                released.store(true, Ordering::SeqCst);
            })
        };

        std::thread::sleep(Duration::from_millis(50));
        assert!(!released.load(Ordering::SeqCst), "gate released too early");

        drop(pause);
        waiter.join().expect("waiter thread panicked");
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn disabled_pause_does_not_touch_the_gate() {
        let gate = RebalanceGate::new();
        let _pause = RebalancePause::disabled();
        gate.wait_until_released();
    }
}
