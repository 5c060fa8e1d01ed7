//! Active worker bookkeeping and the one-shot shutdown latch

use crate::message::{ControlSignal, WorkerAnnouncement, WorkerEvent, WorkerRole};
use crate::queue::{names, publish, QueueTransport};
use std::collections::BTreeMap;

/// Workers that announced themselves and have not stopped
#[derive(Debug, Default, Clone)]
pub struct WorkerRegistry {
    active: BTreeMap<String, WorkerRole>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an announcement from the control queue
    pub fn apply(&mut self, announcement: &WorkerAnnouncement) {
        match announcement.event {
            WorkerEvent::Started => {
                tracing::info!(
                    "{} worker {} joined",
                    announcement.role.as_str(),
                    announcement.worker_id
                );
                self.active
                    .insert(announcement.worker_id.clone(), announcement.role);
            }
            WorkerEvent::Stopped => {
                if self.active.remove(&announcement.worker_id).is_some() {
                    tracing::info!(
                        "{} worker {} left",
                        announcement.role.as_str(),
                        announcement.worker_id
                    );
                }
            }
        }
    }

    /// Active worker ids in sorted order
    pub fn active_ids(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    pub fn count(&self, role: WorkerRole) -> usize {
        self.active.values().filter(|r| **r == role).count()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Fires at most once per coordinator run
#[derive(Debug, Default, Clone)]
pub struct ShutdownLatch {
    fired: bool,
}

impl ShutdownLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true only on the first call
    pub fn fire(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }
}

/// Sends one terminate signal to every active worker
///
/// Does nothing if the latch already fired. Each signal carries the dedup key
/// `terminate:<worker-id>`, so a repeated send within the dedup window is
/// dropped by the broker as well. Returns the number of signals enqueued.
pub fn signal_shutdown<Q>(
    transport: &Q,
    registry: &WorkerRegistry,
    latch: &mut ShutdownLatch,
    reason: &str,
) -> usize
where
    Q: QueueTransport + ?Sized,
{
    if !latch.fire() {
        tracing::debug!("Shutdown already signalled, ignoring");
        return 0;
    }

    let signal = ControlSignal::terminate(reason);
    let mut sent = 0;

    for worker_id in registry.active_ids() {
        let queue = names::control_for(&worker_id);
        let dedup = format!("terminate:{}", worker_id);
        match publish(transport, &queue, &signal, Some(&dedup), None) {
            Ok(outcome) if outcome.is_enqueued() => {
                tracing::info!("Sent terminate to {}", worker_id);
                sent += 1;
            }
            Ok(_) => tracing::debug!("Terminate for {} was already queued", worker_id),
            Err(e) => tracing::error!("Failed to signal {}: {}", worker_id, e),
        }
    }

    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{BrokerOptions, SqliteBroker};

    fn announcement(id: &str, event: WorkerEvent) -> WorkerAnnouncement {
        WorkerAnnouncement::new(id, WorkerRole::Crawl, event)
    }

    #[test]
    fn test_registry_tracks_start_and_stop() {
        let mut registry = WorkerRegistry::new();
        registry.apply(&announcement("crawl-b", WorkerEvent::Started));
        registry.apply(&announcement("crawl-a", WorkerEvent::Started));
        assert_eq!(registry.active_ids(), vec!["crawl-a", "crawl-b"]);

        registry.apply(&announcement("crawl-b", WorkerEvent::Stopped));
        assert_eq!(registry.active_ids(), vec!["crawl-a"]);
        assert_eq!(registry.count(WorkerRole::Crawl), 1);
        assert_eq!(registry.count(WorkerRole::Index), 0);
    }

    #[test]
    fn test_latch_fires_once() {
        let mut latch = ShutdownLatch::new();
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(!latch.fire());
    }

    #[test]
    fn test_signal_shutdown_once_per_worker() {
        let broker = SqliteBroker::new_in_memory(BrokerOptions::default()).unwrap();
        let mut registry = WorkerRegistry::new();
        registry.apply(&announcement("crawl-1", WorkerEvent::Started));
        registry.apply(&WorkerAnnouncement::new(
            "index-1",
            WorkerRole::Index,
            WorkerEvent::Started,
        ));
        let mut latch = ShutdownLatch::new();

        assert_eq!(signal_shutdown(&broker, &registry, &mut latch, "quiescent"), 2);
        assert_eq!(signal_shutdown(&broker, &registry, &mut latch, "quiescent"), 0);

        assert_eq!(broker.depth(&names::control_for("crawl-1")).unwrap(), 1);
        assert_eq!(broker.depth(&names::control_for("index-1")).unwrap(), 1);
    }
}
