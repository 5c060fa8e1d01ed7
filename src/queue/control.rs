//! Worker control plane: announcements and per-worker termination

use crate::message::{
    decode, ControlSignal, Signal, WorkerAnnouncement, WorkerEvent, WorkerRole,
};
use crate::queue::{names, publish, QueueResult, QueueTransport};

/// Why a worker loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The coordinator sent a terminate signal
    Terminated,
    /// Too many consecutive empty pulls
    Idle,
}

/// Posts a lifecycle announcement on the shared control queue
pub fn announce<Q>(
    transport: &Q,
    worker_id: &str,
    role: WorkerRole,
    event: WorkerEvent,
) -> QueueResult<()>
where
    Q: QueueTransport + ?Sized,
{
    let announcement = WorkerAnnouncement::new(worker_id, role, event);
    publish(transport, names::CONTROL, &announcement, None, None)?;
    tracing::debug!("Announced {:?} for {} worker {}", event, role.as_str(), worker_id);
    Ok(())
}

/// Drains a worker's own control queue without waiting
///
/// Returns true if a terminate signal was among the messages. Every message,
/// malformed ones included, is acknowledged.
pub fn terminate_requested<Q>(transport: &Q, worker_id: &str) -> bool
where
    Q: QueueTransport + ?Sized,
{
    let queue = names::control_for(worker_id);
    let batch = match transport.try_receive(&queue, 10) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Failed to poll {}: {}", queue, e);
            return false;
        }
    };

    let mut terminate = false;
    for delivery in batch {
        match decode::<ControlSignal>(&delivery.body) {
            Ok(signal) => {
                if signal.signal == Signal::Terminate {
                    tracing::info!("Worker {} received terminate: {}", worker_id, signal.reason);
                    terminate = true;
                }
            }
            Err(e) => tracing::warn!("Discarding malformed control message on {}: {}", queue, e),
        }

        if let Err(e) = transport.ack(&queue, &delivery.receipt) {
            tracing::warn!("Failed to ack control message on {}: {}", queue, e);
        }
    }

    terminate
}
