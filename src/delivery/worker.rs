// src/delivery/worker.rs
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::delivery::client::Notifier;
use crate::survey::DomainEvent;

/// Deliver queued events one at a time, in queue order.
///
/// Failures are logged and dropped. The worker exits once every sender is
/// gone and the queue is drained.
pub async fn run_delivery_worker(notifier: Arc<dyn Notifier>, mut events: mpsc::Receiver<DomainEvent>) {
    while let Some(event) = events.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            warn!(
                conversation_id = %event.conversation_id(),
                "❌ Failed to deliver {}: {}", event.kind(), e
            );
        }
    }

    debug!("Delivery worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::client::MockNotifier;
    use crate::error::DeliveryError;
    use mockall::Sequence;

    fn start(id: &str) -> DomainEvent {
        DomainEvent::AgentStart {
            conversation_id: id.to_string(),
            agent_extension: "3868".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let mut notifier = MockNotifier::new();
        let mut seq = Sequence::new();

        notifier
            .expect_notify()
            .withf(|e| e.conversation_id() == "1")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DeliveryError::HttpError(500)));
        notifier
            .expect_notify()
            .withf(|e| e.conversation_id() == "2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DeliveryError::Timeout(2000)));
        notifier
            .expect_notify()
            .withf(|e| e.conversation_id() == "3")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let (tx, rx) = mpsc::channel(8);
        for id in ["1", "2", "3"] {
            tx.send(start(id)).await.unwrap();
        }
        drop(tx);

        run_delivery_worker(Arc::new(notifier), rx).await;
    }

    #[tokio::test]
    async fn test_no_retry_on_failure() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(DeliveryError::Connection("refused".into())));

        let (tx, rx) = mpsc::channel(1);
        tx.send(start("1")).await.unwrap();
        drop(tx);

        run_delivery_worker(Arc::new(notifier), rx).await;
    }
}
