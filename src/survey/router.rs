// src/survey/router.rs
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ami::RawBlock;
use crate::survey::conversation::ConversationTable;
use crate::survey::event::{classify, Classified, DomainEvent};

/// Classifies blocks, keeps the conversation table in step and hands
/// accepted events to the delivery queue.
pub struct EventRouter {
    survey_extension: String,
    table: Arc<ConversationTable>,
    deliveries: mpsc::Sender<DomainEvent>,
}

impl EventRouter {
    pub fn new(
        survey_extension: impl Into<String>,
        table: Arc<ConversationTable>,
        deliveries: mpsc::Sender<DomainEvent>,
    ) -> Self {
        Self {
            survey_extension: survey_extension.into(),
            table,
            deliveries,
        }
    }

    /// Classify one block and apply it to the table.
    ///
    /// Returns the event that should be delivered, if any.
    pub async fn accept(&self, block: &RawBlock) -> Option<DomainEvent> {
        let event = match classify(block, &self.survey_extension) {
            Classified::Event(event) => event,
            Classified::Ignored => return None,
        };

        match &event {
            DomainEvent::AgentStart {
                conversation_id,
                agent_extension,
            } => {
                if !self
                    .table
                    .start(conversation_id, agent_extension, Utc::now())
                    .await
                {
                    debug!(conversation_id = %conversation_id, "Survey call already tracked");
                    return None;
                }
                info!(
                    conversation_id = %conversation_id,
                    "📞 Survey call started by agent {}", agent_extension
                );
            }
            DomainEvent::DigitPressed {
                conversation_id,
                digit,
            } => {
                if self.table.complete(conversation_id).await.is_none() {
                    debug!(conversation_id = %conversation_id, "Keypress for untracked call dropped");
                    return None;
                }
                info!(conversation_id = %conversation_id, "⭐ Survey rated {}", digit);
            }
            DomainEvent::CustomerJoin {
                conversation_id,
                customer_id,
            } => {
                if !self.table.is_live(conversation_id).await {
                    debug!(conversation_id = %conversation_id, "Join for untracked call dropped");
                    return None;
                }
                info!(conversation_id = %conversation_id, "Customer {} joined", customer_id);
            }
        }

        Some(event)
    }

    /// Queue an event for delivery without waiting for room.
    fn dispatch(&self, event: DomainEvent) {
        match self.deliveries.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    conversation_id = %event.conversation_id(),
                    "Delivery queue full, dropping {}", event.kind()
                );
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    conversation_id = %event.conversation_id(),
                    "Delivery worker gone, dropping {}", event.kind()
                );
            }
        }
    }

    pub async fn route(&self, block: &RawBlock) {
        if let Some(event) = self.accept(block).await {
            self.dispatch(event);
        }
    }

    /// Consume the block queue in arrival order until it closes or
    /// shutdown is requested.
    pub async fn run(self, mut blocks: mpsc::Receiver<RawBlock>, shutdown: CancellationToken) {
        loop {
            let block = tokio::select! {
                _ = shutdown.cancelled() => break,
                block = blocks.recv() => block,
            };

            match block {
                Some(block) => self.route(&block).await,
                None => break,
            }
        }

        debug!("Event router stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Duration;

    fn block(raw: &str) -> RawBlock {
        RawBlock::parse(raw)
    }

    const DIAL: &str = "Event: Dial\nDest: 3459\nUniqueid: 111.22\nCallerIDNum: 3868\n";
    const DTMF_4: &str = "Event: DTMF\nUniqueid: 111.22\nDigit: 4\n";
    const DTMF_7: &str = "Event: DTMF\nUniqueid: 111.22\nDigit: 7\n";

    fn router(capacity: usize) -> (EventRouter, Arc<ConversationTable>, mpsc::Receiver<DomainEvent>) {
        let table = Arc::new(ConversationTable::new());
        let (tx, rx) = mpsc::channel(capacity);
        (EventRouter::new("3459", table.clone(), tx), table, rx)
    }

    #[tokio::test]
    async fn test_agent_start_then_rating() {
        let (router, table, mut rx) = router(8);

        router.route(&block(DIAL)).await;
        assert!(table.is_live("111.22").await);

        router.route(&block(DTMF_4)).await;
        assert!(!table.is_live("111.22").await);

        assert_eq!(
            rx.recv().await.unwrap(),
            DomainEvent::AgentStart {
                conversation_id: "111.22".to_string(),
                agent_extension: "3868".to_string(),
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            DomainEvent::DigitPressed {
                conversation_id: "111.22".to_string(),
                digit: "4".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_second_digit_is_ignored() {
        let (router, _table, mut rx) = router(8);

        router.route(&block(DIAL)).await;
        router.route(&block(DTMF_4)).await;
        router.route(&block(DTMF_7)).await;
        drop(router);

        let mut ratings = Vec::new();
        while let Some(event) = rx.recv().await {
            if let DomainEvent::DigitPressed { digit, .. } = event {
                ratings.push(digit);
            }
        }
        assert_eq!(ratings, vec!["4".to_string()]);
    }

    #[tokio::test]
    async fn test_uncorrelated_digit_dropped() {
        let (router, _table, mut rx) = router(8);

        let event = router
            .accept(&block("Event: DTMF\nUniqueid: 999.01\nDigit: 2\n"))
            .await;
        assert!(event.is_none());

        drop(router);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_digit_after_eviction_is_a_miss() {
        let (router, table, _rx) = router(8);

        router.route(&block(DIAL)).await;
        let evicted = table
            .sweep(Utc::now() + chrono::Duration::hours(2), Duration::from_secs(3600))
            .await;
        assert_eq!(evicted, vec!["111.22".to_string()]);

        assert!(router.accept(&block(DTMF_4)).await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_dial_not_redelivered() {
        let (router, _table, _rx) = router(8);

        assert!(router.accept(&block(DIAL)).await.is_some());
        assert!(router.accept(&block(DIAL)).await.is_none());
    }

    #[tokio::test]
    async fn test_customer_join_requires_live_call() {
        let (router, _table, _rx) = router(8);
        let join = block("Event: Join\nUniqueid: 111.22\nCallerIDNum: 5551234\n");

        assert!(router.accept(&join).await.is_none());

        router.accept(&block(DIAL)).await;
        assert_eq!(
            router.accept(&join).await,
            Some(DomainEvent::CustomerJoin {
                conversation_id: "111.22".to_string(),
                customer_id: "5551234".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_full_queue_never_blocks() {
        let (router, table, mut rx) = router(1);

        router.route(&block(DIAL)).await;
        // queue is full; the rating is dropped but the table still moves on
        router.route(&block(DTMF_4)).await;

        assert!(!table.is_live("111.22").await);
        assert!(matches!(rx.recv().await, Some(DomainEvent::AgentStart { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_preserves_order() {
        let (router, _table, mut rx) = router(8);
        let (block_tx, block_rx) = mpsc::channel(8);

        let task = tokio::spawn(router.run(block_rx, CancellationToken::new()));
        block_tx.send(block(DIAL)).await.unwrap();
        block_tx.send(block("Event: Hangup\nUniqueid: 5.5\n")).await.unwrap();
        block_tx.send(block(DTMF_4)).await.unwrap();
        drop(block_tx);
        task.await.unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind())
            .collect();
        assert_eq!(kinds, vec!["agent_start", "digit_pressed"]);
    }
}
