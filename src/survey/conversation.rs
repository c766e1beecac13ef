// src/survey/conversation.rs
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Started,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub agent_extension: String,
    pub created_at: DateTime<Utc>,
    pub state: ConversationState,
}

/// Live survey calls keyed by call id.
///
/// Shared by the router and the sweeper; every operation takes the lock
/// once and never awaits while holding it.
#[derive(Debug, Default)]
pub struct ConversationTable {
    records: Mutex<HashMap<String, ConversationRecord>>,
}

impl ConversationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new survey call. Returns `false` if the id is already live.
    pub async fn start(
        &self,
        conversation_id: &str,
        agent_extension: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let mut records = self.records.lock().await;

        if records.contains_key(conversation_id) {
            return false;
        }

        records.insert(
            conversation_id.to_string(),
            ConversationRecord {
                conversation_id: conversation_id.to_string(),
                agent_extension: agent_extension.to_string(),
                created_at: now,
                state: ConversationState::Started,
            },
        );
        true
    }

    /// Complete a live call and drop it from the table.
    ///
    /// Returns the completed record the first time; `None` for unknown or
    /// already completed ids.
    pub async fn complete(&self, conversation_id: &str) -> Option<ConversationRecord> {
        let mut records = self.records.lock().await;

        let mut record = records.remove(conversation_id)?;
        record.state = ConversationState::Completed;
        Some(record)
    }

    pub async fn is_live(&self, conversation_id: &str) -> bool {
        self.records.lock().await.contains_key(conversation_id)
    }

    pub async fn get(&self, conversation_id: &str) -> Option<ConversationRecord> {
        self.records.lock().await.get(conversation_id).cloned()
    }

    /// Remove records older than `ttl`, returning their ids.
    pub async fn sweep(&self, now: DateTime<Utc>, ttl: Duration) -> Vec<String> {
        let mut records = self.records.lock().await;
        let mut evicted = Vec::new();

        records.retain(|id, record| {
            let expired = now
                .signed_duration_since(record.created_at)
                .to_std()
                .map_or(false, |age| age > ttl);
            if expired {
                evicted.push(id.clone());
            }
            !expired
        });

        evicted
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

/// Periodically evict conversations that never completed.
pub async fn run_sweeper(
    table: Arc<ConversationTable>,
    ttl: Duration,
    every: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let evicted = table.sweep(Utc::now(), ttl).await;
        if !evicted.is_empty() {
            info!("🧹 Evicted {} abandoned conversations", evicted.len());
            debug!("Evicted conversation ids: {:?}", evicted);
        }
    }

    debug!("Conversation sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(n: i64) -> chrono::Duration {
        chrono::Duration::minutes(n)
    }

    #[tokio::test]
    async fn test_start_and_complete() {
        let table = ConversationTable::new();
        let now = Utc::now();

        assert!(table.start("111.22", "3868", now).await);
        assert!(table.is_live("111.22").await);

        let record = table.complete("111.22").await.unwrap();
        assert_eq!(record.state, ConversationState::Completed);
        assert_eq!(record.agent_extension, "3868");
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn test_complete_is_terminal() {
        let table = ConversationTable::new();
        table.start("111.22", "3868", Utc::now()).await;

        assert!(table.complete("111.22").await.is_some());
        assert!(table.complete("111.22").await.is_none());
    }

    #[tokio::test]
    async fn test_complete_unknown() {
        let table = ConversationTable::new();
        assert!(table.complete("999.01").await.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_start_keeps_first() {
        let table = ConversationTable::new();
        let first = Utc::now();

        assert!(table.start("111.22", "3868", first).await);
        assert!(!table.start("111.22", "4000", first + minutes(1)).await);

        let record = table.get("111.22").await.unwrap();
        assert_eq!(record.agent_extension, "3868");
        assert_eq!(record.created_at, first);
        assert_eq!(table.len().await, 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_only() {
        let table = ConversationTable::new();
        let now = Utc::now();

        table.start("old", "1", now - minutes(90)).await;
        table.start("fresh", "2", now - minutes(5)).await;

        let evicted = table.sweep(now, Duration::from_secs(3600)).await;
        assert_eq!(evicted, vec!["old".to_string()]);
        assert!(!table.is_live("old").await);
        assert!(table.is_live("fresh").await);
    }

    #[tokio::test]
    async fn test_sweep_ignores_future_timestamps() {
        let table = ConversationTable::new();
        let now = Utc::now();
        table.start("skewed", "1", now + minutes(10)).await;

        assert!(table.sweep(now, Duration::from_secs(1)).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_evicts() {
        let table = Arc::new(ConversationTable::new());
        table.start("abandoned", "1", Utc::now() - minutes(10)).await;

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_sweeper(
            table.clone(),
            Duration::from_secs(60),
            Duration::from_secs(30),
            shutdown.clone(),
        ));

        // first tick fires immediately
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(table.is_empty().await);

        shutdown.cancel();
        task.await.unwrap();
    }
}
