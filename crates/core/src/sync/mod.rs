//! Best-effort post-commit notifications to external financial systems.
//!
//! A committed posting enqueues a [`DepositNotification`] on a bounded
//! channel and returns immediately. A background task delivers it through a
//! [`FinancialAccountSync`] client, retrying with exponential backoff. No
//! outcome of delivery ever reaches the ledger: failures are logged and the
//! notification is eventually dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use settla_shared::SyncConfig;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Upper bound on the delay between two delivery attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A merchant deposit cleared by a committed journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositNotification {
    /// The merchant credited.
    pub merchant_id: String,
    /// The order that produced the deposit.
    pub order_id: String,
    /// The order number.
    pub order_no: String,
    /// Voucher number of the committed entry.
    pub entry_no: String,
    /// Gross payment amount.
    pub gross_amount: i64,
    /// Amount payable to the merchant.
    pub merchant_amount: i64,
    /// Platform fee retained.
    pub platform_fee: i64,
    /// Fee charged by the payment channel.
    pub channel_cost: i64,
}

/// Errors reported by an external sync client.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote system could not be reached; worth retrying.
    #[error("Financial account service unavailable: {0}")]
    Unavailable(String),

    /// The remote system refused the notification; retrying will not help.
    #[error("Financial account service rejected notification: {0}")]
    Rejected(String),
}

impl SyncError {
    /// Returns true if delivery should be attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Client of the external financial-account context.
#[async_trait]
pub trait FinancialAccountSync: Send + Sync {
    /// Notifies the external system of a merchant deposit.
    async fn notify_deposit(&self, notification: &DepositNotification) -> Result<(), SyncError>;
}

/// Enqueues notifications for background delivery.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    sender: mpsc::Sender<DepositNotification>,
}

impl SyncHandle {
    /// Enqueues a notification without waiting.
    ///
    /// Returns false if the queue is full or the dispatcher has stopped; the
    /// notification is dropped with a warning in that case.
    pub fn enqueue(&self, notification: DepositNotification) -> bool {
        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(entry_no = %n.entry_no, "sync queue full, dropping deposit notification");
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(entry_no = %n.entry_no, "sync dispatcher stopped, dropping deposit notification");
                false
            }
        }
    }
}

/// Background delivery of deposit notifications.
pub struct SyncDispatcher {
    client: Arc<dyn FinancialAccountSync>,
    max_attempts: u32,
    base_backoff: Duration,
}

impl SyncDispatcher {
    /// Starts the dispatcher task, or returns `None` when sync is disabled.
    ///
    /// The task ends once every [`SyncHandle`] is dropped and the queue is
    /// drained.
    #[must_use]
    pub fn spawn(
        client: Arc<dyn FinancialAccountSync>,
        config: &SyncConfig,
    ) -> Option<(SyncHandle, JoinHandle<()>)> {
        if !config.enabled {
            info!("deposit sync disabled");
            return None;
        }

        let (sender, mut receiver) = mpsc::channel(config.queue_capacity.max(1));
        let dispatcher = Self {
            client,
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
        };

        let task = tokio::spawn(async move {
            while let Some(notification) = receiver.recv().await {
                dispatcher.deliver(&notification).await;
            }
            debug!("sync dispatcher stopped");
        });

        Some((SyncHandle { sender }, task))
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`, capped.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }

    /// Delivers one notification; returns true on success.
    async fn deliver(&self, notification: &DepositNotification) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.client.notify_deposit(notification).await {
                Ok(()) => {
                    debug!(entry_no = %notification.entry_no, attempt, "deposit notification delivered");
                    return true;
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        entry_no = %notification.entry_no,
                        attempt,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "deposit notification failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    error!(
                        entry_no = %notification.entry_no,
                        merchant_id = %notification.merchant_id,
                        attempt,
                        error = %err,
                        "giving up on deposit notification"
                    );
                    return false;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    struct FlakyClient {
        failures_before_success: u32,
        calls: AtomicU32,
        delivered: Mutex<Vec<DepositNotification>>,
        reject: bool,
    }

    impl FlakyClient {
        fn new(failures_before_success: u32) -> Self {
            Self {
                failures_before_success,
                calls: AtomicU32::new(0),
                delivered: Mutex::new(Vec::new()),
                reject: false,
            }
        }
    }

    #[async_trait]
    impl FinancialAccountSync for FlakyClient {
        async fn notify_deposit(
            &self,
            notification: &DepositNotification,
        ) -> Result<(), SyncError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(SyncError::Rejected("unknown merchant".into()));
            }
            if call < self.failures_before_success {
                return Err(SyncError::Unavailable("connection refused".into()));
            }
            self.delivered.lock().await.push(notification.clone());
            Ok(())
        }
    }

    fn config(max_attempts: u32) -> SyncConfig {
        SyncConfig {
            enabled: true,
            queue_capacity: 16,
            max_attempts,
            base_backoff_ms: 1,
        }
    }

    fn notification(entry_no: &str) -> DepositNotification {
        DepositNotification {
            merchant_id: "1001".into(),
            order_id: "O1".into(),
            order_no: "NO-1".into(),
            entry_no: entry_no.into(),
            gross_amount: 10_000,
            merchant_amount: 9_940,
            platform_fee: 60,
            channel_cost: 25,
        }
    }

    #[tokio::test]
    async fn test_retries_until_delivered() {
        let client = Arc::new(FlakyClient::new(2));
        let (handle, task) = SyncDispatcher::spawn(client.clone(), &config(5)).unwrap();

        assert!(handle.enqueue(notification("JE1")));
        drop(handle);
        task.await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let client = Arc::new(FlakyClient::new(u32::MAX));
        let (handle, task) = SyncDispatcher::spawn(client.clone(), &config(3)).unwrap();

        handle.enqueue(notification("JE1"));
        handle.enqueue(notification("JE2"));
        drop(handle);
        task.await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 6);
        assert!(client.delivered.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejection_is_not_retried() {
        let mut client = FlakyClient::new(0);
        client.reject = true;
        let client = Arc::new(client);
        let (handle, task) = SyncDispatcher::spawn(client.clone(), &config(5)).unwrap();

        handle.enqueue(notification("JE1"));
        drop(handle);
        task.await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_sync_spawns_nothing() {
        let client = Arc::new(FlakyClient::new(0));
        let disabled = SyncConfig {
            enabled: false,
            ..config(5)
        };

        assert!(SyncDispatcher::spawn(client.clone(), &disabled).is_none());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (sender, _receiver) = mpsc::channel(1);
        let handle = SyncHandle { sender };

        assert!(handle.enqueue(notification("JE1")));
        assert!(!handle.enqueue(notification("JE2")));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let dispatcher = SyncDispatcher {
            client: Arc::new(FlakyClient::new(0)),
            max_attempts: 5,
            base_backoff: Duration::from_millis(200),
        };
        assert_eq!(dispatcher.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(dispatcher.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(dispatcher.delay_for_attempt(3), Duration::from_millis(800));
        assert_eq!(dispatcher.delay_for_attempt(40), MAX_BACKOFF);
    }
}
