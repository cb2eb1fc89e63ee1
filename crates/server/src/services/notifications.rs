//! Outbound notification queue.
//!
//! Notifications are side effects of a committed payment transition. They
//! are handed to a bounded channel and delivered by a single background
//! worker, so a slow or failing provider never delays or fails the request
//! that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use payflow_core::{CurrencyCode, MinorUnits, Money, PaymentOrderId, PaymentStatus};

/// An event raised after the primary transaction has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// A checkout signature was verified and the payment fetched.
    PaymentVerified {
        order_id: Option<PaymentOrderId>,
        remote_order_id: String,
        remote_payment_id: String,
        status: PaymentStatus,
        amount: Option<MinorUnits>,
    },
}

impl OutboundEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PaymentVerified { .. } => "payment_verified",
        }
    }

    /// Human-readable message body.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::PaymentVerified {
                order_id,
                remote_order_id,
                remote_payment_id,
                status,
                amount,
            } => {
                let mut text = format!(
                    "Payment {remote_payment_id} {status} for order {remote_order_id}"
                );
                if let Some(amount) = amount {
                    text.push_str(&format!(" ({})", Money::new(*amount, CurrencyCode::INR)));
                }
                if let Some(id) = order_id {
                    text.push_str(&format!(" [#{id}]"));
                }
                text
            }
        }
    }
}

/// Notification delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Provider rejected or never received the message.
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// A destination for outbound events.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver one event.
    async fn notify(&self, event: &OutboundEvent) -> Result<(), NotifyError>;
}

/// Notifier that only writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &OutboundEvent) -> Result<(), NotifyError> {
        info!(kind = event.kind(), message = %event.message(), "Outbound notification");
        Ok(())
    }
}

/// Sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<OutboundEvent>,
}

impl NotificationQueue {
    /// Start the delivery worker and return the queue handle.
    ///
    /// The worker exits once every queue handle has been dropped and the
    /// remaining events are delivered.
    #[must_use]
    pub fn spawn(notifier: Arc<dyn Notifier>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(receiver, notifier));
        (Self { sender }, worker)
    }

    /// Queue an event without waiting. Never fails the caller.
    pub fn enqueue(&self, event: OutboundEvent) {
        match self.sender.try_send(event) {
            Ok(()) => debug!("Notification queued"),
            Err(TrySendError::Full(event)) => {
                warn!(kind = event.kind(), "Notification queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                error!(kind = event.kind(), "Notification worker stopped, dropping event");
            }
        }
    }
}

async fn run_worker(mut receiver: mpsc::Receiver<OutboundEvent>, notifier: Arc<dyn Notifier>) {
    info!(notifier = notifier.name(), "Notification worker started");

    while let Some(event) = receiver.recv().await {
        match notifier.notify(&event).await {
            Ok(()) => debug!(kind = event.kind(), "Notification delivered"),
            Err(e) => error!(
                kind = event.kind(),
                notifier = notifier.name(),
                error = %e,
                "Failed to deliver notification"
            ),
        }
    }

    info!("Notification worker stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<OutboundEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn notify(&self, event: &OutboundEvent) -> Result<(), NotifyError> {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                return Err(NotifyError::Delivery("provider down".to_string()));
            }
            Ok(())
        }
    }

    fn event(n: u32) -> OutboundEvent {
        OutboundEvent::PaymentVerified {
            order_id: Some(PaymentOrderId::new(7)),
            remote_order_id: "order_ABC".to_string(),
            remote_payment_id: format!("pay_{n}"),
            status: PaymentStatus::Captured,
            amount: Some(MinorUnits::new(50_000)),
        }
    }

    #[test]
    fn test_message() {
        assert_eq!(
            event(1).message(),
            "Payment pay_1 captured for order order_ABC (₹500.00) [#7]"
        );
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order() {
        let notifier = Arc::new(Recording::default());
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 8);

        queue.enqueue(event(1));
        queue.enqueue(event(2));
        drop(queue);
        worker.await.unwrap();

        let events = notifier.events.lock().unwrap();
        assert_eq!(*events, vec![event(1), event(2)]);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_worker_running() {
        let notifier = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 8);

        queue.enqueue(event(1));
        queue.enqueue(event(2));
        drop(queue);
        worker.await.unwrap();

        assert_eq!(notifier.events.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stops_does_not_panic() {
        let notifier = Arc::new(Recording::default());
        let (queue, worker) = NotificationQueue::spawn(notifier, 1);
        worker.abort();
        let _ = worker.await;

        queue.enqueue(event(1));
    }
}
