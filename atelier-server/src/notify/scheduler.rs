//! Status notification scheduler
//!
//! Periodic sweep over all orders: first-time sends fire when the order's
//! status differs from the last recorded send (INVOICED guarded by a
//! minimum delay so the email never beats the invoice); reminders fire for
//! reminder-eligible statuses on a fixed cadence with a hard attempt cap.
//! A rate-limited provider aborts the remainder of the sweep.

use super::mailer::{EmailMessage, Mailer, MailerError};
use crate::db::BackofficeStorage;
use crate::tokens::TokenService;
use crate::utils::now_millis;
use serde_json::json;
use shared::models::{OrderRecord, OrderStatus, StatusEmailRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hard cap on sends per (request, status) pair
const MAX_ATTEMPTS: u32 = 3;

/// Scheduler knobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum gap between reminder sends
    pub reminder_interval_ms: i64,
    /// First-time INVOICED sends wait at least this long after the
    /// status change
    pub invoiced_min_delay_ms: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reminder_interval_ms: 72 * 60 * 60 * 1000,
            invoiced_min_delay_ms: 15 * 60 * 1000,
        }
    }
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SweepStats {
    pub examined: u32,
    pub sent: u32,
    pub failed: u32,
    /// Sweep ended early on a provider rate limit
    pub rate_limited: bool,
}

/// Periodic status email sweep
#[derive(Clone)]
pub struct StatusEmailScheduler {
    storage: BackofficeStorage,
    mailer: Arc<dyn Mailer>,
    tokens: TokenService,
    config: SchedulerConfig,
}

impl StatusEmailScheduler {
    pub fn new(
        storage: BackofficeStorage,
        mailer: Arc<dyn Mailer>,
        tokens: TokenService,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            mailer,
            tokens,
            config,
        }
    }

    /// Run the scheduler until shutdown
    pub async fn run(self, period: Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Status email scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    let stats = self.sweep(now_millis()).await;
                    if stats.sent > 0 || stats.failed > 0 {
                        tracing::info!(
                            examined = stats.examined,
                            sent = stats.sent,
                            failed = stats.failed,
                            rate_limited = stats.rate_limited,
                            "Status email sweep finished"
                        );
                    }
                }
            }
        }
    }

    /// One sweep over all orders. Per-order failures are logged and
    /// skipped; only a provider rate limit stops the sweep early.
    pub async fn sweep(&self, now: i64) -> SweepStats {
        let mut stats = SweepStats::default();

        let orders = match self.storage.list_orders() {
            Ok(orders) => orders,
            Err(e) => {
                tracing::error!(error = %e, "Status email sweep could not list orders");
                return stats;
            }
        };

        for order in orders {
            if order.status == OrderStatus::New {
                continue;
            }
            stats.examined += 1;

            match self.process_order(&order, now).await {
                Ok(true) => stats.sent += 1,
                Ok(false) => {}
                Err(MailerError::RateLimited) => {
                    tracing::warn!(
                        request_id = %order.request_id,
                        "Email provider rate limited; aborting sweep"
                    );
                    stats.rate_limited = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %order.request_id,
                        error = %e,
                        "Status email failed; will retry next sweep"
                    );
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Send at most one email for this order. Returns Ok(true) on a send.
    async fn process_order(&self, order: &OrderRecord, now: i64) -> Result<bool, MailerError> {
        let email = match order.details.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) => email,
            None => {
                tracing::warn!(request_id = %order.request_id, "Order has no email address");
                return Ok(false);
            }
        };

        let record = self
            .storage
            .get_status_email(&order.request_id)
            .unwrap_or_default();

        let first_time = record
            .as_ref()
            .map(|r| r.status != order.status)
            .unwrap_or(true);

        if first_time {
            if order.status == OrderStatus::Invoiced
                && now - order.status_updated_at < self.config.invoiced_min_delay_ms
            {
                // The invoice may not be ready yet; pick it up next sweep
                return Ok(false);
            }
        } else if let Some(existing) = record.as_ref() {
            if !order.status.is_reminder_eligible() {
                return Ok(false);
            }
            if existing.attempts >= MAX_ATTEMPTS {
                return Ok(false);
            }
            if now - existing.last_sent_at < self.config.reminder_interval_ms {
                return Ok(false);
            }
        }

        // Cancellable waiting states carry a live cancellation link
        let cancel_url = if order.status.is_reminder_eligible() && order.status.is_cancellable() {
            match self.tokens.find_or_create_cancel_token(
                &order.request_id,
                json!({ "status": order.status }),
                now,
            ) {
                Ok(issued) => Some(issued.url),
                Err(e) => {
                    tracing::error!(
                        request_id = %order.request_id,
                        error = %e,
                        "Could not prepare cancellation link"
                    );
                    None
                }
            }
        } else {
            None
        };

        let message = compose_status_email(order, email, !first_time, cancel_url.as_deref());
        self.mailer.send(&message).await?;

        let updated = match record {
            Some(mut existing) if !first_time => {
                existing.record_attempt(now);
                existing
            }
            _ => StatusEmailRecord::first_send(
                &order.request_id,
                order.status,
                order.status_updated_at,
                now,
            ),
        };
        let attempts = updated.attempts;
        if let Err(e) = self.storage.upsert_status_email(&updated) {
            tracing::error!(request_id = %order.request_id, error = %e, "Could not record status email");
        }

        // Audit trail on the order itself
        let mut order = order.clone();
        let kind = if first_time { "sent" } else { "reminder" };
        order.append_note(
            &format!("status email {} ({}, attempt {})", kind, order.status, attempts),
            now,
        );
        if let Err(e) = self.storage.upsert_order(&order) {
            tracing::error!(request_id = %order.request_id, error = %e, "Could not append email audit note");
        }

        Ok(true)
    }
}

/// Compose the customer-facing status email
fn compose_status_email(
    order: &OrderRecord,
    to: &str,
    reminder: bool,
    cancel_url: Option<&str>,
) -> EmailMessage {
    let name = order.details.name.as_deref().unwrap_or("there");
    let product = order
        .details
        .product_name
        .as_deref()
        .unwrap_or("your order");

    let headline = match order.status {
        OrderStatus::Acknowledged => "We have received your order",
        OrderStatus::PendingConfirmation => "Please confirm your order update",
        OrderStatus::Invoiced => "Your invoice is ready",
        OrderStatus::InvoicePaid => "Payment received",
        OrderStatus::InvoiceExpired => "Your invoice has expired",
        OrderStatus::Processing => "Your piece is in production",
        OrderStatus::Shipped => "Your order is on its way",
        OrderStatus::Delivered => "Your order has been delivered",
        OrderStatus::Cancelled => "Your order has been cancelled",
        OrderStatus::New => "Order update",
    };

    let subject = if reminder {
        format!("Reminder: {} ({})", headline, order.request_id)
    } else {
        format!("{} ({})", headline, order.request_id)
    };

    let mut lines = vec![
        format!("Hello {},", name),
        String::new(),
        format!("{} for {}.", headline, product),
    ];
    if let Some(url) = cancel_url {
        lines.push(String::new());
        lines.push(format!(
            "If you no longer wish to proceed, you can cancel here: {}",
            url
        ));
    }
    lines.push(String::new());
    lines.push("Warm regards,".to_string());
    lines.push("The Atelier".to_string());

    EmailMessage {
        to: to.to_string(),
        subject,
        text_body: lines.join("\n"),
        html_body: None,
        request_id: Some(order.request_id.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every send; can be armed to fail
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail_rate_limited: Mutex<bool>,
        fail_send: Mutex<bool>,
    }

    impl RecordingMailer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_rate_limited: Mutex::new(false),
                fail_send: Mutex::new(false),
            })
        }

        fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailerError> {
            if *self.fail_rate_limited.lock().unwrap() {
                return Err(MailerError::RateLimited);
            }
            if *self.fail_send.lock().unwrap() {
                return Err(MailerError::Send("boom".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn seed_order(storage: &BackofficeStorage, id: &str, status: OrderStatus, updated_at: i64) {
        let mut order = OrderRecord::new(id, 0);
        order.status = status;
        order.status_updated_at = updated_at;
        order.details.email = Some(format!("{}@example.com", id.to_lowercase()));
        order.details.name = Some("Maya".to_string());
        storage.upsert_order(&order).unwrap();
    }

    fn scheduler_with(
        mailer: Arc<RecordingMailer>,
    ) -> (BackofficeStorage, StatusEmailScheduler) {
        let storage = BackofficeStorage::open_in_memory().unwrap();
        let tokens = TokenService::new(storage.clone(), "https://www.example.com");
        let scheduler = StatusEmailScheduler::new(
            storage.clone(),
            mailer,
            tokens,
            SchedulerConfig::default(),
        );
        (storage, scheduler)
    }

    const HOUR: i64 = 60 * 60 * 1000;

    #[tokio::test]
    async fn test_first_time_send_and_dedup() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Acknowledged, 1_000);

        let stats = scheduler.sweep(10_000).await;
        assert_eq!(stats.sent, 1);
        assert_eq!(mailer.sent().len(), 1);
        assert!(mailer.sent()[0].subject.contains("HW-1001"));

        // Same status again: ACKNOWLEDGED is not reminder-eligible
        let stats = scheduler.sweep(10_000 + 100 * HOUR).await;
        assert_eq!(stats.sent, 0);
        assert_eq!(mailer.sent().len(), 1);

        // Audit note landed on the order
        let order = storage.get_order("HW-1001").unwrap().unwrap();
        assert!(order.notes.contains("status email sent"));
    }

    #[tokio::test]
    async fn test_status_change_triggers_new_send() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Acknowledged, 1_000);
        scheduler.sweep(10_000).await;

        let mut order = storage.get_order("HW-1001").unwrap().unwrap();
        order.status = OrderStatus::Shipped;
        order.status_updated_at = 20_000;
        storage.upsert_order(&order).unwrap();

        let stats = scheduler.sweep(30_000).await;
        assert_eq!(stats.sent, 1);
        assert!(mailer.sent()[1].subject.contains("on its way"));
    }

    #[tokio::test]
    async fn test_new_orders_are_skipped() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::New, 1_000);

        let stats = scheduler.sweep(10_000).await;
        assert_eq!(stats.examined, 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_invoiced_min_delay_guard() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Invoiced, 1_000_000);

        // Too soon after the status change
        let stats = scheduler.sweep(1_000_000 + 60_000).await;
        assert_eq!(stats.sent, 0);

        // After the guard window it fires
        let stats = scheduler.sweep(1_000_000 + 16 * 60 * 1000).await;
        assert_eq!(stats.sent, 1);
    }

    #[tokio::test]
    async fn test_reminder_cadence_and_cap() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Invoiced, 0);

        // First send
        assert_eq!(scheduler.sweep(20 * 60 * 1000).await.sent, 1);
        // Within the reminder interval: nothing
        assert_eq!(scheduler.sweep(24 * HOUR).await.sent, 0);
        // Past the interval: reminder #2
        assert_eq!(scheduler.sweep(80 * HOUR).await.sent, 1);
        // Reminder #3 (hits the attempt cap)
        assert_eq!(scheduler.sweep(160 * HOUR).await.sent, 1);
        // Cap reached: no further reminders ever
        assert_eq!(scheduler.sweep(1000 * HOUR).await.sent, 0);

        let record = storage.get_status_email("HW-1001").unwrap().unwrap();
        assert_eq!(record.attempts, 3);
    }

    #[tokio::test]
    async fn test_reminder_carries_cancel_link() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::PendingConfirmation, 0);

        scheduler.sweep(10_000).await;
        let body = &mailer.sent()[0].text_body;
        assert!(body.contains("/order_cancellation?token="));

        // The same live token is reused on the next reminder
        scheduler.sweep(80 * HOUR).await;
        let body2 = &mailer.sent()[1].text_body;
        assert_eq!(
            body.lines().find(|l| l.contains("token=")),
            body2.lines().find(|l| l.contains("token="))
        );
    }

    #[tokio::test]
    async fn test_shipped_email_has_no_cancel_link() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Shipped, 0);

        scheduler.sweep(10_000).await;
        assert!(!mailer.sent()[0].text_body.contains("token="));
    }

    #[tokio::test]
    async fn test_send_failure_does_not_burn_attempts() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Acknowledged, 1_000);

        *mailer.fail_send.lock().unwrap() = true;
        let stats = scheduler.sweep(10_000).await;
        assert_eq!(stats.failed, 1);
        assert!(storage.get_status_email("HW-1001").unwrap().is_none());

        // Next sweep retries successfully
        *mailer.fail_send.lock().unwrap() = false;
        assert_eq!(scheduler.sweep(20_000).await.sent, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_sweep() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        seed_order(&storage, "HW-1001", OrderStatus::Acknowledged, 1_000);
        seed_order(&storage, "HW-1002", OrderStatus::Acknowledged, 1_000);

        *mailer.fail_rate_limited.lock().unwrap() = true;
        let stats = scheduler.sweep(10_000).await;
        assert!(stats.rate_limited);
        assert_eq!(stats.sent, 0);
        // The second order was never attempted
        assert_eq!(stats.examined, 1);
    }

    #[tokio::test]
    async fn test_missing_email_is_skipped() {
        let mailer = RecordingMailer::new();
        let (storage, scheduler) = scheduler_with(mailer.clone());
        let mut order = OrderRecord::new("HW-1001", 0);
        order.status = OrderStatus::Acknowledged;
        storage.upsert_order(&order).unwrap();

        let stats = scheduler.sweep(10_000).await;
        assert_eq!(stats.sent, 0);
        assert_eq!(stats.failed, 0);
    }
}
