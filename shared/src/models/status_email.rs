//! Per-(request, status) dedup/retry record for status notifications

use super::order::OrderStatus;
use serde::{Deserialize, Serialize};

/// Tracks the last notification sent for an order so the scheduler can
/// distinguish first-time sends from reminders and cap retry attempts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEmailRecord {
    pub request_id: String,
    /// Order status the last email was sent for
    pub status: OrderStatus,
    /// The order's status_updated_at at send time (unix millis)
    pub status_updated_at: i64,
    /// Unix millis of the last send
    pub last_sent_at: i64,
    /// Sends recorded for this status value
    pub attempts: u32,
}

impl StatusEmailRecord {
    pub fn first_send(
        request_id: impl Into<String>,
        status: OrderStatus,
        status_updated_at: i64,
        now: i64,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            status_updated_at,
            last_sent_at: now,
            attempts: 1,
        }
    }

    /// Record one more send for the same status value
    pub fn record_attempt(&mut self, now: i64) {
        self.attempts += 1;
        self.last_sent_at = now;
    }
}
