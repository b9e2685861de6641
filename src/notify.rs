// 11.0: every terminal submission outcome produces exactly one notification.
// the Notifier trait is the seam to whatever toast / log surface the host has.

use crate::types::{Symbol, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    Success,
    PartialSuccess,
    RateLimited,
    // venue said no: margin, malformed order, explicit rejection
    HardFailure,
    // network, timeout, anything unclassified
    Generic,
}

impl NotificationKind {
    // a full rejection with mixed causes reports the highest: hard > rate limited > generic
    pub fn severity(&self) -> u8 {
        match self {
            NotificationKind::Success => 0,
            NotificationKind::PartialSuccess => 1,
            NotificationKind::Generic => 2,
            NotificationKind::RateLimited => 3,
            NotificationKind::HardFailure => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub symbol: Symbol,
    pub kind: NotificationKind,
    pub message: String,
    pub timestamp: Timestamp,
}

impl Notification {
    pub fn new(symbol: Symbol, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            symbol,
            kind,
            message: message.into(),
            timestamp: Timestamp::now(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Routes notifications into the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success | NotificationKind::PartialSuccess => tracing::info!(
                symbol = %notification.symbol,
                kind = ?notification.kind,
                "{}",
                notification.message
            ),
            _ => tracing::warn!(
                symbol = %notification.symbol,
                kind = ?notification.kind,
                "{}",
                notification.message
            ),
        }
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct NotificationCollector {
    notifications: Mutex<Vec<Notification>>,
}

impl NotificationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.notifications.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.lock().is_empty()
    }

    pub fn clear(&self) {
        self.notifications.lock().clear();
    }
}

impl Notifier for NotificationCollector {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_keeps_order() {
        let collector = NotificationCollector::new();
        collector.notify(Notification::new(Symbol::new("BTC-PERP"), NotificationKind::Success, "placed"));
        collector.notify(Notification::new(Symbol::new("BTC-PERP"), NotificationKind::RateLimited, "slow down"));

        let all = collector.notifications();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, NotificationKind::Success);
        assert_eq!(all[1].message, "slow down");

        collector.clear();
        assert!(collector.is_empty());
    }

    #[test]
    fn hard_failure_outranks_other_failures() {
        assert!(NotificationKind::HardFailure.severity() > NotificationKind::RateLimited.severity());
        assert!(NotificationKind::RateLimited.severity() > NotificationKind::Generic.severity());
        assert!(NotificationKind::Generic.severity() > NotificationKind::PartialSuccess.severity());
    }
}
