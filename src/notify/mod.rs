//! Best-effort change notifications for connected clients.
//!
//! Delivery is fire-and-forget. Consumers treat a message as a hint to
//! re-query and must tolerate duplicates and gaps.

use std::sync::mpsc::Sender;
use std::sync::Mutex;

use serde::Serialize;

use crate::types::{now_micros, TenantId};

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    EdgeCreated,
    EdgeUpdated,
    EdgeDeleted,
    ScoreUpdated,
}

impl NotificationKind {
    /// Wire name of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EdgeCreated => "EDGE_CREATED",
            Self::EdgeUpdated => "EDGE_UPDATED",
            Self::EdgeDeleted => "EDGE_DELETED",
            Self::ScoreUpdated => "SCORE_UPDATED",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One change message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub tenant: TenantId,
    pub payload: serde_json::Value,
    /// Unix epoch microseconds.
    pub timestamp: u64,
}

impl Notification {
    /// Create a message stamped with the current time.
    pub fn new(kind: NotificationKind, tenant: &TenantId, payload: serde_json::Value) -> Self {
        Self {
            kind,
            tenant: tenant.clone(),
            payload,
            timestamp: now_micros(),
        }
    }
}

/// Sink for change notifications. Must never block or fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: Notification) {}
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        log::info!(
            "{} tenant={} payload={}",
            notification.kind,
            notification.tenant,
            notification.payload
        );
    }
}

/// Forwards notifications over an mpsc channel; dropped once the receiver is gone.
pub struct ChannelNotifier {
    sender: Mutex<Sender<Notification>>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<Notification>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = sender.send(notification) {
            log::warn!("dropped {} notification: receiver gone", e.0.kind);
        }
    }
}
