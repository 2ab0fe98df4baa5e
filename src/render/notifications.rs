//! Transient notification banners.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

/// Kind of a notification banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    /// Returns an emoji representation of the kind.
    pub fn emoji(&self) -> &'static str {
        match self {
            NotificationKind::Success => "✅",
            NotificationKind::Warning => "⚠️",
            NotificationKind::Error => "❌",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "Success"),
            NotificationKind::Warning => write!(f, "Warning"),
            NotificationKind::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Live notifications. Each one expires after the configured TTL or when
/// the user dismisses it, whichever comes first.
#[derive(Debug)]
pub struct NotificationCenter {
    ttl: Duration,
    next_id: u64,
    active: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            // Out-of-range TTLs mean "never expire"
            ttl: i64::try_from(ttl_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            next_id: 1,
            active: Vec::new(),
        }
    }

    /// Add a notification and return its id.
    pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>, now: DateTime<Utc>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.active.push(Notification {
            id,
            kind,
            message: message.into(),
            created_at: now,
        });
        id
    }

    /// Remove a notification. Returns false if it was already gone.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        self.active.len() != before
    }

    /// Drop expired notifications and return how many were removed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.active.len();
        self.active.retain(|n| now - n.created_at < ttl);
        before - self.active.len()
    }

    /// Notifications still visible at `now`.
    pub fn active(&mut self, now: DateTime<Utc>) -> &[Notification] {
        self.expire(now);
        &self.active
    }
}
