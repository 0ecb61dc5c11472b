//! Process-wide toast notifications.
//!
//! Toasts are published on a [`ToastBus`]. Interested parties hold a
//! [`Subscription`] for as long as they want events and drop it to
//! unsubscribe. The bus also keeps the currently visible toasts so that a
//! request/response client can read them with [`ToastBus::active`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub message: String,
    /// Wizard session the toast belongs to; `None` for global toasts
    pub scope: Option<String>,
    /// `None` keeps the toast until it is dismissed
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastEvent {
    Shown(Toast),
    Dismissed { id: u64 },
}

pub struct ToastBus {
    next_id: AtomicU64,
    active: DashMap<u64, Toast>,
    events: broadcast::Sender<ToastEvent>,
    default_duration: Option<Duration>,
}

impl ToastBus {
    pub fn new() -> Arc<Self> {
        Self::with_default_duration(Some(DEFAULT_TOAST_DURATION))
    }

    pub fn with_default_duration(default_duration: Option<Duration>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            active: DashMap::new(),
            events,
            default_duration,
        })
    }

    /// Publish a toast and return its id. A toast with a duration is
    /// dismissed automatically once it elapses.
    pub fn push(
        self: &Arc<Self>,
        kind: ToastKind,
        message: impl Into<String>,
        scope: Option<&str>,
        duration: Option<Duration>,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let duration = duration.filter(|d| !d.is_zero());
        let toast = Toast {
            id,
            kind,
            message: message.into(),
            scope: scope.map(str::to_string),
            duration_ms: duration.map(|d| d.as_millis() as u64),
            created_at: Utc::now(),
        };
        debug!(toast_id = id, kind = ?kind, scope = ?toast.scope, message = %toast.message, "toast shown");

        self.active.insert(id, toast.clone());
        // no subscribers is fine
        let _ = self.events.send(ToastEvent::Shown(toast));

        if let Some(duration) = duration {
            self.schedule_dismissal(id, duration);
        }
        id
    }

    fn schedule_dismissal(self: &Arc<Self>, id: u64, after: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(toast_id = id, "no async runtime, toast will stay until dismissed");
            return;
        };
        let bus: Weak<Self> = Arc::downgrade(self);
        runtime.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(bus) = bus.upgrade() {
                bus.dismiss(id);
            }
        });
    }

    pub fn success(self: &Arc<Self>, scope: Option<&str>, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Success, message, scope, self.default_duration)
    }

    pub fn error(self: &Arc<Self>, scope: Option<&str>, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Error, message, scope, self.default_duration)
    }

    pub fn info(self: &Arc<Self>, scope: Option<&str>, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Info, message, scope, self.default_duration)
    }

    pub fn warning(self: &Arc<Self>, scope: Option<&str>, message: impl Into<String>) -> u64 {
        self.push(ToastKind::Warning, message, scope, self.default_duration)
    }

    /// Remove a toast. Returns `false` if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        let removed = self.active.remove(&id).is_some();
        if removed {
            let _ = self.events.send(ToastEvent::Dismissed { id });
        }
        removed
    }

    /// Dismiss every toast of a scope, e.g. when its wizard session ends.
    pub fn clear_scope(&self, scope: &str) {
        let ids: Vec<u64> = self
            .active
            .iter()
            .filter(|entry| entry.scope.as_deref() == Some(scope))
            .map(|entry| *entry.key())
            .collect();
        for id in ids {
            self.dismiss(id);
        }
    }

    /// Visible toasts of `scope` plus global ones, oldest first
    pub fn active(&self, scope: Option<&str>) -> Vec<Toast> {
        let mut toasts: Vec<Toast> = self
            .active
            .iter()
            .filter(|entry| entry.scope.is_none() || entry.scope.as_deref() == scope)
            .map(|entry| entry.value().clone())
            .collect();
        toasts.sort_by_key(|toast| toast.id);
        toasts
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.events.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

/// Live feed of toast events. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<ToastEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone. A subscriber that falls
    /// behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<ToastEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "toast subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
