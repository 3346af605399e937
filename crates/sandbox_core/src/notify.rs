//! Notification fan-out for state transitions.
//!
//! # Responsibility
//! - Describe every element/property/schema transition as one `Notification`.
//! - Deliver each notification to all registered sinks (real-time broadcast,
//!   durable work queue).
//!
//! # Invariants
//! - Sinks cannot fail a batch; delivery problems are the sink's concern.
//! - Sink ids are unique within one hub.

use crate::model::element::{ElementId, ElementKind};
use crate::model::visibility::WorkspaceId;
use crate::schema::SchemaKind;
use log::debug;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// One state transition emitted by the sandbox engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    ElementChanged {
        element_kind: ElementKind,
        element_id: ElementId,
        workspace_id: WorkspaceId,
    },
    ElementDeleted {
        element_kind: ElementKind,
        element_id: ElementId,
        workspace_id: WorkspaceId,
    },
    PropertyChanged {
        element_kind: ElementKind,
        element_id: ElementId,
        key: String,
        name: String,
        workspace_id: WorkspaceId,
    },
    SchemaChanged {
        schema_kind: SchemaKind,
        name: String,
        workspace_id: WorkspaceId,
    },
}

impl Notification {
    fn event_name(&self) -> &'static str {
        match self {
            Self::ElementChanged { .. } => "element_changed",
            Self::ElementDeleted { .. } => "element_deleted",
            Self::PropertyChanged { .. } => "property_changed",
            Self::SchemaChanged { .. } => "schema_changed",
        }
    }
}

/// Receiver of sandbox notifications.
pub trait NotificationSink: Send + Sync {
    fn sink_id(&self) -> &str;
    fn deliver(&self, notification: &Notification);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("notification sink already registered: {0}")]
    DuplicateSink(String),
}

/// Fans notifications out to every registered sink in registration order.
#[derive(Default)]
pub struct NotificationHub {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, sink: Arc<dyn NotificationSink>) -> Result<(), NotificationError> {
        if self
            .sinks
            .iter()
            .any(|existing| existing.sink_id() == sink.sink_id())
        {
            return Err(NotificationError::DuplicateSink(sink.sink_id().to_string()));
        }
        self.sinks.push(sink);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn emit(&self, notification: &Notification) {
        debug!(
            "event=notify module=notify status=ok kind={} sinks={}",
            notification.event_name(),
            self.sinks.len()
        );
        for sink in &self.sinks {
            sink.deliver(notification);
        }
    }

    pub fn emit_all(&self, notifications: &[Notification]) {
        for notification in notifications {
            self.emit(notification);
        }
    }
}

/// In-process queue sink; keeps notifications in delivery order.
pub struct MemoryNotificationSink {
    id: String,
    queue: Mutex<Vec<Notification>>,
}

impl MemoryNotificationSink {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            queue: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.queue.lock().clone()
    }

    /// Removes and returns all queued notifications.
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.queue.lock())
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn sink_id(&self) -> &str {
        self.id.as_str()
    }

    fn deliver(&self, notification: &Notification) {
        self.queue.lock().push(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryNotificationSink, Notification, NotificationError, NotificationHub};
    use crate::model::element::ElementKind;
    use std::sync::Arc;

    fn changed(id: &str) -> Notification {
        Notification::ElementChanged {
            element_kind: ElementKind::Vertex,
            element_id: id.to_string(),
            workspace_id: "ws".to_string(),
        }
    }

    #[test]
    fn fans_out_to_every_sink() {
        let broadcast = Arc::new(MemoryNotificationSink::new("broadcast"));
        let queue = Arc::new(MemoryNotificationSink::new("work-queue"));
        let mut hub = NotificationHub::new();
        hub.register(broadcast.clone()).unwrap();
        hub.register(queue.clone()).unwrap();

        hub.emit_all(&[changed("v1"), changed("v2")]);

        assert_eq!(broadcast.snapshot(), vec![changed("v1"), changed("v2")]);
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.snapshot().is_empty());
    }

    #[test]
    fn rejects_duplicate_sink_ids() {
        let mut hub = NotificationHub::new();
        hub.register(Arc::new(MemoryNotificationSink::new("a"))).unwrap();
        let err = hub
            .register(Arc::new(MemoryNotificationSink::new("a")))
            .unwrap_err();
        assert_eq!(err, NotificationError::DuplicateSink("a".to_string()));
    }
}
