use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Disabled,
    Failure,
}

/// A credential operation performed by the internal identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub request_id: String,
    pub action: String,
    pub acting_as: Option<String>,
    pub outcome: AuditOutcome,
    pub detail: String,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
    fn list(&self) -> Vec<AuditEvent>;
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }

    fn list(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}
