//! Best-effort audit recording.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use stockella_core::UserId;
use stockella_inventory::{AuditAction, AuditEntry};

use crate::store::AuditSink;

/// Writes audit entries after the primary operation has committed.
///
/// A failed write is logged and swallowed; it never fails the caller.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Option<Arc<dyn AuditSink>>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>, enabled: bool) -> Self {
        Self {
            sink: enabled.then_some(sink),
        }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub async fn record(&self, user_id: UserId, action: AuditAction, detail: impl Into<String>) {
        let Some(sink) = &self.sink else {
            return;
        };
        let entry = AuditEntry::new(user_id, action, detail, Utc::now());
        if let Err(err) = sink.append(&entry).await {
            warn!(
                audit_id = %entry.id,
                user_id = %user_id,
                action = %action,
                error = %err,
                "audit write failed; primary operation already committed"
            );
        }
    }
}

impl core::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
