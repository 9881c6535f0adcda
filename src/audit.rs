use serde_json::Value;
use uuid::Uuid;

use crate::{models::AuditEntry, store::AuditStore};

/// Append an audit entry. A failed write is logged and otherwise ignored so it
/// never fails the action being audited.
pub async fn log_audit(
    audit: &dyn AuditStore,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
    };

    if let Err(err) = audit.append_audit(entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
