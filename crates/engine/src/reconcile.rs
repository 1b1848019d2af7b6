//! Maps local ids to server-assigned identifiers after a success.

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Server-side reference for a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRef {
    pub id: String,
    pub name: String,
}

/// Adapts a 2xx response body into a [`ServerRef`].
///
/// Contract: the body is expected to be a JSON object carrying an `id`
/// (string or integer) and optionally a `name`. Anything else (a
/// non-JSON body, a missing or non-scalar `id`) falls back to a
/// synthesized `local-<uuid>` identifier. Losing the server-assigned
/// id is not grounds for failing an otherwise-successful upload, so
/// this function cannot fail. The retained file name fills in when the
/// server omits one.
///
/// Invoked exactly once per item reaching `Done`; the store's
/// transition guard enforces at-most-once.
pub fn reconcile(local_id: &str, file_name: &str, body: &str) -> ServerRef {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let id = parsed.as_ref().and_then(|v| match v.get("id") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    });

    let name = parsed
        .as_ref()
        .and_then(|v| v.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or(file_name)
        .to_string();

    match id {
        Some(id) => {
            debug!(local_id, server_id = %id, "reconciled");
            ServerRef { id, name }
        }
        None => {
            let id = format!("local-{}", Uuid::new_v4());
            warn!(local_id, fallback = %id, "response carried no usable id, synthesizing");
            ServerRef { id, name }
        }
    }
}
