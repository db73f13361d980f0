//! Cross-context message protocol.
//!
//! Control surface, background controller, and page context have no shared
//! memory; they exchange these typed messages. Each kind has a fixed
//! request/response contract, and a payload that fails to parse is an
//! immediate `InvalidPayload`, never retried.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ControllerError;
use crate::rules::CollectorRow;

/// A request from one context to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    /// Run the collection engine in the page context
    RunCollectors { rows: Vec<CollectorRow> },

    /// Recompute and display the visited-count badge
    UpdateBadge,

    /// Attempt a native connection, nothing more
    NativePing,

    /// Connect and forward lines to the host's append operation
    NativeAppend { path: String, lines: Vec<String> },
}

impl Request {
    /// Parse an untrusted message value.
    pub fn from_value(message: Value) -> Result<Self, ControllerError> {
        serde_json::from_value(message).map_err(|e| ControllerError::InvalidPayload {
            reason: e.to_string(),
        })
    }
}

/// The response side of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// `runCollectors` succeeded with the collected lines
    Collected { result: Vec<String> },

    /// `runCollectors` aborted with a whole-run error
    CollectFailed { error: String },

    /// `nativePing` / `nativeAppend` / `updateBadge` outcome
    Ack {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl Response {
    pub fn ok() -> Self {
        Self::Ack {
            ok: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Ack {
            ok: false,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn run_collectors_round_trips() {
        let message = json!({
            "type": "runCollectors",
            "rows": [{"enabled": true, "value": ".a|inner"}],
        });
        let request = Request::from_value(message).unwrap();
        assert_eq!(
            request,
            Request::RunCollectors {
                rows: vec![CollectorRow::new(".a|inner")],
            }
        );
    }

    #[test]
    fn bare_messages_parse() {
        assert_eq!(
            Request::from_value(json!({"type": "updateBadge"})).unwrap(),
            Request::UpdateBadge
        );
        assert_eq!(
            Request::from_value(json!({"type": "nativePing"})).unwrap(),
            Request::NativePing
        );
    }

    #[test]
    fn unknown_type_is_invalid_payload() {
        let err = Request::from_value(json!({"type": "selfDestruct"})).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidPayload { .. }));
    }

    #[test]
    fn append_with_non_sequence_lines_is_invalid_payload() {
        let err = Request::from_value(json!({
            "type": "nativeAppend",
            "path": "/tmp/out.log",
            "lines": "not a sequence",
        }))
        .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidPayload { .. }));
    }

    #[test]
    fn append_without_path_is_invalid_payload() {
        let err = Request::from_value(json!({
            "type": "nativeAppend",
            "lines": ["a"],
        }))
        .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidPayload { .. }));
    }

    #[test]
    fn ack_serializes_without_null_error() {
        let value = serde_json::to_value(Response::ok()).unwrap();
        assert_eq!(value, json!({"ok": true}));

        let value = serde_json::to_value(Response::error("no host")).unwrap();
        assert_eq!(value, json!({"ok": false, "error": "no host"}));
    }

    #[test]
    fn collected_serializes_as_result() {
        let value = serde_json::to_value(Response::Collected {
            result: vec!["one".to_string()],
        })
        .unwrap();
        assert_eq!(value, json!({"result": ["one"]}));
    }
}
