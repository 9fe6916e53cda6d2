//! Wire messages for the WebSocket capture relay.
//!
//! The client sends the target URL as its first text frame and `ping`
//! keep-alives afterwards; the relay answers with the frames below.

use serde::{Deserialize, Serialize};

/// Status reported by a worker's per-job endpoint.
///
/// Workers may report extra fields (size, current step); they are carried
/// through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkerStatus {
    pub fn pending() -> Self {
        Self {
            done: false,
            error: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn done() -> Self {
        Self {
            done: true,
            error: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A frame sent from the relay to the client.
#[derive(Debug, Clone)]
pub enum RelayMessage {
    /// The id of the job created for this session.
    Id(String),
    /// A worker status snapshot, forwarded verbatim.
    Status(WorkerStatus),
    /// Terminal error; the session ends after this frame.
    Error(String),
}

impl RelayMessage {
    /// Encode to the text-frame wire format.
    pub fn encode(&self) -> String {
        match self {
            RelayMessage::Id(id) => format!("id:{}", id),
            RelayMessage::Status(status) => {
                let json = serde_json::to_string(status)
                    .unwrap_or_else(|_| "{\"done\":false}".to_string());
                format!("status{}", json)
            }
            RelayMessage::Error(message) => format!("error:{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_frame() {
        let frame = RelayMessage::Id("abc123def456-0".into()).encode();
        assert_eq!(frame, "id:abc123def456-0");
    }

    #[test]
    fn test_status_frame() {
        let mut status = WorkerStatus::pending();
        status
            .extra
            .insert("size".into(), serde_json::Value::from(1024));
        let frame = RelayMessage::Status(status).encode();
        assert!(frame.starts_with("status{"));
        assert!(frame.contains("\"done\":false"));
        assert!(frame.contains("\"size\":1024"));
    }

    #[test]
    fn test_error_frame() {
        let frame = RelayMessage::Error("URL not permitted".into()).encode();
        assert_eq!(frame, "error:URL not permitted");
    }

    #[test]
    fn test_worker_status_parses_extra_fields() {
        let status: WorkerStatus =
            serde_json::from_str("{\"done\":true,\"size\":99,\"type\":\"page\"}").unwrap();
        assert!(status.done);
        assert_eq!(status.extra.get("size").and_then(|v| v.as_i64()), Some(99));
    }
}
