use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum KaskadeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The worker process failed to start, was interrupted, or produced
    /// output that does not decode as a result. `output` retains whatever
    /// the worker wrote to stdout so it can be shown for diagnostics.
    #[error("Worker error: {message}")]
    Worker { message: String, output: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Request {request_id} not found in session {session_id}")]
    RequestNotFound { session_id: i64, request_id: i64 },
}

impl Serialize for KaskadeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = KaskadeError::Validation("URL must be a valid string URL".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: URL must be a valid string URL"
        );
    }

    #[test]
    fn persistence_error_display() {
        let err = KaskadeError::Persistence("disk full".to_string());
        assert_eq!(err.to_string(), "Persistence error: disk full");
    }

    #[test]
    fn worker_error_display_omits_raw_output() {
        let err = KaskadeError::Worker {
            message: "output did not decode".to_string(),
            output: "garbage stdout".to_string(),
        };
        let msg = err.to_string();
        assert_eq!(msg, "Worker error: output did not decode");
        assert!(!msg.contains("garbage"));
    }

    #[test]
    fn worker_error_retains_raw_output() {
        let err = KaskadeError::Worker {
            message: "decode failed".to_string(),
            output: "not json".to_string(),
        };
        match err {
            KaskadeError::Worker { output, .. } => assert_eq!(output, "not json"),
            _ => panic!("expected Worker variant"),
        }
    }

    #[test]
    fn backend_error_display() {
        let err = KaskadeError::Backend("backend returned HTTP 500".to_string());
        assert_eq!(err.to_string(), "Backend error: backend returned HTTP 500");
    }

    #[test]
    fn session_not_found_display() {
        let err = KaskadeError::SessionNotFound("1700000000000".to_string());
        assert_eq!(err.to_string(), "Session not found: 1700000000000");
    }

    #[test]
    fn request_not_found_display() {
        let err = KaskadeError::RequestNotFound {
            session_id: 10,
            request_id: 20,
        };
        assert_eq!(err.to_string(), "Request 20 not found in session 10");
    }

    #[test]
    fn serde_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("not valid json").unwrap_err();
        let err: KaskadeError = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn serialize_produces_display_string() {
        let err = KaskadeError::Validation("test error".to_string());
        let json = serde_json::to_string(&err).expect("serialize should succeed");
        assert_eq!(json, "\"Validation error: test error\"");
    }
}
