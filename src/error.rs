use thiserror::Error;

/// Failures of the durable key-value layer.
///
/// None of these are fatal: callers log them and keep their in-memory state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o failed for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
}

/// Why a backend query produced no answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureKind {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend returned HTTP {0}: {1}")]
    Status(u16, String),

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("backend returned no answer")]
    EmptyResponse,
}

impl FailureKind {
    /// Text shown in the conversation in place of an answer.
    pub fn user_message(&self) -> String {
        match self {
            FailureKind::Transport(_) | FailureKind::Timeout | FailureKind::Status(..) => {
                format!(
                    "Sorry, I couldn't reach the HR assistant ({}). Please try again.",
                    self
                )
            }
            FailureKind::Decode(_) | FailureKind::EmptyResponse => {
                "Sorry, the HR assistant sent a response I couldn't read. Please try again."
                    .to_string()
            }
            FailureKind::Backend(message) => {
                format!("Sorry, something went wrong: {}", message)
            }
        }
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FailureKind::Timeout
        } else if err.is_decode() {
            FailureKind::Decode(err.to_string())
        } else {
            FailureKind::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_embeds_backend_text() {
        let message = FailureKind::Backend("index unavailable".to_string()).user_message();
        assert!(message.contains("index unavailable"));
    }

    #[test]
    fn every_failure_has_a_non_empty_message() {
        let failures = [
            FailureKind::Transport("connection refused".into()),
            FailureKind::Timeout,
            FailureKind::Status(502, "bad gateway".into()),
            FailureKind::Decode("expected value".into()),
            FailureKind::Backend("nope".into()),
            FailureKind::EmptyResponse,
        ];
        for failure in failures {
            assert!(!failure.user_message().trim().is_empty(), "{failure:?}");
        }
    }

    #[test]
    fn status_message_mentions_code() {
        let message = FailureKind::Status(503, String::new()).user_message();
        assert!(message.contains("503"));
    }
}
