//! Error types for the chat core.

/// Failures talking to the chat backend
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Setup(#[source] reqwest::Error),
    #[error("request to backend failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode backend reply: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failures from the speech capabilities
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("{0} is not supported on this system")]
    Unsupported(&'static str),
    #[error("a listening session is already active")]
    AlreadyListening,
    #[error("speech command is empty")]
    EmptyCommand,
    #[error("failed to run speech command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures opening a rendered link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("refusing to open non-http(s) link: {0}")]
    UnsupportedScheme(String),
    #[error("failed to launch browser: {0}")]
    Launch(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "backend returned HTTP 502: bad gateway");

        let err = VoiceError::Unsupported("speech recognition");
        assert_eq!(err.to_string(), "speech recognition is not supported on this system");

        let err = VoiceError::AlreadyListening;
        assert_eq!(err.to_string(), "a listening session is already active");

        let err = LinkError::UnsupportedScheme("javascript:alert(1)".to_string());
        assert_eq!(
            err.to_string(),
            "refusing to open non-http(s) link: javascript:alert(1)"
        );
    }

    #[test]
    fn test_decode_error_keeps_source() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClientError::Decode(json_err);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("could not decode backend reply"));
    }
}
