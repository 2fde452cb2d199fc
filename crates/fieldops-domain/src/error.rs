use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("ticket store rejected credentials: {0}")]
    Unauthorized(String),
    #[error("ticket store returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("ticket store payload could not be decoded: {0}")]
    Decode(String),
}

impl CoreError {
    /// Short single-line reason suitable for per-key failure reporting.
    pub fn reason(&self) -> String {
        match self {
            Self::Remote { status, body } if body.trim().is_empty() => format!("HTTP {status}"),
            Self::Remote { status, body } => format!("HTTP {status}: {}", body.trim()),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoreError;

    #[test]
    fn remote_reason_omits_blank_body() {
        let error = CoreError::Remote {
            status: 404,
            body: "  ".to_owned(),
        };
        assert_eq!(error.reason(), "HTTP 404");
    }

    #[test]
    fn remote_reason_keeps_trimmed_body() {
        let error = CoreError::Remote {
            status: 400,
            body: " field is required\n".to_owned(),
        };
        assert_eq!(error.reason(), "HTTP 400: field is required");
    }
}
