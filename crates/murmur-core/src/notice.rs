/// How loudly a notice should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// User-facing alert raised by the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity: Severity::Error,
        }
    }

    /// Raised when an ordinary turn cannot reach the backend
    pub fn send_failed() -> Self {
        Self::error(
            "Send failed",
            "Could not reach the server. Check that the backend service is running.",
        )
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
