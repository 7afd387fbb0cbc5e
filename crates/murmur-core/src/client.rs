use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::SessionId;

/// Body of a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "memoryId")]
    pub session_id: SessionId,
    pub message: String,
}

impl ChatRequest {
    pub fn new(session_id: SessionId, message: impl Into<String>) -> Self {
        Self {
            session_id,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// One-shot request/response chat endpoint
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one request and return the raw response body
    async fn send(&self, request: &ChatRequest) -> BackendResult<String>;
}

/// [`ChatBackend`] over HTTP `POST` with a JSON body
#[derive(Debug, Clone)]
pub struct HttpBackend {
    endpoint: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: Client::new(),
        }
    }

    /// Build a backend whose requests give up after `timeout`
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send(&self, request: &ChatRequest) -> BackendResult<String> {
        debug!("POST {} {:?}", self.endpoint, request);

        let response = self.client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        debug!("Raw response: {}", body);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = ChatRequest::new(SessionId::new(321), "book an appointment");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"memoryId": 321, "message": "book an appointment"}));
    }

    #[test]
    fn test_status_error_display() {
        let err = BackendError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "Backend returned 502: bad gateway");
    }
}
