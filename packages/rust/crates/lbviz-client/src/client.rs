//! reqwest-backed decision client.
//!
//! **Wire contract:**
//! 1. `GET /api/get_ip` answers `{ "ip", "message", "stats": { id: count } }`.
//! 2. `GET /api/set_algorithm/{name}` and `POST /api/add_ip` have no documented
//!    body; success is inferred from the HTTP status. A 2xx body that parses as
//!    `{ "success": false, "message": ... }` is still treated as a rejection.
//!
//! Every failure maps onto a [`TransportError`] variant; nothing here panics or
//! retries. Retry policy belongs to the caller.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use lbviz_types::{Algorithm, Decision, TransportError};

use crate::config::DecisionClientConfig;
use crate::service::{ADD_IP_PATH, DecisionService, GET_IP_PATH, SET_ALGORITHM_PATH};

#[derive(Debug, Deserialize)]
struct GetIpResponse {
    ip: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    stats: HashMap<String, u64>,
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
    success: Option<bool>,
    message: Option<String>,
}

/// HTTP client for one decision service.
#[derive(Debug, Clone)]
pub struct HttpDecisionClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout_ms: u64,
}

impl HttpDecisionClient {
    /// Build a client from config.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &DecisionClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if config.request_timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(config.request_timeout_ms));
        }
        let http = builder
            .build()
            .map_err(|e| anyhow::anyhow!("reqwest client: {e}"))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout_ms: config.request_timeout_ms,
        })
    }

    /// Service root this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn map_request_error(&self, endpoint: &str, error: &reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: self.request_timeout_ms,
            }
        } else {
            TransportError::Network {
                endpoint: endpoint.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Send, check the status and return the body text.
    async fn execute(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.map_request_error(endpoint, &e))?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(endpoint, status = status.as_u16(), "decision service error status");
            return Err(TransportError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|e| self.map_request_error(endpoint, &e))
    }
}

/// Reject a 2xx acknowledgement that carries `success: false`.
fn check_acknowledgement(endpoint: &str, body: &str) -> Result<(), TransportError> {
    let Ok(ack) = serde_json::from_str::<Acknowledgement>(body) else {
        return Ok(());
    };
    if ack.success == Some(false) {
        return Err(TransportError::Rejected {
            endpoint: endpoint.to_string(),
            message: ack.message.unwrap_or_else(|| "success=false".to_string()),
        });
    }
    Ok(())
}

#[async_trait]
impl DecisionService for HttpDecisionClient {
    async fn select_target(&self) -> Result<Decision, TransportError> {
        let body = self
            .execute(GET_IP_PATH, self.http.get(self.url(GET_IP_PATH)))
            .await?;
        let parsed: GetIpResponse =
            serde_json::from_str(&body).map_err(|e| TransportError::Decode {
                endpoint: GET_IP_PATH.to_string(),
                message: e.to_string(),
            })?;
        Ok(Decision {
            target_id: parsed.ip,
            message: parsed.message,
            counts_by_target: parsed.stats,
        })
    }

    async fn set_algorithm(&self, algorithm: Algorithm) -> Result<(), TransportError> {
        let path = format!("{SET_ALGORITHM_PATH}/{}", algorithm.wire_name());
        let body = self.execute(&path, self.http.get(self.url(&path))).await?;
        check_acknowledgement(&path, &body)
    }

    async fn register_target(&self, target_id: &str) -> Result<(), TransportError> {
        let request = self
            .http
            .post(self.url(ADD_IP_PATH))
            .json(&json!({ "ip": target_id }));
        let body = self.execute(ADD_IP_PATH, request).await?;
        check_acknowledgement(ADD_IP_PATH, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledgement_rejects_success_false() {
        let err = check_acknowledgement(ADD_IP_PATH, r#"{"success":false,"message":"Invalid IP"}"#)
            .unwrap_err();
        assert_eq!(
            err,
            TransportError::Rejected {
                endpoint: ADD_IP_PATH.to_string(),
                message: "Invalid IP".to_string(),
            }
        );
    }

    #[test]
    fn test_acknowledgement_accepts_empty_or_non_json_body() {
        assert!(check_acknowledgement(ADD_IP_PATH, "").is_ok());
        assert!(check_acknowledgement(ADD_IP_PATH, "ok").is_ok());
        assert!(check_acknowledgement(ADD_IP_PATH, r#"{"success":true}"#).is_ok());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpDecisionClient::from_config(&DecisionClientConfig {
            base_url: "http://127.0.0.1:5000/".to_string(),
            request_timeout_ms: 0,
        })
        .unwrap();
        assert_eq!(client.url(GET_IP_PATH), "http://127.0.0.1:5000/api/get_ip");
    }
}
