//! HTTP client for the course API
//!
//! Wraps every outgoing request: attaches the current credential before
//! dispatch, and reacts to authorization failures by clearing the stored
//! session. The failure itself always propagates to the caller unchanged —
//! no retry here, no swallowing.

use crate::auth::SessionStore;
use crate::{CoursetrackError, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Authenticated JSON client for the remote course API
#[derive(Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Create a client for the given base URL
    pub fn new(
        base_url: impl Into<String>,
        session: Arc<SessionStore>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            http,
            session,
        })
    }

    /// The session store this client authenticates from
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// The API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token for the next request, if a session exists
    fn bearer(&self) -> Option<String> {
        self.session.token()
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, &url);
        if let Some(token) = self.bearer() {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        builder
    }

    /// GET a JSON resource
    pub async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let response = self.request(Method::GET, path).query(query).send().await?;
        self.handle(response).await
    }

    /// POST a JSON body
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        self.handle(response).await
    }

    /// PATCH a JSON body
    pub async fn patch_json(&self, path: &str, body: &Value) -> Result<Value> {
        let response = self.request(Method::PATCH, path).json(body).send().await?;
        self.handle(response).await
    }

    async fn handle(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();

        Err(self.map_failure(status, retry_after, &body))
    }

    /// Classify a non-success response.
    ///
    /// 401 clears the stored session as a side effect before propagating,
    /// so the next outgoing request carries no credential.
    fn map_failure(
        &self,
        status: StatusCode,
        retry_after: Option<u64>,
        body: &str,
    ) -> CoursetrackError {
        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::warn!("Credential rejected by the server, clearing session");
                self.session.clear();
                CoursetrackError::Unauthorized
            }
            StatusCode::TOO_MANY_REQUESTS => {
                CoursetrackError::RateLimited(retry_after.unwrap_or(60))
            }
            _ => {
                let detail = if body.is_empty() {
                    status.to_string()
                } else {
                    format!("{}: {}", status, body)
                };
                CoursetrackError::FetchFailed(detail)
            }
        }
    }
}
