//! HTTP client for a running tracker server.
//!
//! Used by the CLI to talk to `sytrack serve`, locally or remotely.
//! Configuration is via environment variables:
//! - `SYLLABUS_TRACK_URL` - Base URL (default: `http://localhost:17030/api/v1`)
//! - `SYLLABUS_TRACK_API_KEY` - API key for authentication (optional for local)

use chrono::NaiveDateTime;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::*;
use crate::stats::Dashboard;

pub const DEFAULT_PORT: u16 = 17030;
const DEFAULT_URL: &str = "http://localhost:17030/api/v1";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: API key required or invalid")]
    Unauthorized,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Server error: {0}")]
    Server(String),
}

#[derive(Debug, Clone)]
pub struct TrackerClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl TrackerClient {
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("SYLLABUS_TRACK_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
        let api_key = std::env::var("SYLLABUS_TRACK_API_KEY").ok();
        Self::new(base_url, api_key)
    }

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn error_for(response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(body),
            StatusCode::BAD_REQUEST => ClientError::BadRequest(body),
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::SERVICE_UNAVAILABLE => ClientError::Unavailable(body),
            _ => ClientError::Server(format!("{}: {}", status, body)),
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_for(response).await)
        }
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self.request(Method::GET, "/health").send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::error_for(response).await)
        }
    }

    pub async fn dashboard(&self, now: Option<NaiveDateTime>) -> Result<Dashboard, ClientError> {
        let mut req = self.request(Method::GET, "/dashboard");
        if let Some(now) = now {
            req = req.query(&[("now", now.format("%Y-%m-%dT%H:%M:%S").to_string())]);
        }
        Self::handle_response(req.send().await?).await
    }

    pub async fn list_subjects(&self) -> Result<Vec<Subject>, ClientError> {
        let response = self.request(Method::GET, "/subjects").send().await?;
        Self::handle_response(response).await
    }

    pub async fn list_exams(&self) -> Result<Vec<Exam>, ClientError> {
        let response = self.request(Method::GET, "/exams").send().await?;
        Self::handle_response(response).await
    }

    pub async fn add_topic(
        &self,
        subject_id: &str,
        input: &NewTopicInput,
    ) -> Result<Topic, ClientError> {
        let response = self
            .request(Method::POST, &format!("/subjects/{}/topics", subject_id))
            .json(input)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn toggle_topic(&self, subject_id: &str, topic_id: &str) -> Result<Topic, ClientError> {
        let response = self
            .request(
                Method::POST,
                &format!("/subjects/{}/topics/{}/toggle", subject_id, topic_id),
            )
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Asks the server to load the starter dataset. `false` when the store
    /// already held data.
    pub async fn seed(&self) -> Result<bool, ClientError> {
        let response = self.request(Method::POST, "/seed").send().await?;
        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(Self::error_for(response).await),
        }
    }
}
