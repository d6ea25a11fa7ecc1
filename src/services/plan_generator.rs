//! AI planner integration.
//!
//! The engine talks to the planner through [`AiPlanGenerator`]. The HTTP
//! implementation posts the structured request as JSON and expects the
//! planner service to answer with a replacement session list or a summary.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::PlannerConfig;
use crate::models::{GeneratedPlan, RecalculationRequest};

#[derive(Error, Debug)]
pub enum PlanGeneratorError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Planner timed out")]
    Timeout,
    #[error("Planner returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PlanGeneratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlanGeneratorError::Timeout
        } else if err.is_decode() {
            PlanGeneratorError::Parse(err.to_string())
        } else {
            PlanGeneratorError::Request(err.to_string())
        }
    }
}

#[async_trait]
pub trait AiPlanGenerator: Send + Sync {
    /// Full replacement for the request window
    async fn generate(&self, request: &RecalculationRequest) -> Result<GeneratedPlan, PlanGeneratorError>;

    /// Session-level revision of the request window
    async fn recalculate(&self, request: &RecalculationRequest) -> Result<GeneratedPlan, PlanGeneratorError>;

    /// Natural-language explanation of the revision
    async fn summarize(&self, request: &RecalculationRequest) -> Result<String, PlanGeneratorError>;
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summary: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct HttpPlanGenerator {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpPlanGenerator {
    pub fn new(config: &PlannerConfig) -> Result<Self, PlanGeneratorError> {
        Self::with_timeout(&config.base_url, &config.api_key, config.timeout)
    }

    pub fn with_timeout(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, PlanGeneratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlanGeneratorError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &RecalculationRequest,
    ) -> Result<T, PlanGeneratorError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, window_start = %request.window_start, window_end = %request.window_end, "Calling planner");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            error!(%url, status = status.as_u16(), "Planner request failed: {}", message);
            if status == StatusCode::GATEWAY_TIMEOUT || status == StatusCode::REQUEST_TIMEOUT {
                return Err(PlanGeneratorError::Timeout);
            }
            return Err(PlanGeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| PlanGeneratorError::Parse(format!("{}: {}", e, body)))
    }
}

#[async_trait]
impl AiPlanGenerator for HttpPlanGenerator {
    async fn generate(&self, request: &RecalculationRequest) -> Result<GeneratedPlan, PlanGeneratorError> {
        self.post("/plans/generate", request).await
    }

    async fn recalculate(&self, request: &RecalculationRequest) -> Result<GeneratedPlan, PlanGeneratorError> {
        self.post("/plans/recalculate", request).await
    }

    async fn summarize(&self, request: &RecalculationRequest) -> Result<String, PlanGeneratorError> {
        let response: SummaryResponse = self.post("/plans/summarize", request).await?;
        let summary = response.summary.trim().to_string();
        if summary.is_empty() {
            return Err(PlanGeneratorError::Parse("Empty summary".to_string()));
        }
        Ok(summary)
    }
}
