//! Hugging Face Inference-API compatible backend (`POST {base}/{model}`).
//!
//! All wire types are private to this module; callers only see
//! [`EngineResponse`]. Requests are blocking, so callers on an async runtime
//! must run them on the blocking pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::config::EngineConfig;
use crate::engine::tokenizer;
use crate::engine::{Backend, EngineError, EngineResponse, GenerationParams, Pipeline, TaskKind, Tokenizer};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    api_base_url: String,
    api_token: Option<String>,
    tokenizer_dir: Option<PathBuf>,
    context_limit: usize,
}

impl HttpBackend {
    /// Build a backend from config and an optional bearer token.
    pub fn new(config: &EngineConfig, api_token: Option<String>) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| EngineError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_token,
            tokenizer_dir: config.tokenizer_dir.clone(),
            context_limit: config.context_limit,
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.api_base_url, model)
    }
}

impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    fn load(&self, task: TaskKind, model: &str) -> Result<Arc<dyn Pipeline>, EngineError> {
        if model.trim().is_empty() {
            return Err(EngineError::Load { model: model.to_string(), message: "empty model id".into() });
        }
        Ok(Arc::new(HttpPipeline {
            client: self.client.clone(),
            url: self.model_url(model),
            api_token: self.api_token.clone(),
            task,
        }))
    }

    fn tokenizer(&self, model: &str) -> Result<Arc<dyn Tokenizer>, EngineError> {
        tokenizer::for_model(self.tokenizer_dir.as_deref(), model, self.context_limit)
    }
}

pub struct HttpPipeline {
    client: Client,
    url: String,
    api_token: Option<String>,
    task: TaskKind,
}

impl Pipeline for HttpPipeline {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<EngineResponse, EngineError> {
        let payload = InferenceRequest {
            inputs: prompt,
            parameters: params,
            options: InferenceOptions { wait_for_model: true },
        };

        debug!(url = %self.url, task = %self.task, prompt_len = prompt.len(), "sending inference request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full inference payload");
        }

        let mut req = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.api_token {
            req = req.bearer_auth(token);
        }

        let response = req.send().map_err(|e| {
            error!(url = %self.url, error = %e, "inference request failed (transport)");
            EngineError::Request(e.to_string())
        })?;

        let response = check_status(response)?;

        let parsed = response.json::<EngineResponse>().map_err(|e| {
            error!(error = %e, "failed to deserialize inference response");
            EngineError::Request(format!("failed to parse response body: {e}"))
        })?;
        trace!(response = ?parsed, "inference response");
        Ok(parsed)
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationParams,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

// Error envelope: `{"error": "...", "estimated_time": 20.0}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: serde_json::Value,
    #[serde(default)]
    estimated_time: Option<f64>,
}

/// Return the response if successful, or a structured error.
fn check_status(response: Response) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let message = error_message(status, &body);
    error!(%status, %message, "inference request returned HTTP error");
    Err(EngineError::Request(message))
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return format!("HTTP {status}: {body}");
    };
    let detail = match env.error {
        serde_json::Value::String(s) => s,
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };
    match env.estimated_time {
        Some(secs) => format!("HTTP {status}: {detail} (estimated_time={secs:.0}s)"),
        None => format!("HTTP {status}: {detail}"),
    }
}
