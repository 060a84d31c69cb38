//! HTTP client for a local Ollama inference server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("inference server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("inference server not running at {url} (status {status})")]
    NotRunning { url: String, status: u16 },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Anything that turns a prompt into generated text with a named model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, InferenceError>;
}

/// Client for Ollama's REST API (`/`, `/api/tags`, `/api/pull`, `/api/generate`).
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct PullResponse {
    #[serde(default)]
    status: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// `base_url` should be like `http://localhost:11434` (no trailing slash).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// HTTP status of the server's root endpoint.
    pub async fn status(&self) -> Result<u16, InferenceError> {
        let resp = self.client.get(&self.base_url).send().await?;
        Ok(resp.status().as_u16())
    }

    /// Fail unless the server answers its status check with a 2xx.
    pub async fn ensure_running(&self) -> Result<(), InferenceError> {
        let status = self.status().await?;
        if !(200..300).contains(&status) {
            return Err(InferenceError::NotRunning {
                url: self.base_url.clone(),
                status,
            });
        }
        info!(url = %self.base_url, "inference server is running");
        Ok(())
    }

    /// Names of locally installed models, e.g. `llama3.1:8b`.
    pub async fn list_models(&self) -> Result<Vec<String>, InferenceError> {
        let url = format!("{}/api/tags", self.base_url);
        let body = self.checked_text(self.client.get(&url).send().await?).await?;
        let tags: TagsResponse = serde_json::from_str(&body)?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Download `model`. Blocks until the server reports completion.
    pub async fn pull_model(&self, model: &str) -> Result<(), InferenceError> {
        let url = format!("{}/api/pull", self.base_url);
        info!(model, "pulling model");
        let req = PullRequest {
            model,
            stream: false,
        };
        let body = self
            .checked_text(self.client.post(&url).json(&req).send().await?)
            .await?;
        let pulled: PullResponse = serde_json::from_str(&body)?;
        info!(model, status = %pulled.status, "pull complete");
        Ok(())
    }

    /// Pull `model` unless it is already installed. Returns whether a pull happened.
    pub async fn ensure_model(&self, model: &str) -> Result<bool, InferenceError> {
        let installed = self.list_models().await?;
        if installed.iter().any(|name| model_matches(name, model)) {
            debug!(model, "model already installed");
            return Ok(false);
        }
        self.pull_model(model).await?;
        Ok(true)
    }

    async fn checked_text(&self, resp: reqwest::Response) -> Result<String, InferenceError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(InferenceError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    /// Non-streaming `/api/generate`; returns the full response text as-is.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let body = self
            .checked_text(self.client.post(&url).json(&req).send().await?)
            .await?;
        let generated: GenerateResponse = serde_json::from_str(&body)?;
        Ok(generated.response)
    }
}

/// Whether an installed model name satisfies a requested one.
///
/// Ollama reports untagged models with an implicit `:latest` tag.
fn model_matches(installed: &str, wanted: &str) -> bool {
    if installed == wanted {
        return true;
    }
    !wanted.contains(':') && installed.strip_suffix(":latest") == Some(wanted)
}
