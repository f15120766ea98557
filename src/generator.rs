//! Client for a text-generation-inference compatible server.
//!
//! The server hosts the conversational model. We only send a prompt with
//! fixed sampling parameters and read back the continuation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub top_k: u32,
    pub seed: u64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 50,
            top_k: 50,
            seed: 42,
        }
    }
}

pub struct GeneratorClient {
    endpoint: String,
    params: GenerationParams,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Parameters {
    max_new_tokens: u32,
    do_sample: bool,
    top_k: u32,
    seed: u64,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct InfoResponse {
    model_id: Option<String>,
}

impl GeneratorClient {
    pub fn new(endpoint: &str, params: GenerationParams, timeout: Duration) -> Result<Self, GeneratorError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            params,
            http,
        })
    }

    /// Build a client and check the server answers before handing it out.
    pub async fn connect(
        endpoint: &str,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, GeneratorError> {
        let client = Self::new(endpoint, params, timeout)?;
        let model = client.probe().await?;
        info!("Generative model ready at {} ({})", client.endpoint, model);
        Ok(client)
    }

    /// Ask the server which model it hosts.
    pub async fn probe(&self) -> Result<String, GeneratorError> {
        let response = self
            .http
            .get(format!("{}/info", self.endpoint))
            .send()
            .await
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api(format!("{status}: {body}")));
        }

        let info: InfoResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Parse(e.to_string()))?;
        Ok(info.model_id.unwrap_or_else(|| "unknown model".to_string()))
    }

    /// Generate a continuation for `prompt`. May return an empty string.
    pub async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        let request = GenerateRequest {
            inputs: prompt,
            parameters: Parameters {
                max_new_tokens: self.params.max_new_tokens,
                do_sample: true,
                top_k: self.params.top_k,
                seed: self.params.seed,
                return_full_text: false,
            },
        };

        let response = self
            .http
            .post(format!("{}/generate", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeneratorError::Http(e.to_string()))?;
        debug!("Generator response status: {status}");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(GeneratorError::Api(format!("{status}: {message}")));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).map_err(|e| GeneratorError::Parse(e.to_string()))?;
        Ok(parsed.generated_text)
    }
}

#[derive(Debug)]
pub enum GeneratorError {
    Http(String),
    Api(String),
    Parse(String),
}

impl std::fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeneratorError::Http(e) => write!(f, "HTTP error: {e}"),
            GeneratorError::Api(e) => write!(f, "API error: {e}"),
            GeneratorError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for GeneratorError {}
