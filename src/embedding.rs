//! Concrete embedding providers.
//!
//! - **[`OpenAIProvider`]**: calls the OpenAI-compatible `POST /embeddings`
//!   endpoint. Failures are [`NcError::EmbeddingService`].
//! - **`LocalProvider`**: runs a sentence-embedding model in-process via
//!   fastembed. Failures are [`NcError::UnavailableBackend`]. Only built
//!   with the `local-embeddings-fastembed` feature.
//!
//! Neither provider retries; a failed call is returned as-is.

use async_trait::async_trait;
use nc_analyzer_core::embedding::EmbeddingProvider;
use nc_analyzer_core::{NcError, NcResult};
use std::time::Duration;

use crate::config::{Credential, EmbeddingConfig};

/// Local model names accepted in `[embedding].local_model`.
const LOCAL_MODELS: &[&str] = &[
    "all-minilm-l6-v2",
    "bge-small-en-v1.5",
    "bge-base-en-v1.5",
    "bge-large-en-v1.5",
    "nomic-embed-text-v1.5",
    "multilingual-e5-small",
];

/// Check that `name` is a supported local model.
pub fn validate_local_model(name: &str) -> anyhow::Result<()> {
    if LOCAL_MODELS.contains(&name) {
        return Ok(());
    }
    anyhow::bail!(
        "Unknown local embedding model: '{}'. Supported models: {}",
        name,
        LOCAL_MODELS.join(", ")
    )
}

/// Whether this build can run a local embedding model at all.
pub fn local_backend_available() -> bool {
    cfg!(feature = "local-embeddings-fastembed")
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API.
pub struct OpenAIProvider {
    model: String,
    base_url: String,
    api_key: Credential,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig, api_key: Credential) -> NcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NcError::EmbeddingService(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model: config.remote_model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed_texts(&self, texts: &[String]) -> NcResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .json(&body)
            .send()
            .await
            .map_err(|e| NcError::EmbeddingService(format!("OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(NcError::EmbeddingService(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NcError::EmbeddingService(format!("invalid OpenAI response: {}", e)))?;
        let embeddings = parse_openai_response(&json)?;

        tracing::debug!(model = %self.model, count = embeddings.len(), "remote embeddings received");
        Ok(embeddings)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> NcResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            NcError::EmbeddingService("Invalid OpenAI response: missing data array".into())
        })?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                NcError::EmbeddingService("Invalid OpenAI response: missing embedding".into())
            })?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Local Provider (fastembed) ============

/// Embedding provider for in-process inference.
///
/// The model is downloaded on first use and kept loaded for the life of
/// the provider.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> NcResult<Self> {
        // Fail fast on unknown names; loading itself is deferred.
        config_to_fastembed_model(&config.local_model)?;
        Ok(Self {
            model_name: config.local_model.clone(),
            batch_size: config.batch_size,
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> NcResult<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        other => Err(NcError::UnavailableBackend(format!(
            "Unknown local embedding model: '{}'",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn embed_texts(&self, texts: &[String]) -> NcResult<Vec<Vec<f32>>> {
        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let model = self.model.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();
        let model_name = self.model_name.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| NcError::UnavailableBackend("local model lock poisoned".into()))?;

            if guard.is_none() {
                tracing::info!(model = %model_name, "loading local embedding model");
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model)
                        .with_show_download_progress(false),
                )
                .map_err(|e| {
                    NcError::UnavailableBackend(format!(
                        "Failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *guard = Some(loaded);
            }

            let loaded = guard
                .as_mut()
                .ok_or_else(|| NcError::UnavailableBackend("local model not loaded".into()))?;
            let embeddings = loaded
                .embed(texts, Some(batch_size))
                .map_err(|e| NcError::UnavailableBackend(format!("Local embedding failed: {}", e)))?;
            Ok(embeddings)
        })
        .await
        .map_err(|e| NcError::UnavailableBackend(format!("local embedding task failed: {}", e)))?
    }
}

/// Build the remote provider. Requires a credential.
pub fn create_remote_provider(
    config: &EmbeddingConfig,
    credential: Option<&Credential>,
) -> NcResult<Box<dyn EmbeddingProvider>> {
    let key = credential.cloned().ok_or_else(|| {
        NcError::EmbeddingService("remote embeddings require an API key".into())
    })?;
    Ok(Box::new(OpenAIProvider::new(config, key)?))
}

/// Build the local provider, or report that this build has none.
pub fn create_local_provider(config: &EmbeddingConfig) -> NcResult<Box<dyn EmbeddingProvider>> {
    #[cfg(feature = "local-embeddings-fastembed")]
    {
        Ok(Box::new(LocalProvider::new(config)?))
    }
    #[cfg(not(feature = "local-embeddings-fastembed"))]
    {
        Err(NcError::UnavailableBackend(format!(
            "local model '{}' requires --features local-embeddings-fastembed",
            config.local_model
        )))
    }
}
