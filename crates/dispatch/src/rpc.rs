use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::RpcError;

/// Request/response contract with one embedding worker.
///
/// `embed` must return exactly one vector per input, in input order.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RpcError>;
}

/// HTTP client for a text-embeddings-inference style `/embed` route.
///
/// One instance per worker slot; the underlying `reqwest::Client` keeps its own
/// connection pool so many concurrent batches share a handful of sockets.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpInferenceClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .build()?;
        Ok(Self::with_client(endpoint, http))
    }

    pub fn with_client(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RpcError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(format!("{}/embed", self.endpoint))
            .json(&json!({ "inputs": inputs }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| RpcError::Decode(format!("invalid JSON response: {e}")))?;
        let vectors = parse_embeddings(value)?;
        ensure_aligned(inputs.len(), &vectors)?;
        Ok(vectors)
    }
}

/// Check that a response carries one vector per input.
pub fn ensure_aligned(expected: usize, vectors: &[Vec<f32>]) -> Result<(), RpcError> {
    if vectors.len() != expected {
        return Err(RpcError::Decode(format!(
            "worker returned {} embeddings for {} inputs",
            vectors.len(),
            expected
        )));
    }
    Ok(())
}

/// Decode an embedding response body.
///
/// Accepts a bare array of vectors (TEI), `{"embeddings": [...]}`, and the
/// OpenAI-style `{"data": [{"embedding": [...]}, ...]}`.
pub fn parse_embeddings(value: Value) -> Result<Vec<Vec<f32>>, RpcError> {
    match value {
        Value::Object(mut map) => {
            if let Some(embeddings) = map.remove("embeddings") {
                return parse_embedding_collection(embeddings);
            }

            if let Some(Value::Array(items)) = map.remove("data") {
                return items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(mut obj) => obj
                            .remove("embedding")
                            .ok_or_else(|| {
                                RpcError::Decode("missing `embedding` field in data item".into())
                            })
                            .and_then(parse_embedding_vector),
                        _ => Err(RpcError::Decode(
                            "unexpected entry inside `data` array".into(),
                        )),
                    })
                    .collect();
            }

            Err(RpcError::Decode("unsupported response shape".into()))
        }
        other => parse_embedding_collection(other),
    }
}

fn parse_embedding_collection(value: Value) -> Result<Vec<Vec<f32>>, RpcError> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                Ok(Vec::new())
            } else if items.iter().all(|item| matches!(item, Value::Array(_))) {
                items.into_iter().map(parse_embedding_vector).collect()
            } else {
                parse_embedding_vector(Value::Array(items)).map(|vec| vec![vec])
            }
        }
        other => parse_embedding_vector(other).map(|vec| vec![vec]),
    }
}

fn parse_embedding_vector(value: Value) -> Result<Vec<f32>, RpcError> {
    match value {
        Value::Array(values) => values
            .into_iter()
            .map(|entry| match entry {
                Value::Number(num) => num
                    .as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| RpcError::Decode("non-finite embedding value".into())),
                other => Err(RpcError::Decode(format!(
                    "embedding entries must be numbers, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(RpcError::Decode(format!(
            "embedding vector must be an array, got {other:?}"
        ))),
    }
}
