use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub recall: Recall,
	pub ranking: Ranking,
	pub resolver: Resolver,
	pub validation: Validation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub graph: GraphProviderConfig,
	pub inference: InferenceProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recall {
	pub similarity_top_k: u32,
	pub relationship_top_k: u32,
	/// Per-channel budget. The coordinator's overall deadline is this plus `grace_ms`.
	pub channel_timeout_ms: u64,
	pub grace_ms: u64,
	/// Similarity hits scoring below this floor are treated as zero matches.
	pub similarity_floor: f32,
	pub max_depth: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ranking {
	pub top_k: u32,
	/// Feature name -> weight. Weights need not sum to one.
	pub weights: HashMap<String, f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Resolver {
	pub deterministic_threshold: f32,
	pub ranked_threshold: f32,
	pub inference_threshold: f32,
	pub overall_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Validation {
	/// Domains whose candidates are flagged pending authorization.
	#[serde(default)]
	pub sensitive_domains: Vec<String>,
}
