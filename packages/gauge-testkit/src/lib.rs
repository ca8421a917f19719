//! In-memory provider fakes and config fixtures for exercising the resolver
//! without Postgres, Qdrant, or upstream APIs.

use std::{
	collections::HashMap,
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};

use color_eyre::eyre;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use gauge_config::{
	Config, EmbeddingProviderConfig, GraphProviderConfig, InferenceProviderConfig, Postgres,
	Providers as ProviderSettings, Qdrant, Ranking, Recall, Resolver, Service, Storage, Validation,
};
use gauge_providers::{
	graph::{GraphHit, TraversalStrategy},
	inference::{CandidateHint, InferenceOutcome},
};
use gauge_service::{
	BoxFuture, CatalogProvider, EmbeddingProvider, GraphProvider, InferenceProvider,
	SimilarityProvider,
};
use gauge_storage::{models::MetricRecord, qdrant::SimilarityHit};

/// A config with every knob set to something sane for tests. Thresholds
/// follow the production defaults: 0.9 deterministic, 0.85 ranked.
pub fn test_config() -> Config {
	let mut weights = HashMap::new();

	for (name, weight) in [
		("similarity_score", 0.3),
		("token_overlap", 0.1),
		("semantic_proxy", 0.1),
		("match_type", 0.15),
		("relationship_strength", 0.05),
		("path_penalty", 0.05),
		("centrality", 0.05),
		("domain_match", 0.05),
		("importance", 0.1),
		("usage_frequency", 0.025),
		("user_preference", 0.025),
	] {
		weights.insert(name.to_string(), weight);
	}

	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres { dsn: "postgres://localhost/gauge_test".to_string(), pool_max_conns: 2 },
			qdrant: Qdrant {
				url: "http://localhost:6334".to_string(),
				collection: "metrics_test".to_string(),
				vector_dim: 4,
			},
		},
		providers: ProviderSettings {
			embedding: EmbeddingProviderConfig {
				provider_id: "p".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/".to_string(),
				model: "m".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			graph: GraphProviderConfig {
				provider_id: "p".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			inference: InferenceProviderConfig {
				provider_id: "p".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/".to_string(),
				model: "m".to_string(),
				temperature: 0.1,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		recall: Recall {
			similarity_top_k: 10,
			relationship_top_k: 10,
			channel_timeout_ms: 200,
			grace_ms: 50,
			similarity_floor: 0.3,
			max_depth: 2,
		},
		ranking: Ranking { top_k: 5, weights },
		resolver: Resolver {
			deterministic_threshold: 0.9,
			ranked_threshold: 0.85,
			inference_threshold: 0.6,
			overall_timeout_ms: 5_000,
		},
		validation: Validation { sensitive_domains: vec!["finance".to_string()] },
	}
}

/// A catalog row with sensible defaults; tests mutate the fields they care
/// about.
pub fn metric_record(id: u128, name: &str, code: &str, domain: &str) -> MetricRecord {
	let now = OffsetDateTime::now_utc();

	MetricRecord {
		metric_id: Uuid::from_u128(id),
		name: name.to_string(),
		code: code.to_string(),
		description: format!("{name} metric."),
		synonyms: Vec::new(),
		domain: domain.to_string(),
		importance: 0.5,
		usage_score: 0.5,
		dimensions: Vec::new(),
		min_granularity: None,
		realtime: false,
		created_at: now,
		updated_at: now,
	}
}

pub struct StaticCatalog {
	pub records: Vec<MetricRecord>,
}
impl CatalogProvider for StaticCatalog {
	fn get_metadata<'a>(
		&'a self,
		metric_ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<Vec<MetricRecord>>> {
		Box::pin(async move {
			Ok(self
				.records
				.iter()
				.filter(|record| metric_ids.contains(&record.metric_id))
				.cloned()
				.collect())
		})
	}

	fn find_exact<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<MetricRecord>>> {
		Box::pin(async move {
			let needle = text.to_lowercase();

			Ok(self
				.records
				.iter()
				.find(|record| {
					record.name.to_lowercase() == needle
						|| record.code.to_lowercase() == needle
						|| record.synonyms.iter().any(|s| s.to_lowercase() == needle)
				})
				.cloned())
		})
	}
}

pub struct StaticEmbedding {
	pub vector: Vec<f32>,
}
impl Default for StaticEmbedding {
	fn default() -> Self {
		Self { vector: vec![0.1, 0.2, 0.3, 0.4] }
	}
}
impl EmbeddingProvider for StaticEmbedding {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		_: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move { Ok(self.vector.clone()) })
	}
}

/// Similarity channel fake with injectable latency and failure.
#[derive(Default)]
pub struct StaticSimilarity {
	pub hits: Vec<SimilarityHit>,
	pub delay: Duration,
	pub fail: bool,
	pub calls: AtomicUsize,
}
impl StaticSimilarity {
	pub fn with_hits(hits: Vec<SimilarityHit>) -> Self {
		Self { hits, ..Self::default() }
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl SimilarityProvider for StaticSimilarity {
	fn search<'a>(
		&'a self,
		_: Vec<f32>,
		top_k: u32,
		floor: f32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SimilarityHit>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.fail {
				return Err(eyre::eyre!("similarity channel down"));
			}

			let mut hits: Vec<SimilarityHit> =
				self.hits.iter().filter(|hit| hit.score >= floor).copied().collect();

			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}
}

/// Relationship channel fake with injectable latency and failure.
#[derive(Default)]
pub struct StaticGraph {
	pub hits: Vec<GraphHit>,
	pub delay: Duration,
	pub fail: bool,
	pub calls: AtomicUsize,
}
impl StaticGraph {
	pub fn with_hits(hits: Vec<GraphHit>) -> Self {
		Self { hits, ..Self::default() }
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl GraphProvider for StaticGraph {
	fn traverse<'a>(
		&'a self,
		_: &'a GraphProviderConfig,
		_: &'a [String],
		_: TraversalStrategy,
		_: u32,
		top_k: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<GraphHit>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.fail {
				return Err(eyre::eyre!("relationship channel down"));
			}

			let mut hits = self.hits.clone();

			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}
}

/// Inference fake that replays a canned outcome.
pub struct ScriptedInference {
	pub outcome: InferenceOutcome,
	pub delay: Duration,
	pub fail: bool,
	pub calls: AtomicUsize,
}
impl ScriptedInference {
	pub fn with_outcome(outcome: InferenceOutcome) -> Self {
		Self { outcome, delay: Duration::ZERO, fail: false, calls: AtomicUsize::new(0) }
	}

	pub fn failing() -> Self {
		Self {
			outcome: InferenceOutcome {
				intent: Value::Null,
				confidence: 0.0,
				reasoning: String::new(),
				candidate_scores: HashMap::new(),
			},
			delay: Duration::ZERO,
			fail: true,
			calls: AtomicUsize::new(0),
		}
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl InferenceProvider for ScriptedInference {
	fn infer<'a>(
		&'a self,
		_: &'a InferenceProviderConfig,
		_: &'a str,
		_: &'a Value,
		_: &'a [CandidateHint],
	) -> BoxFuture<'a, color_eyre::Result<InferenceOutcome>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.fail {
				return Err(eyre::eyre!("inference provider down"));
			}

			Ok(self.outcome.clone())
		})
	}
}

/// A graph hit with direct-match defaults.
pub fn graph_hit(id: u128, score: f32) -> GraphHit {
	GraphHit {
		metric_id: Uuid::from_u128(id),
		score,
		match_type: "exact".to_string(),
		path: Vec::new(),
		strength: Some(1.0),
		centrality: Some(0.8),
	}
}

pub fn similarity_hit(id: u128, score: f32) -> SimilarityHit {
	SimilarityHit { metric_id: Uuid::from_u128(id), score }
}
