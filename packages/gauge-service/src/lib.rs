pub mod rank;
pub mod recall;
pub mod resolve;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

use gauge_config::{Config, EmbeddingProviderConfig, GraphProviderConfig, InferenceProviderConfig};
use gauge_providers::{
	embedding,
	graph::{self, GraphHit, TraversalStrategy},
	inference::{self, CandidateHint, InferenceOutcome},
};
use gauge_storage::{
	catalog,
	db::Db,
	models::MetricRecord,
	qdrant::{SimilarityHit, SimilarityStore},
};
pub use rank::{FeatureContribution, LinearModel, RankedResult, ScoreModel, WeightedSumModel};
pub use recall::{ChannelReport, ChannelStatus, RecallOutput};
pub use resolve::{
	ResolutionAttempt, ResolutionState, ResolutionTier, ResolveRequest, ResolveResponse,
};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait SimilarityProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		embedding: Vec<f32>,
		top_k: u32,
		floor: f32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SimilarityHit>>>;
}

pub trait GraphProvider
where
	Self: Send + Sync,
{
	fn traverse<'a>(
		&'a self,
		cfg: &'a GraphProviderConfig,
		tokens: &'a [String],
		strategy: TraversalStrategy,
		max_depth: u32,
		top_k: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<GraphHit>>>;
}

pub trait InferenceProvider
where
	Self: Send + Sync,
{
	fn infer<'a>(
		&'a self,
		cfg: &'a InferenceProviderConfig,
		query: &'a str,
		parsed_intent: &'a Value,
		hints: &'a [CandidateHint],
	) -> BoxFuture<'a, color_eyre::Result<InferenceOutcome>>;
}

pub trait CatalogProvider
where
	Self: Send + Sync,
{
	fn get_metadata<'a>(
		&'a self,
		metric_ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<Vec<MetricRecord>>>;

	fn find_exact<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<MetricRecord>>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<gauge_storage::Error> for ServiceError {
	fn from(err: gauge_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub similarity: Arc<dyn SimilarityProvider>,
	pub graph: Arc<dyn GraphProvider>,
	pub inference: Arc<dyn InferenceProvider>,
	pub catalog: Arc<dyn CatalogProvider>,
}
impl Providers {
	/// Wires the HTTP providers and the live stores.
	pub fn live(db: Arc<Db>, similarity: Arc<SimilarityStore>) -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			similarity: Arc::new(LiveSimilarity { store: similarity }),
			graph: provider.clone(),
			inference: provider,
			catalog: Arc::new(LiveCatalog { db }),
		}
	}
}

pub struct GaugeService {
	pub cfg: Config,
	pub providers: Providers,
}
impl GaugeService {
	pub fn new(cfg: Config, providers: Providers) -> Self {
		Self { cfg, providers }
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed(cfg, text))
	}
}

impl GraphProvider for DefaultProviders {
	fn traverse<'a>(
		&'a self,
		cfg: &'a GraphProviderConfig,
		tokens: &'a [String],
		strategy: TraversalStrategy,
		max_depth: u32,
		top_k: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<GraphHit>>> {
		Box::pin(graph::traverse(cfg, tokens, strategy, max_depth, top_k))
	}
}

impl InferenceProvider for DefaultProviders {
	fn infer<'a>(
		&'a self,
		cfg: &'a InferenceProviderConfig,
		query: &'a str,
		parsed_intent: &'a Value,
		hints: &'a [CandidateHint],
	) -> BoxFuture<'a, color_eyre::Result<InferenceOutcome>> {
		Box::pin(inference::infer(cfg, query, parsed_intent, hints))
	}
}

struct LiveSimilarity {
	store: Arc<SimilarityStore>,
}
impl SimilarityProvider for LiveSimilarity {
	fn search<'a>(
		&'a self,
		embedding: Vec<f32>,
		top_k: u32,
		floor: f32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SimilarityHit>>> {
		Box::pin(async move { Ok(self.store.search(embedding, top_k, floor).await?) })
	}
}

struct LiveCatalog {
	db: Arc<Db>,
}
impl CatalogProvider for LiveCatalog {
	fn get_metadata<'a>(
		&'a self,
		metric_ids: &'a [Uuid],
	) -> BoxFuture<'a, color_eyre::Result<Vec<MetricRecord>>> {
		Box::pin(async move { Ok(catalog::get_metadata(&self.db, metric_ids).await?) })
	}

	fn find_exact<'a>(
		&'a self,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<MetricRecord>>> {
		Box::pin(async move { Ok(catalog::find_exact(&self.db, text).await?) })
	}
}

/// Maps a catalog row to a recall candidate shell. Channel scores and match
/// details are stitched in by the recall merge.
pub fn candidate_from_record(record: &MetricRecord) -> gauge_domain::candidate::MetricCandidate {
	use gauge_domain::{candidate, intent::TimeGranularity};

	candidate::MetricCandidate {
		metric_id: record.metric_id,
		name: record.name.clone(),
		code: record.code.clone(),
		description: record.description.clone(),
		synonyms: record.synonyms.clone(),
		domain: record.domain.clone(),
		importance: record.importance,
		usage_score: record.usage_score,
		dimensions: record.dimensions.clone(),
		min_granularity: record.min_granularity.as_deref().and_then(TimeGranularity::parse),
		freshness: if record.realtime {
			candidate::Freshness::Realtime
		} else {
			candidate::Freshness::Batch
		},
		similarity_score: None,
		relationship_score: None,
		recall_source: candidate::RecallSource::Similarity,
		match_type: None,
		relationship_path: Vec::new(),
		path_strength: None,
		centrality: None,
	}
}
