use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::{QueryIntent, TimeGranularity};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallSource {
	Similarity,
	Relationship,
	Both,
}
impl RecallSource {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Similarity => "similarity",
			Self::Relationship => "relationship",
			Self::Both => "both",
		}
	}
}

/// How the relationship channel matched a candidate, ordered strongest first.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
	Exact,
	Synonym,
	Relationship,
	Inferred,
}
impl MatchType {
	/// Fixed descending scale used by the match-type feature.
	pub fn scale(self) -> f32 {
		match self {
			Self::Exact => 1.0,
			Self::Synonym => 0.8,
			Self::Relationship => 0.5,
			Self::Inferred => 0.3,
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"exact" => Some(Self::Exact),
			"synonym" => Some(Self::Synonym),
			"relationship" => Some(Self::Relationship),
			"inferred" => Some(Self::Inferred),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
	Realtime,
	#[default]
	Batch,
}

/// A metric under consideration for one query. Channel hits only carry the
/// identifier and raw scores; the catalog backfills the descriptive fields.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MetricCandidate {
	pub metric_id: Uuid,
	pub name: String,
	pub code: String,
	pub description: String,
	pub synonyms: Vec<String>,
	/// Slash-separated domain path, e.g. "ecommerce" or "ecommerce/ads".
	pub domain: String,
	pub importance: f32,
	pub usage_score: f32,
	pub dimensions: Vec<String>,
	/// Finest resolution the metric can answer at. None means unconstrained.
	pub min_granularity: Option<TimeGranularity>,
	pub freshness: Freshness,
	pub similarity_score: Option<f32>,
	pub relationship_score: Option<f32>,
	pub recall_source: RecallSource,
	pub match_type: Option<MatchType>,
	/// Relation-type labels along the traversal path; empty for direct matches.
	pub relationship_path: Vec<String>,
	/// Product of edge weights along the path, when the graph reported it.
	pub path_strength: Option<f32>,
	pub centrality: Option<f32>,
}

/// Session-scoped preference weights by domain, neutral when absent.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PreferenceProfile {
	pub domain_weights: std::collections::HashMap<String, f32>,
}

/// Everything the feature extractors and validators read for one query. Built
/// once per resolution call and never mutated afterwards.
#[derive(Clone, Debug)]
pub struct QueryContext {
	pub query: String,
	pub tokens: Vec<String>,
	pub intent: QueryIntent,
	pub domain_hint: Option<String>,
	pub preference: Option<PreferenceProfile>,
}
impl QueryContext {
	pub fn new(intent: QueryIntent, domain_hint: Option<String>) -> Self {
		let tokens = crate::intent::tokenize(&intent.query);

		Self { query: intent.query.clone(), tokens, intent, domain_hint, preference: None }
	}

	pub fn with_preference(mut self, preference: PreferenceProfile) -> Self {
		self.preference = Some(preference);

		self
	}
}

/// Exact vs. parent/child vs. unrelated domain paths. Parent/child earns
/// partial credit, anything else none.
pub fn domain_affinity(candidate_domain: &str, query_domain: &str) -> f32 {
	let candidate = candidate_domain.trim().to_lowercase();
	let query = query_domain.trim().to_lowercase();

	if candidate.is_empty() || query.is_empty() {
		return 0.0;
	}
	if candidate == query {
		return 1.0;
	}
	if candidate.starts_with(&format!("{query}/")) || query.starts_with(&format!("{candidate}/")) {
		return 0.5;
	}

	0.0
}
