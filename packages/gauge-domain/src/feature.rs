use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::candidate::{MetricCandidate, QueryContext, domain_affinity};

pub type Extractor = fn(&MetricCandidate, &QueryContext) -> f32;

/// Neutral value used where an extractor has no evidence either way.
pub const NEUTRAL: f32 = 0.5;

/// The fixed feature registry. Weights in `ranking.weights` must reference
/// these names. Every extractor is pure, clamps to [0, 1], and substitutes a
/// documented default instead of failing on missing optional fields.
pub const FEATURE_REGISTRY: [(&str, Extractor); 11] = [
	("similarity_score", similarity_score),
	("token_overlap", token_overlap),
	("semantic_proxy", semantic_proxy),
	("match_type", match_type),
	("relationship_strength", relationship_strength),
	("path_penalty", path_penalty),
	("centrality", centrality),
	("domain_match", domain_match),
	("importance", importance),
	("usage_frequency", usage_frequency),
	("user_preference", user_preference),
];

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct FeatureVector {
	pub values: BTreeMap<String, f32>,
}
impl FeatureVector {
	pub fn get(&self, name: &str) -> f32 {
		self.values.get(name).copied().unwrap_or(0.0)
	}
}

pub fn extract_all(candidate: &MetricCandidate, context: &QueryContext) -> FeatureVector {
	let mut values = BTreeMap::new();

	for (name, extractor) in FEATURE_REGISTRY {
		values.insert(name.to_string(), extractor(candidate, context));
	}

	FeatureVector { values }
}

/// Rejects weight maps naming features the registry does not know.
pub fn validate_weights(weights: &std::collections::HashMap<String, f32>) -> Result<(), String> {
	for name in weights.keys() {
		if !FEATURE_REGISTRY.iter().any(|(known, _)| known == name) {
			return Err(format!("Unknown feature name in ranking.weights: {name}."));
		}
	}

	Ok(())
}

/// Raw similarity-channel score; 0.0 when the candidate was not recalled by
/// the similarity channel.
fn similarity_score(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	candidate.similarity_score.unwrap_or(0.0).clamp(0.0, 1.0)
}

/// Share of query tokens covered by the candidate's name, code, synonyms, or
/// description; 0.0 for an empty token list.
fn token_overlap(candidate: &MetricCandidate, context: &QueryContext) -> f32 {
	if context.tokens.is_empty() {
		return 0.0;
	}

	let mut haystack = format!(
		"{} {} {}",
		candidate.name.to_lowercase(),
		candidate.code.to_lowercase(),
		candidate.description.to_lowercase(),
	);

	for synonym in &candidate.synonyms {
		haystack.push(' ');
		haystack.push_str(&synonym.to_lowercase());
	}

	let covered = context.tokens.iter().filter(|token| haystack.contains(token.as_str())).count();

	covered as f32 / context.tokens.len() as f32
}

/// Similarity blended with an entity-match boost: full boost for an exact
/// name/code/synonym hit on the core query, half for a substring hit.
fn semantic_proxy(candidate: &MetricCandidate, context: &QueryContext) -> f32 {
	let similarity = candidate.similarity_score.unwrap_or(0.0).clamp(0.0, 1.0);
	let core = context.intent.core_query.to_lowercase();

	if core.is_empty() {
		return similarity * 0.8;
	}

	let exact = candidate.name.to_lowercase() == core
		|| candidate.code.to_lowercase() == core
		|| candidate.synonyms.iter().any(|synonym| synonym.to_lowercase() == core);
	let partial = !exact
		&& (candidate.name.to_lowercase().contains(&core)
			|| candidate.synonyms.iter().any(|synonym| synonym.to_lowercase().contains(&core)));
	let boost = if exact {
		0.2
	} else if partial {
		0.1
	} else {
		0.0
	};

	(similarity * 0.8 + boost).clamp(0.0, 1.0)
}

/// Categorical relationship match quality on a fixed descending scale; 0.0
/// for candidates the relationship channel never saw.
fn match_type(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	candidate.match_type.map(|kind| kind.scale()).unwrap_or(0.0)
}

/// Product of edge weights along the traversal path, neutral for direct or
/// similarity-only recalls.
fn relationship_strength(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	candidate.path_strength.unwrap_or(NEUTRAL).clamp(0.0, 1.0)
}

/// `1 / (1 + path_length)`; 1.0 for direct matches.
fn path_penalty(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	1.0 / (1.0 + candidate.relationship_path.len() as f32)
}

/// Graph centrality proxy as reported by the relationship store, neutral when
/// unreported.
fn centrality(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	candidate.centrality.unwrap_or(NEUTRAL).clamp(0.0, 1.0)
}

/// 1.0 for an exact domain match, 0.5 for parent/child, 0.0 otherwise.
/// Neutral when the query carries no domain hint.
fn domain_match(candidate: &MetricCandidate, context: &QueryContext) -> f32 {
	let Some(query_domain) = context.domain_hint.as_deref() else {
		return NEUTRAL;
	};

	domain_affinity(&candidate.domain, query_domain)
}

fn importance(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	candidate.importance.clamp(0.0, 1.0)
}

/// Usage/recency proxy maintained by the catalog, already ratio-transformed.
fn usage_frequency(candidate: &MetricCandidate, _: &QueryContext) -> f32 {
	candidate.usage_score.clamp(0.0, 1.0)
}

/// Session preference for the candidate's domain; neutral without a profile.
fn user_preference(candidate: &MetricCandidate, context: &QueryContext) -> f32 {
	let Some(profile) = context.preference.as_ref() else {
		return NEUTRAL;
	};
	let domain = candidate.domain.to_lowercase();
	let root = domain.split('/').next().unwrap_or(domain.as_str());

	profile
		.domain_weights
		.get(&domain)
		.or_else(|| profile.domain_weights.get(root))
		.copied()
		.unwrap_or(NEUTRAL)
		.clamp(0.0, 1.0)
}
