use std::collections::HashMap;

use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

use gauge_domain::{
	candidate::{
		Freshness, MatchType, MetricCandidate, PreferenceProfile, QueryContext, RecallSource,
		domain_affinity,
	},
	feature,
	intent::{self, AggregationKind, ComparisonKind, TimeGranularity},
	validate::{self, CheckKind, ValidationRules, ValidationStatus},
};

const NOW: OffsetDateTime = datetime!(2026-03-01 00:00:00 UTC);

fn dummy_candidate() -> MetricCandidate {
	MetricCandidate {
		metric_id: Uuid::from_u128(1),
		name: "GMV".to_string(),
		code: "gmv".to_string(),
		description: "Gross merchandise volume.".to_string(),
		synonyms: vec!["gross merchandise volume".to_string()],
		domain: "ecommerce".to_string(),
		importance: 0.9,
		usage_score: 0.7,
		dimensions: vec!["channel".to_string(), "category".to_string()],
		min_granularity: Some(TimeGranularity::Day),
		freshness: Freshness::Batch,
		similarity_score: Some(0.91),
		relationship_score: Some(0.95),
		recall_source: RecallSource::Both,
		match_type: Some(MatchType::Exact),
		relationship_path: Vec::new(),
		path_strength: Some(1.0),
		centrality: Some(0.8),
	}
}

fn context_for(query: &str) -> QueryContext {
	QueryContext::new(intent::parse(query, NOW), None)
}

#[test]
fn parses_relative_time_range() {
	let intent = intent::parse("GMV last 7 days", NOW);
	let range = intent.time_range.expect("range");

	assert_eq!(range.end, NOW);
	assert_eq!(range.start, NOW - Duration::days(7));
	assert_eq!(intent.core_query, "GMV");
}

#[test]
fn parses_granularity_and_aggregation() {
	let intent = intent::parse("total revenue monthly", NOW);

	assert_eq!(intent.granularity, Some(TimeGranularity::Month));
	assert_eq!(intent.aggregation, Some(AggregationKind::Sum));
	assert_eq!(intent.core_query, "revenue");
}

#[test]
fn parses_dimensions_and_skips_time_words() {
	let intent = intent::parse("orders by region and channel per day", NOW);

	assert_eq!(intent.dimensions, vec!["region".to_string(), "channel".to_string()]);
	assert_eq!(intent.granularity, Some(TimeGranularity::Day));
}

#[test]
fn parses_comparison_and_realtime() {
	let intent = intent::parse("real-time active users yoy", NOW);

	assert!(intent.realtime);
	assert_eq!(intent.comparison, Some(ComparisonKind::YearOverYear));
}

#[test]
fn strips_filler_from_core_query() {
	let intent = intent::parse("show me the average order value", NOW);

	assert_eq!(intent.aggregation, Some(AggregationKind::Avg));
	assert_eq!(intent.core_query, "the order value");
}

#[test]
fn bare_query_keeps_itself_as_core() {
	let intent = intent::parse("GMV", NOW);

	assert_eq!(intent.core_query, "GMV");
	assert!(intent.time_range.is_none());
	assert!(intent.dimensions.is_empty());
}

#[test]
fn rule_confidence_rewards_parsed_elements() {
	let bare = intent::parse("GMV", NOW);
	let rich = intent::parse("total GMV last 30 days by channel", NOW);

	assert!((intent::rule_confidence(&bare, false) - 0.5).abs() < f32::EPSILON);
	assert!((intent::rule_confidence(&bare, true) - 0.8).abs() < f32::EPSILON);
	assert!(intent::rule_confidence(&rich, true) > 0.9);
	assert!(intent::rule_confidence(&rich, true) <= 1.0);
}

#[test]
fn tokenize_dedups_and_drops_short_tokens() {
	let tokens = intent::tokenize("GMV, gmv & a daily GMV!");

	assert_eq!(tokens, vec!["gmv".to_string(), "daily".to_string()]);
}

#[test]
fn granularity_ordering_is_finest_first() {
	assert!(TimeGranularity::Hour.is_finer_than(TimeGranularity::Day));
	assert!(TimeGranularity::Day.is_finer_than(TimeGranularity::Year));
	assert!(!TimeGranularity::Year.is_finer_than(TimeGranularity::Day));
	assert!(!TimeGranularity::Day.is_finer_than(TimeGranularity::Day));
}

#[test]
fn inference_overlay_keeps_unanswered_fields() {
	let parsed = intent::parse("total GMV last 7 days", NOW);
	let merged = parsed.merged_with_inference(&serde_json::json!({
		"core_query": "gross merchandise volume",
		"dimensions": ["channel"],
	}));

	assert_eq!(merged.core_query, "gross merchandise volume");
	assert_eq!(merged.dimensions, vec!["channel".to_string()]);
	assert_eq!(merged.aggregation, Some(AggregationKind::Sum));
	assert!(merged.time_range.is_some());
}

#[test]
fn domain_affinity_grades_paths() {
	assert_eq!(domain_affinity("ecommerce", "ecommerce"), 1.0);
	assert_eq!(domain_affinity("ecommerce/ads", "ecommerce"), 0.5);
	assert_eq!(domain_affinity("ecommerce", "ecommerce/ads"), 0.5);
	assert_eq!(domain_affinity("finance", "ecommerce"), 0.0);
	assert_eq!(domain_affinity("", "ecommerce"), 0.0);
}

#[test]
fn extracts_every_registered_feature() {
	let vector = feature::extract_all(&dummy_candidate(), &context_for("GMV"));

	assert_eq!(vector.values.len(), feature::FEATURE_REGISTRY.len());

	for value in vector.values.values() {
		assert!((0.0..=1.0).contains(value));
	}
}

#[test]
fn token_overlap_is_a_coverage_ratio() {
	let candidate = dummy_candidate();
	let full = feature::extract_all(&candidate, &context_for("gmv"));
	let half = feature::extract_all(&candidate, &context_for("gmv velocity"));

	assert_eq!(full.get("token_overlap"), 1.0);
	assert_eq!(half.get("token_overlap"), 0.5);
}

#[test]
fn semantic_proxy_boosts_exact_entity_hits() {
	let candidate = dummy_candidate();
	let exact = feature::extract_all(&candidate, &context_for("GMV"));
	let mut stranger = candidate.clone();

	stranger.name = "Refund Rate".to_string();
	stranger.code = "refund_rate".to_string();
	stranger.synonyms.clear();

	let miss = feature::extract_all(&stranger, &context_for("GMV"));

	assert!(exact.get("semantic_proxy") > miss.get("semantic_proxy"));
	assert!((exact.get("semantic_proxy") - (0.91 * 0.8 + 0.2)).abs() < 1e-6);
}

#[test]
fn path_penalty_decays_with_hops() {
	let direct = dummy_candidate();
	let mut distant = dummy_candidate();

	distant.relationship_path = vec!["composes".to_string(), "derives".to_string()];

	let ctx = context_for("GMV");

	assert_eq!(feature::extract_all(&direct, &ctx).get("path_penalty"), 1.0);
	assert!((feature::extract_all(&distant, &ctx).get("path_penalty") - 1.0 / 3.0).abs() < 1e-6);
}

#[test]
fn missing_optional_fields_fall_back_to_defaults() {
	let mut candidate = dummy_candidate();

	candidate.similarity_score = None;
	candidate.match_type = None;
	candidate.path_strength = None;
	candidate.centrality = None;

	let vector = feature::extract_all(&candidate, &context_for("GMV"));

	assert_eq!(vector.get("similarity_score"), 0.0);
	assert_eq!(vector.get("match_type"), 0.0);
	assert_eq!(vector.get("relationship_strength"), feature::NEUTRAL);
	assert_eq!(vector.get("centrality"), feature::NEUTRAL);
	assert_eq!(vector.get("domain_match"), feature::NEUTRAL);
	assert_eq!(vector.get("user_preference"), feature::NEUTRAL);
}

#[test]
fn preference_prefers_full_path_over_root() {
	let mut candidate = dummy_candidate();

	candidate.domain = "ecommerce/ads".to_string();

	let mut weights = HashMap::new();

	weights.insert("ecommerce".to_string(), 0.6);
	weights.insert("ecommerce/ads".to_string(), 0.9);

	let ctx = context_for("GMV")
		.with_preference(PreferenceProfile { domain_weights: weights });

	assert_eq!(feature::extract_all(&candidate, &ctx).get("user_preference"), 0.9);
}

#[test]
fn validate_weights_rejects_unknown_names() {
	let mut weights = HashMap::new();

	weights.insert("similarity_score".to_string(), 1.0);

	assert!(feature::validate_weights(&weights).is_ok());

	weights.insert("telepathy".to_string(), 1.0);
	assert!(feature::validate_weights(&weights).is_err());
}

#[test]
fn chain_passes_a_clean_candidate() {
	let outcomes = validate::run_chain(
		&dummy_candidate(),
		&context_for("GMV last 7 days"),
		&ValidationRules::default(),
	);

	assert_eq!(outcomes.len(), 4);
	assert!(outcomes.iter().all(|o| o.status == ValidationStatus::Passed));
	assert!(!validate::has_failed(&outcomes));
}

#[test]
fn missing_dimension_fails_the_chain() {
	let outcomes = validate::run_chain(
		&dummy_candidate(),
		&context_for("GMV by region"),
		&ValidationRules::default(),
	);
	let dimension = outcomes
		.iter()
		.find(|o| o.check == CheckKind::DimensionCompatibility)
		.expect("dimension outcome");

	assert_eq!(dimension.status, ValidationStatus::Failed);
	assert!(dimension.message.contains("region"));
	assert!(validate::has_failed(&outcomes));
}

#[test]
fn finer_granularity_than_supported_fails() {
	let outcomes = validate::run_chain(
		&dummy_candidate(),
		&context_for("GMV hourly"),
		&ValidationRules::default(),
	);
	let granularity =
		outcomes.iter().find(|o| o.check == CheckKind::TimeGranularity).expect("outcome");

	assert_eq!(granularity.status, ValidationStatus::Failed);
	assert!(granularity.suggestion.is_some());
}

#[test]
fn coarser_granularity_passes() {
	let outcomes = validate::run_chain(
		&dummy_candidate(),
		&context_for("GMV monthly"),
		&ValidationRules::default(),
	);

	assert!(!validate::has_failed(&outcomes));
}

#[test]
fn realtime_query_on_batch_metric_warns_without_dropping() {
	let outcomes = validate::run_chain(
		&dummy_candidate(),
		&context_for("real-time GMV"),
		&ValidationRules::default(),
	);
	let freshness =
		outcomes.iter().find(|o| o.check == CheckKind::DataFreshness).expect("outcome");

	assert_eq!(freshness.status, ValidationStatus::Warning);
	assert!(!validate::has_failed(&outcomes));
}

#[test]
fn sensitive_domain_warns() {
	let mut candidate = dummy_candidate();

	candidate.domain = "finance/revenue".to_string();

	let rules = ValidationRules { sensitive_domains: vec!["finance".to_string()] };
	let outcomes = validate::run_chain(&candidate, &context_for("GMV"), &rules);
	let access = outcomes.iter().find(|o| o.check == CheckKind::Access).expect("outcome");

	assert_eq!(access.status, ValidationStatus::Warning);
	assert!(!validate::has_failed(&outcomes));
}
