use std::{collections::HashMap, sync::Arc, time::Duration};

use serde_json::Value;
use uuid::Uuid;

use gauge_domain::{
	candidate::RecallSource,
	validate::ValidationStatus,
};
use gauge_providers::inference::InferenceOutcome;
use gauge_service::{
	GaugeService, Providers, ResolutionState, ResolutionTier, ResolveRequest, ServiceError,
};
use gauge_storage::models::MetricRecord;
use gauge_testkit::{
	ScriptedInference, StaticCatalog, StaticEmbedding, StaticGraph, StaticSimilarity, graph_hit,
	metric_record, similarity_hit, test_config,
};

fn gmv_record() -> MetricRecord {
	let mut record = metric_record(1, "GMV", "gmv", "ecommerce");

	record.description = "Gross merchandise volume across all channels.".to_string();
	record.synonyms = vec!["gross merchandise volume".to_string()];
	record.importance = 0.9;
	record.usage_score = 0.7;
	record.dimensions = vec!["channel".to_string(), "category".to_string()];
	record.min_granularity = Some("day".to_string());
	record
}

fn catalog() -> Vec<MetricRecord> {
	let mut orders = metric_record(2, "Orders by Region", "orders_region", "ecommerce");

	orders.dimensions = vec!["region".to_string()];
	orders.importance = 0.6;

	let margin = metric_record(3, "Gross Margin", "gross_margin", "finance/revenue");

	vec![gmv_record(), orders, margin]
}

fn service_with(
	similarity: StaticSimilarity,
	graph: StaticGraph,
	inference: ScriptedInference,
) -> GaugeService {
	GaugeService::new(test_config(), Providers {
		embedding: Arc::new(StaticEmbedding::default()),
		similarity: Arc::new(similarity),
		graph: Arc::new(graph),
		inference: Arc::new(inference),
		catalog: Arc::new(StaticCatalog { records: catalog() }),
	})
}

fn request(query: &str) -> ResolveRequest {
	ResolveRequest { query: query.to_string(), domain_hint: None, preference: None, top_k: None }
}

#[tokio::test]
async fn gmv_resolves_at_recall_rank_with_both_channels() {
	let service = service_with(
		StaticSimilarity::with_hits(vec![similarity_hit(1, 0.91), similarity_hit(3, 0.55)]),
		StaticGraph::with_hits(vec![graph_hit(1, 0.95)]),
		ScriptedInference::failing(),
	);
	let response = service.resolve(request("GMV")).await.expect("resolve failed");

	assert_eq!(response.state, ResolutionState::Resolved);
	assert_eq!(response.tier, Some(ResolutionTier::RecallRank));
	assert!(response.confidence >= 0.85);

	let top = &response.results[0];

	assert_eq!(top.candidate.metric_id, Uuid::from_u128(1));
	assert_eq!(top.candidate.recall_source, RecallSource::Both);
	assert_eq!(top.candidate.similarity_score, Some(0.91));
	assert_eq!(top.candidate.relationship_score, Some(0.95));
	assert!(top.validations.iter().all(|v| v.status == ValidationStatus::Passed));

	// The deterministic tier saw the exact hit but its confidence stayed
	// below the 0.9 bar for a bare query.
	assert_eq!(response.attempts.len(), 2);
	assert_eq!(response.attempts[0].tier, ResolutionTier::Deterministic);
	assert!(!response.attempts[0].success);
	assert!((response.attempts[0].confidence - 0.8).abs() < 1e-6);
	assert!(response.attempts[1].success);
}

#[tokio::test]
async fn rich_exact_query_resolves_deterministically() {
	let similarity = StaticSimilarity::with_hits(vec![similarity_hit(1, 0.91)]);
	let graph = StaticGraph::with_hits(vec![graph_hit(1, 0.95)]);
	let service = service_with(similarity, graph, ScriptedInference::failing());
	let response =
		service.resolve(request("total GMV last 30 days by channel")).await.expect("resolve failed");

	assert_eq!(response.state, ResolutionState::Resolved);
	assert_eq!(response.tier, Some(ResolutionTier::Deterministic));
	assert_eq!(response.attempts.len(), 1);
	assert_eq!(response.results[0].candidate.metric_id, Uuid::from_u128(1));
	assert_eq!(response.intent.dimensions, vec!["channel".to_string()]);
}

#[tokio::test]
async fn unsupported_dimension_excludes_candidate_everywhere() {
	let service = service_with(
		StaticSimilarity::with_hits(vec![similarity_hit(1, 0.91), similarity_hit(2, 0.6)]),
		StaticGraph::with_hits(vec![graph_hit(1, 0.95)]),
		ScriptedInference::failing(),
	);
	let response = service.resolve(request("GMV by region")).await.expect("resolve failed");

	// GMV carries channel/category only, so the region request fails its
	// dimension check and it never appears, at any tier.
	assert!(
		response
			.results
			.iter()
			.all(|result| result.candidate.metric_id != Uuid::from_u128(1))
	);
	assert_eq!(response.state, ResolutionState::Unresolved);
	assert!(response.results.iter().any(|r| r.candidate.metric_id == Uuid::from_u128(2)));
}

#[tokio::test]
async fn slow_relationship_channel_degrades_and_is_recorded() {
	let similarity = StaticSimilarity {
		hits: vec![similarity_hit(1, 0.91)],
		delay: Duration::from_millis(50),
		..StaticSimilarity::default()
	};
	let graph = StaticGraph {
		hits: vec![graph_hit(1, 0.95)],
		delay: Duration::from_millis(300),
		..StaticGraph::default()
	};
	let inference = ScriptedInference::with_outcome(InferenceOutcome {
		intent: serde_json::json!({ "core_query": "gross merchandise volume" }),
		confidence: 0.9,
		reasoning: "GMV abbreviates gross merchandise volume.".to_string(),
		candidate_scores: HashMap::from([(Uuid::from_u128(1), 0.92)]),
	});
	let service = service_with(similarity, graph, inference);
	let response = service.resolve(request("GMV")).await.expect("resolve failed");

	// The 300ms channel blew its 200ms budget: its hits are absent, the
	// similarity side still went through, and the inference tier closed it.
	assert_eq!(response.state, ResolutionState::Resolved);
	assert_eq!(response.tier, Some(ResolutionTier::Inference));

	let top = &response.results[0];

	assert_eq!(top.candidate.metric_id, Uuid::from_u128(1));
	assert_eq!(top.candidate.recall_source, RecallSource::Similarity);
	assert!((top.score - 0.92).abs() < 1e-6);

	let recall_attempt = &response.attempts[1];
	let channels = recall_attempt.metadata.get("channels").and_then(Value::as_array).expect("channels");
	let relationship = channels
		.iter()
		.find(|entry| entry.get("channel").and_then(Value::as_str) == Some("relationship"))
		.expect("relationship report");

	assert_eq!(relationship.get("status").and_then(Value::as_str), Some("timed_out"));
}

#[tokio::test]
async fn failed_channel_keeps_resolution_alive() {
	let similarity = StaticSimilarity { fail: true, ..StaticSimilarity::default() };
	let graph = StaticGraph::with_hits(vec![graph_hit(1, 0.95)]);
	let inference = ScriptedInference::with_outcome(InferenceOutcome {
		intent: Value::Null,
		confidence: 0.7,
		reasoning: String::new(),
		candidate_scores: HashMap::from([(Uuid::from_u128(1), 0.8)]),
	});
	let service = service_with(similarity, graph, inference);
	let response = service.resolve(request("merchandise volume")).await.expect("resolve failed");

	assert_eq!(response.state, ResolutionState::Resolved);
	assert_eq!(response.tier, Some(ResolutionTier::Inference));
	assert_eq!(response.results[0].candidate.recall_source, RecallSource::Relationship);
}

#[tokio::test]
async fn inference_failure_returns_best_effort_suggestions() {
	let service = service_with(
		StaticSimilarity::with_hits(vec![similarity_hit(3, 0.55)]),
		StaticGraph::default(),
		ScriptedInference::failing(),
	);
	let response = service.resolve(request("margin trend")).await.expect("resolve failed");

	assert_eq!(response.state, ResolutionState::Unresolved);
	assert_eq!(response.tier, None);
	assert_eq!(response.attempts.len(), 3);
	assert!(!response.attempts[2].success);
	// Suggestions survive even though no tier cleared its bar.
	assert_eq!(response.results[0].candidate.metric_id, Uuid::from_u128(3));
}

#[tokio::test]
async fn inference_intent_overlay_revalidates_candidates() {
	let inference = ScriptedInference::with_outcome(InferenceOutcome {
		intent: serde_json::json!({ "dimensions": ["region"] }),
		confidence: 0.8,
		reasoning: String::new(),
		candidate_scores: HashMap::from([
			(Uuid::from_u128(1), 0.9),
			(Uuid::from_u128(2), 0.7),
		]),
	});
	let service = service_with(
		StaticSimilarity::with_hits(vec![similarity_hit(1, 0.7), similarity_hit(2, 0.6)]),
		StaticGraph::default(),
		inference,
	);
	let response = service.resolve(request("merchandise numbers")).await.expect("resolve failed");

	// The model added a region dimension, which knocks GMV out on the
	// second validation pass despite its higher score.
	assert_eq!(response.state, ResolutionState::Resolved);
	assert_eq!(response.tier, Some(ResolutionTier::Inference));
	assert_eq!(response.results[0].candidate.metric_id, Uuid::from_u128(2));
	assert!(
		response.results.iter().all(|result| result.candidate.metric_id != Uuid::from_u128(1))
	);
}

#[tokio::test]
async fn model_scored_candidates_precede_unscored_ones() {
	let inference = ScriptedInference::with_outcome(InferenceOutcome {
		intent: Value::Null,
		confidence: 0.7,
		reasoning: String::new(),
		candidate_scores: HashMap::from([(Uuid::from_u128(2), 0.6)]),
	});
	let service = service_with(
		StaticSimilarity::with_hits(vec![similarity_hit(1, 0.9), similarity_hit(2, 0.4)]),
		StaticGraph::default(),
		inference,
	);
	let response = service.resolve(request("order figures")).await.expect("resolve failed");

	// The model scored only metric 2; it leads even though metric 1 keeps a
	// higher fusion score, which never competes with model scores.
	assert_eq!(response.tier, Some(ResolutionTier::Inference));
	assert_eq!(response.results[0].candidate.metric_id, Uuid::from_u128(2));
	assert!((response.results[0].score - 0.6).abs() < 1e-6);
	assert_eq!(response.results[1].candidate.metric_id, Uuid::from_u128(1));
}

#[tokio::test]
async fn inference_tier_is_bounded_by_the_remaining_budget() {
	let mut cfg = test_config();

	cfg.resolver.overall_timeout_ms = 300;

	let inference = Arc::new(ScriptedInference {
		delay: Duration::from_secs(2),
		..ScriptedInference::with_outcome(InferenceOutcome {
			intent: Value::Null,
			confidence: 0.9,
			reasoning: String::new(),
			candidate_scores: HashMap::from([(Uuid::from_u128(1), 0.92)]),
		})
	});
	let service = GaugeService::new(cfg, Providers {
		embedding: Arc::new(StaticEmbedding::default()),
		similarity: Arc::new(StaticSimilarity::with_hits(vec![similarity_hit(1, 0.91)])),
		graph: Arc::new(StaticGraph::default()),
		inference: inference.clone(),
		catalog: Arc::new(StaticCatalog { records: catalog() }),
	});
	let response = service.resolve(request("GMV")).await.expect("resolve failed");

	// The 2s model call gets cut off at the ~300ms left in the budget and
	// the tier fails over to best-effort suggestions, without a retry.
	assert_eq!(response.state, ResolutionState::Unresolved);
	assert_eq!(response.tier, None);
	assert_eq!(response.attempts.len(), 3);
	assert!(!response.attempts[2].success);
	assert_eq!(
		response.attempts[2].metadata.get("error").and_then(Value::as_str),
		Some("timed_out")
	);
	assert_eq!(response.results[0].candidate.metric_id, Uuid::from_u128(1));
	assert_eq!(inference.call_count(), 1);
}

#[tokio::test]
async fn sensitive_domain_warns_but_still_ranks() {
	let inference = ScriptedInference::with_outcome(InferenceOutcome {
		intent: Value::Null,
		confidence: 0.75,
		reasoning: String::new(),
		candidate_scores: HashMap::from([(Uuid::from_u128(3), 0.85)]),
	});
	let service = service_with(
		StaticSimilarity::with_hits(vec![similarity_hit(3, 0.8)]),
		StaticGraph::default(),
		inference,
	);
	let response = service.resolve(request("gross margin")).await.expect("resolve failed");

	let top = &response.results[0];

	assert_eq!(top.candidate.metric_id, Uuid::from_u128(3));
	assert!(top.validations.iter().any(|v| v.status == ValidationStatus::Warning));
}

#[tokio::test]
async fn each_channel_runs_exactly_once_per_resolution() {
	let similarity = Arc::new(StaticSimilarity::with_hits(vec![similarity_hit(1, 0.91)]));
	let graph = Arc::new(StaticGraph::with_hits(vec![graph_hit(1, 0.95)]));
	let inference = Arc::new(ScriptedInference::failing());
	let service = GaugeService::new(test_config(), Providers {
		embedding: Arc::new(StaticEmbedding::default()),
		similarity: similarity.clone(),
		graph: graph.clone(),
		inference: inference.clone(),
		catalog: Arc::new(StaticCatalog { records: catalog() }),
	});
	let response = service.resolve(request("GMV")).await.expect("resolve failed");

	assert_eq!(response.tier, Some(ResolutionTier::RecallRank));
	assert_eq!(similarity.call_count(), 1);
	assert_eq!(graph.call_count(), 1);
	// Tier two settled it, so the model was never consulted.
	assert_eq!(inference.call_count(), 0);
}

#[tokio::test]
async fn empty_query_is_rejected() {
	let service = service_with(
		StaticSimilarity::default(),
		StaticGraph::default(),
		ScriptedInference::failing(),
	);

	match service.resolve(request("   ")).await {
		Err(ServiceError::InvalidRequest { .. }) => {},
		other => panic!("expected InvalidRequest, got {other:?}"),
	}
}
