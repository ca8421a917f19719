use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use gauge_domain::{
	candidate::{MatchType, PreferenceProfile, QueryContext, RecallSource},
	intent::{self, QueryIntent},
	validate::ValidationRules,
};
use gauge_providers::inference::CandidateHint;

use crate::{
	GaugeService, ServiceError, ServiceResult, candidate_from_record,
	rank::{self, RankedResult, WeightedSumModel},
	recall,
};

#[derive(Clone, Debug, Deserialize)]
pub struct ResolveRequest {
	pub query: String,
	#[serde(default)]
	pub domain_hint: Option<String>,
	#[serde(default)]
	pub preference: Option<PreferenceProfile>,
	/// Overrides `ranking.top_k` for this call.
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
	Deterministic,
	RecallRank,
	Inference,
}
impl ResolutionTier {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Deterministic => "deterministic",
			Self::RecallRank => "recall_rank",
			Self::Inference => "inference",
		}
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
	Resolved,
	Unresolved,
}

/// One tier's outcome, kept in order for the audit trail.
#[derive(Clone, Debug, Serialize)]
pub struct ResolutionAttempt {
	pub tier: ResolutionTier,
	pub success: bool,
	pub confidence: f32,
	pub elapsed_ms: u64,
	pub metadata: Value,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
	pub state: ResolutionState,
	/// The tier that resolved the query; absent when unresolved.
	pub tier: Option<ResolutionTier>,
	pub confidence: f32,
	pub results: Vec<RankedResult>,
	pub intent: QueryIntent,
	pub attempts: Vec<ResolutionAttempt>,
}

impl GaugeService {
	/// Cascades through the deterministic, recall-rank, and inference tiers
	/// until one clears its confidence threshold. Escalation is monotonic;
	/// an exhausted overall budget short-circuits to the best effort so far.
	pub async fn resolve(&self, req: ResolveRequest) -> ServiceResult<ResolveResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "Query must not be empty.".to_string(),
			});
		}

		let started = Instant::now();
		let budget = Duration::from_millis(self.cfg.resolver.overall_timeout_ms);
		let parsed = intent::parse(query, OffsetDateTime::now_utc());
		let mut context = QueryContext::new(parsed, req.domain_hint.clone());

		if let Some(preference) = req.preference.clone() {
			context = context.with_preference(preference);
		}

		let rules = ValidationRules::from_config(&self.cfg.validation);
		let model = WeightedSumModel::new(self.cfg.ranking.weights.clone());
		let top_k = req.top_k.unwrap_or(self.cfg.ranking.top_k).max(1);
		let mut attempts = Vec::new();

		// Tier 1: rule parse plus exact catalog lookup.
		let tier_started = Instant::now();
		let exact = match self.providers.catalog.find_exact(&context.intent.core_query).await {
			Ok(record) => record,
			Err(err) => {
				tracing::warn!(error = %err, "Exact catalog lookup failed, escalating.");

				None
			},
		};
		let confidence = intent::rule_confidence(&context.intent, exact.is_some());
		let deterministic_results = exact
			.as_ref()
			.map(|record| {
				let mut candidate = candidate_from_record(record);

				candidate.recall_source = RecallSource::Relationship;
				candidate.match_type = Some(MatchType::Exact);

				rank::rank_candidates(vec![candidate], &context, &model, &rules, top_k)
			})
			.unwrap_or_default();
		let resolved = confidence >= self.cfg.resolver.deterministic_threshold
			&& !deterministic_results.is_empty();

		attempts.push(ResolutionAttempt {
			tier: ResolutionTier::Deterministic,
			success: resolved,
			confidence,
			elapsed_ms: tier_started.elapsed().as_millis() as u64,
			metadata: serde_json::json!({
				"exact_match": exact.is_some(),
				"core_query": context.intent.core_query,
			}),
		});

		if resolved {
			return Ok(ResolveResponse {
				state: ResolutionState::Resolved,
				tier: Some(ResolutionTier::Deterministic),
				confidence,
				results: deterministic_results,
				intent: context.intent.clone(),
				attempts,
			});
		}
		if started.elapsed() >= budget {
			return Ok(best_effort(deterministic_results, confidence, context.intent, attempts));
		}

		// Tier 2: dual-channel recall plus fusion ranking.
		let tier_started = Instant::now();
		let recalled = recall::dual_recall(self, &context).await?;
		let pool = recalled.candidates.clone();
		let ranked = rank::rank_candidates(recalled.candidates, &context, &model, &rules, top_k);
		let confidence = ranked.first().map(|result| result.score).unwrap_or(0.0);
		let resolved = confidence >= self.cfg.resolver.ranked_threshold;
		let channels: Vec<Value> = recalled
			.reports
			.iter()
			.map(|report| {
				serde_json::json!({
					"channel": report.channel,
					"status": report.status.as_str(),
					"hits": report.hits,
					"elapsed_ms": report.elapsed_ms,
				})
			})
			.collect();

		attempts.push(ResolutionAttempt {
			tier: ResolutionTier::RecallRank,
			success: resolved,
			confidence,
			elapsed_ms: tier_started.elapsed().as_millis() as u64,
			metadata: serde_json::json!({
				"channels": channels,
				"candidates": pool.len(),
				"survivors": ranked.len(),
			}),
		});

		if resolved {
			return Ok(ResolveResponse {
				state: ResolutionState::Resolved,
				tier: Some(ResolutionTier::RecallRank),
				confidence,
				results: ranked,
				intent: context.intent.clone(),
				attempts,
			});
		}
		if started.elapsed() >= budget {
			return Ok(best_effort(ranked, confidence, context.intent, attempts));
		}

		// Tier 3: language-model inference over the recall survivors.
		let tier_started = Instant::now();
		let hints: Vec<CandidateHint> = ranked
			.iter()
			.take(MAX_INFERENCE_HINTS)
			.map(|result| CandidateHint {
				metric_id: result.candidate.metric_id,
				name: result.candidate.name.clone(),
				code: result.candidate.code.clone(),
				description: result.candidate.description.clone(),
				domain: result.candidate.domain.clone(),
			})
			.collect();
		let parsed_intent = serde_json::to_value(&context.intent)
			.map_err(|err| ServiceError::Provider { message: err.to_string() })?;
		// The tier gets whatever is left of the overall budget, never more.
		let remaining = budget.saturating_sub(started.elapsed());
		let outcome = match tokio::time::timeout(
			remaining,
			self.providers.inference.infer(
				&self.cfg.providers.inference,
				query,
				&parsed_intent,
				&hints,
			),
		)
		.await
		{
			Ok(Ok(outcome)) => outcome,
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Inference tier failed.");
				attempts.push(ResolutionAttempt {
					tier: ResolutionTier::Inference,
					success: false,
					confidence: 0.0,
					elapsed_ms: tier_started.elapsed().as_millis() as u64,
					metadata: serde_json::json!({ "error": err.to_string() }),
				});

				return Ok(best_effort(ranked, confidence, context.intent, attempts));
			},
			Err(_) => {
				tracing::warn!(
					budget_ms = remaining.as_millis() as u64,
					"Inference tier timed out.",
				);
				attempts.push(ResolutionAttempt {
					tier: ResolutionTier::Inference,
					success: false,
					confidence: 0.0,
					elapsed_ms: tier_started.elapsed().as_millis() as u64,
					metadata: serde_json::json!({ "error": "timed_out" }),
				});

				return Ok(best_effort(ranked, confidence, context.intent, attempts));
			},
		};

		let merged_intent = context.intent.merged_with_inference(&outcome.intent);
		let mut inference_context = QueryContext::new(merged_intent, req.domain_hint);

		if let Some(preference) = req.preference {
			inference_context = inference_context.with_preference(preference);
		}

		let revalidated =
			rank::rank_candidates(pool, &inference_context, &model, &rules, u32::MAX);

		// The model's scores are authoritative where present: scored
		// candidates lead, ordered by model score; unscored ones follow in
		// their fusion-rank order.
		let mut scored = Vec::new();
		let mut unscored = Vec::new();

		for mut result in revalidated {
			match outcome.candidate_scores.get(&result.candidate.metric_id) {
				Some(score) => {
					result.score = score.clamp(0.0, 1.0);
					scored.push(result);
				},
				None => unscored.push(result),
			}
		}

		scored.sort_by(|left, right| {
			rank::cmp_f32_desc(left.score, right.score)
				.then_with(|| {
					rank::cmp_f32_desc(left.candidate.importance, right.candidate.importance)
				})
				.then_with(|| left.candidate.metric_id.cmp(&right.candidate.metric_id))
		});

		let mut reranked = scored;

		reranked.extend(unscored);
		reranked.truncate(top_k as usize);

		let confidence = outcome.confidence;
		let resolved =
			confidence >= self.cfg.resolver.inference_threshold && !reranked.is_empty();

		attempts.push(ResolutionAttempt {
			tier: ResolutionTier::Inference,
			success: resolved,
			confidence,
			elapsed_ms: tier_started.elapsed().as_millis() as u64,
			metadata: serde_json::json!({
				"reasoning": outcome.reasoning,
				"scored": outcome.candidate_scores.len(),
				"hints": hints.len(),
			}),
		});

		if resolved {
			return Ok(ResolveResponse {
				state: ResolutionState::Resolved,
				tier: Some(ResolutionTier::Inference),
				confidence,
				results: reranked,
				intent: inference_context.intent.clone(),
				attempts,
			});
		}

		Ok(best_effort(reranked, confidence, inference_context.intent, attempts))
	}
}

const MAX_INFERENCE_HINTS: usize = 10;

/// An unresolved response still carries the best-ranked survivors so the
/// caller can offer suggestions.
fn best_effort(
	results: Vec<RankedResult>,
	confidence: f32,
	intent: QueryIntent,
	attempts: Vec<ResolutionAttempt>,
) -> ResolveResponse {
	ResolveResponse {
		state: ResolutionState::Unresolved,
		tier: None,
		confidence,
		results,
		intent,
		attempts,
	}
}
