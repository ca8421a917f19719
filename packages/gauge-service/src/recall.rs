use std::{
	collections::HashMap,
	time::{Duration, Instant},
};

use tokio::time::timeout;
use uuid::Uuid;

use gauge_domain::candidate::{MatchType, MetricCandidate, QueryContext, RecallSource};
use gauge_providers::graph::{GraphHit, TraversalStrategy};
use gauge_storage::qdrant::SimilarityHit;

use crate::{GaugeService, ServiceResult, candidate_from_record};

pub const SIMILARITY_CHANNEL: &str = "similarity";
pub const RELATIONSHIP_CHANNEL: &str = "relationship";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelStatus {
	Ok,
	TimedOut,
	Failed,
}
impl ChannelStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Ok => "ok",
			Self::TimedOut => "timed_out",
			Self::Failed => "failed",
		}
	}
}

/// What one recall channel contributed, kept for the attempt log.
#[derive(Clone, Debug)]
pub struct ChannelReport {
	pub channel: &'static str,
	pub status: ChannelStatus,
	pub hits: usize,
	pub elapsed_ms: u64,
}

#[derive(Debug)]
pub struct RecallOutput {
	pub candidates: Vec<MetricCandidate>,
	pub reports: Vec<ChannelReport>,
}
impl RecallOutput {
	pub fn degraded(&self) -> bool {
		self.reports.iter().any(|report| report.status != ChannelStatus::Ok)
	}
}

/// Runs both recall channels concurrently under per-channel budgets, merges
/// by metric id, and backfills catalog metadata. A slow or broken channel
/// degrades the output instead of failing the call; only a catalog error is
/// fatal.
pub async fn dual_recall(
	service: &GaugeService,
	context: &QueryContext,
) -> ServiceResult<RecallOutput> {
	let recall_cfg = &service.cfg.recall;
	let channel_budget = Duration::from_millis(recall_cfg.channel_timeout_ms);
	let overall_budget = channel_budget + Duration::from_millis(recall_cfg.grace_ms);

	let similarity_task = async {
		let started = Instant::now();
		let outcome = timeout(channel_budget, async {
			let embedding = service
				.providers
				.embedding
				.embed(&service.cfg.providers.embedding, &context.intent.core_query)
				.await?;

			service
				.providers
				.similarity
				.search(embedding, recall_cfg.similarity_top_k, recall_cfg.similarity_floor)
				.await
		})
		.await;

		(outcome, started.elapsed())
	};
	let relationship_task = async {
		let started = Instant::now();
		let outcome = timeout(
			channel_budget,
			service.providers.graph.traverse(
				&service.cfg.providers.graph,
				&context.tokens,
				TraversalStrategy::Combined,
				recall_cfg.max_depth,
				recall_cfg.relationship_top_k,
			),
		)
		.await;

		(outcome, started.elapsed())
	};

	let started = Instant::now();
	let (similarity_hits, relationship_hits, mut reports) =
		match timeout(overall_budget, async { tokio::join!(similarity_task, relationship_task) })
			.await
		{
			Ok(((similarity, similarity_elapsed), (relationship, relationship_elapsed))) => {
				let (similarity_hits, similarity_report) =
					settle(SIMILARITY_CHANNEL, similarity, similarity_elapsed);
				let (relationship_hits, relationship_report) =
					settle(RELATIONSHIP_CHANNEL, relationship, relationship_elapsed);

				(similarity_hits, relationship_hits, vec![similarity_report, relationship_report])
			},
			Err(_) => {
				let elapsed_ms = started.elapsed().as_millis() as u64;

				tracing::warn!(elapsed_ms, "Recall deadline expired before either channel settled.");

				let report = |channel| ChannelReport {
					channel,
					status: ChannelStatus::TimedOut,
					hits: 0,
					elapsed_ms,
				};

				(Vec::new(), Vec::new(), vec![
					report(SIMILARITY_CHANNEL),
					report(RELATIONSHIP_CHANNEL),
				])
			},
		};

	let merged = merge_channels(similarity_hits, relationship_hits);
	let candidates = enrich(service, merged).await?;

	for report in &mut reports {
		if report.status == ChannelStatus::Ok {
			continue;
		}

		tracing::warn!(
			channel = report.channel,
			status = report.status.as_str(),
			elapsed_ms = report.elapsed_ms,
			"Recall channel degraded.",
		);
	}

	Ok(RecallOutput { candidates, reports })
}

fn settle<T>(
	channel: &'static str,
	outcome: Result<color_eyre::Result<Vec<T>>, tokio::time::error::Elapsed>,
	elapsed: Duration,
) -> (Vec<T>, ChannelReport) {
	let elapsed_ms = elapsed.as_millis() as u64;

	match outcome {
		Ok(Ok(hits)) => {
			let report =
				ChannelReport { channel, status: ChannelStatus::Ok, hits: hits.len(), elapsed_ms };

			(hits, report)
		},
		Ok(Err(err)) => {
			tracing::warn!(channel, error = %err, "Recall channel failed.");

			(Vec::new(), ChannelReport { channel, status: ChannelStatus::Failed, hits: 0, elapsed_ms })
		},
		Err(_) => (Vec::new(), ChannelReport {
			channel,
			status: ChannelStatus::TimedOut,
			hits: 0,
			elapsed_ms,
		}),
	}
}

/// Per-metric union of the two channels before catalog enrichment.
#[derive(Debug)]
pub struct MergedHit {
	pub metric_id: Uuid,
	pub similarity: Option<f32>,
	pub relationship: Option<GraphHit>,
}

/// Unions channel hits by metric id. A metric both channels saw keeps both
/// raw scores and is tagged accordingly; channel-internal duplicates keep
/// their best score.
pub fn merge_channels(
	similarity_hits: Vec<SimilarityHit>,
	relationship_hits: Vec<GraphHit>,
) -> Vec<MergedHit> {
	let mut order = Vec::new();
	let mut by_id: HashMap<Uuid, MergedHit> = HashMap::new();

	for hit in similarity_hits {
		let merged = by_id.entry(hit.metric_id).or_insert_with(|| {
			order.push(hit.metric_id);

			MergedHit { metric_id: hit.metric_id, similarity: None, relationship: None }
		});

		merged.similarity = Some(merged.similarity.map_or(hit.score, |s| s.max(hit.score)));
	}
	for hit in relationship_hits {
		let merged = by_id.entry(hit.metric_id).or_insert_with(|| {
			order.push(hit.metric_id);

			MergedHit { metric_id: hit.metric_id, similarity: None, relationship: None }
		});

		if merged.relationship.as_ref().is_none_or(|existing| existing.score < hit.score) {
			merged.relationship = Some(hit);
		}
	}

	order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
}

async fn enrich(service: &GaugeService, merged: Vec<MergedHit>) -> ServiceResult<Vec<MetricCandidate>> {
	if merged.is_empty() {
		return Ok(Vec::new());
	}

	let ids: Vec<Uuid> = merged.iter().map(|hit| hit.metric_id).collect();
	let records = service.providers.catalog.get_metadata(&ids).await?;
	let by_id: HashMap<Uuid, _> =
		records.into_iter().map(|record| (record.metric_id, record)).collect();

	let mut candidates = Vec::with_capacity(merged.len());
	for hit in merged {
		let Some(record) = by_id.get(&hit.metric_id) else {
			tracing::warn!(metric_id = %hit.metric_id, "Recalled metric is missing from the catalog.");

			continue;
		};
		let mut candidate = candidate_from_record(record);

		candidate.recall_source = match (&hit.similarity, &hit.relationship) {
			(Some(_), Some(_)) => RecallSource::Both,
			(None, Some(_)) => RecallSource::Relationship,
			_ => RecallSource::Similarity,
		};
		candidate.similarity_score = hit.similarity;

		if let Some(relationship) = hit.relationship {
			candidate.relationship_score = Some(relationship.score.clamp(0.0, 1.0));
			candidate.match_type = Some(
				MatchType::parse(&relationship.match_type).unwrap_or(MatchType::Relationship),
			);
			candidate.relationship_path = relationship.path;
			candidate.path_strength = relationship.strength;
			candidate.centrality = relationship.centrality;
		}

		candidates.push(candidate);
	}

	Ok(candidates)
}
