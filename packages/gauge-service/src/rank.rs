use std::{cmp::Ordering, collections::HashMap};

use serde::Serialize;

use gauge_domain::{
	candidate::{MetricCandidate, QueryContext},
	feature::{self, FeatureVector},
	validate::{self, ValidationOutcome, ValidationRules},
};

/// A candidate that survived the validation chain, with its fusion score and
/// the evidence behind it.
#[derive(Clone, Debug, Serialize)]
pub struct RankedResult {
	pub candidate: MetricCandidate,
	pub score: f32,
	pub breakdown: Vec<FeatureContribution>,
	pub validations: Vec<ValidationOutcome>,
}

/// One feature's share of a composite score.
#[derive(Clone, Debug, Serialize)]
pub struct FeatureContribution {
	pub feature: String,
	pub value: f32,
	pub weight: f32,
	pub weighted: f32,
}

pub trait ScoreModel
where
	Self: Send + Sync,
{
	fn score(&self, features: &FeatureVector) -> f32;

	/// Per-feature breakdown of [`Self::score`], in feature-name order.
	fn explain(&self, features: &FeatureVector) -> Vec<FeatureContribution>;
}

/// Weight-normalized dot product over the feature registry. Features the
/// weight map leaves out contribute nothing.
pub struct WeightedSumModel {
	weights: HashMap<String, f32>,
}
impl WeightedSumModel {
	pub fn new(weights: HashMap<String, f32>) -> Self {
		Self { weights }
	}
}
impl ScoreModel for WeightedSumModel {
	fn score(&self, features: &FeatureVector) -> f32 {
		let total: f32 = self.weights.values().sum();

		if total <= f32::EPSILON {
			return 0.0;
		}

		let weighted: f32 = self
			.weights
			.iter()
			.map(|(name, weight)| weight * features.get(name))
			.sum();

		(weighted / total).clamp(0.0, 1.0)
	}

	fn explain(&self, features: &FeatureVector) -> Vec<FeatureContribution> {
		let total: f32 = self.weights.values().sum();

		if total <= f32::EPSILON {
			return Vec::new();
		}

		let mut contributions = self
			.weights
			.iter()
			.map(|(name, weight)| {
				let value = features.get(name);
				let weight = weight / total;

				FeatureContribution {
					feature: name.clone(),
					value,
					weight,
					weighted: weight * value,
				}
			})
			.collect::<Vec<_>>();

		contributions.sort_by(|a, b| a.feature.cmp(&b.feature));

		contributions
	}
}

/// Linear model over the same feature registry, for weights fitted offline.
/// The logistic squash keeps scores comparable with the weighted sum.
pub struct LinearModel {
	weights: HashMap<String, f32>,
	bias: f32,
}
impl LinearModel {
	pub fn new(weights: HashMap<String, f32>, bias: f32) -> Self {
		Self { weights, bias }
	}
}
impl ScoreModel for LinearModel {
	fn score(&self, features: &FeatureVector) -> f32 {
		let z: f32 = self.bias
			+ self
				.weights
				.iter()
				.map(|(name, weight)| weight * features.get(name))
				.sum::<f32>();

		1.0 / (1.0 + (-z).exp())
	}

	fn explain(&self, features: &FeatureVector) -> Vec<FeatureContribution> {
		let mut contributions = self
			.weights
			.iter()
			.map(|(name, weight)| {
				let value = features.get(name);

				FeatureContribution {
					feature: name.clone(),
					value,
					weight: *weight,
					weighted: weight * value,
				}
			})
			.collect::<Vec<_>>();

		contributions.sort_by(|a, b| a.feature.cmp(&b.feature));

		contributions
	}
}

/// Scores, validates, and orders candidates. Candidates with a FAILED check
/// are dropped; WARNING outcomes ride along on the survivors. Ordering is
/// fully deterministic: score desc, importance desc, metric id asc.
pub fn rank_candidates(
	candidates: Vec<MetricCandidate>,
	context: &QueryContext,
	model: &dyn ScoreModel,
	rules: &ValidationRules,
	top_k: u32,
) -> Vec<RankedResult> {
	let mut ranked = Vec::with_capacity(candidates.len());

	for candidate in candidates {
		let features = feature::extract_all(&candidate, context);
		let validations = validate::run_chain(&candidate, context, rules);

		if validate::has_failed(&validations) {
			tracing::debug!(
				metric_id = %candidate.metric_id,
				code = candidate.code,
				"Candidate dropped by validation.",
			);

			continue;
		}

		let score = model.score(&features);
		let breakdown = model.explain(&features);

		ranked.push(RankedResult { candidate, score, breakdown, validations });
	}

	ranked.sort_by(|left, right| {
		cmp_f32_desc(left.score, right.score)
			.then_with(|| cmp_f32_desc(left.candidate.importance, right.candidate.importance))
			.then_with(|| left.candidate.metric_id.cmp(&right.candidate.metric_id))
	});
	ranked.truncate(top_k as usize);

	ranked
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
