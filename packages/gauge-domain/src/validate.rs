use serde::{Deserialize, Serialize};

use crate::candidate::{Freshness, MetricCandidate, QueryContext};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
	Passed,
	Warning,
	Failed,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
	DimensionCompatibility,
	TimeGranularity,
	DataFreshness,
	Access,
}
impl CheckKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::DimensionCompatibility => "dimension_compatibility",
			Self::TimeGranularity => "time_granularity",
			Self::DataFreshness => "data_freshness",
			Self::Access => "access",
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ValidationOutcome {
	pub status: ValidationStatus,
	pub check: CheckKind,
	pub message: String,
	pub suggestion: Option<String>,
}
impl ValidationOutcome {
	fn passed(check: CheckKind, message: impl Into<String>) -> Self {
		Self { status: ValidationStatus::Passed, check, message: message.into(), suggestion: None }
	}

	fn warning(check: CheckKind, message: impl Into<String>, suggestion: Option<String>) -> Self {
		Self { status: ValidationStatus::Warning, check, message: message.into(), suggestion }
	}

	fn failed(check: CheckKind, message: impl Into<String>, suggestion: Option<String>) -> Self {
		Self { status: ValidationStatus::Failed, check, message: message.into(), suggestion }
	}
}

/// Rule set for the chain, built once at startup and shared read-only.
#[derive(Clone, Debug, Default)]
pub struct ValidationRules {
	pub sensitive_domains: Vec<String>,
}
impl ValidationRules {
	pub fn from_config(cfg: &gauge_config::Validation) -> Self {
		Self { sensitive_domains: cfg.sensitive_domains.clone() }
	}
}

type ValidatorFn =
	fn(&MetricCandidate, &QueryContext, &ValidationRules) -> Result<ValidationOutcome, String>;

const VALIDATOR_CHAIN: [(CheckKind, ValidatorFn); 4] = [
	(CheckKind::DimensionCompatibility, check_dimensions),
	(CheckKind::TimeGranularity, check_granularity),
	(CheckKind::DataFreshness, check_freshness),
	(CheckKind::Access, check_access),
];

/// Runs every validator for the candidate. A validator's own error is
/// downgraded to WARNING with a diagnostic, never to an implicit FAILED.
pub fn run_chain(
	candidate: &MetricCandidate,
	context: &QueryContext,
	rules: &ValidationRules,
) -> Vec<ValidationOutcome> {
	let mut outcomes = Vec::with_capacity(VALIDATOR_CHAIN.len());

	for (check, validator) in VALIDATOR_CHAIN {
		match validator(candidate, context, rules) {
			Ok(outcome) => outcomes.push(outcome),
			Err(message) => outcomes.push(ValidationOutcome::warning(
				check,
				format!("Validator error: {message}"),
				None,
			)),
		}
	}

	outcomes
}

pub fn has_failed(outcomes: &[ValidationOutcome]) -> bool {
	outcomes.iter().any(|outcome| outcome.status == ValidationStatus::Failed)
}

fn check_dimensions(
	candidate: &MetricCandidate,
	context: &QueryContext,
	_: &ValidationRules,
) -> Result<ValidationOutcome, String> {
	let requested = &context.intent.dimensions;

	if requested.is_empty() {
		return Ok(ValidationOutcome::passed(
			CheckKind::DimensionCompatibility,
			"No dimensions requested.",
		));
	}

	let supported: Vec<String> =
		candidate.dimensions.iter().map(|dimension| dimension.to_lowercase()).collect();
	let missing: Vec<&str> = requested
		.iter()
		.filter(|dimension| !supported.contains(&dimension.to_lowercase()))
		.map(|dimension| dimension.as_str())
		.collect();

	if missing.is_empty() {
		return Ok(ValidationOutcome::passed(
			CheckKind::DimensionCompatibility,
			"All requested dimensions are supported.",
		));
	}

	Ok(ValidationOutcome::failed(
		CheckKind::DimensionCompatibility,
		format!("Metric {} does not support dimensions: {}.", candidate.code, missing.join(", ")),
		Some("Pick a metric that carries the requested dimensions.".to_string()),
	))
}

fn check_granularity(
	candidate: &MetricCandidate,
	context: &QueryContext,
	_: &ValidationRules,
) -> Result<ValidationOutcome, String> {
	let Some(requested) = context.intent.granularity else {
		return Ok(ValidationOutcome::passed(
			CheckKind::TimeGranularity,
			"No time granularity requested.",
		));
	};
	let Some(minimum) = candidate.min_granularity else {
		return Ok(ValidationOutcome::passed(
			CheckKind::TimeGranularity,
			"Metric has no granularity constraint.",
		));
	};

	if requested.is_finer_than(minimum) {
		return Ok(ValidationOutcome::failed(
			CheckKind::TimeGranularity,
			format!(
				"Metric {} resolves down to {} but the query asks for {}.",
				candidate.code,
				minimum.as_str(),
				requested.as_str(),
			),
			Some(format!("Coarsen the query to {} or above.", minimum.as_str())),
		));
	}

	Ok(ValidationOutcome::passed(CheckKind::TimeGranularity, "Requested granularity is supported."))
}

fn check_freshness(
	candidate: &MetricCandidate,
	context: &QueryContext,
	_: &ValidationRules,
) -> Result<ValidationOutcome, String> {
	if context.intent.realtime && candidate.freshness == Freshness::Batch {
		return Ok(ValidationOutcome::warning(
			CheckKind::DataFreshness,
			format!("Query asks for real-time data but metric {} is batch.", candidate.code),
			Some("Use a real-time metric or accept the latest batch value.".to_string()),
		));
	}
	if !context.intent.realtime
		&& candidate.freshness == Freshness::Realtime
		&& context.intent.time_range.is_some()
	{
		return Ok(ValidationOutcome::warning(
			CheckKind::DataFreshness,
			format!("Metric {} is real-time only but the query targets history.", candidate.code),
			Some("Use a cumulative metric or a historical snapshot.".to_string()),
		));
	}

	Ok(ValidationOutcome::passed(CheckKind::DataFreshness, "Freshness matches the query."))
}

fn check_access(
	candidate: &MetricCandidate,
	_: &QueryContext,
	rules: &ValidationRules,
) -> Result<ValidationOutcome, String> {
	let domain = candidate.domain.to_lowercase();
	let root = domain.split('/').next().unwrap_or(domain.as_str());

	if rules.sensitive_domains.iter().any(|sensitive| sensitive == root || *sensitive == domain) {
		return Ok(ValidationOutcome::warning(
			CheckKind::Access,
			format!("Metric {} belongs to the sensitive domain {}.", candidate.code, root),
			Some("Confirm the caller is authorized for this domain.".to_string()),
		));
	}

	Ok(ValidationOutcome::passed(CheckKind::Access, "Domain is not gated."))
}
