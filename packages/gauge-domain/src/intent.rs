use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub const MAX_QUERY_TOKENS: usize = 16;

/// Ordered from finest to coarsest. A candidate whose minimum granularity is
/// coarser than the requested one cannot answer the query.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
	Hour,
	Day,
	Week,
	Month,
	Quarter,
	Year,
}
impl TimeGranularity {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Hour => "hour",
			Self::Day => "day",
			Self::Week => "week",
			Self::Month => "month",
			Self::Quarter => "quarter",
			Self::Year => "year",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"hour" | "hourly" => Some(Self::Hour),
			"day" | "daily" => Some(Self::Day),
			"week" | "weekly" => Some(Self::Week),
			"month" | "monthly" => Some(Self::Month),
			"quarter" | "quarterly" => Some(Self::Quarter),
			"year" | "yearly" | "annual" => Some(Self::Year),
			_ => None,
		}
	}

	pub fn is_finer_than(self, other: Self) -> bool {
		self < other
	}

	fn span(self) -> Duration {
		match self {
			Self::Hour => Duration::hours(1),
			Self::Day => Duration::days(1),
			Self::Week => Duration::days(7),
			Self::Month => Duration::days(30),
			Self::Quarter => Duration::days(91),
			Self::Year => Duration::days(365),
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
	Sum,
	Avg,
	Count,
	Max,
	Min,
	Rate,
	Ratio,
}
impl AggregationKind {
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"sum" | "total" => Some(Self::Sum),
			"avg" | "average" | "mean" => Some(Self::Avg),
			"count" => Some(Self::Count),
			"max" | "peak" => Some(Self::Max),
			"min" => Some(Self::Min),
			"rate" | "growth" => Some(Self::Rate),
			"ratio" | "share" => Some(Self::Ratio),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
	YearOverYear,
	MonthOverMonth,
	WeekOverWeek,
	DayOverDay,
}
impl ComparisonKind {
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_lowercase().as_str() {
			"yoy" | "year_over_year" => Some(Self::YearOverYear),
			"mom" | "month_over_month" => Some(Self::MonthOverMonth),
			"wow" | "week_over_week" => Some(Self::WeekOverWeek),
			"dod" | "day_over_day" => Some(Self::DayOverDay),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct TimeRange {
	#[serde(with = "time::serde::rfc3339")]
	pub start: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub end: OffsetDateTime,
}

/// The structured reading of a free-text query. Built by the deterministic
/// rule parser and optionally overridden field-by-field by the inference tier.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct QueryIntent {
	pub query: String,
	/// The query with time ranges, aggregation words, dimension phrases, and
	/// filler stripped. This is what gets matched against the catalog.
	pub core_query: String,
	pub time_range: Option<TimeRange>,
	pub granularity: Option<TimeGranularity>,
	pub aggregation: Option<AggregationKind>,
	pub dimensions: Vec<String>,
	pub comparison: Option<ComparisonKind>,
	pub realtime: bool,
}

const RELATIVE_RANGE_PATTERN: &str =
	r"(?i)\b(?:last|past|previous)\s+(\d{1,3})\s+(hour|day|week|month|quarter|year)s?\b";

const GRANULARITY_PATTERNS: &[(&str, TimeGranularity)] = &[
	(r"(?i)\bhourly\b|\b(?:by|per)\s+hour\b", TimeGranularity::Hour),
	(r"(?i)\bdaily\b|\b(?:by|per)\s+day\b", TimeGranularity::Day),
	(r"(?i)\bweekly\b|\b(?:by|per)\s+week\b", TimeGranularity::Week),
	(r"(?i)\bmonthly\b|\b(?:by|per)\s+month\b", TimeGranularity::Month),
	(r"(?i)\bquarterly\b|\b(?:by|per)\s+quarter\b", TimeGranularity::Quarter),
	(r"(?i)\byearly\b|\bannual(?:ly)?\b|\b(?:by|per)\s+year\b", TimeGranularity::Year),
];

const AGGREGATION_PATTERNS: &[(&str, AggregationKind)] = &[
	(r"(?i)\btotal\b|\bsum\s+of\b|\boverall\b", AggregationKind::Sum),
	(r"(?i)\baverage\b|\bmean\b|\bavg\b", AggregationKind::Avg),
	(r"(?i)\bcount\s+of\b|\bnumber\s+of\b|\bhow\s+many\b", AggregationKind::Count),
	(r"(?i)\bpeak\b|\bhighest\b|\bmaximum\b", AggregationKind::Max),
	(r"(?i)\blowest\b|\bminimum\b", AggregationKind::Min),
	(r"(?i)\bgrowth\s+rate\b|\bgrowth\b", AggregationKind::Rate),
	(r"(?i)\bshare\s+of\b|\bproportion\b|\bpercentage\s+of\b", AggregationKind::Ratio),
];

const COMPARISON_PATTERNS: &[(&str, ComparisonKind)] = &[
	(r"(?i)\byear[-\s]over[-\s]year\b|\byoy\b", ComparisonKind::YearOverYear),
	(r"(?i)\bmonth[-\s]over[-\s]month\b|\bmom\b", ComparisonKind::MonthOverMonth),
	(r"(?i)\bweek[-\s]over[-\s]week\b|\bwow\b", ComparisonKind::WeekOverWeek),
	(r"(?i)\bday[-\s]over[-\s]day\b|\bdod\b", ComparisonKind::DayOverDay),
];

const REALTIME_PATTERN: &str = r"(?i)\breal[-\s]?time\b|\blive\b|\bright\s+now\b";

const DIMENSION_PATTERN: &str =
	r"(?i)\b(?:by|per|across)\s+([a-z][a-z0-9_]*)((?:\s+and\s+[a-z][a-z0-9_]*)*)";

const FILLER_PATTERN: &str =
	r"(?i)\b(?:show\s+me|what\s+is|what's|what\s+was|give\s+me|how\s+is|how\s+did|tell\s+me)\b";

/// Words that follow "by"/"per" without naming a dimension.
const DIMENSION_STOPWORDS: &[&str] =
	&["hour", "day", "week", "month", "quarter", "year", "the", "now", "far"];

pub fn parse(query: &str, now: OffsetDateTime) -> QueryIntent {
	let mut stripped = query.to_string();
	let time_range = extract_time_range(query, now, &mut stripped);
	let granularity = extract_granularity(query, &mut stripped);
	let aggregation = extract_aggregation(query, &mut stripped);
	let comparison = extract_comparison(query, &mut stripped);
	let realtime = extract_realtime(query, &mut stripped);
	let dimensions = extract_dimensions(query, &mut stripped);

	strip_pattern(FILLER_PATTERN, &mut stripped);

	let core_query = collapse_whitespace(&stripped);
	let core_query = if core_query.is_empty() { query.trim().to_string() } else { core_query };

	QueryIntent {
		query: query.to_string(),
		core_query,
		time_range,
		granularity,
		aggregation,
		dimensions,
		comparison,
		realtime,
	}
}

/// Confidence of the deterministic tier: a base score plus bonuses for each
/// element the rule parser pinned down, clamped to 1.0. An exact catalog hit on
/// the core query carries most of the weight.
pub fn rule_confidence(intent: &QueryIntent, exact_catalog_hit: bool) -> f32 {
	let mut score = 0.5_f32;

	if exact_catalog_hit {
		score += 0.3;
	}
	if intent.time_range.is_some() {
		score += 0.1;
	}
	if intent.aggregation.is_some() {
		score += 0.05;
	}
	if !intent.dimensions.is_empty() {
		score += 0.05;
	}

	score.min(1.0)
}

/// Lowercased alphanumeric tokens, deduplicated in order, single characters
/// dropped.
pub fn tokenize(query: &str) -> Vec<String> {
	let mut normalized = String::with_capacity(query.len());

	for ch in query.chars() {
		if ch.is_ascii_alphanumeric() {
			normalized.push(ch.to_ascii_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in normalized.split_whitespace() {
		if token.len() < 2 {
			continue;
		}
		if seen.insert(token.to_string()) {
			out.push(token.to_string());
		}
		if out.len() >= MAX_QUERY_TOKENS {
			break;
		}
	}

	out
}

impl QueryIntent {
	/// Overlays fields the inference tier returned on top of the rule-parsed
	/// intent. The inference tier is authoritative where it answers; silence
	/// keeps the parsed value.
	pub fn merged_with_inference(&self, inferred: &serde_json::Value) -> Self {
		let mut merged = self.clone();

		if let Some(core_query) = inferred.get("core_query").and_then(|v| v.as_str())
			&& !core_query.trim().is_empty()
		{
			merged.core_query = core_query.trim().to_string();
		}
		if let Some(granularity) = inferred
			.get("time_granularity")
			.and_then(|v| v.as_str())
			.and_then(TimeGranularity::parse)
		{
			merged.granularity = Some(granularity);
		}
		if let Some(aggregation) =
			inferred.get("aggregation").and_then(|v| v.as_str()).and_then(AggregationKind::parse)
		{
			merged.aggregation = Some(aggregation);
		}
		if let Some(comparison) =
			inferred.get("comparison").and_then(|v| v.as_str()).and_then(ComparisonKind::parse)
		{
			merged.comparison = Some(comparison);
		}
		if let Some(dimensions) = inferred.get("dimensions").and_then(|v| v.as_array()) {
			let parsed: Vec<String> = dimensions
				.iter()
				.filter_map(|v| v.as_str())
				.map(|s| s.trim().to_lowercase())
				.filter(|s| !s.is_empty())
				.collect();

			if !parsed.is_empty() {
				merged.dimensions = parsed;
			}
		}
		if let Some(realtime) = inferred.get("realtime").and_then(|v| v.as_bool()) {
			merged.realtime = realtime;
		}

		merged
	}
}

fn extract_time_range(
	query: &str,
	now: OffsetDateTime,
	stripped: &mut String,
) -> Option<TimeRange> {
	let re = Regex::new(RELATIVE_RANGE_PATTERN).ok()?;
	let captures = re.captures(query)?;
	let count: i64 = captures.get(1)?.as_str().parse().ok()?;
	let unit = TimeGranularity::parse(captures.get(2)?.as_str())?;

	strip_pattern(RELATIVE_RANGE_PATTERN, stripped);

	Some(TimeRange { start: now - unit.span() * count as i32, end: now })
}

fn extract_granularity(query: &str, stripped: &mut String) -> Option<TimeGranularity> {
	for (pattern, granularity) in GRANULARITY_PATTERNS {
		if pattern_matches(pattern, query) {
			strip_pattern(pattern, stripped);

			return Some(*granularity);
		}
	}

	None
}

fn extract_aggregation(query: &str, stripped: &mut String) -> Option<AggregationKind> {
	for (pattern, aggregation) in AGGREGATION_PATTERNS {
		if pattern_matches(pattern, query) {
			strip_pattern(pattern, stripped);

			return Some(*aggregation);
		}
	}

	None
}

fn extract_comparison(query: &str, stripped: &mut String) -> Option<ComparisonKind> {
	for (pattern, comparison) in COMPARISON_PATTERNS {
		if pattern_matches(pattern, query) {
			strip_pattern(pattern, stripped);

			return Some(*comparison);
		}
	}

	None
}

fn extract_realtime(query: &str, stripped: &mut String) -> bool {
	if pattern_matches(REALTIME_PATTERN, query) {
		strip_pattern(REALTIME_PATTERN, stripped);

		return true;
	}

	false
}

fn extract_dimensions(query: &str, stripped: &mut String) -> Vec<String> {
	let Ok(re) = Regex::new(DIMENSION_PATTERN) else { return Vec::new() };
	let mut out = Vec::new();

	for captures in re.captures_iter(query) {
		let mut names = Vec::new();

		if let Some(first) = captures.get(1) {
			names.push(first.as_str());
		}
		if let Some(rest) = captures.get(2) {
			for part in rest.as_str().split(" and ") {
				let trimmed = part.trim();

				if !trimmed.is_empty() {
					names.push(trimmed);
				}
			}
		}

		for name in names {
			let name = name.to_lowercase();

			if DIMENSION_STOPWORDS.contains(&name.as_str()) {
				continue;
			}
			if !out.contains(&name) {
				out.push(name);
			}
		}
	}

	if !out.is_empty() {
		strip_pattern(DIMENSION_PATTERN, stripped);
	}

	out
}

fn pattern_matches(pattern: &str, text: &str) -> bool {
	Regex::new(pattern).map(|re| re.is_match(text)).unwrap_or(false)
}

fn strip_pattern(pattern: &str, text: &mut String) {
	if let Ok(re) = Regex::new(pattern) {
		*text = re.replace_all(text, " ").into_owned();
	}
}

fn collapse_whitespace(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ")
}
