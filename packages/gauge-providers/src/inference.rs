use std::{collections::HashMap, time::Duration};

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const SYSTEM_PROMPT: &str = "You resolve analytics queries to metrics from a catalog. \
	Reply with a single JSON object: {\"intent\": {\"core_query\", \"time_granularity\", \
	\"aggregation\", \"comparison\", \"dimensions\", \"realtime\"}, \"confidence\": 0.0-1.0, \
	\"reasoning\": string, \"candidate_scores\": {metric_id: 0.0-1.0}}. \
	Score only the candidates you are given. Omit intent fields you cannot answer.";

/// Catalog slice shown to the model so it scores known metrics instead of
/// inventing names.
#[derive(Clone, Debug, Serialize)]
pub struct CandidateHint {
	pub metric_id: Uuid,
	pub name: String,
	pub code: String,
	pub description: String,
	pub domain: String,
}

#[derive(Clone, Debug)]
pub struct InferenceOutcome {
	/// Intent fields the model answered; overlaid on the rule-parsed intent.
	pub intent: Value,
	pub confidence: f32,
	pub reasoning: String,
	pub candidate_scores: HashMap<Uuid, f32>,
}

pub async fn infer(
	cfg: &gauge_config::InferenceProviderConfig,
	query: &str,
	parsed_intent: &Value,
	hints: &[CandidateHint],
) -> Result<InferenceOutcome> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let user = serde_json::json!({
		"query": query,
		"parsed_intent": parsed_intent,
		"candidates": hints,
	});

	// One shot per resolution; a malformed reply fails the tier instead of
	// spending the caller's budget on another round trip.
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": user.to_string() },
		],
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_inference_response(json)
}

fn parse_inference_response(json: Value) -> Result<InferenceOutcome> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Inference response is missing message content."))?;
	let parsed: Value = serde_json::from_str(content)
		.map_err(|_| eyre::eyre!("Inference content is not valid JSON."))?;

	let confidence = parsed
		.get("confidence")
		.and_then(|v| v.as_f64())
		.ok_or_else(|| eyre::eyre!("Inference content is missing a confidence."))?
		as f32;
	let intent = parsed.get("intent").cloned().unwrap_or(Value::Null);
	let reasoning =
		parsed.get("reasoning").and_then(|v| v.as_str()).unwrap_or_default().to_string();
	let mut candidate_scores = HashMap::new();
	if let Some(scores) = parsed.get("candidate_scores").and_then(|v| v.as_object()) {
		for (key, value) in scores {
			let (Ok(metric_id), Some(score)) = (Uuid::parse_str(key), value.as_f64()) else {
				continue;
			};
			candidate_scores.insert(metric_id, score as f32);
		}
	}

	Ok(InferenceOutcome {
		intent,
		confidence: confidence.clamp(0.0, 1.0),
		reasoning,
		candidate_scores,
	})
}
