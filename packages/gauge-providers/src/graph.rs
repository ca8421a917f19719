use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

/// How the relationship store walks the metric graph for a query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraversalStrategy {
	/// Name/synonym text anchors only, no edge expansion.
	Text,
	/// Expand within the anchor's domain subtree.
	Domain,
	/// Follow composition/derivation edges outward from the anchors.
	Path,
	/// Text anchors plus domain and path expansion, scored together.
	Combined,
}
impl TraversalStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::Domain => "domain",
			Self::Path => "path",
			Self::Combined => "combined",
		}
	}
}

/// One metric surfaced by a graph traversal.
#[derive(Clone, Debug)]
pub struct GraphHit {
	pub metric_id: Uuid,
	pub score: f32,
	pub match_type: String,
	pub path: Vec<String>,
	pub strength: Option<f32>,
	pub centrality: Option<f32>,
}

pub async fn traverse(
	cfg: &gauge_config::GraphProviderConfig,
	tokens: &[String],
	strategy: TraversalStrategy,
	max_depth: u32,
	top_k: u32,
) -> Result<Vec<GraphHit>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"tokens": tokens,
		"strategy": strategy.as_str(),
		"max_depth": max_depth,
		"limit": top_k,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_traverse_response(json)
}

fn parse_traverse_response(json: Value) -> Result<Vec<GraphHit>> {
	let items = json
		.get("hits")
		.or_else(|| json.get("results"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Graph response is missing hits array."))?;

	let mut hits = Vec::with_capacity(items.len());
	for item in items {
		let metric_id = item
			.get("metric_id")
			.and_then(|v| v.as_str())
			.and_then(|raw| Uuid::parse_str(raw).ok())
			.ok_or_else(|| eyre::eyre!("Graph hit is missing a metric_id."))?;
		let score = item
			.get("score")
			.and_then(|v| v.as_f64())
			.ok_or_else(|| eyre::eyre!("Graph hit is missing a score."))? as f32;
		let match_type = item
			.get("match_type")
			.and_then(|v| v.as_str())
			.unwrap_or("relationship")
			.to_string();
		let path = item
			.get("path")
			.and_then(|v| v.as_array())
			.map(|parts| {
				parts.iter().filter_map(|p| p.as_str()).map(str::to_string).collect()
			})
			.unwrap_or_default();
		let strength = item.get("strength").and_then(|v| v.as_f64()).map(|v| v as f32);
		let centrality = item.get("centrality").and_then(|v| v.as_f64()).map(|v| v as f32);

		hits.push(GraphHit { metric_id, score, match_type, path, strength, centrality });
	}

	Ok(hits)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_hits_with_optional_fields() {
		let json = serde_json::json!({
			"hits": [
				{
					"metric_id": "00000000-0000-0000-0000-000000000001",
					"score": 0.95,
					"match_type": "exact",
					"path": [],
					"strength": 1.0,
					"centrality": 0.8
				},
				{
					"metric_id": "00000000-0000-0000-0000-000000000002",
					"score": 0.4,
					"path": ["composes"]
				}
			]
		});
		let hits = parse_traverse_response(json).expect("parse failed");
		assert_eq!(hits.len(), 2);
		assert_eq!(hits[0].match_type, "exact");
		assert!(hits[0].path.is_empty());
		assert_eq!(hits[1].match_type, "relationship");
		assert_eq!(hits[1].path, vec!["composes".to_string()]);
		assert!(hits[1].strength.is_none());
	}

	#[test]
	fn rejects_hits_without_id() {
		let json = serde_json::json!({ "hits": [ { "score": 0.4 } ] });
		assert!(parse_traverse_response(json).is_err());
	}
}
