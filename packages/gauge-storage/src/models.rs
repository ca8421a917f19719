use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// A catalog row. Synonyms and dimensions come back as Postgres text arrays,
/// `min_granularity` stays a string here and is parsed at the domain boundary.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MetricRecord {
	pub metric_id: Uuid,
	pub name: String,
	pub code: String,
	pub description: String,
	pub synonyms: Vec<String>,
	pub domain: String,
	pub importance: f32,
	pub usage_score: f32,
	pub dimensions: Vec<String>,
	pub min_granularity: Option<String>,
	pub realtime: bool,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// One row of the resolution audit log.
#[derive(Debug)]
pub struct ResolutionAttemptRecord {
	pub attempt_id: Uuid,
	pub query: String,
	pub tier: String,
	pub success: bool,
	pub confidence: f32,
	pub elapsed_ms: i64,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
}
