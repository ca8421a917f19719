use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{MetricRecord, ResolutionAttemptRecord},
};

const METRIC_COLUMNS: &str = "\
metric_id,
	name,
	code,
	description,
	synonyms,
	domain,
	importance,
	usage_score,
	dimensions,
	min_granularity,
	realtime,
	created_at,
	updated_at";

/// Batched metadata fetch for recalled ids. Missing ids are skipped, the
/// caller decides whether that matters.
pub async fn get_metadata(db: &Db, metric_ids: &[Uuid]) -> Result<Vec<MetricRecord>> {
	if metric_ids.is_empty() {
		return Ok(Vec::new());
	}

	let records = sqlx::query_as::<_, MetricRecord>(&format!(
		"\
SELECT {METRIC_COLUMNS}
FROM metrics
WHERE metric_id = ANY($1)"
	))
	.bind(metric_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(records)
}

/// Case-insensitive exact lookup over name, code, and synonyms. Ties go to
/// the most important metric.
pub async fn find_exact(db: &Db, text: &str) -> Result<Option<MetricRecord>> {
	let record = sqlx::query_as::<_, MetricRecord>(&format!(
		"\
SELECT {METRIC_COLUMNS}
FROM metrics
WHERE lower(name) = lower($1)
	OR lower(code) = lower($1)
	OR EXISTS (SELECT 1 FROM unnest(synonyms) AS s WHERE lower(s) = lower($1))
ORDER BY importance DESC, metric_id ASC
LIMIT 1"
	))
	.bind(text)
	.fetch_optional(&db.pool)
	.await?;

	Ok(record)
}

/// Nudges the usage score toward 1.0 after a successful resolution.
pub async fn bump_usage(db: &Db, metric_id: Uuid) -> Result<()> {
	sqlx::query(
		"\
UPDATE metrics
SET usage_score = LEAST(1.0, usage_score + (1.0 - usage_score) * 0.05),
	updated_at = now()
WHERE metric_id = $1",
	)
	.bind(metric_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn record_attempt(db: &Db, attempt: &ResolutionAttemptRecord) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO resolution_attempts (
	attempt_id,
	query,
	tier,
	success,
	confidence,
	elapsed_ms,
	metadata,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
	)
	.bind(attempt.attempt_id)
	.bind(attempt.query.as_str())
	.bind(attempt.tier.as_str())
	.bind(attempt.success)
	.bind(attempt.confidence)
	.bind(attempt.elapsed_ms)
	.bind(&attempt.metadata)
	.bind(attempt.created_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}
