use qdrant_client::qdrant::{PointId, Query, QueryPointsBuilder, point_id::PointIdOptions};
use uuid::Uuid;

use crate::Result;

/// One metric returned by the vector index.
#[derive(Clone, Copy, Debug)]
pub struct SimilarityHit {
	pub metric_id: Uuid,
	pub score: f32,
}

pub struct SimilarityStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl SimilarityStore {
	pub fn new(cfg: &gauge_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest-neighbor search over metric embeddings. Hits below the floor
	/// are cut server-side.
	pub async fn search(
		&self,
		embedding: Vec<f32>,
		top_k: u32,
		floor: f32,
	) -> Result<Vec<SimilarityHit>> {
		let query = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(embedding))
			.limit(top_k as u64)
			.score_threshold(floor);
		let response = self.client.query(query).await?;

		let mut hits = Vec::with_capacity(response.result.len());
		for point in response.result {
			let Some(metric_id) = point.id.as_ref().and_then(point_id_to_uuid) else {
				continue;
			};

			hits.push(SimilarityHit { metric_id, score: point.score });
		}

		Ok(hits)
	}
}

pub fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}
