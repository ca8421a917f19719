use std::sync::Arc;

use color_eyre::eyre;

use gauge_service::{GaugeService, Providers};
use gauge_storage::{db::Db, qdrant::SimilarityStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<GaugeService>,
	pub db: Arc<Db>,
}
impl AppState {
	pub async fn new(config: gauge_config::Config) -> color_eyre::Result<Self> {
		// Fail fast on a weight map naming unknown features.
		gauge_domain::feature::validate_weights(&config.ranking.weights).map_err(eyre::Report::msg)?;

		let db = Arc::new(Db::connect(&config.storage.postgres).await?);

		db.ensure_schema().await?;

		let similarity = Arc::new(SimilarityStore::new(&config.storage.qdrant)?);
		let providers = Providers::live(db.clone(), similarity);
		let service = GaugeService::new(config, providers);

		Ok(Self { service: Arc::new(service), db })
	}
}
