mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, GraphProviderConfig, InferenceProviderConfig, Postgres,
	Providers, Qdrant, Ranking, Recall, Resolver, Service, Storage, Validation,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.recall.similarity_top_k == 0 {
		return Err(Error::Validation {
			message: "recall.similarity_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.recall.relationship_top_k == 0 {
		return Err(Error::Validation {
			message: "recall.relationship_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.recall.channel_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "recall.channel_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.recall.similarity_floor) {
		return Err(Error::Validation {
			message: "recall.similarity_floor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.recall.max_depth == 0 {
		return Err(Error::Validation {
			message: "recall.max_depth must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.top_k == 0 {
		return Err(Error::Validation {
			message: "ranking.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.weights.is_empty() {
		return Err(Error::Validation {
			message: "ranking.weights must be non-empty.".to_string(),
		});
	}

	for (name, weight) in &cfg.ranking.weights {
		if !weight.is_finite() {
			return Err(Error::Validation {
				message: format!("ranking.weights.{name} must be a finite number."),
			});
		}
		if *weight < 0.0 {
			return Err(Error::Validation {
				message: format!("ranking.weights.{name} must be zero or greater."),
			});
		}
	}

	for (label, threshold) in [
		("resolver.deterministic_threshold", cfg.resolver.deterministic_threshold),
		("resolver.ranked_threshold", cfg.resolver.ranked_threshold),
		("resolver.inference_threshold", cfg.resolver.inference_threshold),
	] {
		if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.resolver.overall_timeout_ms <= cfg.recall.channel_timeout_ms + cfg.recall.grace_ms {
		return Err(Error::Validation {
			message: "resolver.overall_timeout_ms must exceed the recall deadline.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("graph", &cfg.providers.graph.api_key),
		("inference", &cfg.providers.inference.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for domain in &mut cfg.validation.sensitive_domains {
		*domain = domain.trim().to_lowercase();
	}

	cfg.validation.sensitive_domains.retain(|domain| !domain.is_empty());
}
