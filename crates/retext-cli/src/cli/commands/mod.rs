//! CLI command handlers.

use anyhow::{Context, Result};
use retext_core::config::{Config, paths};
use retext_core::pipeline::TransformPipeline;
use retext_core::providers::{OpenRouterConfig, OpenRouterGateway};
use retext_core::transforms::{CatalogStore, JsonCatalog, load_prompts_from_dir};

pub mod config;
pub mod session;
pub mod transform;
pub mod transforms;
pub mod user;

/// Opens the catalog, seeding it from the prompts directory on first run.
pub fn open_catalog(config: &Config) -> Result<JsonCatalog> {
    let mut catalog = open_catalog_unseeded()?;
    if !catalog.list_categories()?.is_empty() {
        return Ok(catalog);
    }

    let prompts_dir = config.prompts_dir();
    let loaded = load_prompts_from_dir(&prompts_dir);
    for warning in &loaded.warnings {
        tracing::warn!(
            path = %warning.path.display(),
            message = %warning.message,
            "prompt skipped while seeding"
        );
        eprintln!(
            "Warning: skipped {}: {}",
            warning.path.display(),
            warning.message
        );
    }
    let added = catalog
        .seed_from_entries(&loaded.entries)
        .context("seed catalog")?;
    tracing::info!(added, prompts_dir = %prompts_dir.display(), "catalog seeding finished");
    if added > 0 {
        eprintln!(
            "Loaded {added} transformations from {}",
            prompts_dir.display()
        );
    }
    Ok(catalog)
}

pub fn open_catalog_unseeded() -> Result<JsonCatalog> {
    let path = paths::catalog_path();
    JsonCatalog::open(&path).with_context(|| format!("open catalog at {}", path.display()))
}

/// Builds the OpenRouter-backed pipeline with an optional model override.
pub fn build_pipeline(
    config: &Config,
    model_override: Option<&str>,
) -> Result<TransformPipeline<OpenRouterGateway>> {
    let mut gateway_config = OpenRouterConfig::from_config(config)?;
    if let Some(model) = model_override.map(str::trim).filter(|m| !m.is_empty()) {
        gateway_config.model = model.to_string();
    }
    let gateway = OpenRouterGateway::new(gateway_config)?;
    tracing::debug!(model = gateway.model(), "built transform pipeline");
    Ok(TransformPipeline::new(gateway).with_max_transformations(config.max_transformations))
}
