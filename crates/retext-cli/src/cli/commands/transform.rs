//! One-shot transform command handler.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use retext_core::config::Config;
use retext_core::history::VersionHistory;
use retext_core::transforms::resolve_selection;

use super::{build_pipeline, open_catalog};

pub struct TransformOptions<'a> {
    pub config: &'a Config,
    pub names: &'a [String],
    pub file: Option<&'a Path>,
    pub model_override: Option<&'a str>,
}

pub async fn run(options: TransformOptions<'_>) -> Result<()> {
    let config = options.config;
    let source_text = match options.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .lock()
                .read_to_string(&mut text)
                .context("read stdin")?;
            text
        }
    };

    let catalog = open_catalog(config)?;
    let selection = resolve_selection(&catalog, options.names, config.max_transformations)?;
    let pipeline = build_pipeline(config, options.model_override)?;

    let mut history = VersionHistory::with_original(source_text.as_str());
    let user_context = config.user_context();
    let result = pipeline
        .run(
            &selection,
            &source_text,
            (!user_context.is_empty()).then_some(&user_context),
            &mut history,
        )
        .await?;

    println!("{result}");
    Ok(())
}
