//! Catalog command handlers.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{ContentArrangement, Table};
use retext_core::config::Config;
use retext_core::transforms::{
    CatalogStore, NewTransformation, TransformationSpec, TransformationUpdate, categorize,
    find_transformation, load_prompts_from_dir,
};

use super::{open_catalog, open_catalog_unseeded};

pub fn list(config: &Config, category: Option<&str>, search: Option<&str>) -> Result<()> {
    let catalog = open_catalog(config)?;
    let mut transformations = catalog
        .list_transformations(category)
        .context("list transformations")?;
    if let Some(query) = search {
        transformations.retain(|spec| spec.matches_search(query));
    }

    if transformations.is_empty() {
        match (category, search) {
            (_, Some(q)) => println!("No transformations match '{q}'."),
            (Some(c), None) => println!("No transformations in category '{c}'."),
            (None, None) => println!("No transformations found. Import some with `retext transforms import DIR`."),
        }
        return Ok(());
    }

    println!("{}", render_table(&transformations));
    Ok(())
}

pub fn categories(config: &Config) -> Result<()> {
    let catalog = open_catalog(config)?;
    let categories = catalog.list_categories().context("list categories")?;
    if categories.is_empty() {
        println!("No categories found.");
    }
    for category in categories {
        println!("{category}");
    }
    Ok(())
}

pub fn import(config: &Config, dir: Option<&Path>) -> Result<()> {
    let dir = dir.map_or_else(|| config.prompts_dir(), Path::to_path_buf);
    if !dir.is_dir() {
        bail!("Prompts directory not found: {}", dir.display());
    }

    let loaded = load_prompts_from_dir(&dir);
    for warning in &loaded.warnings {
        eprintln!(
            "Warning: skipped {}: {}",
            warning.path.display(),
            warning.message
        );
    }

    let mut catalog = open_catalog_unseeded()?;
    let summary = catalog
        .import_entries(&loaded.entries)
        .context("import transformations")?;
    println!(
        "Imported from {}: added {}, skipped {} already in the catalog",
        dir.display(),
        summary.added,
        summary.skipped
    );
    for (category, entries) in categorize(&loaded.entries) {
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        println!("  {category}: {}", names.join(", "));
    }
    Ok(())
}

pub fn add(name: &str, category: &str, prompt: &str) -> Result<()> {
    let (name, category, prompt) = (name.trim(), category.trim(), prompt.trim());
    if name.is_empty() || category.is_empty() || prompt.is_empty() {
        bail!("Name, category and prompt must all be non-empty");
    }

    let mut catalog = open_catalog_unseeded()?;
    if catalog.find_by_name(name).is_some() {
        bail!("A transformation named '{name}' already exists");
    }
    let id = catalog
        .add(NewTransformation::user(name, category, prompt))
        .context("add transformation")?;
    println!("Added '{name}' (id {id})");
    Ok(())
}

/// Fields `transforms edit` may change; `None` keeps the current value.
pub struct EditOptions<'a> {
    pub name: Option<&'a str>,
    pub category: Option<&'a str>,
    pub prompt: Option<&'a str>,
    pub sort_order: Option<i64>,
}

pub fn edit(id: u64, options: &EditOptions<'_>) -> Result<()> {
    let non_blank = |field: &str, value: Option<&str>| -> Result<Option<String>> {
        match value.map(str::trim) {
            Some("") => bail!("{field} cannot be empty"),
            other => Ok(other.map(str::to_string)),
        }
    };
    let update = TransformationUpdate {
        name: non_blank("Name", options.name)?,
        category: non_blank("Category", options.category)?,
        prompt_text: non_blank("Prompt", options.prompt)?,
        sort_order: options.sort_order,
    };
    if update == TransformationUpdate::default() {
        bail!("Nothing to change. Pass --name, --category, --prompt or --sort-order");
    }

    let mut catalog = open_catalog_unseeded()?;
    if let Some(name) = update.name.as_deref()
        && catalog.find_by_name(name).is_some_and(|spec| spec.id != id)
    {
        bail!("A transformation named '{name}' already exists");
    }
    if !catalog.update(id, update).context("edit transformation")? {
        bail!("No transformation with id {id}");
    }
    println!("Updated transformation {id}");
    Ok(())
}

pub fn remove(id: u64) -> Result<()> {
    let mut catalog = open_catalog_unseeded()?;
    if !catalog.delete(id).context("remove transformation")? {
        bail!("No transformation with id {id}");
    }
    println!("Removed transformation {id}");
    Ok(())
}

pub fn show(config: &Config, name: &str) -> Result<()> {
    let catalog = open_catalog(config)?;
    let spec = find_transformation(&catalog, name)?
        .with_context(|| format!("Unknown transformation '{name}'"))?;

    println!("{} [{}] (id {})", spec.name, spec.category, spec.id);
    println!();
    println!("{}", spec.prompt_text);
    Ok(())
}

fn render_table(transformations: &[TransformationSpec]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Category", "Name", "Source"]);

    for spec in transformations {
        table.add_row(vec![
            spec.id.to_string(),
            spec.category.clone(),
            spec.name.clone(),
            if spec.user_created { "custom" } else { "builtin" }.to_string(),
        ]);
    }

    table
}
