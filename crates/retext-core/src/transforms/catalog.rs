//! Transformation catalog persisted as JSON under `RETEXT_HOME`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::TransformationSpec;
use super::loader::PromptEntry;

/// Read-only view of the catalog used by selection and listing code.
pub trait CatalogStore {
    /// Distinct category names, sorted.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn list_categories(&self) -> Result<Vec<String>>;

    /// Transformations ordered by `(category, sort_order, name)`, or by
    /// `(sort_order, name)` when filtered to one category.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read.
    fn list_transformations(&self, category: Option<&str>) -> Result<Vec<TransformationSpec>>;
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransformation {
    pub name: String,
    pub category: String,
    pub prompt_text: String,
    pub user_created: bool,
    pub sort_order: i64,
}

impl NewTransformation {
    /// A user-created entry with default ordering.
    pub fn user(
        name: impl Into<String>,
        category: impl Into<String>,
        prompt_text: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            prompt_text: prompt_text.into(),
            user_created: true,
            sort_order: 0,
        }
    }
}

impl From<&PromptEntry> for NewTransformation {
    fn from(entry: &PromptEntry) -> Self {
        Self {
            name: entry.name.clone(),
            category: entry.category.clone(),
            prompt_text: entry.prompt.clone(),
            user_created: false,
            sort_order: 0,
        }
    }
}

/// Partial update; `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformationUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub prompt_text: Option<String>,
    pub sort_order: Option<i64>,
}

/// Outcome of [`JsonCatalog::import_entries`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    next_id: u64,
    #[serde(default)]
    transformations: Vec<TransformationSpec>,
}

impl Default for CatalogFile {
    fn default() -> Self {
        Self {
            next_id: 1,
            transformations: Vec::new(),
        }
    }
}

/// File-backed catalog. Mutations are written through on every call.
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    data: CatalogFile,
}

impl JsonCatalog {
    /// Opens the catalog at `path`. A missing file is an empty catalog.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read catalog from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse catalog from {}", path.display()))?
        } else {
            CatalogFile::default()
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_empty(&self) -> bool {
        self.data.transformations.is_empty()
    }

    /// Adds an entry and returns its id.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be written.
    pub fn add(&mut self, new: NewTransformation) -> Result<u64> {
        let mut data = self.data.clone();
        let id = push(&mut data, new);
        self.commit(data)?;
        tracing::debug!(id, "added transformation");
        Ok(id)
    }

    /// Applies `update` to entry `id`. Returns `false` if no such entry.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be written.
    pub fn update(&mut self, id: u64, update: TransformationUpdate) -> Result<bool> {
        let mut data = self.data.clone();
        let Some(spec) = data.transformations.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        if let Some(name) = update.name {
            spec.name = name;
        }
        if let Some(category) = update.category {
            spec.category = category;
        }
        if let Some(prompt_text) = update.prompt_text {
            spec.prompt_text = prompt_text;
        }
        if let Some(sort_order) = update.sort_order {
            spec.sort_order = sort_order;
        }
        self.commit(data)?;
        tracing::debug!(id, "updated transformation");
        Ok(true)
    }

    /// Removes entry `id`. Returns `false` if no such entry.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be written.
    pub fn delete(&mut self, id: u64) -> Result<bool> {
        let mut data = self.data.clone();
        data.transformations.retain(|s| s.id != id);
        if data.transformations.len() == self.data.transformations.len() {
            return Ok(false);
        }
        self.commit(data)?;
        Ok(true)
    }

    pub fn get(&self, id: u64) -> Option<&TransformationSpec> {
        self.data.transformations.iter().find(|s| s.id == id)
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Option<&TransformationSpec> {
        let name = name.trim();
        self.data
            .transformations
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Imports loader entries, skipping any whose `(category, name)` is
    /// already in the catalog (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be written.
    pub fn import_entries(&mut self, entries: &[PromptEntry]) -> Result<ImportSummary> {
        let mut data = self.data.clone();
        let mut summary = ImportSummary::default();
        for entry in entries {
            let exists = data.transformations.iter().any(|s| {
                s.category.eq_ignore_ascii_case(&entry.category)
                    && s.name.eq_ignore_ascii_case(&entry.name)
            });
            if exists {
                summary.skipped += 1;
            } else {
                push(&mut data, entry.into());
                summary.added += 1;
            }
        }
        if summary.added > 0 {
            self.commit(data)?;
        }
        Ok(summary)
    }

    /// Seeds the catalog from loader entries on first run only.
    ///
    /// Does nothing (returns 0) once the catalog has any category.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be read or written.
    pub fn seed_from_entries(&mut self, entries: &[PromptEntry]) -> Result<usize> {
        if !self.list_categories()?.is_empty() {
            return Ok(0);
        }
        let added = self.import_entries(entries)?.added;
        tracing::info!(added, path = %self.path.display(), "seeded transformation catalog");
        Ok(added)
    }

    /// Writes the catalog atomically (temp file + rename).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        write_catalog(&self.path, &self.data)
    }

    /// Persists `data`, then makes it the in-memory state.
    fn commit(&mut self, data: CatalogFile) -> Result<()> {
        write_catalog(&self.path, &data)?;
        self.data = data;
        Ok(())
    }
}

fn push(data: &mut CatalogFile, new: NewTransformation) -> u64 {
    let id = data.next_id;
    data.next_id += 1;
    data.transformations.push(TransformationSpec {
        id,
        name: new.name,
        category: new.category,
        prompt_text: new.prompt_text,
        user_created: new.user_created,
        sort_order: new.sort_order,
    });
    id
}

fn write_catalog(path: &Path, data: &CatalogFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(data).context("Failed to serialize catalog")?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write catalog to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}

impl CatalogStore for JsonCatalog {
    fn list_categories(&self) -> Result<Vec<String>> {
        let mut categories: Vec<String> = self
            .data
            .transformations
            .iter()
            .map(|s| s.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    fn list_transformations(&self, category: Option<&str>) -> Result<Vec<TransformationSpec>> {
        let mut specs: Vec<TransformationSpec> = self
            .data
            .transformations
            .iter()
            .filter(|s| category.is_none_or(|c| s.category == c))
            .cloned()
            .collect();
        specs.sort_by(|a, b| {
            a.category
                .cmp(&b.category)
                .then(a.sort_order.cmp(&b.sort_order))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::transforms::{find_transformation, resolve_selection};

    fn catalog_with_entries(dir: &Path) -> JsonCatalog {
        let mut catalog = JsonCatalog::open(dir.join("catalog.json")).unwrap();
        catalog
            .add(NewTransformation::user("Shorten", "Editing", "Make it shorter."))
            .unwrap();
        catalog
            .add(NewTransformation::user("Fix Grammar", "Editing", "Fix grammar."))
            .unwrap();
        catalog
            .add(NewTransformation::user("Formal", "Tone", "Make it formal."))
            .unwrap();
        catalog
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let catalog = JsonCatalog::open(dir.path().join("catalog.json")).unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.list_categories().unwrap().is_empty());
    }

    #[test]
    fn test_add_assigns_increasing_ids_and_persists() {
        let dir = tempdir().unwrap();
        let catalog = catalog_with_entries(dir.path());
        assert_eq!(catalog.find_by_name("shorten").unwrap().id, 1);

        let reopened = JsonCatalog::open(catalog.path()).unwrap();
        assert_eq!(reopened.get(3).unwrap().name, "Formal");
        assert!(reopened.get(3).unwrap().user_created);
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let dir = tempdir().unwrap();
        let mut catalog = catalog_with_entries(dir.path());
        assert!(catalog.delete(3).unwrap());
        assert!(!catalog.delete(3).unwrap());

        let id = catalog
            .add(NewTransformation::user("Casual", "Tone", "Relax."))
            .unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn test_list_orders_by_category_sort_order_name() {
        let dir = tempdir().unwrap();
        let mut catalog = catalog_with_entries(dir.path());
        catalog
            .update(
                1,
                TransformationUpdate {
                    sort_order: Some(-1),
                    ..Default::default()
                },
            )
            .unwrap();

        let names: Vec<_> = catalog
            .list_transformations(None)
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Shorten", "Fix Grammar", "Formal"]);

        let tone: Vec<_> = catalog
            .list_transformations(Some("Tone"))
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(tone, vec!["Formal"]);
        assert_eq!(catalog.list_categories().unwrap(), vec!["Editing", "Tone"]);
    }

    #[test]
    fn test_update_missing_id_returns_false() {
        let dir = tempdir().unwrap();
        let mut catalog = catalog_with_entries(dir.path());
        assert!(!catalog.update(99, TransformationUpdate::default()).unwrap());
    }

    #[test]
    fn test_seed_only_runs_on_empty_catalog() {
        let dir = tempdir().unwrap();
        let entries = vec![PromptEntry {
            name: "Shorten".to_string(),
            category: "General".to_string(),
            prompt: "Make it shorter.".to_string(),
            path: PathBuf::from("shorten.md"),
        }];

        let mut catalog = JsonCatalog::open(dir.path().join("catalog.json")).unwrap();
        assert_eq!(catalog.seed_from_entries(&entries).unwrap(), 1);
        assert_eq!(catalog.seed_from_entries(&entries).unwrap(), 0);
        assert!(!catalog.get(1).unwrap().user_created);
    }

    #[test]
    fn test_import_twice_skips_existing_entries() {
        let dir = tempdir().unwrap();
        let entries = vec![PromptEntry {
            name: "Shorten".to_string(),
            category: "General".to_string(),
            prompt: "Make it shorter.".to_string(),
            path: PathBuf::from("shorten.md"),
        }];

        let mut catalog = JsonCatalog::open(dir.path().join("catalog.json")).unwrap();
        let first = catalog.import_entries(&entries).unwrap();
        assert_eq!(first, ImportSummary { added: 1, skipped: 0 });
        let second = catalog.import_entries(&entries).unwrap();
        assert_eq!(second, ImportSummary { added: 0, skipped: 1 });

        let reopened = JsonCatalog::open(catalog.path()).unwrap();
        let listed: Vec<_> = reopened
            .list_transformations(None)
            .unwrap()
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();
        assert_eq!(listed, vec![(1, "Shorten".to_string())]);
    }

    #[test]
    fn test_failed_write_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let mut catalog = catalog_with_entries(dir.path());
        // A directory where the temp file should go makes the write fail.
        fs::create_dir(dir.path().join("catalog.json.tmp")).unwrap();

        assert!(catalog.add(NewTransformation::user("Casual", "Tone", "Relax.")).is_err());
        assert!(catalog.delete(1).is_err());
        assert!(
            catalog
                .update(
                    2,
                    TransformationUpdate {
                        name: Some("Renamed".to_string()),
                        ..Default::default()
                    }
                )
                .is_err()
        );

        assert_eq!(catalog.list_transformations(None).unwrap().len(), 3);
        assert!(catalog.get(1).is_some());
        assert_eq!(catalog.get(2).unwrap().name, "Fix Grammar");
        assert!(catalog.find_by_name("Casual").is_none());
    }

    #[test]
    fn test_resolve_selection_by_name_and_id() {
        let dir = tempdir().unwrap();
        let catalog = catalog_with_entries(dir.path());

        let selection =
            resolve_selection(&catalog, &["3".to_string(), "fix grammar".to_string()], 5)
                .unwrap();
        assert_eq!(
            selection.prompts(),
            vec!["Make it formal.", "Fix grammar."]
        );
    }

    #[test]
    fn test_resolve_selection_rejects_unknown_and_excess() {
        let dir = tempdir().unwrap();
        let catalog = catalog_with_entries(dir.path());

        let err = resolve_selection(&catalog, &["nope".to_string()], 5).unwrap_err();
        assert!(err.to_string().contains("Unknown transformation"));

        let names = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let err = resolve_selection(&catalog, &names, 2).unwrap_err();
        assert!(err.to_string().contains("up to 2"));
    }

    #[test]
    fn test_find_transformation_by_id_or_name() {
        let dir = tempdir().unwrap();
        let catalog = catalog_with_entries(dir.path());

        let by_id = find_transformation(&catalog, " 2 ").unwrap().unwrap();
        assert_eq!(by_id.name, "Fix Grammar");
        let by_name = find_transformation(&catalog, "FORMAL").unwrap().unwrap();
        assert_eq!(by_name.id, 3);
        assert!(find_transformation(&catalog, "missing").unwrap().is_none());
    }
}
