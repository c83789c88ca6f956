//! Transformation entities: catalog entries, user selections and user context.

use std::fmt;

use anyhow::{Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod loader;

pub use catalog::{
    CatalogStore, ImportSummary, JsonCatalog, NewTransformation, TransformationUpdate,
};
pub use loader::{LoadPromptsResult, PromptEntry, PromptWarning, categorize, load_prompts_from_dir};

/// Default upper bound on how many transformations can be applied at once.
pub const DEFAULT_MAX_TRANSFORMATIONS: usize = 5;

/// A named, categorized instruction that can be applied to text.
///
/// `name` and `category` are display metadata; identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationSpec {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub prompt_text: String,
    #[serde(default)]
    pub user_created: bool,
    #[serde(default)]
    pub sort_order: i64,
}

impl TransformationSpec {
    /// Case-insensitive substring match on name or category.
    /// A blank query matches everything.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.category.to_lowercase().contains(&query)
    }
}

/// Error returned when toggling would exceed the selection bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionFull {
    pub max: usize,
}

impl fmt::Display for SelectionFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "You can only select up to {} transformations at once",
            self.max
        )
    }
}

impl std::error::Error for SelectionFull {}

/// Outcome of [`TransformationSelection::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Selected,
    Deselected,
}

/// Ordered list of transformations chosen by the user.
///
/// Order is meaningful: prompts are handed to the model as sequential edits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformationSelection {
    items: Vec<TransformationSpec>,
}

impl TransformationSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects `spec` if absent, deselects it if present.
    ///
    /// # Errors
    /// Returns [`SelectionFull`] when selecting would exceed `max`.
    pub fn toggle(
        &mut self,
        spec: TransformationSpec,
        max: usize,
    ) -> Result<Toggled, SelectionFull> {
        if let Some(pos) = self.items.iter().position(|s| s.id == spec.id) {
            self.items.remove(pos);
            return Ok(Toggled::Deselected);
        }
        if self.items.len() >= max {
            return Err(SelectionFull { max });
        }
        self.items.push(spec);
        Ok(Toggled::Selected)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransformationSpec> {
        self.items.iter()
    }

    /// Prompt texts in selection order.
    pub fn prompts(&self) -> Vec<&str> {
        self.items.iter().map(|s| s.prompt_text.as_str()).collect()
    }
}

impl FromIterator<TransformationSpec> for TransformationSelection {
    fn from_iter<I: IntoIterator<Item = TransformationSpec>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a TransformationSelection {
    type Item = &'a TransformationSpec;
    type IntoIter = std::slice::Iter<'a, TransformationSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Free-text details about the user (name, email, notes), in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserContext(IndexMap<String, String>);

impl UserContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a detail. Re-inserting keeps the original position.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.0.insert(label.into(), value.into());
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Builds a context from label/value pairs, dropping blank values.
    pub fn from_details<'a, I>(details: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut context = Self::new();
        for (label, value) in details {
            let value = value.trim();
            if !label.trim().is_empty() && !value.is_empty() {
                context.insert(label.trim(), value);
            }
        }
        context
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (label, value) in iter {
            context.insert(label, value);
        }
        context
    }
}

/// Resolves names (case-insensitive) or numeric ids into a selection.
///
/// Order follows `names`. Duplicates are rejected rather than toggled off.
///
/// # Errors
/// Returns an error for unknown names, duplicates, or more than `max` entries.
pub fn resolve_selection<C: CatalogStore + ?Sized>(
    catalog: &C,
    names: &[String],
    max: usize,
) -> Result<TransformationSelection> {
    let all = catalog.list_transformations(None)?;
    let mut selection = TransformationSelection::new();

    for raw in names {
        let wanted = raw.trim();
        let Some(spec) = lookup(&all, wanted) else {
            bail!("Unknown transformation: {wanted}");
        };
        if selection.iter().any(|s| s.id == spec.id) {
            bail!("Transformation selected twice: {}", spec.name);
        }
        selection.toggle(spec.clone(), max)?;
    }

    Ok(selection)
}

/// Finds one transformation by numeric id or case-insensitive name.
///
/// # Errors
/// Returns an error if the catalog cannot be read.
pub fn find_transformation<C: CatalogStore + ?Sized>(
    catalog: &C,
    wanted: &str,
) -> Result<Option<TransformationSpec>> {
    let all = catalog.list_transformations(None)?;
    Ok(lookup(&all, wanted.trim()).cloned())
}

fn lookup<'a>(all: &'a [TransformationSpec], wanted: &str) -> Option<&'a TransformationSpec> {
    all.iter()
        .find(|spec| wanted.parse::<u64>().is_ok_and(|id| id == spec.id))
        .or_else(|| all.iter().find(|spec| spec.name.eq_ignore_ascii_case(wanted)))
}
