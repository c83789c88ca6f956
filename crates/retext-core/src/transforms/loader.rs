//! Prompt discovery from a directory of markdown files.
//!
//! Layout: `<root>/<category>/<name>.md`. Files directly under the root land
//! in the `General` category. A `# Heading` inside the file overrides the name
//! derived from the file stem.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

const DEFAULT_CATEGORY: &str = "General";
const PROMPT_EXTENSION: &str = "md";

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*\r?$").expect("heading regex is valid")
});

/// A prompt discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptEntry {
    pub name: String,
    pub category: String,
    pub prompt: String,
    pub path: PathBuf,
}

/// Non-fatal problem hit while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptWarning {
    pub path: PathBuf,
    pub message: String,
}

impl PromptWarning {
    fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result of loading prompts.
#[derive(Debug, Clone, Default)]
pub struct LoadPromptsResult {
    pub entries: Vec<PromptEntry>,
    pub warnings: Vec<PromptWarning>,
}

/// Loads every `*.md` prompt under `dir`, in sorted path order.
///
/// A missing directory yields an empty result.
pub fn load_prompts_from_dir(dir: &Path) -> LoadPromptsResult {
    let mut result = LoadPromptsResult::default();
    if !dir.is_dir() {
        return result;
    }

    let mut files = Vec::new();
    collect_prompt_files(dir, &mut files, &mut result.warnings);
    files.sort();

    for path in files {
        match parse_prompt_file(dir, &path) {
            Ok(Some(entry)) => result.entries.push(entry),
            Ok(None) => {}
            Err(message) => {
                tracing::warn!(path = %path.display(), %message, "skipping prompt file");
                result.warnings.push(PromptWarning::new(&path, message));
            }
        }
    }

    result
}

/// Groups entries by category; names inside a category are sorted.
pub fn categorize(entries: &[PromptEntry]) -> BTreeMap<String, Vec<&PromptEntry>> {
    let mut grouped: BTreeMap<String, Vec<&PromptEntry>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.category.clone())
            .or_default()
            .push(entry);
    }
    for group in grouped.values_mut() {
        group.sort_by(|a, b| a.name.cmp(&b.name));
    }
    grouped
}

fn collect_prompt_files(dir: &Path, files: &mut Vec<PathBuf>, warnings: &mut Vec<PromptWarning>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warnings.push(PromptWarning::new(
                dir,
                format!("Failed to read prompts directory: {e}"),
            ));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warnings.push(PromptWarning::new(
                    dir,
                    format!("Failed to read prompts directory entry: {e}"),
                ));
                continue;
            }
        };

        let path = entry.path();
        // Follows symlinks so linked prompt folders are picked up.
        let Ok(metadata) = fs::metadata(&path) else {
            warnings.push(PromptWarning::new(&path, "Failed to read entry metadata"));
            continue;
        };

        if metadata.is_dir() {
            collect_prompt_files(&path, files, warnings);
        } else if metadata.is_file() && is_prompt_file(&path) {
            files.push(path);
        }
    }
}

fn is_prompt_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PROMPT_EXTENSION))
}

fn parse_prompt_file(root: &Path, path: &Path) -> Result<Option<PromptEntry>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read file: {e}"))?;
    let prompt = content.trim();
    if prompt.is_empty() {
        return Ok(None);
    }

    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut components = relative.components();
    let category = match (components.next(), components.next()) {
        (Some(first), Some(_)) => humanize(&first.as_os_str().to_string_lossy()),
        _ => DEFAULT_CATEGORY.to_string(),
    };

    let name = HEADING_RE
        .captures(prompt)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|heading| !heading.is_empty())
        .unwrap_or_else(|| {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            humanize(&stem)
        });

    Ok(Some(PromptEntry {
        name,
        category,
        prompt: prompt.to_string(),
        path: path.to_path_buf(),
    }))
}

/// `fix-grammar_now` -> `Fix Grammar Now`.
fn humanize(raw: &str) -> String {
    raw.replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
