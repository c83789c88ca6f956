//! Configuration management for retext.
//!
//! Loads configuration from ${RETEXT_HOME}/config.toml with sensible defaults.
//! Edits go through [`TomlConfigStore`], which keeps the comments of the
//! embedded template intact.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, Item};

use crate::transforms::{DEFAULT_MAX_TRANSFORMATIONS, UserContext};

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Overlays a user's config onto the template so new comments and sections
/// show up while the user's values win.
fn merge_with_template(user_config: &str) -> Result<DocumentMut> {
    let mut doc: DocumentMut = default_config_template()
        .parse()
        .context("Failed to parse default config template")?;
    let user_doc: DocumentMut = user_config.parse().context("Failed to parse user config")?;

    merge_items(doc.as_table_mut(), user_doc.as_table());

    Ok(doc)
}

fn merge_items(target: &mut toml_edit::Table, source: &toml_edit::Table) {
    for (key, value) in source {
        match value {
            Item::Value(v) => {
                target[key] = Item::Value(v.clone());
            }
            Item::Table(src_table) => {
                if let Some(Item::Table(target_table)) = target.get_mut(key) {
                    merge_items(target_table, src_table);
                } else {
                    target[key] = Item::Table(src_table.clone());
                }
            }
            Item::ArrayOfTables(src_arr) => {
                target[key] = Item::ArrayOfTables(src_arr.clone());
            }
            Item::None => {}
        }
    }
}

pub mod paths {
    //! Path resolution for retext configuration and data.
    //!
    //! RETEXT_HOME resolution order:
    //! 1. RETEXT_HOME environment variable (if set)
    //! 2. ~/.config/retext (default)

    use std::path::PathBuf;

    /// Returns the retext home directory.
    pub fn retext_home() -> PathBuf {
        if let Ok(home) = std::env::var("RETEXT_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".retext"),
            |h| h.join(".config").join("retext"),
        )
    }

    pub fn config_path() -> PathBuf {
        retext_home().join("config.toml")
    }

    pub fn catalog_path() -> PathBuf {
        retext_home().join("catalog.json")
    }

    pub fn default_prompts_dir() -> PathBuf {
        retext_home().join("prompts")
    }

    pub fn logs_dir() -> PathBuf {
        retext_home().join("logs")
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model identifier sent to the gateway
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds (0 disables)
    pub request_timeout_secs: u64,

    /// Upper bound on transformations per run
    pub max_transformations: usize,

    /// Directory of prompt files used to seed the catalog
    pub prompts_dir: Option<String>,

    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Label -> value details injected into prompts
    #[serde(default)]
    pub user_details: IndexMap<String, String>,
}

impl Config {
    pub const DEFAULT_MODEL: &'static str = "openai/gpt-4o-mini";
    const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }

        write_config(path, default_config_template())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    /// Directory used to seed the catalog.
    pub fn prompts_dir(&self) -> PathBuf {
        self.prompts_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map_or_else(paths::default_prompts_dir, PathBuf::from)
    }

    /// User details with blank entries removed.
    pub fn user_context(&self) -> UserContext {
        UserContext::from_details(&self.user_details)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            request_timeout_secs: Self::DEFAULT_TIMEOUT_SECS,
            max_transformations: DEFAULT_MAX_TRANSFORMATIONS,
            prompts_dir: None,
            providers: ProvidersConfig::default(),
            user_details: IndexMap::new(),
        }
    }
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openrouter: ProviderConfig,
}

/// Provider configuration entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Optional API key (overrides environment variable).
    pub api_key: Option<String>,
    /// Optional API base URL (for proxies).
    pub base_url: Option<String>,
}

impl ProviderConfig {
    /// Returns the effective API key if set and non-empty.
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns the effective base URL if set and non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Key-value store
// ============================================================================

/// Scalar config value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl ConfigValue {
    fn to_item(&self) -> Item {
        match self {
            ConfigValue::String(s) => toml_edit::value(s.as_str()),
            ConfigValue::Integer(i) => toml_edit::value(*i),
            ConfigValue::Float(f) => toml_edit::value(*f),
            ConfigValue::Bool(b) => toml_edit::value(*b),
        }
    }

    fn from_item(key: &str, item: &Item) -> Result<Self> {
        let Some(value) = item.as_value() else {
            bail!("Config key '{key}' is a table, not a value");
        };
        Ok(match value {
            toml_edit::Value::String(s) => ConfigValue::String(s.value().clone()),
            toml_edit::Value::Integer(i) => ConfigValue::Integer(*i.value()),
            toml_edit::Value::Float(f) => ConfigValue::Float(*f.value()),
            toml_edit::Value::Boolean(b) => ConfigValue::Bool(*b.value()),
            _ => bail!("Config key '{key}' is not a scalar value"),
        })
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(s) => write!(f, "{s}"),
            ConfigValue::Integer(i) => write!(f, "{i}"),
            ConfigValue::Float(v) => write!(f, "{v}"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Parses command-line input: booleans, then integers, then floats, else text.
impl FromStr for ConfigValue {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Ok(match trimmed {
            "true" => ConfigValue::Bool(true),
            "false" => ConfigValue::Bool(false),
            _ => {
                if let Ok(i) = trimmed.parse::<i64>() {
                    ConfigValue::Integer(i)
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    ConfigValue::Float(f)
                } else {
                    ConfigValue::String(raw.to_string())
                }
            }
        })
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// Get/set access to persisted settings by dotted key (e.g. `providers.openrouter.api_key`).
pub trait ConfigStore {
    /// # Errors
    /// Returns an error if the store cannot be read or the key names a table.
    fn get(&self, key: &str) -> Result<Option<ConfigValue>>;

    /// # Errors
    /// Returns an error if the store cannot be read.
    fn get_or(&self, key: &str, default: ConfigValue) -> Result<ConfigValue> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// # Errors
    /// Returns an error if the key is invalid or the store cannot be written.
    fn set(&mut self, key: &str, value: ConfigValue) -> Result<()>;
}

/// [`ConfigStore`] over the TOML config file.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default config path.
    pub fn open_default() -> Self {
        Self::new(paths::config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Typed view of the current file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(&self) -> Result<Config> {
        Config::load_from(&self.path)
    }

    /// Sets `key` from command-line text.
    ///
    /// The text is typed with [`ConfigValue::from_str`] first. When that
    /// typed value does not fit the field (e.g. `02134` for a string field),
    /// the raw text is stored as a string instead.
    ///
    /// # Errors
    /// Returns the error of the typed attempt if the string fallback also fails.
    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<()> {
        let Ok(typed) = raw.parse::<ConfigValue>();
        if matches!(typed, ConfigValue::String(_)) {
            return self.set(key, typed);
        }
        match self.set(key, typed) {
            Ok(()) => Ok(()),
            Err(typed_err) => {
                tracing::debug!(%key, "typed config value rejected, storing as string");
                self.set(key, ConfigValue::from(raw)).map_err(|_| typed_err)
            }
        }
    }

    /// Sets one user detail. Labels are taken literally (dots allowed).
    ///
    /// # Errors
    /// Returns an error if the label is blank or the file cannot be written.
    pub fn set_user_detail(&mut self, label: &str, value: &str) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            bail!("User detail label cannot be empty");
        }
        let mut doc = self.document()?;
        doc["user_details"][label] = toml_edit::value(value);
        self.write(&doc)
    }

    /// Removes one user detail. Returns `false` if it was not set.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or written.
    pub fn remove_user_detail(&mut self, label: &str) -> Result<bool> {
        let mut doc = self.document()?;
        let removed = doc
            .get_mut("user_details")
            .and_then(Item::as_table_like_mut)
            .and_then(|table| table.remove(label.trim()))
            .is_some();
        if removed {
            self.write(&doc)?;
        }
        Ok(removed)
    }

    /// Current file merged onto the template, or the template alone.
    fn document(&self) -> Result<DocumentMut> {
        if self.path.exists() {
            let user_config = fs::read_to_string(&self.path)
                .with_context(|| format!("Failed to read config from {}", self.path.display()))?;
            merge_with_template(&user_config)
                .with_context(|| format!("Failed to parse config from {}", self.path.display()))
        } else {
            default_config_template()
                .parse()
                .context("Failed to parse default config template")
        }
    }

    fn write(&self, doc: &DocumentMut) -> Result<()> {
        let content = doc.to_string();
        toml::from_str::<Config>(&content).context("Refusing to write an invalid config")?;
        write_config(&self.path, &content)
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>> {
        let doc = self.document()?;
        let mut item = doc.as_item();
        for segment in split_key(key)? {
            match item.get(segment) {
                Some(next) => item = next,
                None => return Ok(None),
            }
        }
        ConfigValue::from_item(key, item).map(Some)
    }

    fn set(&mut self, key: &str, value: ConfigValue) -> Result<()> {
        let segments = split_key(key)?;
        let Some((last, parents)) = segments.split_last() else {
            bail!("Config key cannot be empty");
        };

        let mut doc = self.document()?;
        let mut item = doc.as_item_mut();
        for segment in parents {
            if !(item.is_none() || item.is_table_like()) {
                bail!("Cannot set '{key}': '{segment}' is under a non-table value");
            }
            item = &mut item[*segment];
        }
        if !(item.is_none() || item.is_table_like()) {
            bail!("Cannot set '{key}': parent is a non-table value");
        }
        item[*last] = value.to_item();

        self.write(&doc)?;
        tracing::debug!(%key, "config value updated");
        Ok(())
    }
}

fn split_key(key: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = key.split('.').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        bail!("Invalid config key: '{key}'");
    }
    Ok(segments)
}

/// Writes config content, creating parent directories as needed.
/// Uses atomic write (temp file + rename) to prevent corruption.
fn write_config(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
