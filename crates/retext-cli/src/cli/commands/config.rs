//! Config command handlers.

use anyhow::{Context, Result, bail};
use retext_core::config::{self, ConfigStore, TomlConfigStore};

pub fn path() {
    println!("{}", config::paths::config_path().display());
}

pub fn init() -> Result<()> {
    let config_path = config::paths::config_path();
    config::Config::init(&config_path)
        .with_context(|| format!("init config at {}", config_path.display()))?;
    println!("Created config at {}", config_path.display());
    Ok(())
}

pub fn get(key: &str) -> Result<()> {
    let store = TomlConfigStore::open_default();
    match store.get(key).with_context(|| format!("read '{key}'"))? {
        Some(value) => println!("{value}"),
        None => bail!("Config key '{key}' is not set"),
    }
    Ok(())
}

pub fn set(key: &str, raw: &str) -> Result<()> {
    let mut store = TomlConfigStore::open_default();
    store
        .set_from_str(key, raw)
        .with_context(|| format!("set '{key}' in {}", store.path().display()))?;
    println!("Updated {key} in {}", store.path().display());
    Ok(())
}
