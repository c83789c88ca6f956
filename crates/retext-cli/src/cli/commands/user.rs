//! User detail command handlers.

use anyhow::{Context, Result, bail};
use retext_core::config::{Config, TomlConfigStore};

pub fn set(label: &str, value: &str) -> Result<()> {
    let mut store = TomlConfigStore::open_default();
    store
        .set_user_detail(label, value)
        .with_context(|| format!("set user detail '{label}'"))?;
    println!("Saved {}", label.trim());
    Ok(())
}

pub fn unset(label: &str) -> Result<()> {
    let mut store = TomlConfigStore::open_default();
    let removed = store
        .remove_user_detail(label)
        .with_context(|| format!("remove user detail '{label}'"))?;
    if !removed {
        bail!("No user detail named '{}'", label.trim());
    }
    println!("Removed {}", label.trim());
    Ok(())
}

pub fn list(config: &Config) {
    let context = config.user_context();
    if context.is_empty() {
        println!("No user details set.");
        return;
    }
    for (label, value) in context.iter() {
        println!("{label}: {value}");
    }
}
