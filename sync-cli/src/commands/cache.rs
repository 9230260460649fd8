//! Inspect and clear the on-disk cache.

use anyhow::{Context, Result};

use super::format_message;
use crate::config::AppConfig;

/// Run `cache show`.
pub async fn show(app: &AppConfig) -> Result<()> {
    let cache = app.local_cache();
    let snapshot = cache
        .try_load()
        .await
        .with_context(|| format!("Failed to read cache in {}", app.cache_dir().display()))?;

    match snapshot {
        Some(snapshot) if !snapshot.is_empty() => {
            println!("Cached snapshot ({} messages):", snapshot.len());
            for message in &snapshot {
                println!("  {}", format_message(message));
            }
        }
        _ => println!("Cache is empty."),
    }

    Ok(())
}

/// Run `cache clear`.
pub async fn clear(app: &AppConfig) -> Result<()> {
    let removed = app
        .local_cache()
        .clear()
        .await
        .context("Failed to clear cache")?;

    if removed {
        println!("Cache cleared.");
    } else {
        println!("Cache is already empty.");
    }
    Ok(())
}
