//! Cache maintenance CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Subcommand;
use roadscout::cache::FsGeometryCache;

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show geometry cache statistics
    Stats,
    /// Clear the geometry cache, removing all cached roads
    Clear,
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, cache_dir: Option<PathBuf>) -> Result<(), CliError> {
    let dir = cache_dir.unwrap_or_else(FsGeometryCache::default_directory);

    match action {
        CacheAction::Stats => {
            println!("Geometry cache: {}", dir.display());
            let (files, bytes) = cache_stats(&dir)?;
            println!("  Entries: {}", files);
            println!("  Size:    {} KiB", bytes / 1024);
            Ok(())
        }
        CacheAction::Clear => {
            println!("Clearing geometry cache at: {}", dir.display());
            let removed = clear_cache(&dir)?;
            println!("Deleted {} entries", removed);
            Ok(())
        }
    }
}

fn cache_stats(dir: &Path) -> Result<(usize, u64), CliError> {
    let mut files = 0usize;
    let mut bytes = 0u64;
    if dir.exists() {
        let entries = fs::read_dir(dir).map_err(|e| CliError::Cache(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                files += 1;
                bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
    }
    Ok((files, bytes))
}

fn clear_cache(dir: &Path) -> Result<usize, CliError> {
    let mut removed = 0usize;
    if dir.exists() {
        let entries = fs::read_dir(dir).map_err(|e| CliError::Cache(e.to_string()))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                fs::remove_file(&path).map_err(|e| CliError::Cache(e.to_string()))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}
