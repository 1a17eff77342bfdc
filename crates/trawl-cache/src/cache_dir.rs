use crate::error::CacheError;
use std::path::PathBuf;

pub const TRAWL_CACHE_DIR_ENV_VAR: &str = "TRAWL_CACHE_DIR";

/// Configuration for selecting the on-disk cache root.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheConfig {
    /// Override the global cache directory.
    pub cache_root_override: Option<PathBuf>,
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            cache_root_override: std::env::var_os(TRAWL_CACHE_DIR_ENV_VAR)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Returns (and creates) the directory holding persisted binary metadata.
///
/// By default this is `~/.trawl/cache/metadata`. Entries are keyed by the binary's path, so
/// the directory is shared by every project that references the same binaries.
pub fn metadata_cache_dir(config: &CacheConfig) -> Result<PathBuf, CacheError> {
    let base = match &config.cache_root_override {
        Some(root) => root.clone(),
        None => default_cache_root()?,
    };

    let root = base.join("metadata");
    std::fs::create_dir_all(&root)?;
    Ok(root)
}

pub(crate) fn default_cache_root() -> Result<PathBuf, CacheError> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .ok_or(CacheError::MissingHomeDir)?;

    Ok(home.join(".trawl").join("cache"))
}
