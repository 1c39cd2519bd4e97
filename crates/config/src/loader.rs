use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::DocscanConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "docscan.toml",
    "docscan.yaml",
    "docscan.yml",
    "docscan.json",
];

/// Overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "DOCSCAN_DATABASE_URL";

/// Overrides `key_store.path`.
pub const KEY_STORE_PATH_ENV: &str = "DOCSCAN_KEY_STORE_PATH";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "docscan")
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<DocscanConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let expanded = substitute_env(&raw);
    for name in &expanded.unresolved {
        warn!(var = %name, path = %path.display(), "config references unset env var");
    }
    let mut config = parse_config(&expanded.text, path)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./docscan.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/docscan/docscan.{toml,yaml,yml,json}` (user-global)
///
/// A discovered file that fails to load is an error: falling back to defaults
/// could point the key store somewhere else and orphan existing keys.
pub fn discover_and_load() -> anyhow::Result<DocscanConfig> {
    load_or_default(find_config_file().as_deref())
}

/// Load `path` when given, otherwise `DocscanConfig::default()` plus env
/// overrides.
pub fn load_or_default(path: Option<&Path>) -> anyhow::Result<DocscanConfig> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(path)
        },
        None => {
            debug!("no config file found, using defaults");
            let mut config = DocscanConfig::default();
            apply_env_overrides(&mut config, |name| std::env::var(name).ok());
            Ok(config)
        },
    }
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/docscan/`).
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().to_path_buf())
}

/// Returns the directory holding the key file and database, or `.` when the
/// platform has no home directory.
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Apply `DOCSCAN_*` environment overrides through `lookup`.
pub fn apply_env_overrides(config: &mut DocscanConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
        debug!(var = DATABASE_URL_ENV, "database url overridden from environment");
        config.database.url = Some(url);
    }
    if let Some(path) = lookup(KEY_STORE_PATH_ENV).filter(|v| !v.is_empty()) {
        debug!(var = KEY_STORE_PATH_ENV, "key store path overridden from environment");
        config.key_store.path = Some(PathBuf::from(path));
    }
}

pub(crate) fn parse_config(raw: &str, path: &Path) -> anyhow::Result<DocscanConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
