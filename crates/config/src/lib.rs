//! Configuration loading, validation and env substitution.
//!
//! Config files: `docscan.toml`, `docscan.yaml`, or `docscan.json`
//! Searched in `./` then `~/.config/docscan/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        load_config, load_or_default,
    },
    schema::{DatabaseConfig, DocscanConfig, KeyStoreBackend, KeyStoreConfig, VaultConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_str},
};
