//! Configuration loading, validation and env substitution.
//!
//! Config files: `graphbox.toml`, `graphbox.yaml` or `graphbox.json`,
//! searched in `./` then `~/.config/graphbox/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{LoadedConfig, apply_env_overrides, config_dir, load, load_config},
    schema::{
        AuthConfig, GraphConfig, GraphboxConfig, OutputConfig, OutputFormat, RetryConfig,
        DEFAULT_GRAPH_BASE_URL, DEFAULT_SCOPE,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_str},
};
