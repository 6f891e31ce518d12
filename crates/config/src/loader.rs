use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::{substitute_env, unresolved_placeholders},
    schema::GraphboxConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "graphbox.toml",
    "graphbox.yaml",
    "graphbox.yml",
    "graphbox.json",
];

/// Environment variables for settings that have no command-line flag.
/// Credential and retry variables are read by the CLI flags themselves.
pub const ENV_GRAPH_BASE_URL: &str = "GRAPHBOX_GRAPH_BASE_URL";
pub const ENV_AUTHORITY: &str = "GRAPHBOX_AUTHORITY";
pub const ENV_SCOPE: &str = "GRAPHBOX_SCOPE";
pub const ENV_TIMEOUT_SECS: &str = "GRAPHBOX_TIMEOUT_SECS";
pub const ENV_MAX_DELAY_MS: &str = "GRAPHBOX_MAX_DELAY_MS";
pub const ENV_MAX_PAGES: &str = "GRAPHBOX_MAX_PAGES";

/// A parsed config plus the file it came from.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: GraphboxConfig,
    pub path: Option<PathBuf>,
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<GraphboxConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    for name in unresolved_placeholders(&raw) {
        warn!(
            path = %path.display(),
            variable = %name,
            "config references an unset environment variable"
        );
    }
    parse_config(&raw, path)
}

/// Load `explicit` if given, otherwise the first config file found in the
/// standard locations, then apply environment overrides.
///
/// Search order:
/// 1. `./graphbox.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/graphbox/graphbox.{toml,yaml,yml,json}` (user-global)
///
/// A missing file yields defaults; a file that exists but does not parse is
/// an error.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<LoadedConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let mut config = match &path {
        Some(p) => {
            debug!(path = %p.display(), "loading config");
            load_config(p)?
        },
        None => {
            debug!("no config file found, using defaults");
            GraphboxConfig::default()
        },
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    Ok(LoadedConfig { config, path })
}

/// Overlay `GRAPHBOX_*` environment values onto `config`.
///
/// Values that fail to parse are ignored with a warning.
pub fn apply_env_overrides(config: &mut GraphboxConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(v) = get(ENV_GRAPH_BASE_URL) {
        config.graph.base_url = v;
    }
    if let Some(v) = get(ENV_AUTHORITY) {
        config.graph.authority = v;
    }
    if let Some(v) = get(ENV_SCOPE) {
        config.graph.scope = v;
    }
    if let Some(v) = parsed(ENV_TIMEOUT_SECS, get(ENV_TIMEOUT_SECS)) {
        config.graph.timeout_secs = v;
    }
    if let Some(v) = parsed(ENV_MAX_PAGES, get(ENV_MAX_PAGES)) {
        config.graph.max_pages = v;
    }
    if let Some(v) = parsed(ENV_MAX_DELAY_MS, get(ENV_MAX_DELAY_MS)) {
        config.retry.max_delay_ms = v;
    }
}

fn parsed<T: std::str::FromStr>(name: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %value, "ignoring unparsable environment override");
            None
        },
    }
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/graphbox/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "graphbox").map(|d| d.config_dir().to_path_buf())
}

pub(crate) fn format_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("toml")
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<GraphboxConfig> {
    match format_of(path) {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        ext => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

/// Parse `raw` into a generic value tree for validation.
pub(crate) fn parse_config_value(raw: &str, path: &Path) -> anyhow::Result<serde_json::Value> {
    match format_of(path) {
        "toml" => {
            let v: toml::Value = toml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(raw)?),
        ext => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "graphbox.toml",
            r#"
tenant_id = "contoso.onmicrosoft.com"
client_id = "11111111-2222-3333-4444-555555555555"
mailbox = "room-101@contoso.com"

[auth]
certificate_path = "/etc/graphbox/app.pfx"

[retry]
max_attempts = 2
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.tenant_id.as_deref(), Some("contoso.onmicrosoft.com"));
        assert_eq!(cfg.mailbox.as_deref(), Some("room-101@contoso.com"));
        assert_eq!(
            cfg.auth.certificate_path.as_deref(),
            Some(Path::new("/etc/graphbox/app.pfx"))
        );
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.retry.base_delay_ms, 1000);
    }

    #[test]
    fn loads_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write(
            &dir,
            "graphbox.yaml",
            "tenant_id: contoso\nauth:\n  client_secret: hunter2\n",
        );
        let cfg = load_config(&yaml).unwrap();
        assert_eq!(cfg.tenant_id.as_deref(), Some("contoso"));
        assert_eq!(
            cfg.auth.client_secret.unwrap().expose_secret(),
            "hunter2"
        );

        let json = write(
            &dir,
            "graphbox.json",
            r#"{"graph": {"timeout_secs": 5}, "output": {"format": "json"}}"#,
        );
        let cfg = load_config(&json).unwrap();
        assert_eq!(cfg.graph.timeout_secs, 5);
        assert_eq!(cfg.output.format, crate::schema::OutputFormat::Json);
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "graphbox.ini", "tenant_id=x");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn explicit_path_that_does_not_parse_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "graphbox.toml", "tenant_id = [");
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = GraphboxConfig::default();
        apply_env_overrides(&mut cfg, |name| match name {
            ENV_GRAPH_BASE_URL => Some("http://127.0.0.1:9000/v1.0".into()),
            ENV_TIMEOUT_SECS => Some(" 7 ".into()),
            ENV_MAX_DELAY_MS => Some("not-a-number".into()),
            ENV_SCOPE => Some(String::new()),
            _ => None,
        });
        assert_eq!(cfg.graph.base_url, "http://127.0.0.1:9000/v1.0");
        assert_eq!(cfg.graph.timeout_secs, 7);
        assert_eq!(cfg.retry.max_delay_ms, 30_000);
        assert_eq!(cfg.graph.scope, crate::schema::DEFAULT_SCOPE);
    }
}
