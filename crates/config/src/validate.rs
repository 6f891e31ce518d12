//! Configuration validation engine.
//!
//! Validates config files against the known schema, detects
//! unknown/misspelled fields, and reports credential and retry settings that
//! will fail or misbehave at run time.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    env_subst::{substitute_env, unresolved_placeholders},
    loader::{find_config_file, parse_config_value},
    schema::GraphboxConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "auth", "retry",
    /// "endpoint", "security", "file-ref", "env"
    pub category: &'static str,
    /// Dotted path, e.g. "auth.client_secret"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Expected shape of the configuration schema.
enum KnownKeys {
    Struct(HashMap<&'static str, KnownKeys>),
    Leaf,
}

/// Mirrors every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::{Leaf, Struct};

    Struct(HashMap::from([
        ("tenant_id", Leaf),
        ("client_id", Leaf),
        ("mailbox", Leaf),
        (
            "auth",
            Struct(HashMap::from([
                ("client_secret", Leaf),
                ("certificate_path", Leaf),
                ("certificate_password", Leaf),
                ("certificate_thumbprint", Leaf),
            ])),
        ),
        (
            "retry",
            Struct(HashMap::from([
                ("max_attempts", Leaf),
                ("base_delay_ms", Leaf),
                ("max_delay_ms", Leaf),
            ])),
        ),
        (
            "graph",
            Struct(HashMap::from([
                ("base_url", Leaf),
                ("authority", Leaf),
                ("scope", Leaf),
                ("timeout_secs", Leaf),
                ("max_pages", Leaf),
            ])),
        ),
        ("output", Struct(HashMap::from([("format", Leaf)]))),
    ]))
}

const MAX_SENSIBLE_RETRIES: u32 = 10;

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let mut result = validate_str(&content, actual_path);
            result.config_path = Some(actual_path.clone());
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate raw config text; `path` only selects the format by extension
/// and anchors relative certificate paths.
#[must_use]
pub fn validate_str(raw: &str, path: &Path) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let substituted = substitute_env(raw);
    for name in unresolved_placeholders(&substituted) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "env",
            path: String::new(),
            message: format!("environment variable {name} is not set"),
        });
    }

    let value = match parse_config_value(&substituted, path) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    check_unknown_fields(&value, &build_schema_map(), "", &mut diagnostics);

    match serde_json::from_value::<GraphboxConfig>(value) {
        Ok(config) => {
            check_identity(&config, &mut diagnostics);
            check_auth(&config, raw, path, &mut diagnostics);
            check_retry(&config, &mut diagnostics);
            check_endpoints(&config, &mut diagnostics);
        },
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &serde_json::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (serde_json::Value::Object(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };
    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            "at top level "
        } else {
            ""
        };
        let msg = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
            None => format!("unknown field {level}"),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message: msg.trim().to_string(),
        });
    }
}

fn check_identity(config: &GraphboxConfig, diagnostics: &mut Vec<Diagnostic>) {
    if let Some(tenant) = &config.tenant_id
        && !tenant
            .trim()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "auth",
            path: "tenant_id".into(),
            message: "tenant id must be a GUID or domain name".into(),
        });
    }
    if let Some(client_id) = &config.client_id
        && uuid::Uuid::parse_str(client_id.trim()).is_err()
    {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "auth",
            path: "client_id".into(),
            message: "client id must be the application (client) GUID".into(),
        });
    }
}

fn check_auth(config: &GraphboxConfig, raw: &str, path: &Path, diagnostics: &mut Vec<Diagnostic>) {
    use secrecy::ExposeSecret;

    let auth = &config.auth;
    let configured: Vec<&str> = [
        ("auth.client_secret", auth.client_secret.as_ref().is_some_and(|s| !s.expose_secret().trim().is_empty())),
        ("auth.certificate_path", auth.certificate_path.as_ref().is_some_and(|p| !p.as_os_str().is_empty())),
        ("auth.certificate_thumbprint", auth.certificate_thumbprint.as_ref().is_some_and(|t| !t.trim().is_empty())),
    ]
    .into_iter()
    .filter_map(|(name, set)| set.then_some(name))
    .collect();

    match configured.len() {
        0 => diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "auth",
            path: "auth".into(),
            message: "no authentication method in file; one must come from flags or environment"
                .into(),
        }),
        1 => {},
        _ => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "auth",
            path: "auth".into(),
            message: format!(
                "exactly one authentication method may be configured, found {}",
                configured.join(", ")
            ),
        }),
    }

    if auth.certificate_password.is_some() && auth.certificate_path.is_none() {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "auth",
            path: "auth.certificate_password".into(),
            message: "certificate_password has no effect without certificate_path".into(),
        });
    }

    if let Some(cert) = &auth.certificate_path {
        let resolved = if cert.is_relative() {
            path.parent().map_or_else(|| cert.clone(), |dir| dir.join(cert))
        } else {
            cert.clone()
        };
        if !resolved.exists() {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "file-ref",
                path: "auth.certificate_path".into(),
                message: format!("file not found: {}", resolved.display()),
            });
        }
    }

    // Secrets written literally rather than via ${VAR}.
    for (field, present) in [
        ("client_secret", auth.client_secret.is_some()),
        ("certificate_password", auth.certificate_password.is_some()),
    ] {
        if present && !field_uses_placeholder(raw, field) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "security",
                path: format!("auth.{field}"),
                message: format!(
                    "{field} is stored in plain text; reference an environment variable with ${{VAR}} instead"
                ),
            });
        }
    }
}

fn field_uses_placeholder(raw: &str, field: &str) -> bool {
    raw.lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with(field) || line.starts_with(&format!("\"{field}\"")))
        .any(|line| line.contains("${"))
}

fn check_retry(config: &GraphboxConfig, diagnostics: &mut Vec<Diagnostic>) {
    let retry = &config.retry;
    if retry.max_attempts > MAX_SENSIBLE_RETRIES {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "retry",
            path: "retry.max_attempts".into(),
            message: format!(
                "{} retries can keep a throttled mailbox busy for a long time",
                retry.max_attempts
            ),
        });
    }
    if retry.max_attempts > 0 && retry.base_delay_ms == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "retry",
            path: "retry.base_delay_ms".into(),
            message: "base delay of 0 retries immediately without backoff".into(),
        });
    }
    if retry.max_delay_ms < retry.base_delay_ms {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "retry",
            path: "retry.max_delay_ms".into(),
            message: "max_delay_ms is below base_delay_ms; every wait is capped to max_delay_ms"
                .into(),
        });
    }
}

fn check_endpoints(config: &GraphboxConfig, diagnostics: &mut Vec<Diagnostic>) {
    for (path, value) in [
        ("graph.base_url", &config.graph.base_url),
        ("graph.authority", &config.graph.authority),
    ] {
        match url::Url::parse(value) {
            Ok(url) if url.scheme() == "https" => {},
            Ok(url) if url.host_str().is_some_and(is_loopback_host) => {},
            Ok(_) => diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                category: "endpoint",
                path: path.into(),
                message: "endpoint is not https; credentials would travel in clear text".into(),
            }),
            Err(e) => diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "endpoint",
                path: path.into(),
                message: format!("invalid URL: {e}"),
            }),
        }
    }
    if config.graph.timeout_secs == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "endpoint",
            path: "graph.timeout_secs".into(),
            message: "request timeout must be at least one second".into(),
        });
    }
    if config.graph.max_pages == 0 {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "endpoint",
            path: "graph.max_pages".into(),
            message: "max_pages must be at least 1".into(),
        });
    }
}

fn is_loopback_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn toml(raw: &str) -> ValidationResult {
        validate_str(raw, Path::new("graphbox.toml"))
    }

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("mailbox", "mailbx"), 1);
        assert_eq!(levenshtein("tenant", "tenent"), 1);
    }

    #[test]
    fn suggest_finds_closest() {
        assert_eq!(suggest("tennant_id", &["tenant_id", "client_id"], 3), Some("tenant_id"));
        assert_eq!(suggest("zzzzzzzz", &["tenant_id", "client_id"], 3), None);
    }

    #[test]
    fn clean_config_has_no_errors() {
        let result = toml(
            r#"
tenant_id = "contoso.onmicrosoft.com"
client_id = "11111111-2222-3333-4444-555555555555"

[auth]
certificate_thumbprint = "DEADBEEF"
"#,
        );
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn misspelled_field_gets_suggestion() {
        let result = toml("[retry]\nmax_attemps = 2\n");
        let d = find(&result, "retry.max_attemps").unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.category, "unknown-field");
        assert!(d.message.contains("max_attempts"));
    }

    #[test]
    fn unknown_top_level_field_is_flagged() {
        let result = toml("tennant_id = \"contoso\"\n");
        let d = find(&result, "tennant_id").unwrap();
        assert!(d.message.contains("at top level"));
        assert!(d.message.contains("tenant_id"));
    }

    #[test]
    fn syntax_error_stops_validation() {
        let result = toml("[auth\n");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn wrong_type_is_type_error() {
        let result = toml("[retry]\nmax_attempts = \"three\"\n");
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn two_auth_methods_is_error() {
        let result = toml(
            r#"
[auth]
client_secret = "${GRAPHBOX_SECRET:-abc}"
certificate_thumbprint = "DEADBEEF"
"#,
        );
        let d = find(&result, "auth").unwrap();
        assert_eq!(d.severity, Severity::Error);
        assert!(d.message.contains("auth.client_secret"));
        assert!(d.message.contains("auth.certificate_thumbprint"));
    }

    #[test]
    fn plain_text_secret_is_a_security_warning() {
        let result = toml("[auth]\nclient_secret = \"abc\"\n");
        let d = find(&result, "auth.client_secret").unwrap();
        assert_eq!(d.category, "security");

        let result = toml("[auth]\nclient_secret = \"${GRAPHBOX_SECRET:-abc}\"\n");
        assert!(find(&result, "auth.client_secret").is_none());
    }

    #[test]
    fn missing_certificate_file_is_warned_relative_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("graphbox.toml");
        let result = validate_str("[auth]\ncertificate_path = \"app.pfx\"\n", &config_path);
        let d = find(&result, "auth.certificate_path").unwrap();
        assert_eq!(d.category, "file-ref");

        std::fs::write(dir.path().join("app.pfx"), b"x").unwrap();
        let result = validate_str("[auth]\ncertificate_path = \"app.pfx\"\n", &config_path);
        assert!(find(&result, "auth.certificate_path").is_none());
    }

    #[test]
    fn non_guid_client_id_is_error() {
        let result = toml("client_id = \"my-app\"\n");
        assert_eq!(find(&result, "client_id").unwrap().severity, Severity::Error);
    }

    #[test]
    fn retry_settings_are_sanity_checked() {
        let result = toml("[retry]\nmax_attempts = 50\nbase_delay_ms = 0\nmax_delay_ms = 0\n");
        assert!(find(&result, "retry.max_attempts").is_some());
        assert!(find(&result, "retry.base_delay_ms").is_some());
        assert!(!result.has_errors());
    }

    #[test]
    fn plain_http_endpoint_warns_unless_loopback() {
        let result = toml("[graph]\nbase_url = \"http://graph.example.com/v1.0\"\n");
        assert_eq!(find(&result, "graph.base_url").unwrap().severity, Severity::Warning);

        let result = toml("[graph]\nbase_url = \"http://127.0.0.1:8080/v1.0\"\n");
        assert!(find(&result, "graph.base_url").is_none());
    }

    #[test]
    fn yaml_is_validated_too() {
        let result = validate_str("tenant_id: contoso\nmailbx: a@b.c\n", Path::new("graphbox.yaml"));
        assert!(find(&result, "mailbx").is_some());
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate(Some(&dir.path().join("graphbox.toml")));
        assert!(result.has_errors());
        assert!(result.config_path.is_some());
    }
}
