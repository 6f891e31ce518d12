//! Selection of the single authentication method.

use std::{fmt, path::PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::error::AuthError;

/// Raw, possibly conflicting authentication values as they come out of the
/// configuration layer.
#[derive(Default)]
pub struct AuthParts {
    pub client_secret: Option<Secret<String>>,
    pub certificate_path: Option<PathBuf>,
    pub certificate_password: Option<Secret<String>>,
    pub certificate_thumbprint: Option<String>,
}

/// The one authentication method used for this run.
pub enum AuthInput {
    /// Client secret of the app registration.
    Secret(Secret<String>),
    /// PKCS#12 file on disk plus its password (empty when unprotected).
    CertificateFile {
        path: PathBuf,
        password: Secret<String>,
    },
    /// Thumbprint of a certificate held in the platform certificate store.
    StoreThumbprint(String),
}

impl AuthInput {
    /// Pick the single populated alternative.
    ///
    /// Empty strings count as unset. Performs no I/O.
    pub fn from_parts(parts: AuthParts) -> Result<Self, AuthError> {
        let AuthParts {
            client_secret,
            certificate_path,
            certificate_password,
            certificate_thumbprint,
        } = parts;

        let client_secret = client_secret.filter(|s| !is_blank(s.expose_secret()));
        let certificate_path = certificate_path.filter(|p| !p.as_os_str().is_empty());
        let certificate_thumbprint = certificate_thumbprint.filter(|t| !is_blank(t));

        let mut configured = Vec::new();
        if client_secret.is_some() {
            configured.push(Self::SECRET);
        }
        if certificate_path.is_some() {
            configured.push(Self::CERTIFICATE_FILE);
        }
        if certificate_thumbprint.is_some() {
            configured.push(Self::STORE_THUMBPRINT);
        }
        if configured.len() != 1 {
            return Err(AuthError::NoMethodProvided { configured });
        }

        if certificate_path.is_none() && certificate_password.is_some() {
            debug!("certificate password set without a certificate file, ignoring it");
        }

        match (client_secret, certificate_path, certificate_thumbprint) {
            (Some(secret), None, None) => Ok(Self::Secret(secret)),
            (None, Some(path), None) => Ok(Self::CertificateFile {
                path,
                password: certificate_password.unwrap_or_else(|| Secret::new(String::new())),
            }),
            (None, None, Some(thumbprint)) => Ok(Self::StoreThumbprint(thumbprint.trim().into())),
            _ => Err(AuthError::NoMethodProvided { configured }),
        }
    }

    pub const SECRET: &'static str = "client secret";
    pub const CERTIFICATE_FILE: &'static str = "certificate file";
    pub const STORE_THUMBPRINT: &'static str = "certificate thumbprint";

    /// Human-readable name of the selected method.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Secret(_) => Self::SECRET,
            Self::CertificateFile { .. } => Self::CERTIFICATE_FILE,
            Self::StoreThumbprint(_) => Self::STORE_THUMBPRINT,
        }
    }
}

impl fmt::Debug for AuthInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Secret(_) => f.debug_tuple("Secret").field(&"[REDACTED]").finish(),
            Self::CertificateFile { path, .. } => f
                .debug_struct("CertificateFile")
                .field("path", path)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::StoreThumbprint(t) => f.debug_tuple("StoreThumbprint").field(t).finish(),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> Option<Secret<String>> {
        Some(Secret::new(value.to_string()))
    }

    #[test]
    fn nothing_configured_is_rejected() {
        let err = AuthInput::from_parts(AuthParts::default()).unwrap_err();
        assert!(matches!(err, AuthError::NoMethodProvided { ref configured } if configured.is_empty()));
    }

    #[test]
    fn secret_and_thumbprint_conflict() {
        let err = AuthInput::from_parts(AuthParts {
            client_secret: secret("abc"),
            certificate_thumbprint: Some("DEADBEEF".into()),
            ..AuthParts::default()
        })
        .unwrap_err();
        match err {
            AuthError::NoMethodProvided { configured } => {
                assert_eq!(configured, vec![AuthInput::SECRET, AuthInput::STORE_THUMBPRINT]);
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn all_three_conflict() {
        let err = AuthInput::from_parts(AuthParts {
            client_secret: secret("abc"),
            certificate_path: Some("/does/not/exist.pfx".into()),
            certificate_password: secret("pw"),
            certificate_thumbprint: Some("DEADBEEF".into()),
        })
        .unwrap_err();
        assert!(matches!(err, AuthError::NoMethodProvided { ref configured } if configured.len() == 3));
    }

    #[test]
    fn blank_values_do_not_count() {
        let input = AuthInput::from_parts(AuthParts {
            client_secret: secret("   "),
            certificate_thumbprint: Some("AB12".into()),
            ..AuthParts::default()
        })
        .unwrap();
        assert!(matches!(input, AuthInput::StoreThumbprint(ref t) if t == "AB12"));
    }

    #[test]
    fn certificate_without_password_uses_empty_password() {
        let input = AuthInput::from_parts(AuthParts {
            certificate_path: Some("app.pfx".into()),
            ..AuthParts::default()
        })
        .unwrap();
        match input {
            AuthInput::CertificateFile { path, password } => {
                assert_eq!(path, PathBuf::from("app.pfx"));
                assert_eq!(password.expose_secret(), "");
            },
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn stray_password_is_ignored() {
        let input = AuthInput::from_parts(AuthParts {
            client_secret: secret("abc"),
            certificate_password: secret("pw"),
            ..AuthParts::default()
        })
        .unwrap();
        assert_eq!(input.method(), AuthInput::SECRET);
    }

    #[test]
    fn debug_output_is_redacted() {
        let input = AuthInput::Secret(Secret::new("super-secret".into()));
        let dbg = format!("{input:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("REDACTED"));
    }
}
