//! Auth error types.

use std::path::PathBuf;

use crate::store::StoreError;

/// Errors raised while turning configuration into a signing credential.
///
/// All of these are fatal to the run; none is retried.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Zero, or more than one, authentication method was configured.
    #[error("{}", describe_selection(.configured))]
    NoMethodProvided { configured: Vec<&'static str> },

    /// Tenant or client identifier rejected before building a credential.
    #[error("invalid {field}: {reason}")]
    InvalidIdentifier { field: &'static str, reason: String },

    #[error("cannot read certificate file {}: {source}", .path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The PKCS#12 container could not be turned into key + certificates.
    ///
    /// Never includes the password.
    #[error("failed to decode PKCS#12 certificate: {reason}")]
    CertificateDecodeFailed {
        reason: String,
        #[source]
        source: Option<openssl::error::ErrorStack>,
    },

    #[error("certificate store export failed: {0}")]
    StoreExportFailed(#[from] StoreError),
}

impl AuthError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        Self::CertificateDecodeFailed {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn decode_with(reason: impl Into<String>, source: openssl::error::ErrorStack) -> Self {
        Self::CertificateDecodeFailed {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

fn describe_selection(configured: &[&'static str]) -> String {
    if configured.is_empty() {
        "no authentication method configured: set one of client secret, \
         certificate file, or certificate thumbprint"
            .to_string()
    } else {
        format!(
            "exactly one authentication method must be configured, found {}: {}",
            configured.len(),
            configured.join(", ")
        )
    }
}

/// Errors raised while acquiring an access token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint rejected the request ({status}): {}", describe_rejection(.error, .description))]
    Rejected {
        status: u16,
        error: Option<String>,
        description: Option<String>,
    },

    #[error("failed to sign client assertion: {0}")]
    Signing(#[from] openssl::error::ErrorStack),

    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl TokenError {
    /// HTTP status of a rejected token request, or of the transport error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Signing(_) | Self::Malformed(_) => None,
        }
    }
}

fn describe_rejection(error: &Option<String>, description: &Option<String>) -> String {
    match (error.as_deref(), description.as_deref()) {
        (Some(code), Some(desc)) => format!("{code}: {desc}"),
        (Some(code), None) => code.to_string(),
        (None, Some(desc)) => desc.to_string(),
        (None, None) => "no error details".to_string(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_method_message_lists_alternatives() {
        let err = AuthError::NoMethodProvided { configured: vec![] };
        assert!(err.to_string().contains("certificate thumbprint"));
    }

    #[test]
    fn conflicting_methods_are_named() {
        let err = AuthError::NoMethodProvided {
            configured: vec!["client secret", "certificate thumbprint"],
        };
        assert_eq!(
            err.to_string(),
            "exactly one authentication method must be configured, found 2: \
             client secret, certificate thumbprint"
        );
    }

    #[test]
    fn rejection_message_prefers_code_and_description() {
        let err = TokenError::Rejected {
            status: 401,
            error: Some("invalid_client".into()),
            description: Some("AADSTS7000215: Invalid client secret provided.".into()),
        };
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("invalid_client: AADSTS7000215"));
    }
}
