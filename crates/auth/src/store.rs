//! Platform certificate-store collaborator.
//!
//! Given a thumbprint, a store exports the certificate together with its
//! private key as a PKCS#12 blob protected by a one-time password. The
//! resolver decodes that blob with the same code path as certificate files.

use std::{fmt, sync::Arc};

use {secrecy::Secret, zeroize::Zeroizing};

/// PKCS#12 export of a store certificate.
pub struct ExportedPkcs12 {
    pub blob: Zeroizing<Vec<u8>>,
    pub password: Secret<String>,
}

impl fmt::Debug for ExportedPkcs12 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedPkcs12")
            .field("blob_len", &self.blob.len())
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid certificate thumbprint '{0}': expected 40 hexadecimal digits (SHA-1)")]
    InvalidThumbprint(String),

    #[error("certificate {thumbprint} not found in the certificate store")]
    NotFound { thumbprint: String },

    #[error("certificate {thumbprint} cannot be exported: {reason}")]
    NotExportable { thumbprint: String, reason: String },

    #[error("certificate store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exports certificates (with private key) from a platform store.
pub trait CertificateStore: Send + Sync {
    /// Export the certificate identified by a normalised (uppercase hex)
    /// thumbprint.
    fn export(&self, thumbprint: &str) -> Result<ExportedPkcs12, StoreError>;
}

/// Store used on platforms without a supported certificate store.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedCertificateStore;

impl CertificateStore for UnsupportedCertificateStore {
    fn export(&self, thumbprint: &str) -> Result<ExportedPkcs12, StoreError> {
        Err(StoreError::NotExportable {
            thumbprint: thumbprint.to_string(),
            reason: format!(
                "no certificate store support on {}; use a certificate file instead",
                std::env::consts::OS
            ),
        })
    }
}

/// The certificate store for the current platform.
#[must_use]
pub fn default_store() -> Arc<dyn CertificateStore> {
    #[cfg(windows)]
    {
        Arc::new(crate::windows_store::PowerShellCertificateStore::default())
    }
    #[cfg(not(windows))]
    {
        Arc::new(UnsupportedCertificateStore)
    }
}

/// Hex digits in a SHA-1 thumbprint.
pub const THUMBPRINT_HEX_LEN: usize = 40;

/// Strip separators pasted from certificate viewers and uppercase the digits.
/// The result must be exactly one SHA-1 digest.
pub fn normalize_thumbprint(raw: &str) -> Result<String, StoreError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '\u{200e}')
        .collect::<String>()
        .to_ascii_uppercase();
    if cleaned.len() != THUMBPRINT_HEX_LEN || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidThumbprint(raw.trim().to_string()));
    }
    Ok(cleaned)
}
