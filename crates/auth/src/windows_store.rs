//! Windows certificate store export via PowerShell `Export-PfxCertificate`.
//!
//! The one-time password and the thumbprint reach the child process through
//! its environment, never its command line. The export lands in a private
//! temp directory that is removed when the export returns.

use std::process::Command;

use {
    rand::{Rng, distr::Alphanumeric},
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
    zeroize::Zeroizing,
};

use crate::store::{CertificateStore, ExportedPkcs12, StoreError};

const EXIT_NOT_FOUND: i32 = 3;
const EXIT_NO_PRIVATE_KEY: i32 = 4;
const EXIT_EXPORT_FAILED: i32 = 5;

const ONE_TIME_PASSWORD_LEN: usize = 32;

const EXPORT_SCRIPT: &str = r#"
$ErrorActionPreference = 'Stop'
$thumb = $env:GRAPHBOX_EXPORT_THUMBPRINT
$cert = @('Cert:\CurrentUser\My', 'Cert:\LocalMachine\My') |
  ForEach-Object { Get-ChildItem -Path $_ -ErrorAction SilentlyContinue } |
  Where-Object { $_.Thumbprint -eq $thumb } |
  Select-Object -First 1
if (-not $cert) { exit 3 }
if (-not $cert.HasPrivateKey) { exit 4 }
$pw = ConvertTo-SecureString -String $env:GRAPHBOX_EXPORT_PASSWORD -Force -AsPlainText
try {
  Export-PfxCertificate -Cert $cert -FilePath $env:GRAPHBOX_EXPORT_PATH -Password $pw -ChainOption BuildChain | Out-Null
} catch {
  [Console]::Error.WriteLine($_.Exception.Message)
  exit 5
}
"#;

/// Exports from `Cert:\CurrentUser\My`, then `Cert:\LocalMachine\My`.
pub struct PowerShellCertificateStore {
    program: String,
}

impl Default for PowerShellCertificateStore {
    fn default() -> Self {
        Self {
            program: "powershell.exe".into(),
        }
    }
}

impl CertificateStore for PowerShellCertificateStore {
    fn export(&self, thumbprint: &str) -> Result<ExportedPkcs12, StoreError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("export.pfx");
        let password = Secret::new(one_time_password());

        debug!(thumbprint, "exporting certificate from Windows store");
        let output = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", EXPORT_SCRIPT])
            .env("GRAPHBOX_EXPORT_THUMBPRINT", thumbprint)
            .env("GRAPHBOX_EXPORT_PASSWORD", password.expose_secret())
            .env("GRAPHBOX_EXPORT_PATH", &path)
            .output()?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => {},
            Some(EXIT_NOT_FOUND) => {
                return Err(StoreError::NotFound {
                    thumbprint: thumbprint.to_string(),
                });
            },
            Some(EXIT_NO_PRIVATE_KEY) => {
                return Err(StoreError::NotExportable {
                    thumbprint: thumbprint.to_string(),
                    reason: "certificate has no private key".into(),
                });
            },
            Some(EXIT_EXPORT_FAILED) => {
                return Err(StoreError::NotExportable {
                    thumbprint: thumbprint.to_string(),
                    reason: stderr,
                });
            },
            code => {
                return Err(StoreError::NotExportable {
                    thumbprint: thumbprint.to_string(),
                    reason: format!("powershell exited with {code:?}: {stderr}"),
                });
            },
        }

        let blob = Zeroizing::new(std::fs::read(&path)?);
        Ok(ExportedPkcs12 { blob, password })
    }
}

fn one_time_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ONE_TIME_PASSWORD_LEN)
        .map(char::from)
        .collect()
}
