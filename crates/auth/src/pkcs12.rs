//! PKCS#12 decoding into key + certificate chain.

use std::fmt;

use {
    openssl::{
        hash::MessageDigest,
        pkcs12::Pkcs12,
        pkey::{Id, PKey, Private},
        x509::X509,
    },
    secrecy::{ExposeSecret, Secret},
};

use crate::error::AuthError;

/// Private key and certificates recovered from a PKCS#12 container.
///
/// Short-lived: it is consumed by
/// [`ClientCertificateCredential::new`](crate::ClientCertificateCredential::new).
pub struct CertificateMaterial {
    pub private_key: PKey<Private>,
    pub leaf: X509,
    /// CA certificates in container order, leaf excluded.
    pub chain: Vec<X509>,
}

impl CertificateMaterial {
    /// Leaf first, then the CA certificates, DER encoded.
    pub fn chain_der(&self) -> Result<Vec<Vec<u8>>, openssl::error::ErrorStack> {
        std::iter::once(&self.leaf)
            .chain(self.chain.iter())
            .map(|cert| cert.to_der())
            .collect()
    }

    /// Uppercase hex SHA-1 thumbprint of the leaf, as shown by certificate
    /// stores and the Entra admin center.
    pub fn leaf_thumbprint(&self) -> Result<String, openssl::error::ErrorStack> {
        let digest = self.leaf.digest(MessageDigest::sha1())?;
        Ok(digest.iter().map(|b| format!("{b:02X}")).collect())
    }
}

impl fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("private_key", &"[REDACTED]")
            .field("leaf_subject", &self.leaf.subject_name())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// Decode `blob` with `password`.
///
/// Requires exactly one RSA private key and a leaf certificate whose public
/// key matches it. Any failure yields
/// [`AuthError::CertificateDecodeFailed`]; no partial material is returned.
pub fn decode(blob: &[u8], password: &Secret<String>) -> Result<CertificateMaterial, AuthError> {
    let container = Pkcs12::from_der(blob)
        .map_err(|e| AuthError::decode_with("not a valid PKCS#12 container", e))?;
    let parsed = container
        .parse2(password.expose_secret())
        .map_err(|e| AuthError::decode_with("wrong password or corrupt container", e))?;

    let private_key = parsed
        .pkey
        .ok_or_else(|| AuthError::decode("container holds no private key"))?;
    let leaf = parsed
        .cert
        .ok_or_else(|| AuthError::decode("container holds no certificate for the private key"))?;

    if private_key.id() != Id::RSA {
        return Err(AuthError::decode(format!(
            "unsupported private key type {:?}: an RSA key is required",
            private_key.id()
        )));
    }

    let leaf_key = leaf
        .public_key()
        .map_err(|e| AuthError::decode_with("cannot read certificate public key", e))?;
    if !leaf_key.public_eq(&private_key) {
        return Err(AuthError::decode(
            "certificate does not match the private key",
        ));
    }

    let leaf_der = leaf
        .to_der()
        .map_err(|e| AuthError::decode_with("cannot encode certificate", e))?;
    let mut chain = Vec::new();
    for cert in parsed.ca.into_iter().flatten() {
        // Some exporters repeat the leaf inside the CA bag.
        if cert.to_der().is_ok_and(|der| der == leaf_der) {
            continue;
        }
        chain.push(cert);
    }

    Ok(CertificateMaterial {
        private_key,
        leaf,
        chain,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        PFX_PASSWORD, build_cert, chained_pfx, ec_key, leaf_only_pfx, pkcs12_der, pki,
    };

    fn password(value: &str) -> Secret<String> {
        Secret::new(value.to_string())
    }

    #[test]
    fn leaf_only_container_has_empty_chain() {
        let material = decode(&leaf_only_pfx(PFX_PASSWORD), &password(PFX_PASSWORD)).unwrap();
        assert!(material.chain.is_empty());
        assert_eq!(
            material.leaf.to_der().unwrap(),
            pki().leaf.to_der().unwrap()
        );
        assert!(material.private_key.public_eq(&pki().leaf_key));
    }

    #[test]
    fn chained_container_exposes_ca_certificates() {
        let material = decode(&chained_pfx(PFX_PASSWORD), &password(PFX_PASSWORD)).unwrap();
        assert_eq!(material.chain.len(), 1);
        assert_eq!(
            material.chain[0].to_der().unwrap(),
            pki().ca.to_der().unwrap()
        );

        let der = material.chain_der().unwrap();
        assert_eq!(der.len(), 2);
        assert_eq!(der[0], pki().leaf.to_der().unwrap());
        assert_eq!(der[1], pki().ca.to_der().unwrap());
    }

    #[test]
    fn wrong_password_fails_without_leaking_it() {
        let err = decode(&chained_pfx(PFX_PASSWORD), &password("hunter2")).unwrap_err();
        match &err {
            AuthError::CertificateDecodeFailed { source, .. } => assert!(source.is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("hunter2"));
        assert!(!format!("{err:?}").contains("hunter2"));
    }

    #[test]
    fn garbage_is_not_a_container() {
        let err = decode(b"definitely not der", &password("")).unwrap_err();
        assert!(matches!(err, AuthError::CertificateDecodeFailed { .. }));
    }

    #[test]
    fn empty_password_round_trips() {
        let material = decode(&leaf_only_pfx(""), &password("")).unwrap();
        assert!(material.chain.is_empty());
    }

    #[test]
    fn non_rsa_keys_are_unsupported() {
        let key = ec_key();
        let cert = build_cert("ec leaf", &key, None, false, 7);
        let blob = pkcs12_der(&key, &cert, &[], PFX_PASSWORD);
        let err = decode(&blob, &password(PFX_PASSWORD)).unwrap_err();
        assert!(err.to_string().contains("RSA key is required"));
    }

    #[test]
    fn thumbprint_is_uppercase_sha1_hex() {
        let material = decode(&leaf_only_pfx(PFX_PASSWORD), &password(PFX_PASSWORD)).unwrap();
        let thumb = material.leaf_thumbprint().unwrap();
        assert_eq!(thumb.len(), 40);
        assert!(thumb.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
