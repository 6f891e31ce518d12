//! Signed JWT client assertions for the certificate grant.
//!
//! The header carries the full certificate chain in `x5c` (leaf first) so
//! identity providers that validate chain-of-trust can do so without a
//! pre-registered intermediate.

use std::time::{SystemTime, UNIX_EPOCH};

use {
    base64::{
        Engine,
        engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    },
    openssl::{
        hash::MessageDigest,
        pkey::{PKey, Private},
        sign::Signer,
    },
    serde::Serialize,
};

use crate::{
    error::{AuthError, TokenError},
    pkcs12::CertificateMaterial,
};

/// Assertion lifetime accepted by the Microsoft identity platform.
pub const ASSERTION_TTL_SECS: u64 = 600;

#[derive(Serialize)]
struct Header<'a> {
    alg: &'static str,
    typ: &'static str,
    x5t: &'a str,
    #[serde(rename = "x5t#S256")]
    x5t_s256: &'a str,
    x5c: &'a [String],
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    jti: String,
    nbf: u64,
    iat: u64,
    exp: u64,
}

/// Holds only what signing needs: the key and the encoded chain.
pub struct AssertionSigner {
    private_key: PKey<Private>,
    x5c: Vec<String>,
    x5t: String,
    x5t_s256: String,
}

impl AssertionSigner {
    /// Consume decoded material; the `X509` objects are dropped here.
    pub fn from_material(material: CertificateMaterial) -> Result<Self, AuthError> {
        let encode_err = |e| AuthError::decode_with("cannot encode certificate chain", e);

        let chain = material.chain_der().map_err(encode_err)?;
        let x5t = URL_SAFE_NO_PAD.encode(
            material
                .leaf
                .digest(MessageDigest::sha1())
                .map_err(encode_err)?,
        );
        let x5t_s256 = URL_SAFE_NO_PAD.encode(
            material
                .leaf
                .digest(MessageDigest::sha256())
                .map_err(encode_err)?,
        );

        Ok(Self {
            private_key: material.private_key,
            x5c: chain.iter().map(|der| STANDARD.encode(der)).collect(),
            x5t,
            x5t_s256,
        })
    }

    /// Number of certificates sent in `x5c`.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        self.x5c.len()
    }

    /// Build and sign an RS256 assertion for `client_id` addressed to
    /// `audience` (the token endpoint URL).
    pub fn sign(&self, client_id: &str, audience: &str, now: SystemTime) -> Result<String, TokenError> {
        let iat = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let header = Header {
            alg: "RS256",
            typ: "JWT",
            x5t: &self.x5t,
            x5t_s256: &self.x5t_s256,
            x5c: &self.x5c,
        };
        let claims = Claims {
            aud: audience,
            iss: client_id,
            sub: client_id,
            jti: uuid::Uuid::new_v4().to_string(),
            nbf: iat,
            iat,
            exp: iat + ASSERTION_TTL_SECS,
        };

        let header = serde_json::to_vec(&header)
            .map_err(|e| TokenError::Malformed(format!("assertion header: {e}")))?;
        let claims = serde_json::to_vec(&claims)
            .map_err(|e| TokenError::Malformed(format!("assertion claims: {e}")))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        );

        let mut signer = Signer::new(MessageDigest::sha256(), &self.private_key)?;
        signer.update(signing_input.as_bytes())?;
        let signature = signer.sign_to_vec()?;

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}
