//! Credential resolution for the Graph automation principal.
//!
//! This crate provides:
//! - `AuthInput`: the single authentication method selected from config
//! - `CredentialResolver`: turns an `AuthInput` into a `SigningCredential`
//! - PKCS#12 decoding and a platform certificate-store collaborator
//! - client-secret and client-certificate token acquisition with caching

pub mod assertion;
pub mod credential;
pub mod error;
pub mod input;
pub mod pkcs12;
pub mod resolver;
pub mod store;
#[cfg(windows)]
pub mod windows_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    credential::{
        AccessToken, ClientCertificateCredential, ClientSecretCredential, SigningCredential,
        TokenEndpoint,
    },
    error::{AuthError, TokenError},
    input::{AuthInput, AuthParts},
    pkcs12::CertificateMaterial,
    resolver::{CredentialResolver, DEFAULT_AUTHORITY},
    store::{CertificateStore, ExportedPkcs12, StoreError, default_store},
};
