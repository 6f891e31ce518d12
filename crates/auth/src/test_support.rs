//! Throwaway PKI for tests: keys, certificates and PKCS#12 containers.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::OnceLock;

use openssl::{
    asn1::Asn1Time,
    bn::BigNum,
    ec::{EcGroup, EcKey},
    hash::MessageDigest,
    nid::Nid,
    pkcs12::Pkcs12,
    pkey::{PKey, Private},
    rsa::Rsa,
    stack::Stack,
    x509::{X509, X509NameBuilder, extension::BasicConstraints},
};

pub(crate) const PFX_PASSWORD: &str = "correct horse";

pub(crate) struct TestPki {
    #[allow(dead_code)]
    pub ca_key: PKey<Private>,
    pub ca: X509,
    pub leaf_key: PKey<Private>,
    pub leaf: X509,
}

/// RSA keys are slow to generate, so one PKI is shared by every test.
pub(crate) fn pki() -> &'static TestPki {
    static PKI: OnceLock<TestPki> = OnceLock::new();
    PKI.get_or_init(|| {
        let ca_key = rsa_key();
        let ca = build_cert("graphbox test root", &ca_key, None, true, 1);
        let leaf_key = rsa_key();
        let leaf = build_cert("graphbox automation", &leaf_key, Some((&ca, &ca_key)), false, 2);
        TestPki {
            ca_key,
            ca,
            leaf_key,
            leaf,
        }
    })
}

pub(crate) fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub(crate) fn ec_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

pub(crate) fn build_cert(
    common_name: &str,
    key: &PKey<Private>,
    issuer: Option<(&X509, &PKey<Private>)>,
    is_ca: bool,
    serial: u32,
) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    match issuer {
        Some((cert, _)) => builder.set_issuer_name(cert.subject_name()).unwrap(),
        None => builder.set_issuer_name(&name).unwrap(),
    }
    builder.set_pubkey(key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    if is_ca {
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
    }
    let signing_key = issuer.map_or(key, |(_, issuer_key)| issuer_key);
    builder.sign(signing_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

pub(crate) fn pkcs12_der(
    key: &PKey<Private>,
    leaf: &X509,
    chain: &[X509],
    password: &str,
) -> Vec<u8> {
    let mut builder = Pkcs12::builder();
    builder.name("graphbox").pkey(key).cert(leaf);
    if !chain.is_empty() {
        let mut stack = Stack::new().unwrap();
        for cert in chain {
            stack.push(cert.clone()).unwrap();
        }
        builder.ca(stack);
    }
    builder.build2(password).unwrap().to_der().unwrap()
}

/// Leaf certificate plus its issuing CA.
pub(crate) fn chained_pfx(password: &str) -> Vec<u8> {
    let pki = pki();
    pkcs12_der(&pki.leaf_key, &pki.leaf, std::slice::from_ref(&pki.ca), password)
}

/// Leaf certificate only.
pub(crate) fn leaf_only_pfx(password: &str) -> Vec<u8> {
    let pki = pki();
    pkcs12_der(&pki.leaf_key, &pki.leaf, &[], password)
}
