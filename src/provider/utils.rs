// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use crate::error::{Error, Result};
use crate::key::KeyMaterial;
use crate::module::Attribute;
use cryptoki_sys::{CKO_CERTIFICATE, CKO_PRIVATE_KEY};
use picky_asn1_x509::{AlgorithmIdentifier, DigestInfo, ShaVariant};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Template of the public certificates stored on a token
pub fn certificate_criteria() -> Vec<Attribute> {
    vec![
        Attribute::Class(CKO_CERTIFICATE),
        Attribute::Token(true),
        Attribute::Private(false),
    ]
}

/// Template of the private key sharing the public object's identifier
pub fn private_key_criteria(key_id: &[u8]) -> Vec<Attribute> {
    vec![
        Attribute::Class(CKO_PRIVATE_KEY),
        Attribute::Id(key_id.to_vec()),
    ]
}

/// Hash algorithms the signer can prepare input for
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-1
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Look a hash algorithm up by name, ignoring case and dashes.
    pub fn from_name(name: &str) -> Option<HashAlgorithm> {
        let name: String = name
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match name.as_str() {
            "sha1" => Some(HashAlgorithm::Sha1),
            "sha256" | "sha2256" => Some(HashAlgorithm::Sha256),
            "sha384" | "sha2384" => Some(HashAlgorithm::Sha384),
            "sha512" | "sha2512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Hash `data`
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn algorithm_identifier(self) -> AlgorithmIdentifier {
        match self {
            HashAlgorithm::Sha1 => AlgorithmIdentifier::new_sha(ShaVariant::SHA1),
            HashAlgorithm::Sha256 => AlgorithmIdentifier::new_sha(ShaVariant::SHA2_256),
            HashAlgorithm::Sha384 => AlgorithmIdentifier::new_sha(ShaVariant::SHA2_384),
            HashAlgorithm::Sha512 => AlgorithmIdentifier::new_sha(ShaVariant::SHA2_512),
        }
    }
}

/// Format a digest into ASN1 DigestInfo bytes
pub fn digest_info(hash_algorithm: HashAlgorithm, digest: Vec<u8>) -> Result<Vec<u8>> {
    picky_asn1_der::to_vec(&DigestInfo {
        oid: hash_algorithm.algorithm_identifier(),
        digest: digest.into(),
    })
    .map_err(|e| Error::Encoding(e.to_string()))
}

/// The bytes handed to the token: a DigestInfo for RSA PKCS #1 v1.5 and the bare digest for
/// ECDSA.
pub fn prepare_input(
    hash_algorithm: HashAlgorithm,
    material: &KeyMaterial,
    data: &[u8],
) -> Result<Vec<u8>> {
    let digest = hash_algorithm.digest(data);
    match material {
        KeyMaterial::Rsa(_) => digest_info(hash_algorithm, digest),
        KeyMaterial::Ec(_) => Ok(digest),
    }
}
