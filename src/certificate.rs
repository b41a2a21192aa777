// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Certificates read from tokens
use crate::error::{Error, Result};
use crate::identifier::{CertificateId, ModuleId, Thumbprint};
use picky_asn1_x509::name::NamePrettyFormatter;
use picky_asn1_x509::Certificate;
use sha1::{Digest, Sha1};

/// A decoded certificate tagged with the module it was read from
///
/// The module path travels with the certificate so that a signing request made with it later
/// finds the same module again.
#[derive(Debug, Clone)]
pub struct TokenCertificate {
    der: Vec<u8>,
    certificate: Certificate,
    thumbprint: Thumbprint,
    module: ModuleId,
}

impl TokenCertificate {
    /// Decode a DER encoded certificate read from `module`.
    ///
    /// # Errors
    ///
    /// Returns `Certificate` if the bytes are not a DER encoded X.509 certificate or if the
    /// module path is empty.
    pub fn from_der(der: Vec<u8>, module: ModuleId) -> Result<TokenCertificate> {
        let certificate: Certificate = picky_asn1_der::from_bytes(&der).map_err(|e| {
            format_error!("Failed to decode the certificate value", e);
            Error::Certificate(e.to_string())
        })?;
        if module.as_str().is_empty() {
            return Err(Error::Certificate(
                "the certificate is not attached to a module".to_owned(),
            ));
        }

        let mut thumbprint = [0; 20];
        thumbprint.copy_from_slice(&Sha1::digest(&der));

        Ok(TokenCertificate {
            der,
            certificate,
            thumbprint,
            module,
        })
    }

    /// DER encoding, as read from the token
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Decoded certificate
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// SHA-1 hash of the DER encoding
    pub fn thumbprint(&self) -> &Thumbprint {
        &self.thumbprint
    }

    /// Module the certificate was read from
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Identifier naming this certificate
    pub fn identifier(&self) -> CertificateId {
        CertificateId::new(self.thumbprint, self.module.clone())
    }

    /// Subject distinguished name in a readable form
    pub fn subject(&self) -> String {
        NamePrettyFormatter(&self.certificate.tbs_certificate.subject).to_string()
    }
}

/// Collection of the certificates found on the tokens of one module
///
/// Certificates appear in slot order, then search order. The same certificate seen in two
/// slots appears twice.
#[derive(Debug, Clone, Default)]
pub struct CertificateStore {
    certificates: Vec<TokenCertificate>,
}

impl CertificateStore {
    /// Empty store
    pub fn new() -> CertificateStore {
        Default::default()
    }

    /// Append a certificate
    pub fn push(&mut self, certificate: TokenCertificate) {
        self.certificates.push(certificate);
    }

    /// Number of certificates
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Whether the store holds no certificate
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Certificates in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, TokenCertificate> {
        self.certificates.iter()
    }

    /// First certificate with the given thumbprint
    pub fn find(&self, thumbprint: &Thumbprint) -> Option<&TokenCertificate> {
        self.certificates
            .iter()
            .find(|certificate| certificate.thumbprint() == thumbprint)
    }
}

impl IntoIterator for CertificateStore {
    type Item = TokenCertificate;
    type IntoIter = std::vec::IntoIter<TokenCertificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certificates.into_iter()
    }
}

impl<'a> IntoIterator for &'a CertificateStore {
    type Item = &'a TokenCertificate;
    type IntoIter = std::slice::Iter<'a, TokenCertificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certificates.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const RSA_DER: &[u8] = include_bytes!("../testdata/rsa_cert.der");

    #[test]
    fn thumbprint_is_sha1_of_the_encoding() {
        let certificate =
            TokenCertificate::from_der(RSA_DER.to_vec(), ModuleId::new("p11.so")).unwrap();
        assert_eq!(
            hex::encode_upper(certificate.thumbprint()),
            "6562DB97A87598C58E2B2E9835FE559B632217AE"
        );
        assert_eq!(
            certificate.identifier().to_string(),
            "PKCS:6562DB97A87598C58E2B2E9835FE559B632217AE=p11.so"
        );
        assert!(certificate.subject().contains("Token RSA Test"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            TokenCertificate::from_der(vec![0x30, 0x03, 0x02, 0x01], ModuleId::new("p11.so")),
            Err(Error::Certificate(_))
        ));
    }

    #[test]
    fn empty_module_path_is_rejected() {
        assert!(matches!(
            TokenCertificate::from_der(RSA_DER.to_vec(), ModuleId::new("")),
            Err(Error::Certificate(_))
        ));
    }

    #[test]
    fn store_keeps_duplicates_in_order() {
        let certificate =
            TokenCertificate::from_der(RSA_DER.to_vec(), ModuleId::new("p11.so")).unwrap();
        let mut store = CertificateStore::new();
        store.push(certificate.clone());
        store.push(certificate.clone());
        assert_eq!(store.len(), 2);
        assert!(store.find(certificate.thumbprint()).is_some());
        assert!(store.find(&[0; 20]).is_none());
    }
}
