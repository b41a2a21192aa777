// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Certificate and module identifiers
//!
//! A certificate held on a token is named by `PKCS:<thumbprint>=<module path>` where the
//! thumbprint is the SHA-1 hash of the certificate's DER encoding as 40 hex digits and the
//! module path is everything after the last `=`.
use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Scheme tag opening every token certificate identifier
pub const SCHEME_PREFIX: &str = "PKCS:";

/// Size in bytes of a SHA-1 thumbprint
pub const THUMBPRINT_LEN: usize = 20;

const THUMBPRINT_HEX_LEN: usize = 2 * THUMBPRINT_LEN;

/// SHA-1 thumbprint of a DER encoded certificate
pub type Thumbprint = [u8; THUMBPRINT_LEN];

/// Path of a cryptographic module library
///
/// Two identifiers are equal when their paths are equal ignoring ASCII case.
#[derive(Debug, Clone)]
pub struct ModuleId(String);

impl ModuleId {
    /// Wrap a library path
    pub fn new<S: Into<String>>(path: S) -> ModuleId {
        ModuleId(path.into())
    }

    /// The library path
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ModuleId {}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a certificate living on a token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CertificateId {
    thumbprint: Option<Thumbprint>,
    module: ModuleId,
}

impl CertificateId {
    /// Build the identifier of a certificate with a known thumbprint
    pub fn new(thumbprint: Thumbprint, module: ModuleId) -> CertificateId {
        CertificateId {
            thumbprint: Some(thumbprint),
            module,
        }
    }

    /// Parse an identifier string.
    ///
    /// # Errors
    ///
    /// Returns `MalformedIdentifier` if the string contains no `=` or names an empty module
    /// path. A thumbprint segment that is not 40 hex digits is not an error: the identifier
    /// then carries no thumbprint.
    pub fn parse(identifier: &str) -> Result<CertificateId> {
        let split = identifier
            .rfind('=')
            .ok_or_else(|| Error::MalformedIdentifier(identifier.to_owned()))?;
        let (head, module) = (&identifier[..split], &identifier[split + 1..]);
        if module.is_empty() {
            return Err(Error::MalformedIdentifier(identifier.to_owned()));
        }

        Ok(CertificateId {
            thumbprint: parse_thumbprint(head),
            module: ModuleId::new(module),
        })
    }

    /// The thumbprint of the certificate, if the identifier carries one
    pub fn thumbprint(&self) -> Option<&Thumbprint> {
        self.thumbprint.as_ref()
    }

    /// The module holding the certificate
    pub fn module(&self) -> &ModuleId {
        &self.module
    }
}

fn parse_thumbprint(head: &str) -> Option<Thumbprint> {
    let scheme = head.get(..SCHEME_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(SCHEME_PREFIX) {
        return None;
    }
    let hex_digits = head.get(SCHEME_PREFIX.len()..SCHEME_PREFIX.len() + THUMBPRINT_HEX_LEN)?;
    let mut thumbprint = [0; THUMBPRINT_LEN];
    hex::decode_to_slice(hex_digits, &mut thumbprint).ok()?;
    Some(thumbprint)
}

impl FromStr for CertificateId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CertificateId::parse(s)
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let thumbprint = self.thumbprint.map(hex::encode_upper).unwrap_or_default();
        write!(f, "{}{}={}", SCHEME_PREFIX, thumbprint, self.module)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    const THUMB_HEX: &str = "6562DB97A87598C58E2B2E9835FE559B632217AE";

    fn hash_of(module: &ModuleId) -> u64 {
        let mut hasher = DefaultHasher::new();
        module.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn parse_recovers_module_and_thumbprint() {
        let id = CertificateId::parse(&format!("PKCS:{}=/usr/lib/opensc-pkcs11.so", THUMB_HEX))
            .unwrap();
        assert_eq!(id.module().as_str(), "/usr/lib/opensc-pkcs11.so");
        assert_eq!(
            id.thumbprint().unwrap().to_vec(),
            hex::decode(THUMB_HEX).unwrap()
        );
    }

    #[test]
    fn module_is_everything_after_the_last_equal_sign() {
        let id = CertificateId::parse(&format!("PKCS:{}=C:\\a=b\\p11.dll", THUMB_HEX)).unwrap();
        assert_eq!(id.module().as_str(), "b\\p11.dll");
        assert!(id.thumbprint().is_some());
    }

    #[test]
    fn thumbprint_hex_is_case_insensitive() {
        let upper = CertificateId::parse(&format!("PKCS:{}=p11.dll", THUMB_HEX)).unwrap();
        let lower =
            CertificateId::parse(&format!("pkcs:{}=p11.dll", THUMB_HEX.to_lowercase())).unwrap();
        assert_eq!(upper.thumbprint(), lower.thumbprint());
    }

    #[test]
    fn no_separator_is_malformed() {
        assert!(matches!(
            CertificateId::parse("PKCS:6562DB97A87598C58E2B2E9835FE559B632217AE"),
            Err(Error::MalformedIdentifier(_))
        ));
        assert!(matches!(
            CertificateId::parse("PKCS:abc="),
            Err(Error::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn short_or_non_hex_thumbprint_is_absent() {
        let id = CertificateId::parse("PKCS:1234=p11.dll").unwrap();
        assert!(id.thumbprint().is_none());
        let id =
            CertificateId::parse("PKCS:ZZ62DB97A87598C58E2B2E9835FE559B632217AE=p11.dll").unwrap();
        assert!(id.thumbprint().is_none());
        let id = CertificateId::parse(&format!("CAPI:{}=p11.dll", THUMB_HEX)).unwrap();
        assert!(id.thumbprint().is_none());
    }

    #[test]
    fn display_round_trips() {
        let text = format!("PKCS:{}=/opt/token/libp11.so", THUMB_HEX);
        let id: CertificateId = text.parse().unwrap();
        assert_eq!(id.to_string(), text);
    }

    #[test]
    fn module_ids_compare_ignoring_case() {
        let a = ModuleId::new("C:\\Windows\\System32\\a.dll");
        let b = ModuleId::new("c:\\windows\\system32\\A.DLL");
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, ModuleId::new("b.dll"));
    }
}
