// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Public key material and its token encodings
//!
//! The key material of a certificate is used to find the matching public key object on the
//! token. RSA keys are searched by `CKA_MODULUS`: the big-endian modulus padded to the key
//! size. EC keys are searched by `CKA_EC_POINT`: the uncompressed point `0x04 || X || Y`, each
//! coordinate padded to the byte width of the curve field, wrapped in a DER OCTET STRING.
use crate::certificate::TokenCertificate;
use crate::error::{Error, Result};
use crate::identifier::CertificateId;
use crate::module::Attribute;
use cryptoki_sys::{
    CKK_EC, CKK_RSA, CKM_ECDSA, CKM_RSA_PKCS, CKO_PUBLIC_KEY, CK_KEY_TYPE, CK_MECHANISM_TYPE,
};
use log::{debug, warn};
use num_bigint::BigUint;
use picky_asn1::wrapper::OctetStringAsn1;
use picky_asn1_x509::PublicKey;

const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Big-endian encoding of `value` left-padded with zeros to `width` bytes.
///
/// # Errors
///
/// Returns `Encoding` if the value does not fit.
pub fn to_fixed_be(value: &BigUint, width: usize) -> Result<Vec<u8>> {
    let bytes = if value.bits() == 0 {
        Vec::new()
    } else {
        value.to_bytes_be()
    };
    if bytes.len() > width {
        return Err(Error::Encoding(format!(
            "value of {} bytes does not fit in {} bytes",
            bytes.len(),
            width
        )));
    }

    let mut padded = vec![0; width - bytes.len()];
    padded.extend_from_slice(&bytes);
    Ok(padded)
}

/// Encode an EC point in uncompressed form, each coordinate on `width` bytes.
pub fn encode_uncompressed_point(x: &BigUint, y: &BigUint, width: usize) -> Result<Vec<u8>> {
    let mut point = Vec::with_capacity(1 + 2 * width);
    point.push(UNCOMPRESSED_POINT_TAG);
    point.extend(to_fixed_be(x, width)?);
    point.extend(to_fixed_be(y, width)?);
    Ok(point)
}

/// Split an uncompressed EC point with `width` byte coordinates.
pub fn decode_uncompressed_point(point: &[u8], width: usize) -> Result<(BigUint, BigUint)> {
    match point.split_first() {
        Some((&UNCOMPRESSED_POINT_TAG, coordinates)) if coordinates.len() == 2 * width => {
            let (x, y) = coordinates.split_at(width);
            Ok((BigUint::from_bytes_be(x), BigUint::from_bytes_be(y)))
        }
        _ => Err(Error::Encoding(
            "not an uncompressed point of the expected size".to_owned(),
        )),
    }
}

/// NIST prime curves
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NamedCurve {
    /// secp224r1
    P224,
    /// secp256r1
    P256,
    /// secp384r1
    P384,
    /// secp521r1
    P521,
}

impl NamedCurve {
    /// Bit size of the field prime
    pub fn field_bits(self) -> usize {
        match self {
            NamedCurve::P224 => 224,
            NamedCurve::P256 => 256,
            NamedCurve::P384 => 384,
            NamedCurve::P521 => 521,
        }
    }

    /// Byte width of one coordinate
    pub fn field_width(self) -> usize {
        (self.field_bits() + 7) / 8
    }

    /// Curve whose coordinates are `width` bytes wide
    pub fn from_field_width(width: usize) -> Option<NamedCurve> {
        [
            NamedCurve::P224,
            NamedCurve::P256,
            NamedCurve::P384,
            NamedCurve::P521,
        ]
        .iter()
        .copied()
        .find(|curve| curve.field_width() == width)
    }
}

/// An RSA public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    modulus: BigUint,
    size: usize,
}

impl RsaPublicKey {
    /// Key with the given modulus; the key size is the byte length of the modulus.
    pub fn new(modulus: BigUint) -> RsaPublicKey {
        let size = ((modulus.bits() + 7) / 8) as usize;
        RsaPublicKey { modulus, size }
    }

    /// Key modulus
    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Key size in bytes
    pub fn size(&self) -> usize {
        self.size
    }
}

/// An EC public point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcPublicKey {
    field_width: usize,
    x: BigUint,
    y: BigUint,
}

impl EcPublicKey {
    /// Point with coordinates `width` bytes wide
    pub fn new(field_width: usize, x: BigUint, y: BigUint) -> EcPublicKey {
        EcPublicKey { field_width, x, y }
    }

    /// The NIST prime curve of this coordinate width, if there is one
    pub fn curve(&self) -> Option<NamedCurve> {
        NamedCurve::from_field_width(self.field_width)
    }

    /// Byte width of one coordinate
    pub fn field_width(&self) -> usize {
        self.field_width
    }

    /// `0x04 || X || Y`
    pub fn uncompressed_point(&self) -> Result<Vec<u8>> {
        encode_uncompressed_point(&self.x, &self.y, self.field_width)
    }
}

/// Public key material of a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// RSA key
    Rsa(RsaPublicKey),
    /// Elliptic curve key
    Ec(EcPublicKey),
}

impl KeyMaterial {
    /// Extract the subject public key of a certificate.
    pub fn from_certificate(certificate: &TokenCertificate) -> Result<KeyMaterial> {
        let tbs = &certificate.certificate().tbs_certificate;
        match &tbs.subject_public_key_info.subject_public_key {
            PublicKey::Rsa(key) => {
                let modulus = BigUint::from_bytes_be(key.0.modulus.as_unsigned_bytes_be());
                Ok(KeyMaterial::Rsa(RsaPublicKey::new(modulus)))
            }
            PublicKey::Ec(point) => {
                let point = point.0.payload_view();
                if point.is_empty() || point.len() % 2 == 0 {
                    return Err(Error::Encoding(
                        "EC public key is not an uncompressed point".to_owned(),
                    ));
                }
                let width = (point.len() - 1) / 2;
                let (x, y) = decode_uncompressed_point(point, width)?;
                let key = EcPublicKey::new(width, x, y);
                match key.curve() {
                    Some(curve) => debug!("EC key on {:?}", curve),
                    None => warn!(
                        "EC key with {} byte coordinates is not on a NIST prime curve",
                        width
                    ),
                }
                Ok(KeyMaterial::Ec(key))
            }
            _ => Err(Error::Encoding(
                "unsupported public key algorithm".to_owned(),
            )),
        }
    }

    /// PKCS #11 key type
    pub fn key_type(&self) -> CK_KEY_TYPE {
        match self {
            KeyMaterial::Rsa(_) => CKK_RSA,
            KeyMaterial::Ec(_) => CKK_EC,
        }
    }

    /// Signing mechanism taking a prepared digest
    pub fn mechanism(&self) -> CK_MECHANISM_TYPE {
        match self {
            KeyMaterial::Rsa(_) => CKM_RSA_PKCS,
            KeyMaterial::Ec(_) => CKM_ECDSA,
        }
    }

    /// The attribute a public key object of this material carries.
    pub fn search_attribute(&self) -> Result<Attribute> {
        match self {
            KeyMaterial::Rsa(key) => Ok(Attribute::Modulus(to_fixed_be(
                key.modulus(),
                key.size(),
            )?)),
            KeyMaterial::Ec(key) => {
                let point = OctetStringAsn1::from(key.uncompressed_point()?);
                let der = picky_asn1_der::to_vec(&point)
                    .map_err(|e| Error::Encoding(e.to_string()))?;
                Ok(Attribute::EcPoint(der))
            }
        }
    }

    /// Template matching the public key object of this material.
    pub fn public_key_criteria(&self) -> Result<Vec<Attribute>> {
        Ok(vec![
            Attribute::Class(CKO_PUBLIC_KEY),
            self.search_attribute()?,
            Attribute::KeyType(self.key_type()),
        ])
    }
}

/// The key a signing request is made with: the certificate identity and its key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenKey {
    certificate: CertificateId,
    material: KeyMaterial,
}

impl TokenKey {
    /// Pair a certificate identifier with its key material
    pub fn new(certificate: CertificateId, material: KeyMaterial) -> TokenKey {
        TokenKey {
            certificate,
            material,
        }
    }

    /// Key of a certificate read from a token
    pub fn from_certificate(certificate: &TokenCertificate) -> Result<TokenKey> {
        Ok(TokenKey {
            certificate: certificate.identifier(),
            material: KeyMaterial::from_certificate(certificate)?,
        })
    }

    /// Certificate the key belongs to
    pub fn certificate(&self) -> &CertificateId {
        &self.certificate
    }

    /// Public key material
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identifier::ModuleId;

    const RSA_DER: &[u8] = include_bytes!("../testdata/rsa_cert.der");
    const EC_DER: &[u8] = include_bytes!("../testdata/ec_cert.der");
    const EC_POINT_HEX: &str = "048b04605859dd8d8df35b736dea0ab19c834808e0ffe6e7deadc961faad9e4d\
                                7405da7b297e579cbeeedc75706d005c3dd0ccdca4ba1cd732c414ab7875c8e81d";

    fn token_certificate(der: &[u8]) -> TokenCertificate {
        TokenCertificate::from_der(der.to_vec(), ModuleId::new("p11.so")).unwrap()
    }

    #[test]
    fn fixed_width_pads_on_the_left() {
        let value = BigUint::from(0x0102u32);
        assert_eq!(to_fixed_be(&value, 4).unwrap(), vec![0, 0, 1, 2]);
        assert_eq!(to_fixed_be(&BigUint::from(0u32), 2).unwrap(), vec![0, 0]);
        assert!(to_fixed_be(&value, 1).is_err());
    }

    #[test]
    fn point_encoding_is_a_bijection_for_every_curve_width() {
        for width in &[28, 32, 48, 66] {
            let width = *width;
            let x = BigUint::from_bytes_be(&vec![0xa5; width]);
            // A leading zero byte must be kept by the encoding.
            let mut y_bytes = vec![0x5a; width];
            y_bytes[0] = 0;
            let y = BigUint::from_bytes_be(&y_bytes);

            let point = encode_uncompressed_point(&x, &y, width).unwrap();
            assert_eq!(point.len(), 1 + 2 * width);
            assert_eq!(point[0], 0x04);
            assert_eq!(&point[1 + width..], &y_bytes[..]);
            assert_eq!(decode_uncompressed_point(&point, width).unwrap(), (x, y));
        }
    }

    #[test]
    fn curve_follows_the_coordinate_width() {
        let key = EcPublicKey::new(66, BigUint::from(1u32), BigUint::from(2u32));
        assert_eq!(key.curve(), Some(NamedCurve::P521));
        assert_eq!(NamedCurve::P224.field_width(), 28);
        assert_eq!(NamedCurve::P384.field_bits(), 384);

        let unknown = EcPublicKey::new(40, BigUint::from(1u32), BigUint::from(2u32));
        assert_eq!(unknown.curve(), None);
        assert_eq!(unknown.uncompressed_point().unwrap().len(), 81);
    }

    #[test]
    fn rsa_material_searches_by_padded_modulus() {
        let material = KeyMaterial::from_certificate(&token_certificate(RSA_DER)).unwrap();
        assert_eq!(material.key_type(), CKK_RSA);
        assert_eq!(material.mechanism(), CKM_RSA_PKCS);
        match material.search_attribute().unwrap() {
            Attribute::Modulus(modulus) => {
                assert_eq!(modulus.len(), 256);
                assert_eq!(&hex::encode_upper(&modulus)[..8], "B7A81136");
            }
            other => panic!("unexpected attribute {:?}", other),
        }
    }

    #[test]
    fn ec_material_searches_by_der_wrapped_point() {
        let material = KeyMaterial::from_certificate(&token_certificate(EC_DER)).unwrap();
        assert_eq!(material.key_type(), CKK_EC);
        assert_eq!(material.mechanism(), CKM_ECDSA);

        let point = hex::decode(EC_POINT_HEX).unwrap();
        let mut expected = vec![0x04, 65];
        expected.extend_from_slice(&point);
        assert_eq!(
            material.search_attribute().unwrap(),
            Attribute::EcPoint(expected)
        );

        let criteria = material.public_key_criteria().unwrap();
        assert_eq!(criteria[0], Attribute::Class(CKO_PUBLIC_KEY));
        assert_eq!(criteria[2], Attribute::KeyType(CKK_EC));
    }

    #[test]
    fn token_key_keeps_the_certificate_identity() {
        let certificate = token_certificate(EC_DER);
        let key = TokenKey::from_certificate(&certificate).unwrap();
        assert_eq!(key.certificate(), &certificate.identifier());
    }
}
