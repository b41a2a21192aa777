// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0

// Identity of token certificates, as seen by a user of the crate.
#[cfg(test)]
mod tests {
    use pkcs11_certsign::certificate::TokenCertificate;
    use pkcs11_certsign::identifier::{CertificateId, ModuleId};
    use pkcs11_certsign::key::{KeyMaterial, NamedCurve, TokenKey};
    use pkcs11_certsign::module::Attribute;

    const RSA_DER: &[u8] = include_bytes!("../testdata/rsa_cert.der");
    const EC_DER: &[u8] = include_bytes!("../testdata/ec_cert.der");
    const MODULE: &str = "C:\\Program Files\\Token\\token-pkcs11.dll";

    #[test]
    fn identifier_of_a_certificate_finds_it_again() {
        let certificate = TokenCertificate::from_der(RSA_DER.to_vec(), ModuleId::new(MODULE))
            .expect("Failed to decode the certificate");
        let text = certificate.identifier().to_string();
        assert_eq!(
            text,
            format!("PKCS:6562DB97A87598C58E2B2E9835FE559B632217AE={}", MODULE)
        );

        let parsed: CertificateId = text.parse().expect("Failed to parse the identifier");
        assert_eq!(parsed.thumbprint(), Some(certificate.thumbprint()));
        assert_eq!(parsed.module(), &ModuleId::new(MODULE.to_lowercase()));
    }

    #[test]
    fn ec_key_of_a_certificate_is_on_p256() {
        let certificate = TokenCertificate::from_der(EC_DER.to_vec(), ModuleId::new(MODULE))
            .expect("Failed to decode the certificate");
        let key = TokenKey::from_certificate(&certificate).expect("Failed to extract the key");

        match key.material() {
            KeyMaterial::Ec(point) => {
                assert_eq!(point.curve(), Some(NamedCurve::P256));
                assert_eq!(point.field_width(), 32);
                assert_eq!(point.uncompressed_point().unwrap().len(), 65);
            }
            other => panic!("unexpected key material {:?}", other),
        }
        match key.material().search_attribute().unwrap() {
            // OCTET STRING of 65 bytes holding an uncompressed point
            Attribute::EcPoint(der) => assert_eq!(&der[..3], &[0x04, 0x41, 0x04]),
            other => panic!("unexpected attribute {:?}", other),
        }
    }
}
