// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::utils::{certificate_criteria, prepare_input, private_key_criteria, HashAlgorithm};
use super::Provider;
use crate::error::{AuthenticationError, CorrelationError, Error, Result, SigningError};
use crate::identifier::CertificateId;
use crate::key::TokenKey;
use crate::module::Session;
use crate::pin::{Pin, PinProvider};
use cryptoki_sys::{CKA_ID, CK_OBJECT_HANDLE};
use log::{info, trace, warn};
use std::fmt;

/// Signature produced by a token
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the signature in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the signature is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the signature bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0))
    }
}

/// Log the user in with `pin`, then wipe it.
///
/// The PIN is wiped on every path. It is handed to the PIN provider to remember before that if
/// the token accepted it.
pub(crate) fn login_with_pin(
    session: &Session,
    pins: &dyn PinProvider,
    certificate: &CertificateId,
    pin: &mut Pin,
) -> Result<()> {
    let outcome = session.login(pin);
    match &outcome {
        Ok(()) => pins.remember(certificate, pin),
        Err(e) => {
            format_error!("The token refused the login", e);
            pins.forget(certificate);
        }
    }
    pin.wipe();

    outcome
}

impl Provider {
    pub(super) fn sign_internal(
        &self,
        key: &TokenKey,
        data: &[u8],
        hash_algorithm: &str,
    ) -> Result<Signature> {
        let certificate = key.certificate();
        let _ = self.registry.load(certificate.module())?;

        let hash_algorithm = HashAlgorithm::from_name(hash_algorithm).ok_or_else(|| {
            if crate::utils::GlobalConfig::log_error_details() {
                warn!("Unsupported hash algorithm '{}'", hash_algorithm);
            }
            SigningError::UnsupportedHash
        })?;

        let material = key.material();
        let public_key_criteria = material.public_key_criteria()?;

        let (session, public_object) = match self.locate(certificate, &public_key_criteria, true) {
            Ok(found) => found,
            Err(Error::ObjectNotFound) => self.locate_certificate_instead(certificate)?,
            Err(e) => return Err(e),
        };

        let key_id = session
            .attribute_value(public_object, CKA_ID)
            .map_err(|e| match e {
                Error::Module { rv, .. } => CorrelationError::MissingIdentifier(rv).into(),
                e => e,
            })?;

        let private_key = self.find_private_key(&session, certificate, &key_id)?;

        let input = prepare_input(hash_algorithm, material, data)?;
        let signature = session.sign(material.mechanism(), private_key, &input)?;
        info!(
            "Produced a {} byte signature in slot {}",
            signature.len(),
            session.slot()
        );

        Ok(Signature(signature))
    }

    // Some tokens only expose a certificate for the key pair. The certificate carries the
    // same CKA_ID as the private key.
    fn locate_certificate_instead(
        &self,
        certificate: &CertificateId,
    ) -> Result<(Session, CK_OBJECT_HANDLE)> {
        info!("No public key object matches, looking for the certificate instead.");
        match self.locate(certificate, &certificate_criteria(), false) {
            Err(Error::ObjectNotFound) => {
                warn!("No certificate has the thumbprint, using the first token certificate.");
                self.locate(certificate, &certificate_criteria(), true)
            }
            found => found,
        }
    }

    fn find_private_key(
        &self,
        session: &Session,
        certificate: &CertificateId,
        key_id: &[u8],
    ) -> Result<CK_OBJECT_HANDLE> {
        let criteria = private_key_criteria(key_id);
        if let Some(private_key) = session.find_objects(&criteria, 1)?.first() {
            return Ok(*private_key);
        }

        info!("The private key is not visible, logging in.");
        trace!("Requesting PIN for {}", certificate);
        let mut pin = self
            .pins
            .request(certificate)
            .ok_or(AuthenticationError::PinNotSupplied)?;
        login_with_pin(session, self.pins.as_ref(), certificate, &mut pin)?;

        session
            .find_objects(&criteria, 1)?
            .first()
            .copied()
            .ok_or_else(|| CorrelationError::PrivateKeyNotFound.into())
    }
}
