// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::utils::certificate_criteria;
use super::Provider;
use crate::certificate::TokenCertificate;
use crate::error::Result;
use crate::identifier::{CertificateId, ModuleId};
use crate::module::Session;
use cryptoki_sys::{CKA_VALUE, CK_OBJECT_HANDLE};

/// Read the value of a certificate object and decode it.
pub(super) fn materialize(
    session: &Session,
    object: CK_OBJECT_HANDLE,
    module: &ModuleId,
) -> Result<TokenCertificate> {
    let value = session.attribute_value(object, CKA_VALUE)?;
    TokenCertificate::from_der(value, module.clone())
}

impl Provider {
    pub(super) fn load_certificate_internal(&self, identifier: &str) -> Result<TokenCertificate> {
        let certificate = CertificateId::parse(identifier)?;
        let (session, object) = self.locate(&certificate, &certificate_criteria(), false)?;

        materialize(&session, object, certificate.module())
    }
}
