// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::certificate::materialize;
use super::Provider;
use crate::error::{Error, Result};
use crate::identifier::CertificateId;
use crate::module::{Attribute, Session};
use cryptoki_sys::CK_OBJECT_HANDLE;
use log::{info, trace, warn};

impl Provider {
    /// Find an object matching `criteria` on the tokens of the certificate's module.
    ///
    /// With `return_first`, the first match in slot order wins. Otherwise matches are read as
    /// certificates and the one whose thumbprint equals the identifier's wins. The session the
    /// object was found in is handed to the caller; every other session is closed before
    /// returning.
    pub(super) fn locate(
        &self,
        certificate: &CertificateId,
        criteria: &[Attribute],
        return_first: bool,
    ) -> Result<(Session, CK_OBJECT_HANDLE)> {
        let functions = self.registry.load(certificate.module())?;

        let thumbprint = if return_first {
            None
        } else {
            match certificate.thumbprint() {
                Some(thumbprint) => Some(thumbprint),
                None => {
                    info!("The identifier carries no thumbprint, nothing can match it.");
                    return Err(Error::ObjectNotFound);
                }
            }
        };

        trace!("GetSlotList command");
        let slots = functions
            .get_slot_list(true)
            .map_err(|rv| Error::Module {
                call: "C_GetSlotList",
                rv,
            })?;

        for slot in slots {
            trace!("GetTokenInfo command");
            match functions.get_token_info(slot) {
                Ok(token) => info!(
                    "Slot {} holds token '{}' ({} {}, serial {})",
                    slot, token.label, token.manufacturer_id, token.model, token.serial_number
                ),
                Err(rv) => {
                    warn!("Skipping slot {}, no token information ({:#x})", slot, rv);
                    continue;
                }
            }

            let session = match Session::open(&functions, slot) {
                Ok(session) => session,
                Err(e) => {
                    format_error!("Skipping slot, no session could be opened", e);
                    continue;
                }
            };

            let objects = match session.find_objects(criteria, self.limits.max_objects_per_search)
            {
                Ok(objects) => objects,
                Err(e) => {
                    format_error!("Skipping slot, the object search failed", e);
                    continue;
                }
            };

            match thumbprint {
                None => {
                    if let Some(object) = objects.first() {
                        return Ok((session, *object));
                    }
                }
                Some(thumbprint) => {
                    for object in objects {
                        match materialize(&session, object, certificate.module()) {
                            Ok(candidate) if candidate.thumbprint() == thumbprint => {
                                return Ok((session, object));
                            }
                            Ok(_) => (),
                            Err(e) => format_error!("Skipping unreadable certificate", e),
                        }
                    }
                }
            }
        }

        Err(Error::ObjectNotFound)
    }
}
