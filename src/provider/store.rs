// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::certificate::materialize;
use super::utils::certificate_criteria;
use super::Provider;
use crate::certificate::CertificateStore;
use crate::error::{Error, Result};
use crate::identifier::ModuleId;
use crate::module::Session;
use log::{info, trace};

impl Provider {
    pub(super) fn build_store_internal(&self, module: &ModuleId) -> Result<CertificateStore> {
        let functions = self.registry.load(module)?;

        trace!("GetSlotList command");
        let slots = functions
            .get_slot_list(true)
            .map_err(|rv| Error::Module {
                call: "C_GetSlotList",
                rv,
            })?;

        let criteria = certificate_criteria();
        let mut store = CertificateStore::new();
        for slot in slots {
            let session = match Session::open(&functions, slot) {
                Ok(session) => session,
                Err(e) => {
                    format_error!("Skipping slot, no session could be opened", e);
                    continue;
                }
            };

            let objects =
                match session.find_objects(&criteria, self.limits.max_certificates_per_slot) {
                    Ok(objects) => objects,
                    Err(e) => {
                        format_error!("Skipping slot, the certificate search failed", e);
                        continue;
                    }
                };

            for object in objects {
                match materialize(&session, object, module) {
                    Ok(certificate) => store.push(certificate),
                    Err(e) => format_error!("Skipping unreadable certificate", e),
                }
            }
        }

        info!(
            "Found {} certificate(s) through '{}'",
            store.len(),
            module
        );
        Ok(store)
    }
}
