// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::{Attribute, FunctionList};
use crate::error::{AuthenticationError, Error, Result, SigningError};
use crate::pin::Pin;
use cryptoki_sys::{
    CKF_RW_SESSION, CKF_SERIAL_SESSION, CKR_USER_ALREADY_LOGGED_IN, CKU_USER, CK_ATTRIBUTE_TYPE,
    CK_MECHANISM_TYPE, CK_OBJECT_HANDLE, CK_SESSION_HANDLE, CK_SLOT_ID,
};
use log::{error, info, trace};
use std::sync::Arc;
use zeroize::Zeroize;

/// An open session with the token of a slot
///
/// The session is closed exactly once, when the value is dropped. Ownership of an open session
/// can be handed from one component to another by moving the value.
pub struct Session {
    functions: Arc<dyn FunctionList>,
    slot: CK_SLOT_ID,
    handle: CK_SESSION_HANDLE,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("slot", &self.slot)
            .field("handle", &self.handle)
            .finish()
    }
}

impl Session {
    /// Open a serial session, read-only first and read-write if the token refuses.
    pub fn open(functions: &Arc<dyn FunctionList>, slot: CK_SLOT_ID) -> Result<Session> {
        if crate::utils::GlobalConfig::log_error_details() {
            info!("Opening session on slot {}", slot);
        }

        trace!("OpenSession command");
        let handle = match functions.open_session(slot, CKF_SERIAL_SESSION) {
            Ok(handle) => handle,
            Err(rv) => {
                info!(
                    "Read-only session refused on slot {} ({:#x}), retrying read-write.",
                    slot, rv
                );
                trace!("OpenSession command");
                functions
                    .open_session(slot, CKF_SERIAL_SESSION | CKF_RW_SESSION)
                    .map_err(|rv| Error::Module {
                        call: "C_OpenSession",
                        rv,
                    })?
            }
        };

        Ok(Session {
            functions: functions.clone(),
            slot,
            handle,
        })
    }

    /// Slot the session was opened on
    pub fn slot(&self) -> CK_SLOT_ID {
        self.slot
    }

    /// Run one object search and fetch at most `max_objects` handles.
    ///
    /// The search is finalized whenever it was started, whatever the outcome of the fetch.
    pub fn find_objects(
        &self,
        template: &[Attribute],
        max_objects: usize,
    ) -> Result<Vec<CK_OBJECT_HANDLE>> {
        trace!("FindObjectsInit command");
        self.functions
            .find_objects_init(self.handle, template)
            .map_err(|rv| Error::Module {
                call: "C_FindObjectsInit",
                rv,
            })?;

        trace!("FindObjects command");
        let objects = self.functions.find_objects(self.handle, max_objects);

        trace!("FindObjectsFinal command");
        if let Err(rv) = self.functions.find_objects_final(self.handle) {
            if crate::utils::GlobalConfig::log_error_details() {
                error!(
                    "Failed to finalize the search in session {} ({:#x}). Continuing...",
                    self.handle, rv
                );
            }
        }

        objects.map_err(|rv| Error::Module {
            call: "C_FindObjects",
            rv,
        })
    }

    /// Read the value of one attribute of an object.
    pub fn attribute_value(
        &self,
        object: CK_OBJECT_HANDLE,
        attribute: CK_ATTRIBUTE_TYPE,
    ) -> Result<Vec<u8>> {
        let module_error = |rv| Error::Module {
            call: "C_GetAttributeValue",
            rv,
        };

        trace!("GetAttributeValue command");
        let size = self
            .functions
            .get_attribute_value(self.handle, object, attribute, None)
            .map_err(module_error)?;

        let mut value = vec![0; size];
        trace!("GetAttributeValue command");
        let written = self
            .functions
            .get_attribute_value(self.handle, object, attribute, Some(&mut value))
            .map_err(module_error)?;
        value.truncate(written);

        Ok(value)
    }

    /// Log the normal user in. The PIN is only read.
    ///
    /// Login state is shared by every session of the application on a token, so a token that
    /// already has the user logged in counts as a successful login.
    pub fn login(&self, pin: &Pin) -> Result<()> {
        trace!("Login command");
        match self.functions.login(self.handle, CKU_USER, pin.expose()) {
            Ok(()) => Ok(()),
            Err(CKR_USER_ALREADY_LOGGED_IN) => {
                info!("The user is already logged in on slot {}.", self.slot);
                Ok(())
            }
            Err(rv) => Err(AuthenticationError::PinRejected(rv).into()),
        }
    }

    /// Sign `data` with a private key: start the operation, query the signature size, then
    /// produce the signature in a buffer of that size.
    pub fn sign(
        &self,
        mechanism: CK_MECHANISM_TYPE,
        key: CK_OBJECT_HANDLE,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        trace!("SignInit command");
        self.functions
            .sign_init(self.handle, mechanism, key)
            .map_err(|rv| SigningError::from_rv("C_SignInit", rv))?;

        trace!("Sign command");
        let size = self
            .functions
            .sign(self.handle, data, None)
            .map_err(|rv| SigningError::from_rv("C_Sign", rv))?;

        let mut signature = vec![0; size];
        trace!("Sign command");
        let written = self
            .functions
            .sign(self.handle, data, Some(&mut signature))
            .map_err(|rv| SigningError::from_rv("C_Sign", rv))?;
        signature.truncate(written);

        Ok(signature)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        trace!("CloseSession command");
        match self.functions.close_session(self.handle) {
            Ok(_) => {
                if crate::utils::GlobalConfig::log_error_details() {
                    info!("Session {} closed.", self.handle);
                }
            }
            // Treat this as best effort.
            Err(rv) => {
                if crate::utils::GlobalConfig::log_error_details() {
                    error!(
                        "Failed to close session {} due to error {:#x}. Continuing...",
                        self.handle, rv
                    );
                } else {
                    error!("Failed to close session. Continuing...");
                }
            }
        }
        self.handle.zeroize();
    }
}
