// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Native module libraries
//!
//! Loads a PKCS #11 shared library, resolves `C_GetFunctionList` and forwards the
//! [`FunctionList`] calls to the table it returns. The library is never unloaded: tokens may
//! keep state tied to removable hardware and the function table must stay valid for the rest
//! of the process.
use super::{Attribute, CkResult, FunctionList, LoadModule, TokenInfo};
use crate::error::{Error, Result};
use crate::identifier::ModuleId;
use cryptoki_sys::{
    CKR_ATTRIBUTE_TYPE_INVALID, CKR_FUNCTION_NOT_SUPPORTED, CKR_OK, CK_ATTRIBUTE,
    CK_ATTRIBUTE_TYPE, CK_FALSE, CK_FLAGS, CK_FUNCTION_LIST, CK_FUNCTION_LIST_PTR,
    CK_FUNCTION_LIST_PTR_PTR, CK_MECHANISM, CK_MECHANISM_TYPE, CK_OBJECT_HANDLE, CK_RV,
    CK_SESSION_HANDLE, CK_SLOT_ID, CK_TOKEN_INFO, CK_TRUE, CK_ULONG, CK_UNAVAILABLE_INFORMATION,
    CK_USER_TYPE,
};
use libloading::Library;
use log::{info, trace};
use std::ffi::c_void;
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr;
use std::sync::Arc;

type GetFunctionList = unsafe extern "C" fn(CK_FUNCTION_LIST_PTR_PTR) -> CK_RV;

/// Loader of PKCS #11 shared libraries from disk
#[derive(Debug, Default, Copy, Clone)]
pub struct NativeLoader;

impl LoadModule for NativeLoader {
    fn load(&self, module: &ModuleId) -> Result<Arc<dyn FunctionList>> {
        let library = open_library(module.as_str()).map_err(|e| {
            format_error!("Error loading the PKCS 11 library", e);
            Error::ModuleLoad {
                path: module.to_string(),
                reason: format!("{:#}", e),
            }
        })?;

        let not_a_module = |reason: String| Error::NotAModule {
            path: module.to_string(),
            reason,
        };

        // Safety: the symbol type is the one mandated by the PKCS #11 standard for
        // C_GetFunctionList. The copied function pointer stays valid because the library is
        // never unloaded.
        let get_function_list: GetFunctionList = unsafe {
            *library
                .get::<GetFunctionList>(b"C_GetFunctionList\0")
                .map_err(|e| not_a_module(e.to_string()))?
        };

        let mut list: CK_FUNCTION_LIST_PTR = ptr::null_mut();
        trace!("GetFunctionList command");
        let rv = unsafe { get_function_list(&mut list) };
        if rv != CKR_OK || list.is_null() {
            return Err(not_a_module(format!(
                "C_GetFunctionList returned {:#x}",
                rv
            )));
        }

        // Safety: a conforming module returns a pointer to a function table that lives as
        // long as the library stays loaded.
        let functions: &'static CK_FUNCTION_LIST = unsafe { &*list };
        let version = functions.version;
        if version.major < 2 {
            return Err(not_a_module(format!(
                "unsupported interface version {}.{}",
                version.major, version.minor
            )));
        }
        info!(
            "Loaded PKCS 11 library '{}' (interface version {}.{})",
            module, version.major, version.minor
        );

        Ok(Arc::new(NativeModule {
            _library: ManuallyDrop::new(library),
            functions,
        }))
    }
}

#[cfg(windows)]
fn open_library(path: &str) -> anyhow::Result<Library> {
    use libloading::os::windows::{
        Library as WindowsLibrary, LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR,
        LOAD_LIBRARY_SEARCH_SYSTEM32,
    };

    // Dependencies are only looked up next to the library and in the system directory,
    // never in the process search path.
    let library = unsafe {
        WindowsLibrary::load_with_flags(
            path,
            LOAD_LIBRARY_SEARCH_DLL_LOAD_DIR | LOAD_LIBRARY_SEARCH_SYSTEM32,
        )
    }?;
    Ok(library.into())
}

#[cfg(unix)]
fn open_library(path: &str) -> anyhow::Result<Library> {
    use anyhow::Context;
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LOCAL, RTLD_NOW};

    // dlopen looks a name without a slash up in LD_LIBRARY_PATH and the system directories.
    // Only the named file is loaded.
    let path = std::fs::canonicalize(path)
        .with_context(|| format!("Cannot resolve the library path {}", path))?;
    let library = unsafe { UnixLibrary::open(Some(&path), RTLD_NOW | RTLD_LOCAL) }?;
    Ok(library.into())
}

struct NativeModule {
    _library: ManuallyDrop<Library>,
    functions: &'static CK_FUNCTION_LIST,
}

fn check(rv: CK_RV) -> CkResult<()> {
    if rv == CKR_OK {
        Ok(())
    } else {
        Err(rv)
    }
}

fn trimmed(field: &[u8]) -> String {
    String::from_utf8_lossy(field).trim_end().to_owned()
}

impl FunctionList for NativeModule {
    fn initialize(&self) -> CkResult<()> {
        let c_initialize = self
            .functions
            .C_Initialize
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        check(unsafe { c_initialize(ptr::null_mut()) })
    }

    fn get_slot_list(&self, token_present: bool) -> CkResult<Vec<CK_SLOT_ID>> {
        let c_get_slot_list = self
            .functions
            .C_GetSlotList
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let present = if token_present { CK_TRUE } else { CK_FALSE };

        let mut count: CK_ULONG = 0;
        check(unsafe { c_get_slot_list(present, ptr::null_mut(), &mut count) })?;
        let mut slots: Vec<CK_SLOT_ID> = vec![0; count as usize];
        check(unsafe { c_get_slot_list(present, slots.as_mut_ptr(), &mut count) })?;
        slots.truncate(count as usize);

        Ok(slots)
    }

    fn get_token_info(&self, slot: CK_SLOT_ID) -> CkResult<TokenInfo> {
        let c_get_token_info = self
            .functions
            .C_GetTokenInfo
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let mut info = MaybeUninit::<CK_TOKEN_INFO>::zeroed();
        check(unsafe { c_get_token_info(slot, info.as_mut_ptr()) })?;
        // Safety: zero is a valid bit pattern for every field and the module filled it in.
        let info = unsafe { info.assume_init() };

        Ok(TokenInfo {
            label: trimmed(&info.label),
            manufacturer_id: trimmed(&info.manufacturerID),
            model: trimmed(&info.model),
            serial_number: trimmed(&info.serialNumber),
        })
    }

    fn open_session(&self, slot: CK_SLOT_ID, flags: CK_FLAGS) -> CkResult<CK_SESSION_HANDLE> {
        let c_open_session = self
            .functions
            .C_OpenSession
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let mut session: CK_SESSION_HANDLE = 0;
        check(unsafe { c_open_session(slot, flags, ptr::null_mut(), None, &mut session) })?;
        Ok(session)
    }

    fn close_session(&self, session: CK_SESSION_HANDLE) -> CkResult<()> {
        let c_close_session = self
            .functions
            .C_CloseSession
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        check(unsafe { c_close_session(session) })
    }

    fn login(&self, session: CK_SESSION_HANDLE, user: CK_USER_TYPE, pin: &[u8]) -> CkResult<()> {
        let c_login = self.functions.C_Login.ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        // The module only reads the PIN despite the mutable pointer in the prototype.
        check(unsafe { c_login(session, user, pin.as_ptr() as *mut u8, pin.len() as CK_ULONG) })
    }

    fn find_objects_init(
        &self,
        session: CK_SESSION_HANDLE,
        template: &[Attribute],
    ) -> CkResult<()> {
        let c_find_objects_init = self
            .functions
            .C_FindObjectsInit
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;

        // The values must outlive the raw template pointing into them.
        let values: Vec<Vec<u8>> = template.iter().map(Attribute::value_bytes).collect();
        let mut raw_template: Vec<CK_ATTRIBUTE> = template
            .iter()
            .zip(values.iter())
            .map(|(attribute, value)| CK_ATTRIBUTE {
                type_: attribute.attribute_type(),
                pValue: value.as_ptr() as *mut c_void,
                ulValueLen: value.len() as CK_ULONG,
            })
            .collect();

        check(unsafe {
            c_find_objects_init(
                session,
                raw_template.as_mut_ptr(),
                raw_template.len() as CK_ULONG,
            )
        })
    }

    fn find_objects(
        &self,
        session: CK_SESSION_HANDLE,
        max_objects: usize,
    ) -> CkResult<Vec<CK_OBJECT_HANDLE>> {
        let c_find_objects = self
            .functions
            .C_FindObjects
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let mut objects: Vec<CK_OBJECT_HANDLE> = vec![0; max_objects];
        let mut count: CK_ULONG = 0;
        check(unsafe {
            c_find_objects(
                session,
                objects.as_mut_ptr(),
                max_objects as CK_ULONG,
                &mut count,
            )
        })?;
        objects.truncate(count as usize);
        Ok(objects)
    }

    fn find_objects_final(&self, session: CK_SESSION_HANDLE) -> CkResult<()> {
        let c_find_objects_final = self
            .functions
            .C_FindObjectsFinal
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        check(unsafe { c_find_objects_final(session) })
    }

    fn get_attribute_value(
        &self,
        session: CK_SESSION_HANDLE,
        object: CK_OBJECT_HANDLE,
        attribute: CK_ATTRIBUTE_TYPE,
        value: Option<&mut [u8]>,
    ) -> CkResult<usize> {
        let c_get_attribute_value = self
            .functions
            .C_GetAttributeValue
            .ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let mut raw_attribute = CK_ATTRIBUTE {
            type_: attribute,
            pValue: ptr::null_mut(),
            ulValueLen: 0,
        };
        if let Some(buffer) = value {
            raw_attribute.pValue = buffer.as_mut_ptr() as *mut c_void;
            raw_attribute.ulValueLen = buffer.len() as CK_ULONG;
        }

        check(unsafe { c_get_attribute_value(session, object, &mut raw_attribute, 1) })?;
        if raw_attribute.ulValueLen == CK_UNAVAILABLE_INFORMATION {
            return Err(CKR_ATTRIBUTE_TYPE_INVALID);
        }
        Ok(raw_attribute.ulValueLen as usize)
    }

    fn sign_init(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: CK_MECHANISM_TYPE,
        key: CK_OBJECT_HANDLE,
    ) -> CkResult<()> {
        let c_sign_init = self.functions.C_SignInit.ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let mut mechanism = CK_MECHANISM {
            mechanism,
            pParameter: ptr::null_mut(),
            ulParameterLen: 0,
        };
        check(unsafe { c_sign_init(session, &mut mechanism, key) })
    }

    fn sign(
        &self,
        session: CK_SESSION_HANDLE,
        data: &[u8],
        signature: Option<&mut [u8]>,
    ) -> CkResult<usize> {
        let c_sign = self.functions.C_Sign.ok_or(CKR_FUNCTION_NOT_SUPPORTED)?;
        let (output, mut length) = match signature {
            Some(buffer) => (buffer.as_mut_ptr(), buffer.len() as CK_ULONG),
            None => (ptr::null_mut(), 0),
        };
        check(unsafe {
            c_sign(
                session,
                data.as_ptr() as *mut u8,
                data.len() as CK_ULONG,
                output,
                &mut length,
            )
        })?;
        Ok(length as usize)
    }
}
