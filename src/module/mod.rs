// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! PKCS #11 module access
//!
//! A cryptographic module is reached through the function table it exports. [`FunctionList`]
//! exposes the part of that table this crate drives, keeping the C calling conventions: every
//! call yields `CKR_OK` or a distinct `CK_RV` failure code, and variable-length outputs follow
//! the two-call protocol (ask for the size with no buffer, then ask again with a buffer of that
//! size).
//!
//! Modules are loaded once per process through the [`ModuleRegistry`] and conversations with a
//! token go through the scoped [`Session`].
use cryptoki_sys::{
    CKA_CLASS, CKA_EC_POINT, CKA_ID, CKA_KEY_TYPE, CKA_MODULUS, CKA_PRIVATE, CKA_TOKEN,
    CK_ATTRIBUTE_TYPE, CK_FALSE, CK_FLAGS, CK_KEY_TYPE, CK_MECHANISM_TYPE, CK_OBJECT_CLASS,
    CK_OBJECT_HANDLE, CK_RV, CK_SESSION_HANDLE, CK_SLOT_ID, CK_TRUE, CK_USER_TYPE,
};

mod native;
mod registry;
mod session;

pub use native::NativeLoader;
pub use registry::{LoadModule, ModuleRegistry};
pub use session::Session;

/// Outcome of a single module call
pub type CkResult<T> = Result<T, CK_RV>;

/// Description of the token present in a slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenInfo {
    /// Application-defined label
    pub label: String,
    /// Token manufacturer
    pub manufacturer_id: String,
    /// Token model
    pub model: String,
    /// Token serial number
    pub serial_number: String,
}

/// An (attribute type, expected value) pair of an object search template
///
/// A template matches an object when every attribute it lists is equal on the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    /// `CKA_CLASS`
    Class(CK_OBJECT_CLASS),
    /// `CKA_KEY_TYPE`
    KeyType(CK_KEY_TYPE),
    /// `CKA_TOKEN`
    Token(bool),
    /// `CKA_PRIVATE`
    Private(bool),
    /// `CKA_ID`
    Id(Vec<u8>),
    /// `CKA_MODULUS`
    Modulus(Vec<u8>),
    /// `CKA_EC_POINT`, DER encoded
    EcPoint(Vec<u8>),
}

impl Attribute {
    /// The `CKA_*` type of this attribute
    pub fn attribute_type(&self) -> CK_ATTRIBUTE_TYPE {
        match self {
            Attribute::Class(_) => CKA_CLASS,
            Attribute::KeyType(_) => CKA_KEY_TYPE,
            Attribute::Token(_) => CKA_TOKEN,
            Attribute::Private(_) => CKA_PRIVATE,
            Attribute::Id(_) => CKA_ID,
            Attribute::Modulus(_) => CKA_MODULUS,
            Attribute::EcPoint(_) => CKA_EC_POINT,
        }
    }

    /// The value as the module expects it in memory
    pub fn value_bytes(&self) -> Vec<u8> {
        match self {
            Attribute::Class(value) | Attribute::KeyType(value) => value.to_ne_bytes().to_vec(),
            Attribute::Token(value) | Attribute::Private(value) => {
                vec![if *value { CK_TRUE } else { CK_FALSE }]
            }
            Attribute::Id(bytes) | Attribute::Modulus(bytes) | Attribute::EcPoint(bytes) => {
                bytes.clone()
            }
        }
    }
}

/// The part of a PKCS #11 function table used by this crate
///
/// Implementations must be usable from several threads but no session is ever used by two
/// threads at once.
pub trait FunctionList: Send + Sync {
    /// `C_Initialize` with no arguments
    fn initialize(&self) -> CkResult<()>;

    /// `C_GetSlotList`, returning every slot the module reports
    fn get_slot_list(&self, token_present: bool) -> CkResult<Vec<CK_SLOT_ID>>;

    /// `C_GetTokenInfo`
    fn get_token_info(&self, slot: CK_SLOT_ID) -> CkResult<TokenInfo>;

    /// `C_OpenSession` without notification callback
    fn open_session(&self, slot: CK_SLOT_ID, flags: CK_FLAGS) -> CkResult<CK_SESSION_HANDLE>;

    /// `C_CloseSession`
    fn close_session(&self, session: CK_SESSION_HANDLE) -> CkResult<()>;

    /// `C_Login`
    fn login(&self, session: CK_SESSION_HANDLE, user: CK_USER_TYPE, pin: &[u8]) -> CkResult<()>;

    /// `C_FindObjectsInit`
    fn find_objects_init(&self, session: CK_SESSION_HANDLE, template: &[Attribute])
        -> CkResult<()>;

    /// `C_FindObjects`, fetching at most `max_objects` handles
    fn find_objects(
        &self,
        session: CK_SESSION_HANDLE,
        max_objects: usize,
    ) -> CkResult<Vec<CK_OBJECT_HANDLE>>;

    /// `C_FindObjectsFinal`
    fn find_objects_final(&self, session: CK_SESSION_HANDLE) -> CkResult<()>;

    /// `C_GetAttributeValue` for a single attribute.
    ///
    /// With no buffer, returns the size of the value. With a buffer, fills it and returns the
    /// number of bytes written.
    fn get_attribute_value(
        &self,
        session: CK_SESSION_HANDLE,
        object: CK_OBJECT_HANDLE,
        attribute: CK_ATTRIBUTE_TYPE,
        value: Option<&mut [u8]>,
    ) -> CkResult<usize>;

    /// `C_SignInit` with a parameterless mechanism
    fn sign_init(
        &self,
        session: CK_SESSION_HANDLE,
        mechanism: CK_MECHANISM_TYPE,
        key: CK_OBJECT_HANDLE,
    ) -> CkResult<()>;

    /// `C_Sign`.
    ///
    /// With no buffer, returns the size of the signature and leaves the operation active. With
    /// a buffer, produces the signature and returns its length.
    fn sign(
        &self,
        session: CK_SESSION_HANDLE,
        data: &[u8],
        signature: Option<&mut [u8]>,
    ) -> CkResult<usize>;
}
