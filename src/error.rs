// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Error taxonomy
//!
//! Every component-level operation returns either its result or one of these errors. Nothing
//! is partially produced: a failed lookup yields no certificate and a failed signing call yields
//! no signature.
use crate::notify::UserNotice;
use cryptoki_sys::{CKR_KEY_TYPE_INCONSISTENT, CK_RV};
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// The module library could not be loaded (missing, corrupt or built for another architecture)
    #[error("could not load PKCS #11 library '{path}': {reason}")]
    ModuleLoad {
        /// Path of the library
        path: String,
        /// Loader diagnostic
        reason: String,
    },

    /// The library loaded but does not export a conforming function table
    #[error("'{path}' is not a PKCS #11 library: {reason}")]
    NotAModule {
        /// Path of the library
        path: String,
        /// What was missing
        reason: String,
    },

    /// The module refused to initialize
    #[error("PKCS #11 library '{path}' failed to initialize (CK_RV {rv:#x})")]
    ModuleInit {
        /// Path of the library
        path: String,
        /// Value returned by `C_Initialize`
        rv: CK_RV,
    },

    /// The certificate identifier does not name a module
    #[error("malformed certificate identifier '{0}'")]
    MalformedIdentifier(String),

    /// No slot, session or object matched the search
    #[error("no matching object found on any token")]
    ObjectNotFound,

    /// A module call failed outside of the steps that have a dedicated error
    #[error("{call} failed (CK_RV {rv:#x})")]
    Module {
        /// Name of the failing call
        call: &'static str,
        /// Value returned by the module
        rv: CK_RV,
    },

    /// The raw certificate value could not be turned into a certificate handle
    #[error("invalid certificate object: {0}")]
    Certificate(String),

    /// The public object could not be correlated with a private key
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    /// Login could not be performed
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// The key material could not be encoded as search criteria
    #[error("key material encoding failed: {0}")]
    Encoding(String),

    /// The signing operation failed
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Failures linking a public object to its private key
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    /// The public object has no readable `CKA_ID`
    #[error("the public object carries no key identifier (CK_RV {0:#x})")]
    MissingIdentifier(CK_RV),
    /// No private key carries the identifier, even after logging in
    #[error("no private key matches the public object's identifier")]
    PrivateKeyNotFound,
}

/// Failures of the login-on-demand step
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthenticationError {
    /// The credential collaborator supplied no PIN
    #[error("no PIN was supplied")]
    PinNotSupplied,
    /// The token rejected the PIN
    #[error("the token rejected the PIN (CK_RV {0:#x})")]
    PinRejected(CK_RV),
}

/// Failures of the sign step
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum SigningError {
    /// The key cannot be used with the selected mechanism
    #[error("the key type is inconsistent with the signing mechanism")]
    KeyTypeInconsistent,
    /// Any other failure of `C_SignInit` or `C_Sign`
    #[error("{call} failed (CK_RV {rv:#x})")]
    Failed {
        /// Name of the failing call
        call: &'static str,
        /// Value returned by the module
        rv: CK_RV,
    },
    /// The hash algorithm name is not one the signer can prepare
    #[error("unsupported hash algorithm")]
    UnsupportedHash,
}

impl SigningError {
    /// Classify a failing return value of the signing calls
    pub fn from_rv(call: &'static str, rv: CK_RV) -> SigningError {
        if rv == CKR_KEY_TYPE_INCONSISTENT {
            SigningError::KeyTypeInconsistent
        } else {
            SigningError::Failed { call, rv }
        }
    }
}

impl Error {
    /// The user-visible message this failure warrants, if any.
    ///
    /// Lookup and correlation failures are silent: they only reach the calling layer.
    pub fn user_notice(&self) -> Option<UserNotice> {
        match self {
            Error::ModuleLoad { .. } => Some(UserNotice::LibraryLoadFailed),
            Error::NotAModule { .. } => Some(UserNotice::NotAModule),
            Error::ModuleInit { .. } => Some(UserNotice::InitFailed),
            Error::Signing(SigningError::KeyTypeInconsistent) => {
                Some(UserNotice::SigningMechanismMismatch)
            }
            Error::Signing(SigningError::Failed { .. }) => Some(UserNotice::SigningFailed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use cryptoki_sys::{CKR_DEVICE_ERROR, CKR_PIN_INCORRECT};

    #[test]
    fn key_type_inconsistent_is_singled_out() {
        assert_eq!(
            SigningError::from_rv("C_Sign", CKR_KEY_TYPE_INCONSISTENT),
            SigningError::KeyTypeInconsistent
        );
        assert_eq!(
            SigningError::from_rv("C_SignInit", CKR_DEVICE_ERROR),
            SigningError::Failed {
                call: "C_SignInit",
                rv: CKR_DEVICE_ERROR
            }
        );
    }

    #[test]
    fn only_user_facing_failures_carry_a_notice() {
        let err = Error::Signing(SigningError::KeyTypeInconsistent);
        assert_eq!(
            err.user_notice(),
            Some(UserNotice::SigningMechanismMismatch)
        );

        let err = Error::Signing(SigningError::Failed {
            call: "C_Sign",
            rv: CKR_DEVICE_ERROR,
        });
        assert_eq!(err.user_notice(), Some(UserNotice::SigningFailed));

        assert_eq!(Error::ObjectNotFound.user_notice(), None);
        assert_eq!(
            Error::Correlation(CorrelationError::PrivateKeyNotFound).user_notice(),
            None
        );
        assert_eq!(
            Error::Authentication(AuthenticationError::PinRejected(CKR_PIN_INCORRECT))
                .user_notice(),
            None
        );
    }
}
