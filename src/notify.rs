// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! User-facing failure notification
//!
//! A small fixed set of failures is worth interrupting the user for: a library that does not
//! load, a library that is not a PKCS #11 module, a module that does not initialize, and the two
//! signing failures. Everything else only reaches the calling layer.
use log::error;
use std::fmt;

/// The fixed set of messages shown to the user
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UserNotice {
    /// The module library could not be loaded
    LibraryLoadFailed,
    /// The library is not a PKCS #11 module
    NotAModule,
    /// The module failed to initialize
    InitFailed,
    /// The token refused the key for the signing mechanism
    SigningMechanismMismatch,
    /// Any other signing failure
    SigningFailed,
}

impl UserNotice {
    /// Title of the notification
    pub fn title(self) -> &'static str {
        match self {
            UserNotice::LibraryLoadFailed => "Could Not Load PKCS Library",
            UserNotice::NotAModule | UserNotice::InitFailed => "PKCS Library Problem",
            UserNotice::SigningMechanismMismatch | UserNotice::SigningFailed => {
                "PKCS Signing Problem"
            }
        }
    }

    /// Body of the notification
    pub fn message(self) -> &'static str {
        match self {
            UserNotice::LibraryLoadFailed => {
                "The selected PKCS library could not be loaded. Either the file is corrupted or \
                 it was not built for this architecture: a 32-bit program can only load 32-bit \
                 PKCS libraries and a 64-bit program can only load 64-bit PKCS libraries."
            }
            UserNotice::NotAModule => {
                "The selected library file could be read but it does not appear to be a PKCS \
                 library. It does not contain the functions necessary to interface with PKCS."
            }
            UserNotice::InitFailed => {
                "The selected PKCS library could not be initialized. Usually this is the result \
                 of a buggy or misconfigured PKCS library."
            }
            UserNotice::SigningMechanismMismatch => {
                "The PKCS library reported the selected certificate cannot be used to sign data."
            }
            UserNotice::SigningFailed => {
                "The PKCS library experienced an error attempting to perform a signing operation."
            }
        }
    }
}

impl fmt::Display for UserNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title(), self.message())
    }
}

/// Receiver of user-facing failure notifications
///
/// Implementations may block until the user acknowledged the message.
pub trait Notify: Send + Sync {
    /// Show a notice to the user.
    fn notify(&self, notice: UserNotice);
}

/// Notifier writing the notice to the error log
#[derive(Debug, Default, Copy, Clone)]
pub struct LogNotifier;

impl Notify for LogNotifier {
    fn notify(&self, notice: UserNotice) {
        error!("{}", notice);
    }
}
