// Copyright 2019 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Token-backed certificate discovery and signing
//!
//! This crate locates X.509 certificates held on PKCS #11 tokens (smart cards, USB keys,
//! software tokens) and drives challenge-signing operations with the private key that sits
//! next to them on the token. Certificates are named by an opaque identifier of the form
//! `PKCS:<SHA-1 thumbprint>=<module path>`, which carries everything needed to find the
//! cryptographic module again at signing time.
//!
//! The entry point is the [`Provider`](provider::Provider), built over a process-wide
//! [`ModuleRegistry`](module::ModuleRegistry).
#![deny(
    nonstandard_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    missing_copy_implementations
)]
// This one is hard to avoid.
#![allow(clippy::multiple_crate_versions)]

#[allow(unused)]
macro_rules! format_error {
    ($message:expr, $error:expr) => {
        if crate::utils::GlobalConfig::log_error_details() {
            log::error!("{}; Error: {}", $message, $error)
        } else {
            log::error!("{};", $message)
        }
    };
}

pub mod certificate;
pub mod error;
pub mod identifier;
pub mod key;
pub mod module;
pub mod notify;
pub mod pin;
pub mod provider;
pub mod utils;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
