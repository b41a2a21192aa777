// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Certificate lookup and signing on PKCS #11 tokens
//!
//! The [`Provider`] is the face of the crate. It loads a certificate from its identifier, signs
//! with the private key sitting next to a certificate on its token and lists the certificates
//! of a module. Failures the user should hear about are handed to the notifier once, then
//! returned to the caller.
use crate::certificate::{CertificateStore, TokenCertificate};
use crate::error::Result;
use crate::identifier::{CertificateId, ModuleId};
use crate::key::TokenKey;
use crate::module::ModuleRegistry;
use crate::notify::{LogNotifier, Notify};
use crate::pin::{ConfiguredPin, PinProvider};
use derivative::Derivative;
use std::sync::Arc;

mod certificate;
mod locate;
mod sign;
mod store;
mod utils;

#[cfg(test)]
pub(crate) use sign::login_with_pin;
pub use sign::Signature;
pub use utils::HashAlgorithm;

/// Default upper bound of objects fetched per search
pub const DEFAULT_MAX_OBJECTS_PER_SEARCH: usize = 32;
/// Default upper bound of certificates enumerated per slot when building a store
pub const DEFAULT_MAX_CERTIFICATES_PER_SLOT: usize = 16;

/// Upper bounds of the object searches
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SearchLimits {
    /// Handles fetched by one certificate or public key search in a slot
    pub max_objects_per_search: usize,
    /// Certificates enumerated in one slot when building a store
    pub max_certificates_per_slot: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_objects_per_search: DEFAULT_MAX_OBJECTS_PER_SEARCH,
            max_certificates_per_slot: DEFAULT_MAX_CERTIFICATES_PER_SLOT,
        }
    }
}

/// Token certificate provider
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Provider {
    registry: Arc<ModuleRegistry>,
    #[derivative(Debug = "ignore")]
    pins: Arc<dyn PinProvider>,
    #[derivative(Debug = "ignore")]
    notifier: Arc<dyn Notify>,
    limits: SearchLimits,
}

impl Provider {
    /// Load the certificate an identifier names.
    ///
    /// # Errors
    ///
    /// Fails if the identifier is malformed, the module cannot be used, or no token carries a
    /// public certificate with the identifier's thumbprint.
    pub fn load_certificate(&self, identifier: &str) -> Result<TokenCertificate> {
        self.report(self.load_certificate_internal(identifier))
    }

    /// Sign `data` with the private key matching `key`, hashing it first with the named hash
    /// algorithm.
    ///
    /// A PIN is requested only when the private key is not visible without logging in.
    pub fn sign(&self, key: &TokenKey, data: &[u8], hash_algorithm: &str) -> Result<Signature> {
        self.report(self.sign_internal(key, data, hash_algorithm))
    }

    /// Gather the public certificates of every token of a module.
    pub fn build_store(&self, module: &ModuleId) -> Result<CertificateStore> {
        self.report(self.build_store_internal(module))
    }

    /// Whether a signing request with this identifier and hash algorithm can be prepared
    pub fn supports_hash(&self, identifier: &str, hash_algorithm: &str) -> bool {
        CertificateId::parse(identifier).is_ok()
            && HashAlgorithm::from_name(hash_algorithm).is_some()
    }

    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            if let Some(notice) = error.user_notice() {
                self.notifier.notify(notice);
            }
        }
        result
    }
}

/// Builder for Provider
///
/// Unset parts default to a registry loading libraries from disk, no PIN, notices written to
/// the log and the default search limits.
#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct ProviderBuilder {
    registry: Option<Arc<ModuleRegistry>>,
    #[derivative(Debug = "ignore")]
    pins: Option<Arc<dyn PinProvider>>,
    #[derivative(Debug = "ignore")]
    notifier: Option<Arc<dyn Notify>>,
    limits: Option<SearchLimits>,
}

impl ProviderBuilder {
    /// Create a new provider builder
    pub fn new() -> ProviderBuilder {
        Default::default()
    }

    /// Share a module registry
    pub fn with_registry(mut self, registry: Arc<ModuleRegistry>) -> ProviderBuilder {
        self.registry = Some(registry);

        self
    }

    /// Add the source of user PINs
    pub fn with_pin_provider(mut self, pins: Arc<dyn PinProvider>) -> ProviderBuilder {
        self.pins = Some(pins);

        self
    }

    /// Add the receiver of user notices
    pub fn with_notifier(mut self, notifier: Arc<dyn Notify>) -> ProviderBuilder {
        self.notifier = Some(notifier);

        self
    }

    /// Override the search limits
    pub fn with_search_limits(mut self, limits: SearchLimits) -> ProviderBuilder {
        self.limits = Some(limits);

        self
    }

    /// Create an instance of Provider
    pub fn build(self) -> Provider {
        Provider {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(ModuleRegistry::new())),
            pins: self
                .pins
                .unwrap_or_else(|| Arc::new(ConfiguredPin::none())),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            limits: self.limits.unwrap_or_default(),
        }
    }
}
