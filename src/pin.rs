// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! User PIN handling
//!
//! PINs are collected on demand by a [`PinProvider`], handed to the token for one login and
//! wiped right after, whatever the outcome.
use crate::identifier::CertificateId;
use log::trace;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use zeroize::{Zeroize, Zeroizing};

/// A user PIN
///
/// The bytes are zeroed when the value is dropped. [`Pin::wipe`] zeroes them earlier, in place.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin {
    secret: Zeroizing<Vec<u8>>,
}

impl Pin {
    /// Take ownership of PIN bytes
    pub fn new(bytes: Vec<u8>) -> Pin {
        Pin {
            secret: Zeroizing::new(bytes),
        }
    }

    /// The PIN bytes
    pub fn expose(&self) -> &[u8] {
        &self.secret
    }

    /// Overwrite every byte of the PIN with zero, keeping its length.
    pub fn wipe(&mut self) {
        self.secret.as_mut_slice().zeroize();
    }

    /// Number of bytes in the PIN
    pub fn len(&self) -> usize {
        self.secret.len()
    }

    /// Whether the PIN is empty
    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }
}

impl From<&str> for Pin {
    fn from(pin: &str) -> Self {
        Pin::new(pin.as_bytes().to_vec())
    }
}

impl From<String> for Pin {
    fn from(pin: String) -> Self {
        Pin::new(pin.into_bytes())
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(<redacted>)")
    }
}

/// Source of user PINs
///
/// `request` may block while the user is prompted.
pub trait PinProvider: Send + Sync {
    /// A PIN for the token holding the certificate, or `None` if none was supplied
    fn request(&self, certificate: &CertificateId) -> Option<Pin>;

    /// Called after the token accepted `pin`, before it is wiped.
    fn remember(&self, certificate: &CertificateId, pin: &Pin);

    /// Called after the token rejected the PIN obtained for `certificate`.
    fn forget(&self, _certificate: &CertificateId) {}
}

/// PIN read from the configuration, the same for every certificate
pub struct ConfiguredPin {
    pin: Option<SecretString>,
}

impl ConfiguredPin {
    /// Provider handing out `pin` for every request, or nothing if `None`
    pub fn new(pin: Option<String>) -> ConfiguredPin {
        ConfiguredPin {
            pin: pin.map(SecretString::new),
        }
    }

    /// Provider that never supplies a PIN
    pub fn none() -> ConfiguredPin {
        ConfiguredPin { pin: None }
    }
}

impl fmt::Debug for ConfiguredPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredPin")
            .field("configured", &self.pin.is_some())
            .finish()
    }
}

impl PinProvider for ConfiguredPin {
    fn request(&self, certificate: &CertificateId) -> Option<Pin> {
        trace!("PIN requested for {}", certificate);
        self.pin
            .as_ref()
            .map(|pin| Pin::from(pin.expose_secret().as_str()))
    }

    fn remember(&self, _certificate: &CertificateId, _pin: &Pin) {}
}

/// Wrapper caching the PINs accepted by the token, per certificate
///
/// A cached PIN is dropped again as soon as the token rejects it.
#[derive(Debug)]
pub struct CachedPins<P> {
    inner: P,
    cache: Mutex<HashMap<CertificateId, Pin>>,
}

impl<P: PinProvider> CachedPins<P> {
    /// Cache the PINs handed out by `inner`
    pub fn new(inner: P) -> CachedPins<P> {
        CachedPins {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: PinProvider> PinProvider for CachedPins<P> {
    fn request(&self, certificate: &CertificateId) -> Option<Pin> {
        let cached = self
            .cache
            .lock()
            .expect("PIN cache lock poisoned")
            .get(certificate)
            .cloned();
        cached.or_else(|| self.inner.request(certificate))
    }

    fn remember(&self, certificate: &CertificateId, pin: &Pin) {
        let _ = self
            .cache
            .lock()
            .expect("PIN cache lock poisoned")
            .insert(certificate.clone(), pin.clone());
        self.inner.remember(certificate, pin);
    }

    fn forget(&self, certificate: &CertificateId) {
        let _ = self
            .cache
            .lock()
            .expect("PIN cache lock poisoned")
            .remove(certificate);
        self.inner.forget(certificate);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identifier::ModuleId;

    fn certificate() -> CertificateId {
        CertificateId::new([7; 20], ModuleId::new("p11.so"))
    }

    #[test]
    fn wipe_zeroes_in_place() {
        let mut pin = Pin::from("123456");
        pin.wipe();
        assert_eq!(pin.len(), 6);
        assert!(pin.expose().iter().all(|b| *b == 0));
    }

    #[test]
    fn debug_never_shows_the_pin() {
        let pin = Pin::from("123456");
        assert!(!format!("{:?}", pin).contains("123456"));
        let configured = ConfiguredPin::new(Some("123456".to_owned()));
        assert!(!format!("{:?}", configured).contains("123456"));
    }

    #[test]
    fn configured_pin_is_handed_out() {
        let provider = ConfiguredPin::new(Some("0000".to_owned()));
        assert_eq!(provider.request(&certificate()).unwrap().expose(), b"0000");
        assert!(ConfiguredPin::none().request(&certificate()).is_none());
    }

    #[test]
    fn cache_serves_remembered_pins_until_forgotten() {
        let pins = CachedPins::new(ConfiguredPin::none());
        assert!(pins.request(&certificate()).is_none());

        pins.remember(&certificate(), &Pin::from("4321"));
        assert_eq!(pins.request(&certificate()).unwrap().expose(), b"4321");

        pins.forget(&certificate());
        assert!(pins.request(&certificate()).is_none());
    }
}
