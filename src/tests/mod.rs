// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
//! Scenario tests of the provider against a scripted module.
use crate::certificate::TokenCertificate;
use crate::identifier::{CertificateId, ModuleId};
use crate::key::TokenKey;
use crate::module::ModuleRegistry;
use crate::notify::{Notify, UserNotice};
use crate::pin::{Pin, PinProvider};
use crate::provider::{Provider, ProviderBuilder, SearchLimits};
use mock::{MockLoader, MockModule, MockSlot};
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};


mod store;

const MODULE_PATH: &str = "/usr/lib/mock-pkcs11.so";
const RSA_DER: &[u8] = include_bytes!("../../testdata/rsa_cert.der");
const EC_DER: &[u8] = include_bytes!("../../testdata/ec_cert.der");
const RSA_THUMBPRINT: &str = "6562DB97A87598C58E2B2E9835FE559B632217AE";
const KEY_ID: &[u8] = &[0x01, 0x02];

#[derive(Debug, Default)]
struct ScriptedPins {
    pin: Option<&'static str>,
    requests: Mutex<usize>,
    remembered: Mutex<Vec<Vec<u8>>>,
    forgotten: Mutex<usize>,
}

impl ScriptedPins {
    fn with_pin(pin: &'static str) -> ScriptedPins {
        ScriptedPins {
            pin: Some(pin),
            ..Default::default()
        }
    }

    fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }

    fn remembered(&self) -> Vec<Vec<u8>> {
        self.remembered.lock().unwrap().clone()
    }

    fn forgotten(&self) -> usize {
        *self.forgotten.lock().unwrap()
    }
}

impl PinProvider for ScriptedPins {
    fn request(&self, _certificate: &CertificateId) -> Option<Pin> {
        *self.requests.lock().unwrap() += 1;
        self.pin.map(Pin::from)
    }

    fn remember(&self, _certificate: &CertificateId, pin: &Pin) {
        self.remembered.lock().unwrap().push(pin.expose().to_vec());
    }

    fn forget(&self, _certificate: &CertificateId) {
        *self.forgotten.lock().unwrap() += 1;
    }
}

#[derive(Debug, Default)]
struct RecordingNotifier {
    notices: Mutex<Vec<UserNotice>>,
}

impl RecordingNotifier {
    fn notices(&self) -> Vec<UserNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl Notify for RecordingNotifier {
    fn notify(&self, notice: UserNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

struct Fixture {
    module: Arc<MockModule>,
    provider: Provider,
    pins: Arc<ScriptedPins>,
    notifier: Arc<RecordingNotifier>,
    loads: Arc<AtomicUsize>,
}

fn fixture(slots: Vec<MockSlot>) -> Fixture {
    fixture_with(slots, ScriptedPins::default(), SearchLimits::default())
}

fn fixture_with(slots: Vec<MockSlot>, pins: ScriptedPins, limits: SearchLimits) -> Fixture {
    let module = MockModule::new(slots);
    let loader = MockLoader::new()
        .with_module(MODULE_PATH, module.clone())
        .with_foreign_library("/usr/lib/libc.so");
    let loads = loader.load_counter();
    let pins = Arc::new(pins);
    let notifier = Arc::new(RecordingNotifier::default());
    let provider = ProviderBuilder::new()
        .with_registry(Arc::new(ModuleRegistry::with_loader(Box::new(loader))))
        .with_pin_provider(pins.clone())
        .with_notifier(notifier.clone())
        .with_search_limits(limits)
        .build();

    Fixture {
        module,
        provider,
        pins,
        notifier,
        loads,
    }
}

fn rsa_identifier() -> String {
    format!("PKCS:{}={}", RSA_THUMBPRINT, MODULE_PATH)
}

fn token_certificate(der: &[u8]) -> TokenCertificate {
    TokenCertificate::from_der(der.to_vec(), ModuleId::new(MODULE_PATH)).unwrap()
}

fn token_key(der: &[u8]) -> TokenKey {
    TokenKey::from_certificate(&token_certificate(der)).unwrap()
}
