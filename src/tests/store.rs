// Copyright 2020 Contributors to the Parsec project.
// SPDX-License-Identifier: Apache-2.0
use super::mock::{MockObject, MockSlot};
use super::{fixture, fixture_with, ScriptedPins, EC_DER, KEY_ID, MODULE_PATH, RSA_DER};
use crate::error::Error;
use crate::identifier::ModuleId;
use crate::provider::SearchLimits;
use cryptoki_sys::{CKR_DEVICE_ERROR, CKR_GENERAL_ERROR};

#[test]
fn store_lists_certificates_in_slot_order() {
    let fixture = fixture(vec![
        MockSlot::new(1).with_object(MockObject::certificate(RSA_DER, KEY_ID)),
        MockSlot::new(2)
            .with_object(MockObject::certificate(EC_DER, KEY_ID))
            .with_object(MockObject::certificate(RSA_DER, KEY_ID)),
    ]);

    let store = fixture
        .provider
        .build_store(&ModuleId::new(MODULE_PATH))
        .unwrap();

    let ders: Vec<&[u8]> = store.iter().map(|certificate| certificate.der()).collect();
    assert_eq!(ders, vec![RSA_DER, EC_DER, RSA_DER]);
    assert!(store
        .iter()
        .all(|certificate| certificate.module().as_str() == MODULE_PATH));
    assert_eq!(fixture.module.open_sessions(), 0);
}

#[test]
fn failing_slots_are_skipped() {
    let fixture = fixture(vec![
        MockSlot::new(1)
            .with_object(MockObject::certificate(RSA_DER, KEY_ID))
            .failing_searches(CKR_DEVICE_ERROR),
        MockSlot::new(2)
            .with_object(MockObject::certificate(RSA_DER, KEY_ID))
            .refusing_sessions(CKR_DEVICE_ERROR),
        MockSlot::new(3).with_object(MockObject::certificate(EC_DER, KEY_ID)),
    ]);

    let store = fixture
        .provider
        .build_store(&ModuleId::new(MODULE_PATH))
        .unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.iter().next().unwrap().der(), EC_DER);
    assert_eq!(fixture.module.open_sessions(), 0);
}

#[test]
fn unreadable_certificates_are_skipped() {
    let fixture = fixture(vec![MockSlot::new(1)
        .with_object(MockObject::certificate(&[0x30, 0x00], KEY_ID))
        .with_object(MockObject::certificate(RSA_DER, KEY_ID))]);

    let store = fixture
        .provider
        .build_store(&ModuleId::new(MODULE_PATH))
        .unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn certificates_per_slot_are_capped() {
    let slot = (0..5).fold(MockSlot::new(1), |slot, _| {
        slot.with_object(MockObject::certificate(RSA_DER, KEY_ID))
    });
    let fixture = fixture_with(
        vec![slot],
        ScriptedPins::default(),
        SearchLimits {
            max_certificates_per_slot: 3,
            ..SearchLimits::default()
        },
    );

    let store = fixture
        .provider
        .build_store(&ModuleId::new(MODULE_PATH))
        .unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn slot_list_failure_yields_no_store() {
    let fixture = fixture(vec![MockSlot::new(1)]);
    fixture.module.set_slot_list_rv(CKR_GENERAL_ERROR);

    assert!(matches!(
        fixture.provider.build_store(&ModuleId::new(MODULE_PATH)),
        Err(Error::Module {
            call: "C_GetSlotList",
            ..
        })
    ));
    assert!(fixture.notifier.notices().is_empty());
}
