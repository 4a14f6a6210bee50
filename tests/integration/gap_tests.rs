//! Integration tests for the GAP lifecycle driven through the controller.

use codelock::adapters::nimble::NimbleTransport;
use codelock::app::controller::PeripheralController;
use codelock::app::events::LockEvent;
use codelock::config::CodelockConfig;
use codelock::error::{AdvStage, StackError};
use codelock::gap::{GapEvent, GapState};

use crate::mock_transport::{MockTransport, RecordingSink, StackCall};

fn synced_mock() -> PeripheralController<MockTransport, RecordingSink> {
    let mut ctrl = PeripheralController::new(
        MockTransport::new(),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    ctrl.initialize(b"1234").unwrap();
    ctrl.on_sync();
    ctrl
}

fn synced_sim() -> PeripheralController<NimbleTransport, RecordingSink> {
    let mut ctrl = PeripheralController::new(
        NimbleTransport::new(),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    ctrl.initialize(b"1234").unwrap();
    ctrl.on_sync();
    ctrl
}

fn connect(ctrl: &mut PeripheralController<NimbleTransport, RecordingSink>, conn_handle: u16) {
    ctrl.transport_mut().sim_link_up();
    ctrl.on_gap_event(GapEvent::Connect { status: 0, conn_handle });
}

#[test]
fn sync_starts_advertising() {
    let ctrl = synced_mock();
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
    assert_eq!(ctrl.transport().count(StackCall::StartAdvertising), 1);
    assert!(ctrl.sink().contains(&LockEvent::AdvertisingStarted));
}

#[test]
fn connect_then_disconnect_resumes_advertising() {
    let mut ctrl = synced_sim();
    connect(&mut ctrl, 7);
    assert_eq!(ctrl.gap_state(), GapState::Connected { conn_handle: 7 });

    ctrl.on_gap_event(GapEvent::Disconnect { reason: 0x213, conn_handle: 7 });
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
    assert!(ctrl.transport().is_advertising());
    assert_eq!(ctrl.transport().adv_starts(), 2);
}

#[test]
fn failed_connect_resumes_advertising() {
    let mut ctrl = synced_sim();
    ctrl.transport_mut().sim_link_up();
    ctrl.on_gap_event(GapEvent::Connect { status: 13, conn_handle: 0 });
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
    assert!(ctrl.sink().contains(&LockEvent::ConnectFailed { status: 13 }));
}

#[test]
fn adv_complete_while_connected_does_not_readvertise() {
    let mut ctrl = synced_sim();
    connect(&mut ctrl, 1);
    ctrl.on_gap_event(GapEvent::AdvComplete { reason: 0 });
    assert_eq!(ctrl.gap_state(), GapState::Connected { conn_handle: 1 });
    assert_eq!(ctrl.transport().adv_starts(), 1);
}

#[test]
fn stray_disconnect_while_advertising_does_not_start_twice() {
    let mut ctrl = synced_sim();
    ctrl.on_gap_event(GapEvent::Disconnect { reason: 0, conn_handle: 3 });
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
    assert_eq!(ctrl.transport().adv_starts(), 1);
    assert_eq!(
        ctrl.sink().count(|e| matches!(e, LockEvent::AdvertisingFailed { .. })),
        0
    );
}

#[test]
fn advertising_start_failure_is_reported_and_recovered_on_next_event() {
    let mut ctrl = PeripheralController::new(
        MockTransport::failing(StackCall::StartAdvertising),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    ctrl.initialize(b"1234").unwrap();
    ctrl.on_sync();
    assert_eq!(ctrl.gap_state(), GapState::Failed);
    assert!(ctrl.sink().contains(&LockEvent::AdvertisingFailed {
        stage: AdvStage::Start,
        error: StackError(3),
    }));

    ctrl.on_gap_event(GapEvent::AdvComplete { reason: 0 });
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
}

#[test]
fn address_inference_failure_leaves_peripheral_failed() {
    let mut ctrl = PeripheralController::new(
        MockTransport::failing(StackCall::InferAddressType),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    ctrl.initialize(b"1234").unwrap();
    ctrl.on_sync();
    assert_eq!(ctrl.gap_state(), GapState::Failed);
    assert_eq!(ctrl.transport().count(StackCall::StartAdvertising), 0);
}

#[test]
fn reset_then_sync_advertises_again() {
    let mut ctrl = synced_mock();
    ctrl.on_reset(19);
    assert_eq!(ctrl.gap_state(), GapState::Idle);
    assert!(ctrl.sink().contains(&LockEvent::HostReset { reason: 19 }));
    ctrl.on_sync();
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
    assert_eq!(ctrl.transport().count(StackCall::StartAdvertising), 2);
}

#[test]
fn mtu_and_subscribe_are_observed() {
    let mut ctrl = synced_sim();
    connect(&mut ctrl, 4);
    ctrl.on_gap_event(GapEvent::Mtu { conn_handle: 4, mtu: 185 });
    ctrl.on_gap_event(GapEvent::Subscribe {
        conn_handle: 4,
        attr_handle: 12,
        cur_notify: true,
        cur_indicate: false,
    });
    ctrl.on_gap_event(GapEvent::Other { kind: 38 });
    assert_eq!(ctrl.gap().mtu(), Some(185));
    assert!(ctrl.sink().contains(&LockEvent::UnhandledGapEvent { kind: 38 }));
    assert_eq!(ctrl.gap_state(), GapState::Connected { conn_handle: 4 });
}

#[test]
fn disconnect_before_sync_stays_idle() {
    let mut ctrl = PeripheralController::new(
        MockTransport::new(),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    ctrl.initialize(b"1234").unwrap();
    ctrl.on_gap_event(GapEvent::Disconnect { reason: 0x13, conn_handle: 0 });
    ctrl.on_gap_event(GapEvent::AdvComplete { reason: 0 });

    assert_eq!(ctrl.gap_state(), GapState::Idle);
    assert!(ctrl.sink().contains(&LockEvent::Disconnected { conn_handle: 0, reason: 0x13 }));
    assert_eq!(
        ctrl.sink().count(|e| matches!(e, LockEvent::AdvertisingFailed { .. })),
        0
    );
    assert_eq!(ctrl.transport().count(StackCall::StartAdvertising), 0);

    ctrl.on_sync();
    assert_eq!(ctrl.gap_state(), GapState::Advertising);
}
