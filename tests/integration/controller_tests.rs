//! Integration tests for the write → verify → callback pipeline and the
//! one-time bring-up sequence.

use codelock::adapters::nimble::NimbleTransport;
use codelock::app::controller::PeripheralController;
use codelock::app::events::LockEvent;
use codelock::config::CodelockConfig;
use codelock::error::{AttError, InitError, SecretError, StackError};
use codelock::gap::GapState;
use codelock::gatt::{CharacteristicId, Registration, Uuid};

use crate::mock_transport::{Counter, MockTransport, RecordingSink, StackCall};

type Controller = PeripheralController<MockTransport, RecordingSink>;

fn make_controller(code: &[u8]) -> (Controller, Counter, Counter) {
    let config = CodelockConfig::default();
    let mut ctrl = PeripheralController::new(MockTransport::new(), RecordingSink::new(), &config);
    let ok = Counter::new();
    let bad = Counter::new();
    ctrl.set_success_callback(ok.callback());
    ctrl.set_failure_callback(bad.callback());
    ctrl.initialize(code).unwrap();
    (ctrl, ok, bad)
}

fn write(ctrl: &mut Controller, value: &[u8]) -> Result<(), AttError> {
    ctrl.on_write(CharacteristicId::Code, value)
}

// ── Verification ──────────────────────────────────────────────

#[test]
fn correct_code_fires_success_once() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    write(&mut ctrl, b"1234").unwrap();
    assert_eq!((ok.get(), bad.get()), (1, 0));
    assert!(ctrl.sink().contains(&LockEvent::AccessGranted));
    assert!(ctrl.received().is_empty(), "accepted code must not linger");
}

#[test]
fn prefix_of_code_fires_failure_once() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    write(&mut ctrl, b"12").unwrap();
    assert_eq!((ok.get(), bad.get()), (0, 1));
    assert!(ctrl.sink().contains(&LockEvent::AccessDenied));
}

#[test]
fn granted_code_is_not_retained() {
    let (mut ctrl, ok, _bad) = make_controller(b"1234");
    write(&mut ctrl, b"1234").unwrap();
    assert_eq!(ok.get(), 1);
    assert_eq!(ctrl.received().len(), 0);
    assert_eq!(ctrl.received().as_bytes(), b"");
}

#[test]
fn superset_of_code_is_denied() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    write(&mut ctrl, b"12345").unwrap();
    assert_eq!((ok.get(), bad.get()), (0, 1));
}

#[test]
fn every_accepted_write_fires_exactly_one_callback() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    for value in [&b"0000"[..], b"1234", b"1", b"1234", b"4321"] {
        write(&mut ctrl, value).unwrap();
    }
    assert_eq!(ok.get(), 2);
    assert_eq!(bad.get(), 3);
}

// ── Length bounds ─────────────────────────────────────────────

#[test]
fn empty_write_is_rejected_without_callback() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    assert_eq!(write(&mut ctrl, b""), Err(AttError::InvalidLength));
    assert_eq!((ok.get(), bad.get()), (0, 0));
    assert!(ctrl.sink().contains(&LockEvent::WriteRejected { error: AttError::InvalidLength }));
}

#[test]
fn oversized_write_is_rejected_without_callback() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    assert_eq!(write(&mut ctrl, &[b'1'; 25]), Err(AttError::InvalidLength));
    assert_eq!((ok.get(), bad.get()), (0, 0));
}

#[test]
fn max_length_code_is_accepted() {
    let code = [b'7'; 24];
    let (mut ctrl, ok, _bad) = make_controller(&code);
    write(&mut ctrl, &code).unwrap();
    assert_eq!(ok.get(), 1);
}

#[test]
fn empty_secret_never_matches_a_write() {
    let (mut ctrl, ok, bad) = make_controller(b"");
    write(&mut ctrl, b"0").unwrap();
    assert_eq!((ok.get(), bad.get()), (0, 1));
}

// ── Secret / callback replacement ─────────────────────────────

#[test]
fn set_secret_applies_to_later_writes() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    ctrl.set_secret(b"9999").unwrap();
    write(&mut ctrl, b"1234").unwrap();
    write(&mut ctrl, b"9999").unwrap();
    assert_eq!((ok.get(), bad.get()), (1, 1));
}

#[test]
fn too_long_secret_keeps_previous() {
    let (mut ctrl, ok, _bad) = make_controller(b"1234");
    assert_eq!(ctrl.set_secret(&[0u8; 25]), Err(SecretError::TooLong { len: 25 }));
    write(&mut ctrl, b"1234").unwrap();
    assert_eq!(ok.get(), 1);
}

#[test]
fn replaced_callback_is_the_only_one_called() {
    let (mut ctrl, ok, _bad) = make_controller(b"1234");
    let replacement = Counter::new();
    ctrl.set_success_callback(replacement.callback());
    write(&mut ctrl, b"1234").unwrap();
    assert_eq!((ok.get(), replacement.get()), (0, 1));
}

#[test]
fn cleared_callbacks_still_classify() {
    let (mut ctrl, ok, bad) = make_controller(b"1234");
    ctrl.clear_success_callback();
    ctrl.clear_failure_callback();
    write(&mut ctrl, b"1234").unwrap();
    write(&mut ctrl, b"0000").unwrap();
    assert_eq!((ok.get(), bad.get()), (0, 0));
    assert!(ctrl.sink().contains(&LockEvent::AccessGranted));
    assert!(ctrl.sink().contains(&LockEvent::AccessDenied));
}

// ── Reads ─────────────────────────────────────────────────────

#[test]
fn device_information_reads() {
    let (ctrl, _, _) = make_controller(b"1234");
    let mut out = Vec::new();
    ctrl.on_read(CharacteristicId::ManufacturerName, &mut out).unwrap();
    assert_eq!(out, b"Apache Mynewt ESP32 devkitC");

    let mut out = Vec::new();
    ctrl.on_read(CharacteristicId::ModelNumber, &mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn read_into_full_buffer_reports_insufficient_resources() {
    let (ctrl, _, _) = make_controller(b"1234");
    let mut out: heapless::Vec<u8, 4> = heapless::Vec::new();
    assert_eq!(
        ctrl.on_read(CharacteristicId::ManufacturerName, &mut out),
        Err(AttError::InsufficientResources)
    );
}

#[test]
fn code_handle_recorded_from_registration() {
    let (mut ctrl, _, _) = make_controller(b"1234");
    assert_eq!(ctrl.code_handle(), None);
    ctrl.on_registered(Registration::Service {
        uuid: Uuid::Uuid16(0x180A),
        handle: 1,
    });
    ctrl.on_registered(Registration::Characteristic {
        uuid: Uuid::Uuid16(0x2af6),
        def_handle: 11,
        val_handle: 12,
    });
    assert_eq!(ctrl.code_handle(), Some(12));
    assert!(ctrl.sink().contains(&LockEvent::CodeHandleRegistered { val_handle: 12 }));
}

// ── Bring-up ──────────────────────────────────────────────────

#[test]
fn initialize_runs_steps_in_order() {
    let (ctrl, _, _) = make_controller(b"1234");
    assert_eq!(
        ctrl.transport().calls,
        vec![
            StackCall::InitStack,
            StackCall::CountServices,
            StackCall::AddServices,
            StackCall::SetDeviceName,
            StackCall::StartHostTask,
        ]
    );
    assert_eq!(ctrl.transport().device_name, "ble_codelock");
    assert_eq!(ctrl.gap_state(), GapState::Idle);
}

#[test]
fn initialize_stops_at_first_failing_step() {
    let cases = [
        (StackCall::InitStack, InitError::StackInit(StackError(3))),
        (StackCall::CountServices, InitError::ServiceCount(StackError(3))),
        (StackCall::AddServices, InitError::ServiceAdd(StackError(3))),
        (StackCall::SetDeviceName, InitError::DeviceName(StackError(3))),
        (StackCall::StartHostTask, InitError::HostTask(StackError(3))),
    ];
    for (step, expected) in cases {
        let mut ctrl = PeripheralController::new(
            MockTransport::failing(step),
            RecordingSink::new(),
            &CodelockConfig::default(),
        );
        assert_eq!(ctrl.initialize(b"1234"), Err(expected));
        assert_eq!(ctrl.transport().calls.last(), Some(&step));
        assert_eq!(ctrl.transport().count(StackCall::StartHostTask), usize::from(step == StackCall::StartHostTask));
    }
}

#[test]
fn initialize_rejects_oversized_code_before_touching_stack() {
    let mut ctrl = PeripheralController::new(
        MockTransport::new(),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    assert_eq!(
        ctrl.initialize(&[1u8; 30]),
        Err(InitError::Secret(SecretError::TooLong { len: 30 }))
    );
    assert!(ctrl.transport().calls.is_empty());
}

#[test]
fn simulated_nimble_transport_brings_up() {
    let mut ctrl = PeripheralController::new(
        NimbleTransport::new(),
        RecordingSink::new(),
        &CodelockConfig::default(),
    );
    ctrl.initialize(b"1234").unwrap();
    assert!(ctrl.transport().host_task_running());
    assert_eq!(ctrl.transport().device_name(), "ble_codelock");
}
