//! Fuzz target: code characteristic write path
//!
//! First byte picks how much of the remaining input becomes the secret;
//! the rest is written to the code characteristic.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Writes outside 1..=24 bytes are rejected and fire no callback
//! - Accepted writes fire exactly one callback, success iff equal
//!
//! cargo fuzz run fuzz_code_write

#![no_main]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use codelock::app::events::LockEvent;
use codelock::app::ports::EventSink;
use codelock::config::CodelockConfig;
use codelock::adapters::nimble::NimbleTransport;
use codelock::app::controller::PeripheralController;
use codelock::error::AttError;
use codelock::gatt::CharacteristicId;
use libfuzzer_sys::fuzz_target;

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &LockEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let secret_len = usize::from(split % 25).min(rest.len());
    let (secret, written) = rest.split_at(secret_len);

    let mut ctrl = PeripheralController::new(
        NimbleTransport::new(),
        NullSink,
        &CodelockConfig::default(),
    );
    ctrl.set_secret(secret).unwrap();

    let ok = Arc::new(AtomicUsize::new(0));
    let bad = Arc::new(AtomicUsize::new(0));
    let (ok_cb, bad_cb) = (Arc::clone(&ok), Arc::clone(&bad));
    ctrl.set_success_callback(move || {
        ok_cb.fetch_add(1, Ordering::SeqCst);
    });
    ctrl.set_failure_callback(move || {
        bad_cb.fetch_add(1, Ordering::SeqCst);
    });

    let result = ctrl.on_write(CharacteristicId::Code, written);
    let (ok, bad) = (ok.load(Ordering::SeqCst), bad.load(Ordering::SeqCst));

    if (1..=24).contains(&written.len()) {
        assert_eq!(result, Ok(()));
        assert_eq!(ok + bad, 1);
        assert_eq!(ok == 1, written == secret);
    } else {
        assert_eq!(result, Err(AttError::InvalidLength));
        assert_eq!(ok + bad, 0);
    }
});
