//! BLE code lock firmware entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │                                                          │
//! │   NimbleTransport          LogEventSink      LockLatch   │
//! │   (HostPort + GapPort)     (EventSink)       (GPIO)      │
//! │                                                          │
//! │   ─────────────── Port Trait Boundary ──────────────     │
//! │                                                          │
//! │   ┌──────────────────────────────────────────────────┐   │
//! │   │        PeripheralController (pure logic)         │   │
//! │   │   GAP state machine · GATT dispatch · verifier   │   │
//! │   └──────────────────────────────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::PinDriver;
use esp_idf_hal::peripherals::Peripherals;
use log::{error, info, warn};

use codelock::adapters::log_sink::LogEventSink;
use codelock::adapters::nimble::{self, NimbleTransport};
use codelock::app::controller::PeripheralController;
use codelock::config::CodelockConfig;
use codelock::drivers::latch::LockLatch;

const LATCH_POLL_MS: u32 = 50;

fn now_ms() -> u64 {
    // SAFETY: reads the monotonic system timer.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("ble-codelock v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config (build-time JSON or defaults) ───────────────
    let config = match option_env!("CODELOCK_CONFIG_JSON") {
        Some(json) => CodelockConfig::from_json(json).unwrap_or_else(|e| {
            warn!("CODELOCK_CONFIG_JSON rejected ({}), using defaults", e);
            CodelockConfig::default()
        }),
        None => CodelockConfig::default(),
    };

    // ── 3. Latch ──────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let pin = PinDriver::output(peripherals.pins.gpio2)?;
    let latch = Arc::new(Mutex::new(LockLatch::new(pin, config.unlock_hold_ms)));

    // ── 4. Controller + BLE bring-up ──────────────────────────
    let mut controller =
        PeripheralController::new(NimbleTransport::new(), LogEventSink::new(), &config);

    let success_latch = Arc::clone(&latch);
    controller.set_success_callback(move || {
        success_latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(now_ms());
    });
    controller.set_failure_callback(|| warn!("Codelock: wrong code"));

    // Installed before bring-up: the host task starts inside `initialize`
    // and its sync callback blocks on the controller lock until it returns.
    nimble::install(controller);
    let init = nimble::with_controller(|c| c.initialize(config.access_code.as_bytes()));
    if let Some(Err(e)) = init {
        error!("Codelock: bring-up failed: {}", e);
        panic!("BLE bring-up failed: {e}");
    }

    info!("System ready. Entering latch loop.");

    // ── 5. Latch loop ─────────────────────────────────────────
    loop {
        latch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tick(now_ms());
        FreeRtos::delay_ms(LATCH_POLL_MS);
    }
}
