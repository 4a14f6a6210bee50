//! Door latch driver (solenoid or relay on one GPIO).
//!
//! A granted code releases the latch for a fixed hold time; [`LockLatch::tick`]
//! re-engages it once the hold has elapsed. Time is passed in by the caller
//! as a monotonic millisecond count.
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::digital::OutputPin`: on ESP-IDF the pin is
//! an `esp_idf_hal` `PinDriver`; on host/test it is any mock pin.

use embedded_hal::digital::OutputPin;
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    Locked,
    /// Released until the given timestamp (ms).
    Released { until_ms: u64 },
}

pub struct LockLatch<P> {
    pin: P,
    hold_ms: u32,
    state: LatchState,
}

impl<P: OutputPin> LockLatch<P> {
    /// Takes ownership of the pin and drives it to the locked level.
    pub fn new(pin: P, hold_ms: u32) -> Self {
        let mut latch = Self {
            pin,
            hold_ms,
            state: LatchState::Locked,
        };
        latch.drive(false);
        latch
    }

    /// Release for `hold_ms`. Releasing again while open extends the hold.
    pub fn release(&mut self, now_ms: u64) {
        let until_ms = now_ms.saturating_add(u64::from(self.hold_ms));
        if !self.is_released() {
            self.drive(true);
            info!("Latch: released for {} ms", self.hold_ms);
        }
        self.state = LatchState::Released { until_ms };
    }

    /// Re-lock once the hold has elapsed. Returns `true` on the tick that
    /// re-engages the latch.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        match self.state {
            LatchState::Released { until_ms } if now_ms >= until_ms => {
                self.lock();
                true
            }
            _ => false,
        }
    }

    pub fn lock(&mut self) {
        self.drive(false);
        if self.is_released() {
            info!("Latch: locked");
        }
        self.state = LatchState::Locked;
    }

    pub fn state(&self) -> LatchState {
        self.state
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, LatchState::Released { .. })
    }

    fn drive(&mut self, high: bool) {
        let result = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() {
            warn!("Latch: GPIO write failed (level={})", high);
        }
    }
}
