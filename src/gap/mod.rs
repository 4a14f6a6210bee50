//! GAP state machine: advertising and connection lifecycle.
//!
//! ```text
//!            on_sync              on_connect(ok)
//!   Idle ─────────────▶ Advertising ──────────────▶ Connected
//!                          ▲   ▲                        │
//!                          │   └── on_disconnect ───────┘
//!                          │
//!        next connect/     │ start failed
//!        disconnect event  ▼
//!                        Failed
//! ```
//!
//! The peripheral holds a single link. Every time it becomes connectable
//! again (failed connect attempt, disconnect, advertising ended) the
//! advertisement is restarted. A failed start is reported and left alone
//! until the next connect/disconnect event; there is no retry loop.
//! Link events that arrive before sync are only reported.

pub mod advertising;
pub mod event;

use crate::app::events::LockEvent;
use crate::app::ports::{EventSink, GapPort};
use crate::error::{AdvStage, StackError};
use advertising::{AddressType, AdvParams, AdvertisementData};
pub use event::GapEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapState {
    /// Host not yet synced with the controller.
    Idle,
    Advertising,
    Connected { conn_handle: u16 },
    /// Advertising could not be started; not connectable.
    Failed,
}

#[derive(Debug)]
pub struct GapStateMachine {
    state: GapState,
    addr_type: Option<AddressType>,
    adv_data: AdvertisementData,
    adv_params: AdvParams,
    mtu: Option<u16>,
}

impl GapStateMachine {
    pub fn new(adv_data: AdvertisementData) -> Self {
        Self {
            state: GapState::Idle,
            addr_type: None,
            adv_data,
            adv_params: AdvParams::default(),
            mtu: None,
        }
    }

    pub fn state(&self) -> GapState {
        self.state
    }

    pub fn is_advertising(&self) -> bool {
        self.state == GapState::Advertising
    }

    /// Handle of the active link, if any.
    pub fn conn_handle(&self) -> Option<u16> {
        match self.state {
            GapState::Connected { conn_handle } => Some(conn_handle),
            _ => None,
        }
    }

    /// ATT MTU negotiated on the current link.
    pub fn mtu(&self) -> Option<u16> {
        self.mtu
    }

    pub fn advertisement(&self) -> &AdvertisementData {
        &self.adv_data
    }

    // ── Host lifecycle ────────────────────────────────────────

    /// Host and controller synced: resolve the own address type and
    /// start advertising.
    pub fn on_sync<G: GapPort, S: EventSink>(&mut self, gap: &mut G, sink: &mut S) {
        match gap.infer_address_type() {
            Ok(addr_type) => {
                self.addr_type = Some(addr_type);
                sink.emit(&LockEvent::Synced { addr_type });
                self.advertise(gap, sink);
            }
            Err(error) => {
                self.addr_type = None;
                self.state = GapState::Failed;
                sink.emit(&LockEvent::AdvertisingFailed {
                    stage: AdvStage::AddressType,
                    error,
                });
            }
        }
    }

    /// Host stack reset; nothing is valid until the next sync.
    pub fn on_reset<S: EventSink>(&mut self, reason: i32, sink: &mut S) {
        self.state = GapState::Idle;
        self.addr_type = None;
        self.mtu = None;
        sink.emit(&LockEvent::HostReset { reason });
    }

    // ── GAP events ────────────────────────────────────────────

    pub fn handle<G: GapPort, S: EventSink>(&mut self, event: GapEvent, gap: &mut G, sink: &mut S) {
        match event {
            GapEvent::Connect { status, conn_handle } => {
                self.on_connect(status, conn_handle, gap, sink);
            }
            GapEvent::Disconnect { reason, conn_handle } => {
                self.on_disconnect(reason, conn_handle, gap, sink);
            }
            GapEvent::AdvComplete { reason } => self.on_advertising_complete(reason, gap, sink),
            GapEvent::Subscribe {
                conn_handle,
                attr_handle,
                cur_notify,
                cur_indicate,
            } => sink.emit(&LockEvent::Subscribed {
                conn_handle,
                attr_handle,
                notify: cur_notify,
                indicate: cur_indicate,
            }),
            GapEvent::Mtu { conn_handle, mtu } => self.on_mtu_update(conn_handle, mtu, sink),
            GapEvent::Other { kind } => sink.emit(&LockEvent::UnhandledGapEvent { kind }),
        }
    }

    pub fn on_connect<G: GapPort, S: EventSink>(
        &mut self,
        status: i32,
        conn_handle: u16,
        gap: &mut G,
        sink: &mut S,
    ) {
        if status != 0 {
            sink.emit(&LockEvent::ConnectFailed { status });
            if self.state != GapState::Idle {
                self.advertise(gap, sink);
            }
            return;
        }
        // The stack stops advertising on its own once a link is up.
        self.state = GapState::Connected { conn_handle };
        self.mtu = None;
        sink.emit(&LockEvent::Connected { conn_handle });
    }

    pub fn on_disconnect<G: GapPort, S: EventSink>(
        &mut self,
        reason: i32,
        conn_handle: u16,
        gap: &mut G,
        sink: &mut S,
    ) {
        sink.emit(&LockEvent::Disconnected { conn_handle, reason });
        self.mtu = None;
        // Before sync nothing may be started; while advertising a second
        // start would be refused.
        if matches!(self.state, GapState::Idle | GapState::Advertising) {
            return;
        }
        self.advertise(gap, sink);
    }

    pub fn on_advertising_complete<G: GapPort, S: EventSink>(
        &mut self,
        reason: i32,
        gap: &mut G,
        sink: &mut S,
    ) {
        sink.emit(&LockEvent::AdvertisingComplete { reason });
        if matches!(self.state, GapState::Idle | GapState::Connected { .. }) {
            return;
        }
        self.advertise(gap, sink);
    }

    pub fn on_mtu_update<S: EventSink>(&mut self, conn_handle: u16, mtu: u16, sink: &mut S) {
        if self.conn_handle() == Some(conn_handle) {
            self.mtu = Some(mtu);
        }
        sink.emit(&LockEvent::MtuUpdated { conn_handle, mtu });
    }

    // ── Internal ──────────────────────────────────────────────

    fn advertise<G: GapPort, S: EventSink>(&mut self, gap: &mut G, sink: &mut S) {
        // Only reached after sync; an earlier inference failure is retried.
        let addr_type = match self.addr_type {
            Some(addr_type) => addr_type,
            None => match gap.infer_address_type() {
                Ok(addr_type) => {
                    self.addr_type = Some(addr_type);
                    addr_type
                }
                Err(error) => {
                    self.fail(AdvStage::AddressType, error, sink);
                    return;
                }
            },
        };
        if let Err(error) = gap.set_advertisement(&self.adv_data) {
            self.fail(AdvStage::SetFields, error, sink);
            return;
        }
        if let Err(error) = gap.start_advertising(addr_type, &self.adv_params) {
            self.fail(AdvStage::Start, error, sink);
            return;
        }
        self.state = GapState::Advertising;
        sink.emit(&LockEvent::AdvertisingStarted);
    }

    fn fail<S: EventSink>(&mut self, stage: AdvStage, error: StackError, sink: &mut S) {
        self.state = GapState::Failed;
        sink.emit(&LockEvent::AdvertisingFailed { stage, error });
    }
}
