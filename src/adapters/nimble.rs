//! NimBLE transport adapter.
//!
//! Implements [`HostPort`] and [`GapPort`] on top of the NimBLE host and
//! bridges the stack's C callbacks into the installed
//! [`PeripheralController`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: NimBLE via `esp_idf_svc::sys`.
//! - **all other targets**: an in-memory simulation for host-side tests.
//!   It mirrors the stack's refusal to start a second advertisement
//!   while one is running.
//!
//! ## Callback context
//!
//! The NimBLE host task calls `on_sync`, `on_reset`, the GAP event
//! handler and the GATT access handler. Each one locks [`CONTROLLER`],
//! so controller state is only ever touched by one context at a time.
//! Access callbacks registered on the controller run under that lock.

use std::sync::{Mutex, PoisonError};

use log::info;

use super::log_sink::LogEventSink;
use crate::app::controller::PeripheralController;
use crate::app::ports::{GapPort, HostPort};
use crate::error::StackError;
use crate::gap::advertising::{AddressType, AdvParams, AdvertisementData};
use crate::gatt::AttributeTable;

/// NimBLE `BLE_HS_EALREADY`: operation already in progress.
pub const BLE_HS_EALREADY: i32 = 2;

pub type SharedController = PeripheralController<NimbleTransport, LogEventSink>;

static CONTROLLER: Mutex<Option<SharedController>> = Mutex::new(None);

/// Hand the controller to the stack callbacks. Replaces any previous one.
pub fn install(controller: SharedController) {
    *CONTROLLER.lock().unwrap_or_else(PoisonError::into_inner) = Some(controller);
}

/// Run `f` on the installed controller. Returns `None` before
/// [`install`].
pub fn with_controller<R>(f: impl FnOnce(&mut SharedController) -> R) -> Option<R> {
    let mut guard = CONTROLLER.lock().unwrap_or_else(PoisonError::into_inner);
    guard.as_mut().map(f)
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct NimbleTransport {
    #[cfg(not(target_os = "espidf"))]
    sim: SimStack,
}

/// Simulation-side record of what the stack has been asked to do.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimStack {
    stack_up: bool,
    attributes: usize,
    services_added: usize,
    device_name: heapless::String<32>,
    host_task: bool,
    advertising: bool,
    adv_starts: usize,
}

impl NimbleTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(target_os = "espidf"))]
impl NimbleTransport {
    pub fn is_advertising(&self) -> bool {
        self.sim.advertising
    }

    pub fn adv_starts(&self) -> usize {
        self.sim.adv_starts
    }

    pub fn device_name(&self) -> &str {
        &self.sim.device_name
    }

    pub fn host_task_running(&self) -> bool {
        self.sim.host_task
    }

    /// A central connected: the stack stops advertising by itself.
    pub fn sim_link_up(&mut self) {
        self.sim.advertising = false;
    }
}

// ───────────────────────────────────────────────────────────────
// HostPort
// ───────────────────────────────────────────────────────────────

impl HostPort for NimbleTransport {
    fn init_stack(&mut self) -> Result<(), StackError> {
        self.platform_init_stack()
    }

    fn count_services(&mut self, table: &AttributeTable) -> Result<(), StackError> {
        let count = table.count();
        info!(
            "BLE: GATT table {} services, {} characteristics, {} attributes",
            count.services, count.characteristics, count.attributes
        );
        self.platform_count_services(table)
    }

    fn add_services(&mut self, table: &AttributeTable) -> Result<(), StackError> {
        self.platform_add_services(table)
    }

    fn set_device_name(&mut self, name: &str) -> Result<(), StackError> {
        self.platform_set_device_name(name)
    }

    fn start_host_task(&mut self) -> Result<(), StackError> {
        self.platform_start_host_task()
    }
}

// ───────────────────────────────────────────────────────────────
// GapPort
// ───────────────────────────────────────────────────────────────

impl GapPort for NimbleTransport {
    fn infer_address_type(&mut self) -> Result<AddressType, StackError> {
        self.platform_infer_address_type()
    }

    fn set_advertisement(&mut self, data: &AdvertisementData) -> Result<(), StackError> {
        self.platform_set_advertisement(data)
    }

    fn start_advertising(
        &mut self,
        own_addr: AddressType,
        params: &AdvParams,
    ) -> Result<(), StackError> {
        self.platform_start_advertising(own_addr, params)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl NimbleTransport {
    fn platform_init_stack(&mut self) -> Result<(), StackError> {
        self.sim.stack_up = true;
        info!("BLE(sim): host stack up");
        Ok(())
    }

    fn platform_count_services(&mut self, table: &AttributeTable) -> Result<(), StackError> {
        self.sim.attributes = table.count().attributes;
        Ok(())
    }

    fn platform_add_services(&mut self, table: &AttributeTable) -> Result<(), StackError> {
        use crate::gatt::Registration;

        let mut handle: u16 = 1;
        for svc in table.services() {
            Registration::Service { uuid: svc.uuid, handle }.log();
            handle += 1;
            for chr in svc.characteristics {
                Registration::Characteristic {
                    uuid: chr.uuid,
                    def_handle: handle,
                    val_handle: handle + 1,
                }
                .log();
                handle += 2;
            }
        }
        self.sim.services_added = table.services().len();
        Ok(())
    }

    fn platform_set_device_name(&mut self, name: &str) -> Result<(), StackError> {
        self.sim.device_name.clear();
        self.sim
            .device_name
            .push_str(name)
            .map_err(|()| StackError(BLE_HS_EINVAL))
    }

    fn platform_start_host_task(&mut self) -> Result<(), StackError> {
        self.sim.host_task = true;
        info!("BLE(sim): host task started");
        Ok(())
    }

    fn platform_infer_address_type(&mut self) -> Result<AddressType, StackError> {
        Ok(AddressType::Public)
    }

    fn platform_set_advertisement(&mut self, data: &AdvertisementData) -> Result<(), StackError> {
        if !data.fits() {
            return Err(StackError(BLE_HS_EMSGSIZE));
        }
        Ok(())
    }

    fn platform_start_advertising(
        &mut self,
        own_addr: AddressType,
        _params: &AdvParams,
    ) -> Result<(), StackError> {
        if self.sim.advertising {
            return Err(StackError(BLE_HS_EALREADY));
        }
        self.sim.advertising = true;
        self.sim.adv_starts += 1;
        info!("BLE(sim): advertising (own_addr_type={:?})", own_addr);
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
const BLE_HS_EINVAL: i32 = 3;
#[cfg(not(target_os = "espidf"))]
const BLE_HS_EMSGSIZE: i32 = 4;

// ───────────────────────────────────────────────────────────────
// ESP-IDF NimBLE
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
use core::ffi::{c_int, c_void};

#[cfg(target_os = "espidf")]
use crate::gatt::{AttrBuffer, AttrSink, CharacteristicId, Registration, Uuid};

/// Leaked NimBLE service definitions. Built once, read by the stack for
/// the rest of the program.
#[cfg(target_os = "espidf")]
struct SvcDefs(*const esp_idf_svc::sys::ble_gatt_svc_def);

// SAFETY: the definitions are immutable after construction and never freed.
#[cfg(target_os = "espidf")]
unsafe impl Send for SvcDefs {}
#[cfg(target_os = "espidf")]
unsafe impl Sync for SvcDefs {}

#[cfg(target_os = "espidf")]
static SVC_DEFS: std::sync::OnceLock<SvcDefs> = std::sync::OnceLock::new();

#[cfg(target_os = "espidf")]
fn uuid_to_raw(uuid: Uuid) -> *const esp_idf_svc::sys::ble_uuid_t {
    use esp_idf_svc::sys::*;
    match uuid {
        Uuid::Uuid16(value) => {
            let u: &'static ble_uuid16_t = Box::leak(Box::new(ble_uuid16_t {
                u: ble_uuid_t { type_: BLE_UUID_TYPE_16 as u8 },
                value,
            }));
            core::ptr::from_ref(u).cast()
        }
        Uuid::Uuid128(value) => {
            let u: &'static ble_uuid128_t = Box::leak(Box::new(ble_uuid128_t {
                u: ble_uuid_t { type_: BLE_UUID_TYPE_128 as u8 },
                value: value.to_le_bytes(),
            }));
            core::ptr::from_ref(u).cast()
        }
    }
}

#[cfg(target_os = "espidf")]
unsafe fn uuid_from_raw(raw: *const esp_idf_svc::sys::ble_uuid_t) -> Uuid {
    use esp_idf_svc::sys::*;
    // SAFETY: NimBLE UUID structs start with `ble_uuid_t`; the type tag
    // says which concrete layout follows.
    unsafe {
        if u32::from((*raw).type_) == BLE_UUID_TYPE_16 {
            Uuid::Uuid16((*raw.cast::<ble_uuid16_t>()).value)
        } else {
            Uuid::Uuid128(u128::from_le_bytes((*raw.cast::<ble_uuid128_t>()).value))
        }
    }
}

#[cfg(target_os = "espidf")]
fn build_svc_defs(table: &AttributeTable) -> SvcDefs {
    use esp_idf_svc::sys::*;

    let mut svcs: Vec<ble_gatt_svc_def> = Vec::new();
    for svc in table.services() {
        let mut chrs: Vec<ble_gatt_chr_def> = svc
            .characteristics
            .iter()
            .map(|c| ble_gatt_chr_def {
                uuid: uuid_to_raw(c.uuid),
                access_cb: Some(gatt_access),
                arg: c.id.as_arg() as *mut c_void,
                flags: c.flags.bits() as _,
                // SAFETY: all-zero is the "unset" value for the remaining fields.
                ..unsafe { core::mem::zeroed() }
            })
            .collect();
        // SAFETY: a zeroed definition terminates the list.
        chrs.push(unsafe { core::mem::zeroed() });

        svcs.push(ble_gatt_svc_def {
            type_: BLE_GATT_SVC_TYPE_PRIMARY as u8,
            uuid: uuid_to_raw(svc.uuid),
            characteristics: Box::leak(chrs.into_boxed_slice()).as_ptr(),
            // SAFETY: no included services.
            ..unsafe { core::mem::zeroed() }
        });
    }
    // SAFETY: a zeroed definition terminates the list.
    svcs.push(unsafe { core::mem::zeroed() });

    SvcDefs(Box::leak(svcs.into_boxed_slice()).as_ptr())
}

/// Incoming write value held in an mbuf chain.
#[cfg(target_os = "espidf")]
struct MbufReader(*mut esp_idf_svc::sys::os_mbuf);

#[cfg(target_os = "espidf")]
impl AttrBuffer for MbufReader {
    fn len(&self) -> usize {
        // SAFETY: the mbuf is owned by the stack for the duration of the access.
        usize::from(unsafe { esp_idf_svc::sys::os_mbuf_len(self.0) })
    }

    fn flatten(&self, dst: &mut [u8]) -> Result<usize, StackError> {
        let mut out_len: u16 = 0;
        // SAFETY: `dst` is valid for `dst.len()` bytes.
        let rc = unsafe {
            esp_idf_svc::sys::ble_hs_mbuf_to_flat(
                self.0,
                dst.as_mut_ptr().cast(),
                dst.len() as u16,
                &mut out_len,
            )
        };
        StackError::check(rc)?;
        Ok(usize::from(out_len))
    }
}

/// Outgoing read response mbuf.
#[cfg(target_os = "espidf")]
struct MbufWriter(*mut esp_idf_svc::sys::os_mbuf);

#[cfg(target_os = "espidf")]
impl AttrSink for MbufWriter {
    fn append(&mut self, data: &[u8]) -> Result<(), StackError> {
        // SAFETY: `data` is valid for `data.len()` bytes.
        let rc = unsafe {
            esp_idf_svc::sys::os_mbuf_append(self.0, data.as_ptr().cast(), data.len() as u16)
        };
        StackError::check(rc)
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn host_task(_param: *mut c_void) {
    info!("BLE: host task started");
    // SAFETY: returns only once `nimble_port_stop()` has been called.
    unsafe {
        esp_idf_svc::sys::nimble_port_run();
        esp_idf_svc::sys::nimble_port_freertos_deinit();
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_sync() {
    with_controller(SharedController::on_sync);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn on_reset(reason: c_int) {
    with_controller(|c| c.on_reset(reason));
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gap_event(
    event: *mut esp_idf_svc::sys::ble_gap_event,
    _arg: *mut c_void,
) -> c_int {
    use crate::gap::GapEvent;
    use esp_idf_svc::sys::*;

    // SAFETY: the stack passes a valid event for the duration of the call;
    // the union member read matches the type tag.
    let ev = unsafe {
        let e = &*event;
        let u = &e.__bindgen_anon_1;
        match u32::from(e.type_) {
            BLE_GAP_EVENT_CONNECT => GapEvent::Connect {
                status: u.connect.status,
                conn_handle: u.connect.conn_handle,
            },
            BLE_GAP_EVENT_DISCONNECT => GapEvent::Disconnect {
                reason: u.disconnect.reason,
                conn_handle: u.disconnect.conn.conn_handle,
            },
            BLE_GAP_EVENT_ADV_COMPLETE => GapEvent::AdvComplete {
                reason: u.adv_complete.reason,
            },
            BLE_GAP_EVENT_SUBSCRIBE => GapEvent::Subscribe {
                conn_handle: u.subscribe.conn_handle,
                attr_handle: u.subscribe.attr_handle,
                cur_notify: u.subscribe.cur_notify() != 0,
                cur_indicate: u.subscribe.cur_indicate() != 0,
            },
            BLE_GAP_EVENT_MTU => GapEvent::Mtu {
                conn_handle: u.mtu.conn_handle,
                mtu: u.mtu.value,
            },
            _ => GapEvent::Other { kind: e.type_ },
        }
    };

    with_controller(|c| c.on_gap_event(ev));
    0
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn gatt_access(
    _conn_handle: u16,
    _attr_handle: u16,
    ctxt: *mut esp_idf_svc::sys::ble_gatt_access_ctxt,
    arg: *mut c_void,
) -> c_int {
    use esp_idf_svc::sys::*;
    const READ_CHR: u8 = BLE_GATT_ACCESS_OP_READ_CHR as u8;
    const WRITE_CHR: u8 = BLE_GATT_ACCESS_OP_WRITE_CHR as u8;

    let Some(id) = CharacteristicId::from_arg(arg as usize) else {
        panic!("GATT access for unknown characteristic tag {}", arg as usize);
    };
    // SAFETY: the stack passes a valid context for the duration of the call.
    let ctxt = unsafe { &mut *ctxt };

    let result = match ctxt.op {
        WRITE_CHR => with_controller(|c| c.on_write(id, &MbufReader(ctxt.om))),
        READ_CHR => with_controller(|c| c.on_read(id, &mut MbufWriter(ctxt.om))),
        op => panic!("unexpected GATT access op {} on {:?}", op, id),
    };

    match result {
        Some(Ok(())) => 0,
        Some(Err(e)) => c_int::from(e.att_code()),
        None => BLE_ATT_ERR_UNLIKELY as c_int,
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn register_cb(
    ctxt: *mut esp_idf_svc::sys::ble_gatt_register_ctxt,
    _arg: *mut c_void,
) {
    use esp_idf_svc::sys::*;

    // SAFETY: the union member read matches the op tag; definitions
    // referenced here are the leaked ones built by `build_svc_defs`.
    let registration = unsafe {
        let c = &*ctxt;
        let u = &c.__bindgen_anon_1;
        match u32::from(c.op) {
            BLE_GATT_REGISTER_OP_SVC => Registration::Service {
                uuid: uuid_from_raw((*u.svc.svc_def).uuid),
                handle: u.svc.handle,
            },
            BLE_GATT_REGISTER_OP_CHR => Registration::Characteristic {
                uuid: uuid_from_raw((*u.chr.chr_def).uuid),
                def_handle: u.chr.def_handle,
                val_handle: u.chr.val_handle,
            },
            BLE_GATT_REGISTER_OP_DSC => Registration::Descriptor {
                uuid: uuid_from_raw((*u.dsc.dsc_def).uuid),
                handle: u.dsc.handle,
            },
            op => panic!("unexpected GATT registration op {}", op),
        }
    };

    // Registration happens on the host task during sync, so the
    // controller lock is free unless `initialize` is still finishing.
    if with_controller(|c| c.on_registered(registration)).is_none() {
        registration.log();
    }
}

#[cfg(target_os = "espidf")]
impl NimbleTransport {
    fn platform_init_stack(&mut self) -> Result<(), StackError> {
        use esp_idf_svc::sys::*;
        // SAFETY: called once at boot before the host task exists.
        unsafe {
            StackError::check(nimble_port_init())?;
            ble_hs_cfg.sync_cb = Some(on_sync);
            ble_hs_cfg.reset_cb = Some(on_reset);
            ble_hs_cfg.gatts_register_cb = Some(register_cb);
            ble_svc_gap_init();
            ble_svc_gatt_init();
        }
        info!("BLE(espidf): NimBLE port initialised");
        Ok(())
    }

    fn platform_count_services(&mut self, table: &AttributeTable) -> Result<(), StackError> {
        let defs = SVC_DEFS.get_or_init(|| build_svc_defs(table));
        // SAFETY: `defs` is a zero-terminated, leaked definition list.
        StackError::check(unsafe { esp_idf_svc::sys::ble_gatts_count_cfg(defs.0) })
    }

    fn platform_add_services(&mut self, table: &AttributeTable) -> Result<(), StackError> {
        let defs = SVC_DEFS.get_or_init(|| build_svc_defs(table));
        // SAFETY: as above; the stack keeps the pointers for its lifetime.
        StackError::check(unsafe { esp_idf_svc::sys::ble_gatts_add_svcs(defs.0) })
    }

    fn platform_set_device_name(&mut self, name: &str) -> Result<(), StackError> {
        let name = std::ffi::CString::new(name).map_err(|_| StackError(-1))?;
        // SAFETY: the stack copies the name into its own buffer.
        StackError::check(unsafe { esp_idf_svc::sys::ble_svc_gap_device_name_set(name.as_ptr()) })
    }

    fn platform_start_host_task(&mut self) -> Result<(), StackError> {
        // SAFETY: the port was initialised by `platform_init_stack`.
        unsafe { esp_idf_svc::sys::nimble_port_freertos_init(Some(host_task)) };
        Ok(())
    }

    fn platform_infer_address_type(&mut self) -> Result<AddressType, StackError> {
        let mut raw: u8 = 0;
        // SAFETY: `raw` outlives the call.
        StackError::check(unsafe { esp_idf_svc::sys::ble_hs_id_infer_auto(0, &mut raw) })?;
        AddressType::from_raw(raw).ok_or(StackError(-1))
    }

    fn platform_set_advertisement(&mut self, data: &AdvertisementData) -> Result<(), StackError> {
        use crate::gap::advertising::TxPower;
        use esp_idf_svc::sys::*;

        // SAFETY: all-zero means "field absent" for every member.
        let mut fields: ble_hs_adv_fields = unsafe { core::mem::zeroed() };
        fields.flags = data.flags.bits();
        fields.set_tx_pwr_lvl_is_present(1);
        fields.tx_pwr_lvl = match data.tx_power {
            TxPower::Auto => BLE_HS_ADV_TX_PWR_LVL_AUTO as i8,
            TxPower::Dbm(dbm) => dbm,
        };
        fields.name = data.name.as_ptr();
        fields.name_len = data.name.len() as u8;
        fields.set_name_is_complete(1);

        // SAFETY: the fields are encoded immediately; `data` outlives the call.
        StackError::check(unsafe { ble_gap_adv_set_fields(&fields) })
    }

    fn platform_start_advertising(
        &mut self,
        own_addr: AddressType,
        params: &AdvParams,
    ) -> Result<(), StackError> {
        use crate::gap::advertising::AdvDuration;
        use esp_idf_svc::sys::*;

        // SAFETY: zeroed intervals select the stack defaults.
        let mut adv: ble_gap_adv_params = unsafe { core::mem::zeroed() };
        adv.conn_mode = BLE_GAP_CONN_MODE_UND as u8;
        adv.disc_mode = BLE_GAP_DISC_MODE_GEN as u8;
        let duration_ms = match params.duration {
            AdvDuration::Forever => BLE_HS_FOREVER as i32,
            AdvDuration::Millis(ms) => ms as i32,
        };

        // SAFETY: `adv` outlives the call; the callback is a static fn.
        StackError::check(unsafe {
            ble_gap_adv_start(
                own_addr as u8,
                core::ptr::null(),
                duration_ms,
                &adv,
                Some(gap_event),
                core::ptr::null_mut(),
            )
        })
    }
}
