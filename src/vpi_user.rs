// IEEE 1364-2005 vpi_user.h, the subset used by the VPI backend.
// Symbols are resolved by the simulator when it loads the shared library.

use std::os::raw::{c_char, c_int};

pub type PLI_INT32 = c_int;
pub type PLI_UINT32 = u32;
pub type PLI_BYTE8 = c_char;
pub type vpiHandle = *mut PLI_UINT32;

// object types
pub const vpiIntegerVar: PLI_UINT32 = 25;
pub const vpiModule: PLI_UINT32 = 32;
pub const vpiNet: PLI_UINT32 = 36;
pub const vpiNetBit: PLI_UINT32 = 37;
pub const vpiRealVar: PLI_UINT32 = 47;
pub const vpiReg: PLI_UINT32 = 48;
pub const vpiRegBit: PLI_UINT32 = 49;

// properties
pub const vpiType: PLI_UINT32 = 1;
pub const vpiName: PLI_UINT32 = 2;
pub const vpiFullName: PLI_UINT32 = 3;
pub const vpiSize: PLI_UINT32 = 4;
pub const vpiTimePrecision: PLI_UINT32 = 12;

// value formats
pub const vpiBinStrVal: PLI_UINT32 = 1;
pub const vpiIntVal: PLI_UINT32 = 6;
pub const vpiSuppressVal: PLI_UINT32 = 13;

// time types
pub const vpiSimTime: PLI_UINT32 = 2;
pub const vpiSuppressTime: PLI_UINT32 = 3;

// vpi_put_value flags
pub const vpiNoDelay: PLI_UINT32 = 1;
pub const vpiInertialDelay: PLI_UINT32 = 2;

// callback reasons
pub const cbValueChange: PLI_UINT32 = 1;
pub const cbReadWriteSynch: PLI_UINT32 = 6;
pub const cbReadOnlySynch: PLI_UINT32 = 7;
pub const cbAfterDelay: PLI_UINT32 = 9;
pub const cbStartOfSimulation: PLI_UINT32 = 11;
pub const cbEndOfSimulation: PLI_UINT32 = 12;

// vpi_control operations
pub const vpiStop: PLI_UINT32 = 66;
pub const vpiFinish: PLI_UINT32 = 67;

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct t_vpi_time {
    pub type_: PLI_INT32,
    pub high: PLI_UINT32,
    pub low: PLI_UINT32,
    pub real: f64,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub union t_vpi_value__bindgen_ty_1 {
    pub str_: *mut PLI_BYTE8,
    pub scalar: PLI_INT32,
    pub integer: PLI_INT32,
    pub real: f64,
    pub misc: *mut PLI_BYTE8,
}

impl Default for t_vpi_value__bindgen_ty_1 {
    fn default() -> Self {
        t_vpi_value__bindgen_ty_1 { integer: 0 }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Default)]
pub struct t_vpi_value {
    pub format: PLI_INT32,
    pub value: t_vpi_value__bindgen_ty_1,
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct t_cb_data {
    pub reason: PLI_INT32,
    pub cb_rtn: Option<unsafe extern "C" fn(arg1: *mut t_cb_data) -> PLI_INT32>,
    pub obj: vpiHandle,
    pub time: *mut t_vpi_time,
    pub value: *mut t_vpi_value,
    pub index: PLI_INT32,
    pub user_data: *mut PLI_BYTE8,
}

impl Default for t_cb_data {
    fn default() -> Self {
        t_cb_data {
            reason: 0,
            cb_rtn: None,
            obj: std::ptr::null_mut(),
            time: std::ptr::null_mut(),
            value: std::ptr::null_mut(),
            index: 0,
            user_data: std::ptr::null_mut(),
        }
    }
}

extern "C" {
    pub fn vpi_register_cb(cb_data_p: *mut t_cb_data) -> vpiHandle;
    pub fn vpi_remove_cb(cb_obj: vpiHandle) -> PLI_INT32;
    pub fn vpi_handle_by_name(name: *mut PLI_BYTE8, scope: vpiHandle) -> vpiHandle;
    pub fn vpi_handle_by_index(object: vpiHandle, indx: PLI_INT32) -> vpiHandle;
    pub fn vpi_get(property: PLI_INT32, object: vpiHandle) -> PLI_INT32;
    pub fn vpi_get_str(property: PLI_INT32, object: vpiHandle) -> *mut PLI_BYTE8;
    pub fn vpi_get_value(expr: vpiHandle, value_p: *mut t_vpi_value);
    pub fn vpi_put_value(
        object: vpiHandle,
        value_p: *mut t_vpi_value,
        time_p: *mut t_vpi_time,
        flags: PLI_INT32,
    ) -> vpiHandle;
    pub fn vpi_get_time(object: vpiHandle, time_p: *mut t_vpi_time);
    pub fn vpi_iterate(type_: PLI_INT32, refHandle: vpiHandle) -> vpiHandle;
    pub fn vpi_scan(iterator: vpiHandle) -> vpiHandle;
    pub fn vpi_free_object(object: vpiHandle) -> PLI_INT32;
    pub fn vpi_printf(format: *mut PLI_BYTE8, ...) -> PLI_INT32;
    pub fn vpi_control(operation: PLI_INT32, ...) -> PLI_INT32;
}
