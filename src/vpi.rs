use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::signal::{ObjectKind, SimObject};
use crate::sim_if::{self, format_log_line, SimIf};
use crate::test::RstbTests;
use crate::trigger::{self, EdgeKind};
use crate::vpi_user;
use crate::TbConfig;

type CbRoutine = unsafe extern "C" fn(*mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32;

pub(crate) struct Vpi {
    precision: i8,
}

impl Vpi {
    pub fn new() -> Self {
        Vpi {
            precision: get_time_precision(),
        }
    }

    #[inline]
    unsafe fn register_callback(
        &self,
        reason: u32,
        mut time: vpi_user::t_vpi_time,
        mut value: vpi_user::t_vpi_value,
        obj: vpi_user::vpiHandle,
        cb_fun: CbRoutine,
    ) -> SimResult<usize> {
        let mut cb_data = vpi_user::t_cb_data {
            reason: reason as i32,
            cb_rtn: Some(cb_fun),
            obj,
            value: &mut value,
            time: &mut time,
            ..Default::default()
        };
        let hdl = vpi_user::vpi_register_cb(&mut cb_data);
        match hdl.is_null() {
            true => Err(SimError::Simulator(format!(
                "callback with reason {} was not registered",
                reason
            ))),
            false => Ok(hdl as usize),
        }
    }

    fn put_value(&self, obj: &SimObject, mut val: vpi_user::t_vpi_value) {
        let mut time = vpi_user::t_vpi_time {
            type_: vpi_user::vpiSimTime as i32,
            ..Default::default()
        };
        unsafe {
            vpi_user::vpi_put_value(
                obj.handle as vpi_user::vpiHandle,
                &mut val,
                &mut time,
                vpi_user::vpiInertialDelay as i32,
            );
        }
    }

    fn get_kind(&self, hdl: usize) -> ObjectKind {
        match get_property(vpi_user::vpiType, hdl) as u32 {
            vpi_user::vpiNet
            | vpi_user::vpiNetBit
            | vpi_user::vpiReg
            | vpi_user::vpiRegBit
            | vpi_user::vpiIntegerVar => ObjectKind::Int(get_property(vpi_user::vpiSize, hdl) as u32),
            vpi_user::vpiModule => ObjectKind::Hier,
            _ => ObjectKind::Other,
        }
    }
}

impl SimIf for Vpi {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimResult<()> {
        let val = vpi_user::t_vpi_value {
            format: vpi_user::vpiIntVal as i32,
            value: vpi_user::t_vpi_value__bindgen_ty_1 {
                integer: value as i32,
            },
        };
        self.put_value(obj, val);
        Ok(())
    }

    fn set_value_bin(&self, obj: &SimObject, value: &str) -> SimResult<()> {
        let s = CString::new(value).map_err(|_| SimError::InvalidValue {
            name: self.get_full_name(obj).unwrap_or_default(),
            value: value.to_string(),
            reason: "contains a nul byte",
        })?;
        let val = vpi_user::t_vpi_value {
            format: vpi_user::vpiBinStrVal as i32,
            value: vpi_user::t_vpi_value__bindgen_ty_1 {
                str_: s.as_ptr() as *mut c_char,
            },
        };
        // the simulator copies the string before vpi_put_value returns
        self.put_value(obj, val);
        Ok(())
    }

    fn get_value(&self, obj: &SimObject) -> SimResult<u32> {
        let mut val = vpi_user::t_vpi_value {
            format: vpi_user::vpiIntVal as i32,
            ..Default::default()
        };
        unsafe {
            vpi_user::vpi_get_value(obj.handle as vpi_user::vpiHandle, &mut val);
            match val.format == vpi_user::vpiIntVal as i32 {
                true => Ok(val.value.integer as u32),
                false => Err(SimError::NoValue(self.get_full_name(obj)?)),
            }
        }
    }

    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String> {
        let mut val = vpi_user::t_vpi_value {
            format: vpi_user::vpiBinStrVal as i32,
            ..Default::default()
        };
        unsafe {
            vpi_user::vpi_get_value(obj.handle as vpi_user::vpiHandle, &mut val);
            if val.format != vpi_user::vpiBinStrVal as i32 {
                return Err(SimError::NoValue(self.get_full_name(obj)?));
            }
            string_from(val.value.str_)
                .ok_or_else(|| SimError::Simulator("binary string value is null".to_string()))
        }
    }

    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject> {
        let c_name = CString::new(name).map_err(|_| SimError::NoSuchObject(name.to_string()))?;
        let hdl = unsafe {
            vpi_user::vpi_handle_by_name(c_name.as_ptr() as *mut c_char, std::ptr::null_mut())
        };
        match hdl.is_null() {
            true => Err(SimError::NoSuchObject(name.to_string())),
            false => Ok(SimObject::new(hdl as usize, self.get_kind(hdl as usize))),
        }
    }

    fn get_object_by_index(&self, parent: &SimObject, index: u32) -> SimResult<SimObject> {
        let hdl = unsafe {
            vpi_user::vpi_handle_by_index(parent.handle as vpi_user::vpiHandle, index as i32)
        };
        match hdl.is_null() {
            true => Err(SimError::IndexOutOfRange {
                name: self.get_full_name(parent)?,
                index,
            }),
            false => Ok(SimObject::new(hdl as usize, self.get_kind(hdl as usize))),
        }
    }

    fn get_full_name(&self, obj: &SimObject) -> SimResult<String> {
        let ptr = unsafe {
            vpi_user::vpi_get_str(
                vpi_user::vpiFullName as i32,
                obj.handle as vpi_user::vpiHandle,
            )
        };
        unsafe { string_from(ptr) }
            .ok_or_else(|| SimError::NoSuchObject(format!("<handle {:#x}>", obj.handle)))
    }

    fn get_root_object(&self) -> SimResult<SimObject> {
        let no_root = || SimError::Simulator("no top level module".to_string());
        unsafe {
            let iterator = vpi_user::vpi_iterate(vpi_user::vpiModule as i32, std::ptr::null_mut());
            if iterator.is_null() {
                return Err(no_root());
            }
            let root = vpi_user::vpi_scan(iterator);
            if root.is_null() {
                return Err(no_root());
            }
            // an exhausted iterator is freed by the simulator
            if !vpi_user::vpi_scan(iterator).is_null() {
                vpi_user::vpi_free_object(iterator);
            }
            Ok(SimObject::new(root as usize, ObjectKind::Hier))
        }
    }

    fn get_sim_time_steps(&self) -> u64 {
        let mut time_obj = vpi_user::t_vpi_time {
            type_: vpi_user::vpiSimTime as i32,
            ..Default::default()
        };
        unsafe {
            vpi_user::vpi_get_time(std::ptr::null_mut(), &mut time_obj);
        }
        (u64::from(time_obj.high) << 32) + u64::from(time_obj.low)
    }

    fn get_sim_precision(&self) -> i8 {
        self.precision
    }

    fn log(&self, msg: &str) {
        printf(&format_log_line(self.get_sim_time_ns(), msg));
    }

    fn register_callback_rw(&self) -> SimResult<usize> {
        unsafe {
            self.register_callback(
                vpi_user::cbReadWriteSynch,
                suppress_time(),
                suppress_value(),
                std::ptr::null_mut(),
                react_vpi_rw,
            )
        }
    }

    fn register_callback_ro(&self) -> SimResult<usize> {
        unsafe {
            self.register_callback(
                vpi_user::cbReadOnlySynch,
                suppress_time(),
                suppress_value(),
                std::ptr::null_mut(),
                react_vpi_ro,
            )
        }
    }

    fn register_callback_time(&self, t: u64) -> SimResult<usize> {
        let time = vpi_user::t_vpi_time {
            type_: vpi_user::vpiSimTime as i32,
            high: (t >> 32) as u32,
            low: (t & 0xFFFF_FFFF) as u32,
            ..Default::default()
        };
        unsafe {
            self.register_callback(
                vpi_user::cbAfterDelay,
                time,
                suppress_value(),
                std::ptr::null_mut(),
                react_vpi_time,
            )
        }
    }

    fn register_callback_edge(&self, sig_hdl: usize) -> SimResult<usize> {
        let value = vpi_user::t_vpi_value {
            format: vpi_user::vpiIntVal as i32,
            ..Default::default()
        };
        unsafe {
            self.register_callback(
                vpi_user::cbValueChange,
                suppress_time(),
                value,
                sig_hdl as vpi_user::vpiHandle,
                react_vpi_edge,
            )
        }
    }

    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()> {
        match unsafe { vpi_user::vpi_remove_cb(cb_hdl as vpi_user::vpiHandle) } {
            1 => Ok(()),
            _ => Err(SimError::UnknownCallback(cb_hdl)),
        }
    }

    fn finish(&self) {
        unsafe {
            vpi_user::vpi_control(vpi_user::vpiFinish as i32, 1 as vpi_user::PLI_INT32);
        }
    }
}

fn suppress_time() -> vpi_user::t_vpi_time {
    vpi_user::t_vpi_time {
        type_: vpi_user::vpiSuppressTime as i32,
        ..Default::default()
    }
}

fn suppress_value() -> vpi_user::t_vpi_value {
    vpi_user::t_vpi_value {
        format: vpi_user::vpiSuppressVal as i32,
        ..Default::default()
    }
}

fn get_property(property: u32, hdl: usize) -> i32 {
    unsafe { vpi_user::vpi_get(property as i32, hdl as vpi_user::vpiHandle) }
}

fn get_time_precision() -> i8 {
    get_property(vpi_user::vpiTimePrecision, 0).clamp(-15, 2) as i8
}

unsafe fn string_from(ptr: *const c_char) -> Option<String> {
    match ptr.is_null() {
        true => None,
        false => Some(CStr::from_ptr(ptr).to_string_lossy().into_owned()),
    }
}

// usable before a simulator interface is installed
fn printf(line: &str) {
    if let Ok(line) = CString::new(format!("{}\n", line)) {
        unsafe {
            vpi_user::vpi_printf(b"%s\0".as_ptr() as *mut c_char, line.as_ptr());
        }
    }
}

unsafe extern "C" fn react_vpi_edge(cb_data: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    let hdl = (*cb_data).obj as usize;
    let value = (*cb_data).value;
    let edge = match get_property(vpi_user::vpiSize, hdl) == 1 && !value.is_null() {
        true => match (*value).value.integer {
            0 => EdgeKind::Falling,
            _ => EdgeKind::Rising,
        },
        false => EdgeKind::Any,
    };
    trigger::react_edge(hdl, edge);
    0
}

unsafe extern "C" fn react_vpi_time(cb_data: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    let time = (*cb_data).time;
    let t = match time.is_null() {
        true => sim_if::sim_if().get_sim_time_steps(),
        false => (u64::from((*time).high) << 32) + u64::from((*time).low),
    };
    trigger::react_time(t);
    0
}

unsafe extern "C" fn react_vpi_ro(_: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    trigger::react_ro();
    0
}

unsafe extern "C" fn react_vpi_rw(_: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    trigger::react_rw();
    0
}

/// Registers `tests` and hooks the regression into the simulator's start and
/// end of simulation. Called from `vlog_startup_routines`.
pub fn vpi_init(tests: RstbTests, suite: &str) {
    let config = TbConfig::from_env(suite).unwrap_or_else(|e| {
        printf(&format!("{}, running all tests with default settings", e));
        TbConfig::new(suite)
    });
    crate::register_regression(tests, config);

    let routines: [(u32, CbRoutine); 2] = [
        (vpi_user::cbStartOfSimulation, vpi_start_of_simulation),
        (vpi_user::cbEndOfSimulation, vpi_end_of_simulation),
    ];
    for (reason, cb_rtn) in routines {
        let mut cb_data = vpi_user::t_cb_data {
            reason: reason as i32,
            cb_rtn: Some(cb_rtn),
            ..Default::default()
        };
        unsafe { vpi_user::vpi_register_cb(&mut cb_data) };
    }
}

unsafe extern "C" fn vpi_start_of_simulation(_: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    sim_if::install(Rc::new(Vpi::new()));
    crate::start_of_simulation();
    0
}

unsafe extern "C" fn vpi_end_of_simulation(_: *mut vpi_user::t_cb_data) -> vpi_user::PLI_INT32 {
    crate::end_of_simulation();
    sim_if::uninstall();
    0
}

/// Exports the VPI entry point of a testbench library.
///
/// ```ignore
/// latchbench::run_with_vpi!(test_dlatch, test_dlatch_strict);
/// ```
#[macro_export]
macro_rules! run_with_vpi {
    ($( $i:ident ),+ $(,)?) => {
        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static vlog_startup_routines: [Option<extern "C" fn()>; 2] =
            [Some(vpi_entry_point), None];

        #[no_mangle]
        pub extern "C" fn vpi_entry_point() {
            $crate::vpi::vpi_init($crate::test_list!($($i),+), std::env!("CARGO_PKG_NAME"));
        }
    };
}
