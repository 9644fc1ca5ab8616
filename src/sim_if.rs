use num_format::{Locale, ToFormattedString};
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::signal::SimObject;

thread_local! {
    static SIM_IF: RefCell<Option<Rc<dyn SimIf>>> = RefCell::new(None);
}

/// Makes `sim` the simulator interface of the current thread.
pub fn install(sim: Rc<dyn SimIf>) {
    SIM_IF.with(|s| s.borrow_mut().replace(sim));
}

pub fn uninstall() {
    SIM_IF.with(|s| s.borrow_mut().take());
}

pub fn try_sim_if() -> SimResult<Rc<dyn SimIf>> {
    SIM_IF.with(|s| s.borrow().clone()).ok_or(SimError::NoInterface)
}

/// The simulator interface of the current thread.
///
/// Panics when no backend is installed: every entry point (`vpi_init`,
/// `ModelSim::run`) installs one before any test code runs.
pub fn sim_if() -> Rc<dyn SimIf> {
    match try_sim_if() {
        Ok(sim) => sim,
        Err(e) => panic!("{}", e),
    }
}

pub trait SimIf {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimResult<()>;
    fn set_value_bin(&self, obj: &SimObject, value: &str) -> SimResult<()>;
    fn get_value(&self, obj: &SimObject) -> SimResult<u32>;
    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String>;
    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject>;
    fn get_object_by_index(&self, parent: &SimObject, index: u32) -> SimResult<SimObject>;
    fn get_full_name(&self, obj: &SimObject) -> SimResult<String>;
    fn get_root_object(&self) -> SimResult<SimObject>;
    fn get_sim_time_steps(&self) -> u64;
    fn get_sim_precision(&self) -> i8;
    fn log(&self, msg: &str);
    fn register_callback_rw(&self) -> SimResult<usize>;
    fn register_callback_ro(&self) -> SimResult<usize>;
    fn register_callback_time(&self, t: u64) -> SimResult<usize>;
    fn register_callback_edge(&self, sig_hdl: usize) -> SimResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()>;
    /// Ends the simulation once control returns to the simulator.
    fn finish(&self);

    fn get_sim_time(&self, unit: &str) -> SimResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let t = self.get_sim_time_steps() as f64;
        Ok(ldexp10(t, self.get_sim_precision() - time_scale(unit)?))
    }
    fn get_sim_time_ns(&self) -> f64 {
        ldexp10(self.get_sim_time_steps() as f64, self.get_sim_precision() + 9)
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> SimResult<u64> {
        to_sim_steps(time, unit, self.get_sim_precision())
    }
}

pub fn to_sim_steps(time: f64, unit: &str, precision: i8) -> SimResult<u64> {
    let steps = ldexp10(time, time_scale(unit)? - precision);
    if steps >= 0.0 && steps % 1.0 == 0.0 {
        Ok(steps as u64)
    } else {
        Err(SimError::TimeRounding {
            time,
            unit: unit.to_string(),
            precision,
        })
    }
}

pub fn time_scale(unit: &str) -> SimResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(SimError::TimeUnit(unit.to_string())),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}

/// `1,234,567.500ns message`
pub(crate) fn format_log_line(time_ns: f64, msg: &str) -> String {
    let int = time_ns.floor() as u64;
    let frac = ((time_ns - time_ns.floor()) * 1000.0).round() as u64;
    let (int, frac) = if frac >= 1000 { (int + 1, 0) } else { (int, frac) };
    format!("{}.{:03}ns {}", int.to_formatted_string(&Locale::en), frac, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_time_to_steps() {
        assert_eq!(to_sim_steps(5.0, "us", -9).unwrap(), 5_000);
        assert_eq!(to_sim_steps(10.0, "ns", -12).unwrap(), 10_000);
        assert_eq!(to_sim_steps(3.0, "ps", -12).unwrap(), 3);
    }

    #[test]
    fn refuses_rounding_conversion() {
        let err = to_sim_steps(1.0, "ps", -9).unwrap_err();
        assert!(matches!(err, SimError::TimeRounding { precision: -9, .. }));
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(matches!(time_scale("min"), Err(SimError::TimeUnit(u)) if u == "min"));
    }

    #[test]
    fn log_line_has_grouped_time_prefix() {
        assert_eq!(format_log_line(1_234_567.5, "hello"), "1,234,567.500ns hello");
        assert_eq!(format_log_line(0.0, "start"), "0.000ns start");
        assert_eq!(format_log_line(9.9996, "carry"), "10.000ns carry");
    }

    #[test]
    fn sim_if_is_missing_until_installed() {
        uninstall();
        assert!(matches!(try_sim_if(), Err(SimError::NoInterface)));
    }
}
