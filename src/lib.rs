//! Testbench for a one-bit level-sensitive D-latch, written as Rust coroutines.
//!
//! Tests are `async fn(SimObject) -> RstbResult` driving the circuit under test
//! through a simulator interface. The runtime suspends them on clock edges,
//! timers and simulator phases. Two backends exist: VPI (feature `vpi`, for
//! Verilog simulators loading this crate as a shared library) and an
//! in-process event kernel (`model`) hosting a behavioral circuit.

mod config;
pub mod dlatch;
mod error;
mod executor;
mod junit;
pub mod model;
mod obj;
pub mod prelude;
mod report;
mod signal;
pub mod sim_if;
pub mod testbench;
mod trigger;
pub mod utils;
mod value;
#[cfg(feature = "vpi")]
pub mod vpi;
#[cfg(feature = "vpi")]
#[allow(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    dead_code,
    clippy::upper_case_acronyms
)]
mod vpi_user;

pub use config::TbConfig;
pub use error::{SimError, SimResult};
pub use executor::{JoinHandle, Task};
pub use obj::Shared;
pub use report::{RegressionReport, TestReport};
pub use signal::{ObjectKind, SimObject};
pub use test::{RstbTests, Test, TestGenerator, TestOutcome};
pub use trigger::{react_edge, react_ro, react_rw, react_time, EdgeKind, Trigger};
pub use value::Val;

use futures::future::{select, Either};
use futures_channel::oneshot;
use once_cell::unsync::OnceCell;
use sim_if::sim_if;
use std::cell::RefCell;
use std::time::Instant;

pub type RstbResult = Result<Val, Val>;

struct Regression {
    tests: RstbTests,
    config: TbConfig,
    started: OnceCell<Instant>,
}

thread_local! {
    static REGRESSION: RefCell<Option<Regression>> = RefCell::new(None);
    static CURRENT_TEST: RefCell<Option<oneshot::Sender<RstbResult>>> = RefCell::new(None);
}

/// Ends the running test as passed. Has no effect once the test has a result.
pub fn pass_test(msg: &str) {
    finish_test(Ok(Val::from(msg)));
}

/// Ends the running test as failed. Has no effect once the test has a result.
pub fn fail_test(msg: &str) {
    finish_test(Err(Val::from(msg)));
}

fn finish_test(result: RstbResult) {
    if let Some(tx) = CURRENT_TEST.with(|c| c.borrow_mut().take()) {
        let _ = tx.send(result);
    }
}

fn tear_down_test() {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
}

pub(crate) fn register_regression(tests: RstbTests, config: TbConfig) {
    REGRESSION.with(|r| {
        r.borrow_mut().replace(Regression {
            tests,
            config,
            started: OnceCell::new(),
        })
    });
}

pub(crate) fn start_of_simulation() {
    let registered = REGRESSION.with(|r| {
        r.borrow().as_ref().map(|r| {
            let _ = r.started.set(Instant::now());
            (r.tests.clone(), r.config.clone())
        })
    });
    let Some((tests, config)) = registered else {
        sim_if().log("No tests registered, nothing to do");
        sim_if().finish();
        return;
    };

    signal::clear_cache();
    utils::seed(config.seed);
    sim_if().log(&format!("Seeding random number generator with {}", config.seed));

    let sim_root = match SimObject::get_root() {
        Ok(root) => root,
        Err(e) => {
            sim_if().log(&format!("Can't find the simulation root: {}", e));
            sim_if().finish();
            return;
        }
    };
    sim_if().log(&format!(
        "Running {} tests of suite {}",
        tests.len(),
        config.suite
    ));
    Task::spawn_from_future(run_regression(tests, config, sim_root), "regression");

    // execute first simulation tick
    executor::run_once();
}

// Tests run one after another. Each one ends when its coroutine returns or when
// it calls pass_test/fail_test, whichever comes first.
async fn run_regression(tests: RstbTests, config: TbConfig, sim_root: SimObject) -> RstbResult {
    let tests: Vec<Shared<Test>> = tests.iter().cloned().collect();
    for test in tests {
        let (name, generator) = test.with(|t| (t.name.clone(), t.generator));
        if !config.selects(&name) {
            sim_if().log(&format!("Skipping test {}", name));
            test.with_mut(|t| t.set_outcome(TestOutcome::Skipped));
            continue;
        }

        sim_if().log(&format!("Running test {}", name));
        let time_start = Instant::now();
        let sim_time_start = sim_if().get_sim_time_ns();
        let (tx, rx) = oneshot::channel();
        CURRENT_TEST.with(|c| c.borrow_mut().replace(tx));

        let handle = Task::spawn_from_future(generator(sim_root), &name);
        // a verdict wins over the value the coroutine returns afterwards
        let result = match select(rx, handle).await {
            Either::Left((verdict, handle)) => {
                handle.cancel();
                verdict.unwrap_or_else(|_| Err(Val::from("test verdict was lost")))
            }
            Either::Right((result, mut rx)) => match rx.try_recv() {
                Ok(Some(verdict)) => verdict,
                _ => result,
            },
        };
        CURRENT_TEST.with(|c| c.borrow_mut().take());
        tear_down_test();

        let outcome = TestOutcome::from(result);
        match outcome.message() {
            "" => sim_if().log(&format!("Test {} {}", name, outcome)),
            msg => sim_if().log(&format!("Test {} {}: {}", name, outcome, msg)),
        }
        let sim_time_ns = sim_if().get_sim_time_ns() - sim_time_start;
        test.with_mut(|t| {
            t.time_secs = time_start.elapsed().as_secs_f64();
            t.sim_time_ns = sim_time_ns;
            t.set_outcome(outcome);
        });
    }
    sim_if().finish();
    Ok(Val::None)
}

pub(crate) fn end_of_simulation() -> Option<RegressionReport> {
    let regression = REGRESSION.with(|r| r.borrow_mut().take())?;
    CURRENT_TEST.with(|c| c.borrow_mut().take());
    // whatever is still waiting holds wakers in the trigger maps
    tear_down_test();

    let real_time = regression
        .started
        .get()
        .map(|s| s.elapsed().as_secs_f64())
        .unwrap_or_default();
    let report = RegressionReport::collect(
        &regression.config.suite,
        &regression.tests,
        sim_if().get_sim_time_ns(),
        real_time,
    );

    for t in &report.tests {
        sim_if().log(&format!(
            "TEST {}: Result={}, Time={:.3}, SimTime={:.3}ns, SimSpeed={:.3}ns/s",
            t.name,
            t.outcome,
            t.time_secs,
            t.sim_time_ns,
            t.sim_speed()
        ));
    }
    for line in report.table().to_string().lines() {
        sim_if().log(line);
    }

    if let Some(path) = &regression.config.results_file {
        match junit::write_junit_xml(&report, path) {
            Ok(()) => sim_if().log(&format!("Results written to {}", path.display())),
            Err(e) => sim_if().log(&format!("{}", e)),
        }
    }
    Some(report)
}
