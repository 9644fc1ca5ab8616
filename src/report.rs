use prettytable::{row, Table};

use crate::test::{RstbTests, TestOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    pub name: String,
    pub outcome: TestOutcome,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

impl TestReport {
    pub fn sim_speed(&self) -> f64 {
        match self.time_secs > 0.0 {
            true => self.sim_time_ns / self.time_secs,
            false => 0.0,
        }
    }
}

/// Outcome of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionReport {
    pub suite: String,
    pub tests: Vec<TestReport>,
    pub sim_time_ns: f64,
    pub real_time_secs: f64,
}

impl RegressionReport {
    pub(crate) fn collect(
        suite: &str,
        tests: &RstbTests,
        sim_time_ns: f64,
        real_time_secs: f64,
    ) -> Self {
        let tests = tests
            .iter()
            .map(|t| {
                t.with(|t| TestReport {
                    name: t.name.clone(),
                    // still running when the simulator stopped
                    outcome: t.outcome.clone().unwrap_or_else(|| {
                        TestOutcome::Failed("Simulation ended before the test completed".to_string())
                    }),
                    time_secs: t.time_secs,
                    sim_time_ns: t.sim_time_ns,
                })
            })
            .collect();
        RegressionReport {
            suite: suite.to_string(),
            tests,
            sim_time_ns,
            real_time_secs,
        }
    }

    pub fn get(&self, name: &str) -> Option<&TestReport> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn passed(&self) -> usize {
        self.tests.iter().filter(|t| t.outcome.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.tests.iter().filter(|t| t.outcome.is_fail()).count()
    }

    pub fn skipped(&self) -> usize {
        self.tests.len() - self.passed() - self.failed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn sim_speed(&self) -> f64 {
        match self.real_time_secs > 0.0 {
            true => self.sim_time_ns / self.real_time_secs,
            false => 0.0,
        }
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_titles(row!["TEST", "RESULT", "SIM TIME (ns)", "REAL TIME (s)", "RATIO (ns/s)"]);
        for t in &self.tests {
            table.add_row(row![
                t.name,
                t.outcome,
                format!("{:.3}", t.sim_time_ns),
                format!("{:.3}", t.time_secs),
                format!("{:.3}", t.sim_speed())
            ]);
        }
        table.add_row(row![
            format!("TESTS={} PASS={} FAIL={} SKIP={}", self.tests.len(), self.passed(), self.failed(), self.skipped()),
            "",
            format!("{:.3}", self.sim_time_ns),
            format!("{:.3}", self.real_time_secs),
            format!("{:.3}", self.sim_speed())
        ]);
        table
    }
}
