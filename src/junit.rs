use junit_report::{Duration, ReportBuilder, TestCase, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::report::RegressionReport;
use crate::test::TestOutcome;

pub(crate) fn write_junit_xml(report: &RegressionReport, path: &Path) -> SimResult<()> {
    let test_cases: Vec<TestCase> = report
        .tests
        .iter()
        .map(|t| {
            let duration = Duration::seconds_f64(t.time_secs);
            match &t.outcome {
                TestOutcome::Passed(_) => TestCaseBuilder::success(&t.name, duration),
                TestOutcome::Failed(msg) => {
                    TestCaseBuilder::failure(&t.name, duration, "failure", msg)
                }
                TestOutcome::Skipped => TestCaseBuilder::skipped(&t.name),
            }
            .build()
        })
        .collect();

    let test_suite = TestSuiteBuilder::new(&report.suite)
        .add_testcases(test_cases)
        .build();
    let junit = ReportBuilder::new().add_testsuite(test_suite).build();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::File::create(path)?;
    junit
        .write_xml(file)
        .map_err(|e| SimError::Report(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestReport;

    #[test]
    fn writes_one_testcase_per_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("results.xml");
        let report = RegressionReport {
            suite: "dlatch".to_string(),
            tests: vec![
                TestReport {
                    name: "test_dlatch".to_string(),
                    outcome: TestOutcome::Failed("Q should HOLD when clk=0".to_string()),
                    time_secs: 0.01,
                    sim_time_ns: 50_000.0,
                },
                TestReport {
                    name: "test_dlatch_strict".to_string(),
                    outcome: TestOutcome::Passed(String::new()),
                    time_secs: 0.01,
                    sim_time_ns: 90_000.0,
                },
            ],
            sim_time_ns: 140_000.0,
            real_time_secs: 0.02,
        };
        write_junit_xml(&report, &path).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        assert!(xml.contains("dlatch"));
        assert!(xml.contains("test_dlatch_strict"));
        assert!(xml.contains("Q should HOLD when clk=0"));
    }
}
