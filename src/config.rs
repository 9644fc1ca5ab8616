use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{SimError, SimResult};

pub const ENV_TESTCASE: &str = "RSTB_TESTCASE";
pub const ENV_RESULTS: &str = "RSTB_RESULTS";
pub const ENV_SEED: &str = "RSTB_SEED";

/// Regression settings: which tests run, where results go, the RNG seed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TbConfig {
    pub suite: String,
    pub testcase: Option<Vec<String>>,
    pub results_file: Option<PathBuf>,
    pub seed: u64,
}

impl TbConfig {
    /// All tests, no report file, seed 0.
    pub fn new(suite: &str) -> Self {
        TbConfig {
            suite: suite.to_string(),
            testcase: None,
            results_file: None,
            seed: 0,
        }
    }

    pub fn from_env(suite: &str) -> SimResult<Self> {
        TbConfig::from_vars(suite, std::env::vars())
    }

    pub fn from_vars(
        suite: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> SimResult<Self> {
        let mut config = TbConfig {
            results_file: Some(PathBuf::from("results.xml")),
            seed: wall_clock_seed(),
            ..TbConfig::new(suite)
        };
        for (key, value) in vars {
            match key.as_str() {
                ENV_TESTCASE => {
                    let names: Vec<String> = value
                        .split(',')
                        .map(str::trim)
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect();
                    if names.is_empty() {
                        return Err(SimError::Config { key, value });
                    }
                    config.testcase = Some(names);
                }
                ENV_RESULTS => {
                    if value.is_empty() {
                        return Err(SimError::Config { key, value });
                    }
                    config.results_file = Some(PathBuf::from(value));
                }
                ENV_SEED => match value.trim().parse() {
                    Ok(seed) => config.seed = seed,
                    Err(_) => return Err(SimError::Config { key, value }),
                },
                _ => {}
            }
        }
        Ok(config)
    }

    pub fn with_testcase(mut self, names: &[&str]) -> Self {
        self.testcase = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn selects(&self, test_name: &str) -> bool {
        match &self.testcase {
            Some(names) => names.iter().any(|n| n == test_name),
            None => true,
        }
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_without_variables() {
        let config = TbConfig::from_vars("tb", vars(&[("PATH", "/bin")])).unwrap();
        assert_eq!(config.suite, "tb");
        assert_eq!(config.testcase, None);
        assert_eq!(config.results_file, Some(PathBuf::from("results.xml")));
        assert!(config.selects("anything"));
    }

    #[test]
    fn reads_filter_results_and_seed() {
        let config = TbConfig::from_vars(
            "tb",
            vars(&[
                (ENV_TESTCASE, "test_dlatch, test_dlatch_strict"),
                (ENV_RESULTS, "out/junit.xml"),
                (ENV_SEED, "1234"),
            ]),
        )
        .unwrap();
        assert_eq!(
            config.testcase,
            Some(vec!["test_dlatch".to_string(), "test_dlatch_strict".to_string()])
        );
        assert_eq!(config.results_file, Some(PathBuf::from("out/junit.xml")));
        assert_eq!(config.seed, 1234);
        assert!(config.selects("test_dlatch_strict"));
        assert!(!config.selects("test_dlatch_random"));
    }

    #[test]
    fn rejects_bad_seed() {
        let err = TbConfig::from_vars("tb", vars(&[(ENV_SEED, "soon")])).unwrap_err();
        assert!(matches!(err, SimError::Config { key, .. } if key == ENV_SEED));
    }

    #[test]
    fn rejects_empty_testcase_list() {
        assert!(TbConfig::from_vars("tb", vars(&[(ENV_TESTCASE, " , ")])).is_err());
    }
}
