//! Failure summary and the CRITICAL alert line

use super::DbtTestResult;
use log::Level;

/// Log target used for alert lines
pub const ALERT_TARGET: &str = "dw::alert";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FailureSummary {
    pub total: usize,
    /// Rows with status `fail` or `error`
    pub failed: usize,
}

impl FailureSummary {
    pub fn from_results(results: &[DbtTestResult]) -> Self {
        Self {
            total: results.len(),
            failed: results.iter().filter(|r| r.status.is_failure()).count(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// `log` has no critical level, so CRITICAL is an error record with a prefix
    pub fn level(&self) -> Level {
        if self.has_failures() {
            Level::Error
        } else {
            Level::Info
        }
    }

    pub fn message(&self) -> String {
        if self.has_failures() {
            format!(
                "CRITICAL: {} DBT tests failed or errored. Check the 'monitoring.dbt_test_results' table or DBT artifacts for details.",
                self.failed
            )
        } else {
            "All DBT tests passed or were skipped.".to_string()
        }
    }
}

/// Log one line describing the outcome and return the summary
pub fn alert_on_failures(results: &[DbtTestResult]) -> FailureSummary {
    let summary = FailureSummary::from_results(results);
    log::log!(target: ALERT_TARGET, summary.level(), "{}", summary.message());
    summary
}

/// Process-wide logger recording alert lines for tests
#[cfg(test)]
pub(crate) mod capture {
    use super::ALERT_TARGET;
    use log::Level;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub(crate) struct CaptureLogger {
        lines: Mutex<Vec<(Level, String)>>,
    }

    impl CaptureLogger {
        pub(crate) fn lines(&self) -> MutexGuard<'_, Vec<(Level, String)>> {
            self.lines.lock().unwrap()
        }

        pub(crate) fn critical(&self) -> Vec<(Level, String)> {
            self.lines()
                .iter()
                .filter(|(_, msg)| msg.starts_with("CRITICAL"))
                .cloned()
                .collect()
        }
    }

    impl log::Log for CaptureLogger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.target() == ALERT_TARGET
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.lines
                    .lock()
                    .unwrap()
                    .push((record.level(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    /// Install the logger once and clear previous lines; callers must be `#[serial]`
    pub(crate) fn capture() -> &'static CaptureLogger {
        static LOGGER: OnceLock<&'static CaptureLogger> = OnceLock::new();
        let logger = *LOGGER.get_or_init(|| {
            let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger {
                lines: Mutex::new(Vec::new()),
            }));
            log::set_logger(logger).unwrap();
            log::set_max_level(log::LevelFilter::Trace);
            logger
        });
        logger.lines().clear();
        logger
    }
}

#[cfg(test)]
mod tests {
    use super::capture::capture;
    use super::*;
    use crate::monitoring::TestStatus;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_single_critical_line() {
        let logger = capture();
        let results = vec![
            DbtTestResult::new("test.a.b.1", TestStatus::Fail),
            DbtTestResult::new("test.a.c.1", TestStatus::Pass),
        ];

        let summary = alert_on_failures(&results);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 2);

        let critical = logger.critical();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].0, Level::Error);
        assert!(critical[0].1.contains("1 DBT tests failed or errored"));
    }

    #[test]
    #[serial]
    fn test_all_passed() {
        let logger = capture();
        let results = vec![
            DbtTestResult::new("test.a.b.1", TestStatus::Pass),
            DbtTestResult::new("test.a.c.1", TestStatus::Skipped),
        ];

        assert!(!alert_on_failures(&results).has_failures());
        let lines = logger.lines();
        assert_eq!(
            *lines,
            vec![(Level::Info, "All DBT tests passed or were skipped.".to_string())]
        );
    }

    #[test]
    fn test_error_counts_as_failure() {
        let results = vec![
            DbtTestResult::new("model.a.b", TestStatus::Error),
            DbtTestResult::new("test.a.c.1", TestStatus::Warn),
        ];
        let summary = FailureSummary::from_results(&results);
        assert_eq!(summary.failed, 1);
        assert!(summary.message().starts_with("CRITICAL: 1 DBT tests"));
    }
}
