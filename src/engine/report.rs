//! Crawl report and failure log
//!
//! The driver returns a report summarizing a run: branch counters, the
//! configuration hash, and one entry per abandoned branch. The failure log
//! is the user-visible record of lost branches; the crawl itself never
//! aborts on them.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// One abandoned branch
#[derive(Debug, Clone)]
pub struct BranchFailure {
    /// The request URL the branch died on
    pub url: String,

    /// The stage that was handling the branch
    pub stage: String,

    /// Why the branch was abandoned
    pub reason: String,

    /// When it was abandoned
    pub at: DateTime<Utc>,
}

impl BranchFailure {
    pub fn new(url: impl Into<String>, stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stage: stage.into(),
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}

/// Summary of one site crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Site name the pipeline was built for
    pub site: String,

    /// SHA-256 hash of the configuration file that produced this run
    pub config_hash: String,

    /// Branches handed to the fetch layer
    pub branches_dispatched: u64,

    /// Records handed to the sink
    pub records_emitted: u64,

    /// Branches that ended in a silent skip
    pub branches_skipped: u64,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// One entry per abandoned branch
    pub failures: Vec<BranchFailure>,
}

impl CrawlReport {
    pub fn new(site: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            config_hash: config_hash.into(),
            ..Self::default()
        }
    }

    /// Number of abandoned branches
    pub fn branches_failed(&self) -> u64 {
        self.failures.len() as u64
    }

    /// Share of dispatched branches that terminated without failure
    pub fn success_rate(&self) -> f64 {
        if self.branches_dispatched == 0 {
            return 0.0;
        }
        let ok = self.branches_dispatched - self.branches_failed();
        (ok as f64 / self.branches_dispatched as f64) * 100.0
    }

    /// Appends the run's failures to the failure log file
    ///
    /// One line per abandoned branch: timestamp, site, stage, URL, reason,
    /// tab-separated. Appending keeps earlier runs visible.
    pub fn append_failure_log(&self, path: &Path) -> std::io::Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        for failure in &self.failures {
            writeln!(
                file,
                "{}\t{}\t{}\t{}\t{}",
                failure.at.to_rfc3339(),
                self.site,
                failure.stage,
                failure.url,
                failure.reason
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut report = CrawlReport::new("chevrolet", "abc123");
        report.branches_dispatched = 10;
        report.failures.push(BranchFailure::new(
            "https://example.com/trim",
            "trim",
            "HTTP 500",
        ));

        assert_eq!(report.branches_failed(), 1);
        assert!((report.success_rate() - 90.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_empty_run() {
        let report = CrawlReport::new("chevrolet", "abc123");
        assert_eq!(report.success_rate(), 0.0);
    }

    #[test]
    fn test_failure_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.log");

        let mut report = CrawlReport::new("toyota", "abc123");
        report
            .failures
            .push(BranchFailure::new("https://example.com/a", "models", "shape"));
        report.append_failure_log(&path).unwrap();
        report.append_failure_log(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("https://example.com/a"));
        assert!(content.contains("models"));
    }

    #[test]
    fn test_failure_log_skipped_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.log");

        let report = CrawlReport::new("toyota", "abc123");
        report.append_failure_log(&path).unwrap();
        assert!(!path.exists());
    }
}
