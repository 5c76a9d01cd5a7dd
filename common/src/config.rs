//! Configuration types for runtime and output settings

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Only report errors
    pub quiet: bool,
    /// Verbosity level: 0=WARN, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
}

impl OutputConfig {
    /// Default filter directive for the configured verbosity.
    #[must_use]
    pub fn level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Log file configuration
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Append logs to this file in addition to stdout
    pub log_file: Option<std::path::PathBuf>,
}

impl TracingConfig {
    /// Log into a new timestamped file inside `dir`: `snapvault_YYYYMMDD_HHMMSS.log`.
    #[must_use]
    pub fn in_directory(dir: &std::path::Path, now: chrono::NaiveDateTime) -> Self {
        Self {
            log_file: Some(dir.join(format!("snapvault_{}.log", now.format("%Y%m%d_%H%M%S")))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        let mut output = OutputConfig::default();
        assert_eq!(output.level(), "warn");
        output.verbose = 1;
        assert_eq!(output.level(), "info");
        output.verbose = 2;
        assert_eq!(output.level(), "debug");
        output.verbose = 7;
        assert_eq!(output.level(), "trace");
        output.quiet = true;
        assert_eq!(output.level(), "error");
    }

    #[test]
    fn log_file_in_directory() {
        let now = chrono::NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        let config = TracingConfig::in_directory(std::path::Path::new("logs"), now);
        assert_eq!(
            config.log_file.unwrap(),
            std::path::PathBuf::from("logs/snapvault_20250115_090503.log")
        );
    }
}
