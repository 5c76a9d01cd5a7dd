use crate::Error;
use crate::collector::TransferFailure;

/// What a run did, printed at the end and sent with the completion notification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub files_discovered: usize,
    /// Files per `YYYY-MM-DD` folder
    pub date_folders: std::collections::BTreeMap<String, usize>,
    pub destinations: usize,
    pub copies_completed: u64,
    pub copies_failed: u64,
    pub bytes_copied: u64,
    pub directories_created: u64,
    pub duration: std::time::Duration,
}

impl Summary {
    #[must_use]
    pub fn from_progress(
        progress: &common::progress::Progress,
        files_discovered: usize,
        date_folders: std::collections::BTreeMap<String, usize>,
        destinations: usize,
        duration: std::time::Duration,
    ) -> Self {
        Self {
            files_discovered,
            date_folders,
            destinations,
            copies_completed: progress.copies_completed.get(),
            copies_failed: progress.copies_failed.get(),
            bytes_copied: progress.bytes_copied.get(),
            directories_created: progress.directories_created.get(),
            duration,
        }
    }

    /// Wall time rounded down to whole seconds.
    #[must_use]
    pub fn elapsed(&self) -> String {
        humantime::format_duration(std::time::Duration::from_secs(self.duration.as_secs()))
            .to_string()
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "files discovered: {}", self.files_discovered)?;
        writeln!(f, "date folders: {}", self.date_folders.len())?;
        for (folder, count) in &self.date_folders {
            writeln!(f, "  {folder}: {count}")?;
        }
        writeln!(f, "destinations: {}", self.destinations)?;
        writeln!(f, "copies completed: {}", self.copies_completed)?;
        writeln!(f, "copies failed: {}", self.copies_failed)?;
        writeln!(f, "bytes copied: {}", bytesize::ByteSize(self.bytes_copied))?;
        writeln!(f, "directories created: {}", self.directories_created)?;
        write!(f, "duration: {}", self.elapsed())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Every file was attempted but some copies failed
    CompletedWithErrors,
    Cancelled,
    /// The run could not start or was aborted
    Failed,
}

impl Status {
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Failed => 1,
            Status::CompletedWithErrors => 2,
            Status::Cancelled => 130,
        }
    }

    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        if error.is_cancelled() {
            Status::Cancelled
        } else {
            Status::Failed
        }
    }
}

/// Outcome of a run that got as far as connecting to all destinations.
#[derive(Debug)]
pub struct RunResult {
    /// Failed copies, ordered by source path
    pub failures: Vec<TransferFailure>,
    pub summary: Summary,
    /// Set when discovery stopped early (cancellation or an unrecoverable error)
    pub aborted: Option<Error>,
}

impl RunResult {
    #[must_use]
    pub fn status(&self) -> Status {
        match &self.aborted {
            Some(error) => Status::from_error(error),
            None if self.failures.is_empty() => Status::Success,
            None => Status::CompletedWithErrors,
        }
    }

    /// Human readable list of failed copies; empty when there were none.
    #[must_use]
    pub fn failure_report(&self) -> String {
        if self.failures.is_empty() {
            return String::new();
        }
        let mut report = format!(
            "=== Transfer Error Summary ===\n{} copies failed\n",
            self.failures.len()
        );
        for failure in &self.failures {
            report.push_str(&format!(
                "\nFile: {}\nDestination: {}\nError: {:#}\n",
                failure.source_path.display(),
                failure.destination,
                failure.cause
            ));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(path: &str) -> TransferFailure {
        TransferFailure {
            source_path: path.into(),
            destination: "storage".to_string(),
            cause: anyhow::anyhow!("connection reset").context("failed writing \"x\""),
        }
    }

    #[test]
    fn status_and_exit_codes() {
        let mut result = RunResult {
            failures: Vec::new(),
            summary: Summary::default(),
            aborted: None,
        };
        assert_eq!(result.status(), Status::Success);
        assert_eq!(result.status().exit_code(), 0);
        result.failures.push(failure("/card/IMG_001.jpg"));
        assert_eq!(result.status(), Status::CompletedWithErrors);
        assert_eq!(result.status().exit_code(), 2);
        result.aborted = Some(Error::Cancelled);
        assert_eq!(result.status().exit_code(), 130);
        result.aborted = Some(Error::WorkersGone);
        assert_eq!(result.status(), Status::Failed);
        assert_eq!(result.status().exit_code(), 1);
    }

    #[test]
    fn failure_report_lists_every_failure() {
        let result = RunResult {
            failures: vec![failure("/card/IMG_001.jpg"), failure("/card/IMG_002.jpg")],
            summary: Summary::default(),
            aborted: None,
        };
        let report = result.failure_report();
        assert!(report.starts_with("=== Transfer Error Summary ==="));
        assert!(report.contains("2 copies failed"));
        assert!(report.contains("File: /card/IMG_002.jpg"));
        assert!(report.contains("Error: failed writing \"x\": connection reset"));
    }

    #[test]
    fn summary_display() {
        let mut summary = Summary {
            files_discovered: 3,
            destinations: 2,
            copies_completed: 6,
            bytes_copied: 2048,
            duration: std::time::Duration::from_millis(63_400),
            ..Default::default()
        };
        summary.date_folders.insert("2025-01-15".to_string(), 2);
        summary.date_folders.insert("2025-01-16".to_string(), 1);
        let text = summary.to_string();
        assert!(text.contains("files discovered: 3"));
        assert!(text.contains("  2025-01-15: 2"));
        assert!(text.contains("copies completed: 6"));
        assert!(text.contains("duration: 1m 3s"));
    }
}
