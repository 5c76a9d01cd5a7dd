//! Transfer jobs and the remote layout they map to
//!
//! Every discovered file becomes one [`TransferJob`] that lands at
//! `<base_path>/<organizing folder>/<YYYY-MM-DD>/<name>` on each destination.

/// Year-prefixed top-level folder of a run, e.g. `"2025 - Wedding"`.
#[must_use]
pub fn organizing_folder_name(name: &str, year: i32) -> String {
    format!("{year} - {}", name.trim())
}

#[must_use]
pub fn date_folder(timestamp: &chrono::NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub source_path: std::path::PathBuf,
    pub organizing_folder: std::sync::Arc<str>,
    /// Capture time (or modification time when the file carries none)
    pub timestamp: chrono::NaiveDateTime,
    /// File name at the destination, unique inside its date folder for this run
    pub remote_name: String,
}

impl TransferJob {
    #[must_use]
    pub fn remote_dir(&self, base_path: &str) -> String {
        remote::path::join(&[
            base_path,
            self.organizing_folder.as_ref(),
            date_folder(&self.timestamp).as_str(),
        ])
    }
    #[must_use]
    pub fn remote_path(&self, base_path: &str) -> String {
        remote::path::join(&[self.remote_dir(base_path).as_str(), self.remote_name.as_str()])
    }
}

fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        None | Some(0) => (name, ""),
        Some(pos) => name.split_at(pos),
    }
}

/// Hands out remote file names, renaming `IMG.jpg` to `IMG_1.jpg`, `IMG_2.jpg`, ... when two
/// files of a run land in the same date folder. Comparison ignores case.
#[derive(Debug, Default)]
pub struct NameRegistry {
    taken: std::collections::HashMap<String, std::collections::HashSet<String>>,
}

impl NameRegistry {
    pub fn reserve(&mut self, folder: &str, file_name: &str) -> String {
        let taken = self.taken.entry(folder.to_string()).or_default();
        let (stem, extension) = split_extension(file_name);
        let mut candidate = file_name.to_string();
        let mut counter = 1;
        while !taken.insert(candidate.to_lowercase()) {
            candidate = format!("{stem}_{counter}{extension}");
            counter += 1;
        }
        candidate
    }
}
