//! Capture timestamps
//!
//! Photos are filed under the date they were taken: the EXIF `DateTimeOriginal` tag, then
//! `DateTime`, and the file's modification time (local time) when neither is present or readable.

use anyhow::{Context, anyhow};

/// Reads the capture time of a file.
///
/// Called on the blocking thread pool.
pub trait Extractor: Send + Sync {
    fn timestamp(&self, path: &std::path::Path) -> anyhow::Result<chrono::NaiveDateTime>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

fn from_exif(datetime: &exif::DateTime) -> anyhow::Result<chrono::NaiveDateTime> {
    chrono::NaiveDate::from_ymd_opt(
        i32::from(datetime.year),
        u32::from(datetime.month),
        u32::from(datetime.day),
    )
    .and_then(|date| {
        date.and_hms_opt(
            u32::from(datetime.hour),
            u32::from(datetime.minute),
            u32::from(datetime.second),
        )
    })
    .ok_or_else(|| anyhow!("invalid EXIF date {:?}", datetime))
}

impl Extractor for ExifExtractor {
    fn timestamp(&self, path: &std::path::Path) -> anyhow::Result<chrono::NaiveDateTime> {
        let file = std::fs::File::open(path).with_context(|| format!("failed opening {path:?}"))?;
        let mut reader = std::io::BufReader::new(file);
        let exif = exif::Reader::new()
            .read_from_container(&mut reader)
            .with_context(|| format!("no EXIF data in {path:?}"))?;
        for tag in [exif::Tag::DateTimeOriginal, exif::Tag::DateTime] {
            let Some(field) = exif.get_field(tag, exif::In::PRIMARY) else {
                continue;
            };
            let datetime = match &field.value {
                exif::Value::Ascii(values) => values
                    .first()
                    .and_then(|raw| exif::DateTime::from_ascii(raw).ok()),
                _ => None,
            };
            if let Some(datetime) = datetime {
                return from_exif(&datetime);
            }
        }
        Err(anyhow!("no capture date in EXIF data of {:?}", path))
    }
}

fn modification_time(modified: Option<std::time::SystemTime>) -> chrono::NaiveDateTime {
    let modified = modified.unwrap_or_else(std::time::SystemTime::now);
    chrono::DateTime::<chrono::Local>::from(modified).naive_local()
}

/// Capture time of `path`, falling back to `modified`.
pub(crate) async fn resolve(
    extractor: std::sync::Arc<dyn Extractor>,
    path: &std::path::Path,
    modified: Option<std::time::SystemTime>,
) -> chrono::NaiveDateTime {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || extractor.timestamp(&owned)).await {
        Ok(Ok(timestamp)) => timestamp,
        Ok(Err(error)) => {
            tracing::debug!("using modification time for {:?}: {:#}", path, error);
            modification_time(modified)
        }
        Err(error) => {
            tracing::warn!(
                "timestamp extraction for {:?} failed, using modification time: {}",
                path,
                error
            );
            modification_time(modified)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(chrono::NaiveDateTime);

    impl Extractor for Fixed {
        fn timestamp(&self, _: &std::path::Path) -> anyhow::Result<chrono::NaiveDateTime> {
            Ok(self.0)
        }
    }

    #[test]
    fn converts_exif_dates() {
        let datetime = exif::DateTime::from_ascii(b"2025:01:15 14:30:05").unwrap();
        assert_eq!(
            from_exif(&datetime).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(14, 30, 5)
                .unwrap()
        );
    }

    #[test]
    fn files_without_exif_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_001.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();
        assert!(ExifExtractor.timestamp(&path).is_err());
        assert!(ExifExtractor.timestamp(&dir.path().join("missing.jpg")).is_err());
    }

    #[tokio::test]
    async fn resolve_prefers_extracted_time() {
        let taken = chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let resolved = resolve(
            std::sync::Arc::new(Fixed(taken)),
            std::path::Path::new("IMG.jpg"),
            Some(std::time::SystemTime::UNIX_EPOCH),
        )
        .await;
        assert_eq!(resolved, taken);
    }

    #[tokio::test]
    async fn resolve_falls_back_to_modification_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("IMG_002.png");
        std::fs::write(&path, b"png").unwrap();
        let modified = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_736_942_400);
        let resolved = resolve(std::sync::Arc::new(ExifExtractor), &path, Some(modified)).await;
        assert_eq!(
            resolved,
            chrono::DateTime::<chrono::Local>::from(modified).naive_local()
        );
    }
}
