//! Transfer counters and the optional progress bar

#[derive(Debug, Default)]
pub struct Counter {
    count: std::sync::atomic::AtomicU64,
}

impl Counter {
    pub fn add(&self, value: u64) {
        self.count
            .fetch_add(value, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn get(&self) -> u64 {
        self.count.load(std::sync::atomic::Ordering::Relaxed)
    }
}

/// Counters updated by discovery and the workers of one run.
#[derive(Debug)]
pub struct Progress {
    /// Jobs handed to the queue
    pub files_queued: Counter,
    /// Jobs a worker finished with (all destinations attempted)
    pub jobs_finished: Counter,
    pub copies_completed: Counter,
    pub copies_failed: Counter,
    pub bytes_copied: Counter,
    pub directories_created: Counter,
    start_time: std::time::Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            files_queued: Default::default(),
            jobs_finished: Default::default(),
            copies_completed: Default::default(),
            copies_failed: Default::default(),
            bytes_copied: Default::default(),
            directories_created: Default::default(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn get_duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Jobs taken off the queue or still waiting in it.
    pub fn jobs_in_flight(&self) -> u64 {
        // read queued first so a concurrent finish can only make this smaller
        let queued = self.files_queued.get();
        queued.saturating_sub(self.jobs_finished.get())
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

fn progress_style() -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {wide_bar} {pos}/{len} copies {msg}",
    )
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
}

/// Draw a progress bar on stderr until `done` is cancelled.
///
/// The total grows as discovery queues files: every file is copied once per destination.
pub async fn run_progress_bar(
    progress: std::sync::Arc<Progress>,
    copies_per_file: u64,
    delay: std::time::Duration,
    done: tokio_util::sync::CancellationToken,
) {
    let bar = indicatif::ProgressBar::new(0);
    bar.set_style(progress_style());
    loop {
        let finished = tokio::select! {
            _ = done.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        bar.set_length(progress.files_queued.get() * copies_per_file);
        bar.set_position(progress.copies_completed.get() + progress.copies_failed.get());
        bar.set_message(format!(
            "({} failed, {})",
            progress.copies_failed.get(),
            bytesize::ByteSize(progress.bytes_copied.get())
        ));
        if finished {
            bar.finish();
            break;
        }
    }
}
