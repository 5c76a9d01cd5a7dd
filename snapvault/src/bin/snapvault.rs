use chrono::Datelike;
use clap::Parser;
use tracing::instrument;

use snapvault::{Config, RunResult, Settings, Status};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "snapvault",
    version,
    about = "Copy photos from a memory card to several network shares, organized by capture date",
    long_about = "`snapvault` copies every photo under a source directory to each destination listed in the configuration file.

Files are stored as `<base_path>/<year> - <name>/<YYYY-MM-DD>/<file>` where the date is the EXIF capture date (or the file's modification time when there is none). Destinations are written in parallel by a pool of workers, each with its own connection to every destination.

EXIT STATUS:
    0    all files copied to all destinations
    1    the transfer could not run (configuration, source or connection problems)
    2    the transfer finished but some copies failed
    130  the transfer was interrupted

EXAMPLES:
    # Copy a memory card to all configured shares
    snapvault --source /media/card --name \"Smith Wedding\" --progress

    # Only copy to one destination, with 8 workers
    snapvault -s /media/card -n Portraits -d storage --workers 8

    # Show what would be written without touching the shares
    snapvault -s /media/card -n Portraits --dry-run"
)]
struct Args {
    // Transfer options
    /// Directory to copy photos from (e.g. the memory card mount point)
    #[arg(short, long, value_name = "DIR", help_heading = "Transfer options")]
    source: std::path::PathBuf,

    /// Photoshoot name; files are stored under "<year> - <name>"
    #[arg(short, long, help_heading = "Transfer options")]
    name: String,

    /// Destinations configuration file
    #[arg(
        short,
        long,
        default_value = "config.yaml",
        value_name = "PATH",
        help_heading = "Transfer options"
    )]
    config: std::path::PathBuf,

    /// Only copy to the named destination; may be repeated
    #[arg(
        short = 'd',
        long = "destination",
        value_name = "NAME",
        help_heading = "Transfer options"
    )]
    destinations: Vec<String>,

    /// Show the files that would be written without writing anything
    #[arg(long, help_heading = "Transfer options")]
    dry_run: bool,

    // Performance
    /// Number of parallel transfer workers
    #[arg(
        short,
        long,
        default_value = "4",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..),
        help_heading = "Performance"
    )]
    workers: u32,

    /// Number of files that may wait for a worker (default: number of workers)
    #[arg(long, value_name = "N", help_heading = "Performance")]
    queue_capacity: Option<usize>,

    /// Connection timeout per destination session
    ///
    /// Accepts human-readable durations like "30s", "2min".
    #[arg(
        long,
        default_value = "30s",
        value_name = "DURATION",
        value_parser = humantime::parse_duration,
        help_heading = "Performance"
    )]
    timeout: std::time::Duration,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: WARN)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, only report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    /// Also write logs to this file
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "log_dir",
        help_heading = "Progress & output"
    )]
    log_file: Option<std::path::PathBuf>,

    /// Also write logs to a new timestamped file in this directory
    #[arg(long, value_name = "DIR", help_heading = "Progress & output")]
    log_dir: Option<std::path::PathBuf>,

    // Advanced settings
    /// Number of runtime worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,
}

fn report(result: &RunResult) {
    println!("{}", result.summary);
    if !result.failures.is_empty() {
        tracing::warn!(
            "transfer completed with {} failed copies",
            result.failures.len()
        );
        println!("\n{}", result.failure_report());
    }
}

fn print_planned(
    connector: &remote::memory::MemoryConnector,
    destinations: &[snapvault::DestinationConfig],
) {
    for destination in destinations {
        for (path, size) in connector.files(&destination.host, &destination.share) {
            println!(
                "[dry run] {}: {} ({})",
                destination.id(),
                path,
                bytesize::ByteSize(size)
            );
        }
    }
}

#[instrument(skip(config, notifier))]
async fn transfer(
    args: &Args,
    config: &Config,
    folder: &str,
    notifier: &snapvault::notify::Notifier,
) -> Result<RunResult, snapvault::Error> {
    let destinations = config.select(&args.destinations)?;
    tracing::info!(
        "transferring {:?} into {:?} on {} destinations",
        args.source,
        folder,
        destinations.len()
    );
    notifier.started(folder, &args.source).await;
    let workers = args.workers as usize;
    let settings = Settings {
        workers,
        queue_capacity: args.queue_capacity.unwrap_or(workers),
        connect_timeout: args.timeout,
        ..Default::default()
    };
    let dry_run = args
        .dry_run
        .then(remote::memory::MemoryConnector::sizes_only);
    let connector: std::sync::Arc<dyn remote::Connector> = match &dry_run {
        Some(memory) => std::sync::Arc::new(memory.clone()),
        None => std::sync::Arc::new(remote::mounted::MountedConnector::new()),
    };
    let pipeline = snapvault::Pipeline::new(connector);
    let cancel = tokio_util::sync::CancellationToken::new();
    let listener = snapvault::interrupt::listen(cancel.clone());
    let progress_done = tokio_util::sync::CancellationToken::new();
    let progress_task = args.progress.then(|| {
        tokio::spawn(common::progress::run_progress_bar(
            pipeline.progress().clone(),
            destinations.len() as u64,
            std::time::Duration::from_millis(200),
            progress_done.clone(),
        ))
    });
    let result = pipeline
        .run(&args.source, folder, &destinations, &settings, &cancel)
        .await;
    progress_done.cancel();
    let progress_outcome = match progress_task {
        Some(task) => task.await,
        None => Ok(()),
    };
    if let Err(error) = progress_outcome {
        tracing::debug!("progress bar task failed: {}", error);
    }
    listener.abort();
    if let (Some(memory), Ok(_)) = (&dry_run, &result) {
        print_planned(memory, &destinations);
    }
    result
}

async fn async_main(args: Args) -> Status {
    let name = args.name.trim();
    if name.is_empty() {
        tracing::error!("photoshoot name cannot be empty");
        return Status::Failed;
    }
    let config = match Config::load(&args.config).await {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("{}", error.display_chain());
            return Status::Failed;
        }
    };
    let webhook_url = if args.dry_run {
        tracing::debug!("dry run, notifications disabled");
        None
    } else {
        config.notify.webhook_url.as_deref()
    };
    let notifier = snapvault::notify::Notifier::new(webhook_url);
    let folder = snapvault::organizing_folder_name(name, chrono::Local::now().year());
    match transfer(&args, &config, &folder, &notifier).await {
        Ok(result) => {
            report(&result);
            match &result.aborted {
                Some(error) if error.is_cancelled() => {
                    tracing::warn!("transfer interrupted, some files were not copied");
                }
                Some(error) => tracing::error!("transfer aborted: {}", error.display_chain()),
                None => {}
            }
            notifier.finished(&folder, &result).await;
            result.status()
        }
        Err(error) => {
            let status = Status::from_error(&error);
            if status == Status::Cancelled {
                tracing::warn!("transfer interrupted before it started");
            } else {
                tracing::error!("{}", error.display_chain());
            }
            notifier.failed(&folder, &error.display_chain()).await;
            status
        }
    }
}

fn main() -> std::process::ExitCode {
    // usage errors exit with 1, leaving 2 to mean "completed with failed copies"
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            if let Err(print_error) = error.print() {
                eprintln!("snapvault: {print_error}");
            }
            return if error.use_stderr() {
                std::process::ExitCode::from(Status::Failed.exit_code())
            } else {
                std::process::ExitCode::SUCCESS
            };
        }
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: 0,
    };
    let tracing = match (&args.log_file, &args.log_dir) {
        (Some(file), _) => common::TracingConfig {
            log_file: Some(file.clone()),
        },
        (None, Some(dir)) => {
            common::TracingConfig::in_directory(dir, chrono::Local::now().naive_local())
        }
        (None, None) => common::TracingConfig::default(),
    };
    match common::run(&output, &runtime, &tracing, || async_main(args)) {
        Ok(status) => std::process::ExitCode::from(status.exit_code()),
        Err(error) => {
            eprintln!("snapvault: {error:#}");
            std::process::ExitCode::from(Status::Failed.exit_code())
        }
    }
}
