use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing_subscriber::fmt::MakeWriter;

use tracklink_core::Config;
use tracklink_sync::{pipeline, PassOptions, PassSummary};

use crate::error::{io_err, DaemonError};
use crate::log_rotation;
use crate::paths::{log_path, logs_dir, run_dir};
use crate::state::{write_last_pass_at, LastPass};

/// Everything `tracklink daemon` needs to run.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub home: PathBuf,
    pub config: Config,
    /// Pause between the end of one pass and the start of the next.
    pub interval: Duration,
    /// Log to `~/.tracklink/logs/tracklink.log` instead of stderr.
    pub log_to_file: bool,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(options: DaemonOptions) -> Result<(), DaemonError> {
    init_tracing(options.log_to_file.then(|| log_path(&options.home)));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(options))
}

/// Run passes until ctrl-c.
pub async fn run(options: DaemonOptions) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&options.home)?;
    tracing::info!(
        interval_secs = options.interval.as_secs(),
        store = %options.config.store_path.display(),
        "daemon started"
    );

    // Listen from the start so a ctrl-c during a pass is seen once it ends.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received ctrl-c, stopping after the current pass"),
            Err(err) => tracing::warn!(error = %err, "ctrl-c handler failed, stopping"),
        }
        let _ = stop_tx.send(());
    });

    let config = Arc::new(options.config);
    let pass = move || {
        pipeline::run_once(&config, PassOptions::default())
            .map(|report| report.summary())
            .map_err(|err| err.to_string())
    };

    let passes = run_loop(
        &options.home,
        options.interval,
        options.log_to_file,
        pass,
        async move {
            let _ = stop_rx.await;
        },
    )
    .await?;
    tracing::info!(passes, "daemon stopped");
    Ok(())
}

/// Call `pass` on a blocking thread, record its outcome, sleep, repeat.
///
/// `shutdown` is only observed between passes. Returns the number of passes run.
pub async fn run_loop<F, S>(
    home: &Path,
    interval: Duration,
    rotate_logs: bool,
    pass: F,
    shutdown: S,
) -> Result<usize, DaemonError>
where
    F: Fn() -> Result<PassSummary, String> + Clone + Send + 'static,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut passes = 0usize;

    loop {
        if rotate_logs {
            log_rotation::rotate_log(home);
        }

        let started = Instant::now();
        let job = pass.clone();
        let result = tokio::task::spawn_blocking(move || job())
            .await
            .map_err(|err| DaemonError::Join(err.to_string()))?;
        passes += 1;

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let last = match result {
            Ok(summary) => {
                tracing::info!(
                    created = summary.created,
                    propagated = summary.propagated,
                    failed = summary.failed,
                    duration_ms,
                    "pass complete"
                );
                LastPass {
                    finished_at: Utc::now(),
                    duration_ms,
                    summary: Some(summary),
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!(error = %error, "pass aborted, retrying after the interval");
                LastPass {
                    finished_at: Utc::now(),
                    duration_ms,
                    summary: None,
                    error: Some(error),
                }
            }
        };
        if let Err(err) = write_last_pass_at(home, &last) {
            tracing::warn!(error = %err, "could not record last pass");
        }

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    Ok(passes)
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    for dir in [run_dir(home), logs_dir(home)] {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
    }
    Ok(())
}

/// Install the global subscriber: `RUST_LOG` filter (default `info`), to
/// stderr or appended to `log_file`. A second call is a no-op.
pub fn init_tracing(log_file: Option<PathBuf>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                let _ = fs::create_dir_all(dir);
            }
            builder
                .with_ansi(false)
                .with_writer(AppendFile(path))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}

/// Opens the log path per event so rotation never leaves a stale handle.
struct AppendFile(PathBuf);

impl<'a> MakeWriter<'a> for AppendFile {
    type Writer = Box<dyn Write + 'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match fs::OpenOptions::new().create(true).append(true).open(&self.0) {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(std::io::sink()),
        }
    }
}
