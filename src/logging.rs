use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn filter(debug: bool) -> EnvFilter {
    // Without debug we force `info` so a stray `RUST_LOG` cannot flood the
    // console during a long run.
    if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info")
    }
}

/// Initialise logging to stderr and, when `log_file` is given, to that file
/// as plain text. Calling it again is a no-op.
pub fn init(debug: bool, log_file: Option<PathBuf>) {
    let file_layer = log_file.and_then(|path| {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = path.file_name()?.to_owned();
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if FILE_GUARD.set(guard).is_err() {
            return None;
        }
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter(debug)),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter(debug)))
        .with(file_layer)
        .try_init();
}
