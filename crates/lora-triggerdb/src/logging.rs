use std::path::PathBuf;

use once_cell::sync::OnceCell;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, prelude::*};

/// File name prefix of the daily log under the log directory.
pub const LOG_FILE_NAME: &str = "lora-triggerdb.log";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
    Pretty,
    Full,
}

impl LogFormat {
    /// JSON wins over compact, compact over pretty; none set means full.
    pub fn from_flags(json: bool, compact: bool, pretty: bool) -> Self {
        if json {
            LogFormat::Json
        } else if compact {
            LogFormat::Compact
        } else if pretty {
            LogFormat::Pretty
        } else {
            LogFormat::Full
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub filter: String,
    pub format: LogFormat,
    pub to_file: bool,
    pub dir: PathBuf,
}

fn fmt_layer<W>(writer: W, ansi: bool, format: LogFormat) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = tracing_subscriber::fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_ansi(ansi)
        .with_writer(writer);
    match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Full => base.boxed(),
    }
}

/// Install the global subscriber: stderr plus an optional daily file.
/// A second call is a no-op.
pub fn init_tracing(opts: &LoggingOptions) {
    let filter = EnvFilter::try_new(&opts.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(std::io::stderr, true, opts.format)];
    let mut deferred_warning = None;
    if opts.to_file {
        match std::fs::create_dir_all(&opts.dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(&opts.dir, LOG_FILE_NAME);
                let (nb, guard) = tracing_appender::non_blocking(appender);
                if FILE_GUARD.set(guard).is_ok() {
                    layers.push(fmt_layer(nb, false, opts.format));
                }
            }
            Err(e) => {
                deferred_warning = Some(format!(
                    "failed to create log dir {}: {}",
                    opts.dir.display(),
                    e
                ));
            }
        }
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(filter);
    if let Err(e) = subscriber.try_init() {
        tracing::debug!("tracing already set: {:?}", e);
    }
    if let Some(msg) = deferred_warning {
        tracing::warn!("{}", msg);
    }
}
