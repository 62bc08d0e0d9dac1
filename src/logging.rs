//! Logging setup.
//!
//! One `tracing` registry with two layers: a per-run log file under the configured
//! directory and the console. Installed once at process start; a second call fails
//! with `LoggingError::AlreadyInitialized`.
//!
//! File lines read `[2020-04-15 19:14:35] INFO    : message`, console lines
//! `INFO    : message`.

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::time::{ChronoLocal, FormatTime};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter};

const FILE_TIME_FORMAT: &str = "[%Y-%m-%d %H:%M:%S]";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Logging is already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub log_dir: PathBuf,
    /// DEBUG in the log file instead of INFO
    pub verbose: bool,
}

/// Sinks installed by [`init`]
#[derive(Debug)]
pub struct LoggingGuard {
    log_file: PathBuf,
    file_filter: String,
}

impl LoggingGuard {
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    pub fn file_filter(&self) -> &str {
        &self.file_filter
    }
}

/// Event layout shared by both sinks: optional timestamp, level padded to 8, colon, message
pub struct LineFormat {
    timer: Option<ChronoLocal>,
}

impl LineFormat {
    pub fn file() -> Self {
        Self {
            timer: Some(ChronoLocal::new(FILE_TIME_FORMAT.to_string())),
        }
    }

    pub fn console() -> Self {
        Self { timer: None }
    }
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARNING",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        if let Some(timer) = &self.timer {
            timer.format_time(&mut writer)?;
            writer.write_char(' ')?;
        }
        write!(writer, "{:<8}: ", level_name(event.metadata().level()))?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `alpha-YYYYmmddHHMMSS.log`
pub fn log_file_name(now: DateTime<Local>) -> String {
    now.format("alpha-%Y%m%d%H%M%S.log").to_string()
}

/// Filter directives for the log file. `RUST_LOG` wins when set.
pub fn file_directives(verbose: bool) -> String {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => directives,
        _ if verbose => "alpha_trading=debug,sqlx=debug".to_string(),
        _ => "alpha_trading=info,sqlx=warn".to_string(),
    }
}

pub fn init(settings: &LogSettings) -> Result<LoggingGuard, LoggingError> {
    let log_file = settings.log_dir.join(log_file_name(Local::now()));
    let file = std::fs::create_dir_all(&settings.log_dir)
        .and_then(|_| File::create(&log_file))
        .map_err(|source| LoggingError::LogFile {
            path: log_file.clone(),
            source,
        })?;

    let directives = file_directives(settings.verbose);
    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .event_format(LineFormat::file())
        .with_filter(EnvFilter::new(&directives));

    let console_layer = fmt::layer()
        .event_format(LineFormat::console())
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    Ok(LoggingGuard {
        log_file,
        file_filter: directives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io;
    use std::sync::Arc;

    /// In-memory sink for formatted lines
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture(format: LineFormat, emit: impl FnOnce()) -> String {
        let sink = Captured::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_ansi(false)
                .event_format(format)
                .with_writer(move || writer.clone()),
        );
        tracing::subscriber::with_default(subscriber, emit);
        sink.text()
    }

    #[test]
    fn test_console_line_format() {
        let text = capture(LineFormat::console(), || {
            tracing::info!("NFLX Profit:");
            tracing::warn!("careful");
        });
        assert_eq!(text, "INFO    : NFLX Profit:\nWARNING : careful\n");
    }

    #[test]
    fn test_file_line_format() {
        let text = capture(LineFormat::file(), || tracing::error!("boom"));

        // [YYYY-mm-dd HH:MM:SS] ERROR   : boom
        assert!(text.starts_with('['), "{}", text);
        assert_eq!(&text[20..], "] ERROR   : boom\n");
    }

    #[test]
    fn test_log_file_name() {
        let now = Local.with_ymd_and_hms(2020, 4, 15, 9, 5, 7).unwrap();
        assert_eq!(log_file_name(now), "alpha-20200415090507.log");
    }

    #[test]
    fn test_init_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            log_dir: dir.path().join("logs"),
            verbose: true,
        };

        let guard = init(&settings).unwrap();
        assert!(guard.log_file().starts_with(dir.path().join("logs")));
        assert!(guard.log_file().exists());

        tracing::info!("written to the log file");

        assert!(matches!(
            init(&settings),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_unwritable_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let settings = LogSettings {
            log_dir: blocker.join("logs"),
            verbose: false,
        };
        assert!(matches!(init(&settings), Err(LoggingError::LogFile { .. })));
    }
}
