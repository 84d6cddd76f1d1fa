use std::{
    io::{self, Write},
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime, UtcOffset};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, format, FmtContext, FormatEvent, FormatFields, MakeWriter},
    field::MakeExt,
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

/// Targets too chatty to follow the configured level
const QUIET_TARGETS: [&str; 2] = ["tower_http", "hyper"];

/// Size at which the log file is rolled over
const LOG_FILE_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Rolled over files kept as `<log_file>.1` to `<log_file>.5`
const LOG_FILE_BACKUPS: usize = 5;

/// Initialize the logging system: stdout, plus a copy without colors in `log_file`.
///
/// The log file is rotated once it reaches 10 MiB, keeping 5 backups.
///
/// `offset` must have been read before any thread was spawned.
pub fn init_logging(level: Level, offset: UtcOffset, log_file: Option<&Path>) -> Result<()> {
    let filter = QUIET_TARGETS
        .into_iter()
        .fold(Targets::new().with_default(level), |filter, target| {
            filter.with_target(target, Level::WARN.min(level))
        });

    let stdout_layer = fmt::layer()
        .event_format(MyPrettyLogger::new(offset))
        .with_writer(std::io::stdout);

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .wrap_err("Could not create log directory")?;
            }
            let file = RotatingLogFile::open(path, LOG_FILE_MAX_BYTES, LOG_FILE_BACKUPS)
                .into_diagnostic()
                .wrap_err_with(|| format!("Could not open log file {}", path.display()))?;

            Some(
                fmt::layer()
                    .event_format(MyPrettyLogger::new(offset))
                    .fmt_fields(plain_fields())
                    .with_ansi(false)
                    .with_writer(file),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer.and_then(file_layer).with_filter(filter))
        .try_init()
        .into_diagnostic()
        .wrap_err("Setting default subscriber failed")
}

/// Size-rotated log file shared by every thread.
///
/// The appender buffers its writes: each event is flushed once written.
struct RotatingLogFile(Mutex<BasicRollingFileAppender>);

impl RotatingLogFile {
    fn open(path: &Path, max_bytes: u64, backups: usize) -> io::Result<Self> {
        let appender = BasicRollingFileAppender::new(
            path,
            RollingConditionBasic::new().max_size(max_bytes),
            backups,
        )?;
        Ok(Self(Mutex::new(appender)))
    }
}

impl<'a> MakeWriter<'a> for RotatingLogFile {
    type Writer = RotatingLogGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingLogGuard(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

struct RotatingLogGuard<'a>(MutexGuard<'a, BasicRollingFileAppender>);

impl Write for RotatingLogGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Drop for RotatingLogGuard<'_> {
    fn drop(&mut self) {
        // Nowhere to report a failure to write the log
        let _ = self.0.flush();
    }
}

/// Field formatter for the log file, kept apart from the stdout one
/// so span fields formatted with colors are not reused there
fn plain_fields() -> impl for<'w> FormatFields<'w> + 'static {
    format::debug_fn(|writer, field, value| {
        if field.name() == "message" {
            write!(writer, "{value:?}")
        } else {
            write!(writer, "{field}={value:?}")
        }
    })
    .delimited(" ")
}

/// Custom logger as the default ones are not as customizable as I want
struct MyPrettyLogger {
    offset: UtcOffset,
}

impl MyPrettyLogger {
    fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl<S, N> FormatEvent<S, N> for MyPrettyLogger
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
        let metadata = event.metadata();

        let now = OffsetDateTime::now_utc().to_offset(self.offset).time();
        let now = now.format(TIME_FORMAT).map_err(|_| std::fmt::Error)?;
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");

        if writer.has_ansi_escapes() {
            let level = match *metadata.level() {
                Level::ERROR => metadata.level().red().to_string(),
                Level::WARN => metadata.level().yellow().to_string(),
                Level::DEBUG => metadata.level().blue().to_string(),
                _ => metadata.level().green().to_string(),
            };

            write!(&mut writer, "{} {:>5} {} ", now, level, thread_name.yellow())?;
        } else {
            write!(&mut writer, "{} {:>5} {} ", now, metadata.level(), thread_name)?;
        }

        // Request span fields, outermost first
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<fmt::FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}
