//! Tracing subscriber setup: console formatter, file layer, and initialisation.
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "netrepair::stage";

/// Collects an event's message and its structured fields.
///
/// Engine code logs with fields (`path`, `files`, `passed`); they are
/// rendered after the message as `name=value`.
#[derive(Default)]
struct EventText {
    message: String,
    fields: Vec<(&'static str, String)>,
}

impl EventText {
    fn of(event: &tracing::Event<'_>) -> String {
        let mut text = Self::default();
        event.record(&mut text);
        text.fields
            .iter()
            .fold(text.message, |mut out, (name, value)| {
                let _ = write!(out, " {name}={value}");
                out
            })
    }
}

impl tracing::field::Visit for EventText {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }
}

/// Layer writing every event to the per-command log file, plain text with a
/// UTC time prefix. Filtered at `DEBUG` independently of the console.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log for `command` and write the run header.
    ///
    /// `None` when the cache directory or file is unusable; logging then
    /// goes to the console only.
    pub(super) fn new(command: &str) -> Option<Self> {
        let path = log_file_path(command)?;
        let version =
            option_env!("NETREPAIR_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "# netrepair {version} {command} started {} UTC\n",
            format_utc_datetime()
        );
        fs::write(&path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let msg = strip_ansi(&EventText::of(event));
        let ts = format_utc_time();

        let line = if metadata.target() == STAGE_TARGET {
            format!("{ts} ----- {msg}")
        } else {
            match *metadata.level() {
                tracing::Level::ERROR => format!("{ts} ERROR {msg}"),
                tracing::Level::WARN => format!("{ts} WARN  {msg}"),
                tracing::Level::INFO => format!("{ts} INFO  {msg}"),
                tracing::Level::DEBUG | tracing::Level::TRACE => {
                    format!("{ts} DEBUG {msg} [{}]", metadata.target())
                }
            }
        };

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] for netrepair console output.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let msg = EventText::of(event);

        if metadata.target() == STAGE_TARGET {
            return writeln!(writer, "\x1b[1;36m::\x1b[0m \x1b[1m{msg}\x1b[0m");
        }
        match *metadata.level() {
            tracing::Level::ERROR => writeln!(writer, "\x1b[1;31merror\x1b[0m: {msg}"),
            tracing::Level::WARN => writeln!(writer, "\x1b[1;33mwarning\x1b[0m: {msg}"),
            tracing::Level::INFO => writeln!(writer, "   {msg}"),
            tracing::Level::DEBUG | tracing::Level::TRACE => writeln!(writer, "   \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Console output goes to stdout (info) and stderr (warnings, errors);
/// `RUST_LOG` overrides the console level. Every event at `DEBUG` and
/// above is also appended to `$XDG_CACHE_HOME/netrepair/<command>.log`.
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let console_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_filter);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
