//! Tracing subscriber setup: console formatter, file layer, and initialisation.
//!
//! The [`Logger`](super::Logger) tags its events with one of the targets
//! below.  Both outputs classify events by target through [`EventKind`] and
//! read the structured fields with [`EventFields`], so a per-file outcome or
//! the end of a progress run is rendered from its fields rather than from a
//! pre-formatted message.
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;
use std::sync::Mutex;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target used for stage headers.
pub(super) const STAGE_TARGET: &str = "localdeploy::stage";
/// Target used for dry-run action lines.
pub(super) const DRY_RUN_TARGET: &str = "localdeploy::dry_run";
/// Target used for per-file outcomes (`file`, `status`, `detail` fields).
pub(super) const FILE_TARGET: &str = "localdeploy::file";
/// Target used when a progress run ends (`units`, `total` fields).
pub(super) const PROGRESS_TARGET: &str = "localdeploy::progress";

/// What an event describes, derived from its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventKind {
    Stage,
    DryRun,
    File,
    Progress,
    Plain,
}

impl EventKind {
    fn of(target: &str) -> Self {
        match target {
            STAGE_TARGET => Self::Stage,
            DRY_RUN_TARGET => Self::DryRun,
            FILE_TARGET => Self::File,
            PROGRESS_TARGET => Self::Progress,
            _ => Self::Plain,
        }
    }
}

/// The fields of a [`tracing::Event`] the deployer emits.
#[derive(Debug, Default)]
struct EventFields {
    message: String,
    file: Option<String>,
    status: Option<String>,
    detail: Option<String>,
    units: Option<u64>,
    total: Option<u64>,
}

impl EventFields {
    fn from_event(event: &tracing::Event<'_>) -> Self {
        let mut fields = Self::default();
        event.record(&mut fields);
        fields
    }

    fn set_str(&mut self, name: &str, value: String) {
        match name {
            "message" => self.message = value,
            "file" => self.file = Some(value),
            "status" => self.status = Some(value),
            "detail" if !value.is_empty() => self.detail = Some(value),
            _ => {}
        }
    }

    /// `name (detail)` for file outcomes.
    fn file_label(&self) -> String {
        let mut label = self.file.clone().unwrap_or_default();
        if let Some(detail) = &self.detail {
            write!(label, " ({detail})").ok();
        }
        label
    }

    /// `done/total units`, plus `(incomplete)` when the run stopped short.
    fn progress_label(&self) -> String {
        let units = self.units.unwrap_or_default();
        let total = self.total.unwrap_or_default();
        if units < total {
            format!("{units}/{total} units (incomplete)")
        } else {
            format!("{units}/{total} units")
        }
    }
}

impl tracing::field::Visit for EventFields {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.set_str(field.name(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.set_str(field.name(), value.to_string());
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        match field.name() {
            "units" => self.units = Some(value),
            "total" => self.total = Some(value),
            name => self.set_str(name, value.to_string()),
        }
    }
}

/// Render one log-file line (without the timestamp prefix).
fn file_line(level: tracing::Level, kind: EventKind, fields: &EventFields) -> String {
    let msg = strip_ansi(&fields.message);
    match (level, kind) {
        (_, EventKind::File) => format!(
            "    [{}] {}",
            fields.status.as_deref().unwrap_or("file"),
            fields.file_label()
        ),
        (_, EventKind::Progress) => format!("    [progress] {}", fields.progress_label()),
        (tracing::Level::INFO, EventKind::Stage) => format!("==> {msg}"),
        (tracing::Level::INFO, EventKind::DryRun) => format!("    [DRY RUN] {msg}"),
        (tracing::Level::ERROR, _) => format!("    [error] {msg}"),
        (tracing::Level::WARN, _) => format!("    [warn] {msg}"),
        (tracing::Level::DEBUG | tracing::Level::TRACE, _) => format!("    [debug] {msg}"),
        _ => format!("    {msg}"),
    }
}

/// A [`tracing_subscriber::Layer`] that appends all events to the persistent
/// log file with timestamps and ANSI codes stripped.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open the log file for `command` under the cache directory.
    ///
    /// Returns `None` if the cache directory cannot be created or the file
    /// cannot be opened.
    pub(super) fn new(command: &str) -> Option<Self> {
        Self::at(&log_file_path(command)?, command)
    }

    /// Truncate `path`, write a header naming `command`, and return a layer
    /// appending to it.
    pub(super) fn at(path: &Path, command: &str) -> Option<Self> {
        let version = option_env!("LOCALDEPLOY_VERSION")
            .unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        let header = format!(
            "# localdeploy {version} {command} started {}\n",
            format_utc_datetime(),
        );
        fs::write(path, header).ok()?;
        let file = fs::OpenOptions::new().append(true).open(path).ok()?;
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
        let kind = EventKind::of(metadata.target());
        let line = file_line(*metadata.level(), kind, &EventFields::from_event(event));

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "[{}] {line}", format_utc_time()).ok();
        }
    }
}

/// Console formatter: `==>` stage headers, `[DRY RUN]` tags, colored levels.
///
/// File outcomes and progress records arrive at DEBUG, so they only reach
/// the console with `-v`.
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
        let fields = EventFields::from_event(event);
        let msg = &fields.message;

        match (*metadata.level(), EventKind::of(metadata.target())) {
            (tracing::Level::ERROR, _) => writeln!(writer, "\x1b[31mERROR\x1b[0m {msg}"),
            (tracing::Level::WARN, _) => writeln!(writer, "\x1b[33mWARN\x1b[0m  {msg}"),
            (_, EventKind::File) => writeln!(
                writer,
                "  \x1b[2m{:<13} {}\x1b[0m",
                fields.status.as_deref().unwrap_or_default(),
                fields.file_label()
            ),
            (_, EventKind::Progress) => {
                writeln!(writer, "  \x1b[2mprogress {}\x1b[0m", fields.progress_label())
            }
            (tracing::Level::INFO, EventKind::Stage) => {
                writeln!(writer, "\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m")
            }
            (tracing::Level::INFO, EventKind::DryRun) => {
                writeln!(writer, "  \x1b[33m[DRY RUN]\x1b[0m {msg}")
            }
            (tracing::Level::INFO, _) => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// Console output goes to stdout (INFO and below) and stderr (WARN and
/// above); every event at DEBUG and above is also appended to
/// `$XDG_CACHE_HOME/localdeploy/<command>.log`.
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(verbose: bool, command: &str) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(tracing::Level::WARN)
        .and(std::io::stdout.with_min_level(tracing::Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormatter)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(command).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn fields(message: &str) -> EventFields {
        EventFields {
            message: message.to_string(),
            ..EventFields::default()
        }
    }

    #[test]
    fn targets_map_to_kinds() {
        assert_eq!(EventKind::of(STAGE_TARGET), EventKind::Stage);
        assert_eq!(EventKind::of(FILE_TARGET), EventKind::File);
        assert_eq!(EventKind::of(PROGRESS_TARGET), EventKind::Progress);
        assert_eq!(EventKind::of("localdeploy_cli::deploy"), EventKind::Plain);
    }

    #[test]
    fn file_outcome_line_uses_fields() {
        let skipped = EventFields {
            file: Some("src/a.txt".into()),
            status: Some("skipped".into()),
            detail: Some("same age".into()),
            ..EventFields::default()
        };
        assert_eq!(
            file_line(Level::DEBUG, EventKind::File, &skipped),
            "    [skipped] src/a.txt (same age)"
        );

        let copied = EventFields {
            file: Some("b".into()),
            status: Some("copied".into()),
            ..EventFields::default()
        };
        assert_eq!(file_line(Level::DEBUG, EventKind::File, &copied), "    [copied] b");
    }

    #[test]
    fn progress_line_flags_incomplete_runs() {
        let mut record = EventFields {
            units: Some(1000),
            total: Some(1000),
            ..EventFields::default()
        };
        assert_eq!(
            file_line(Level::DEBUG, EventKind::Progress, &record),
            "    [progress] 1000/1000 units"
        );
        record.units = Some(600);
        assert_eq!(
            file_line(Level::DEBUG, EventKind::Progress, &record),
            "    [progress] 600/1000 units (incomplete)"
        );
    }

    #[test]
    fn message_lines_by_level_and_kind() {
        assert_eq!(
            file_line(Level::INFO, EventKind::DryRun, &fields("would copy a")),
            "    [DRY RUN] would copy a"
        );
        assert_eq!(
            file_line(Level::INFO, EventKind::Stage, &fields("Copy")),
            "==> Copy"
        );
        assert_eq!(
            file_line(Level::WARN, EventKind::Plain, &fields("\x1b[33mhm\x1b[0m")),
            "    [warn] hm"
        );
        assert_eq!(
            file_line(Level::INFO, EventKind::Plain, &fields("done")),
            "    done"
        );
    }

    #[test]
    fn empty_detail_is_ignored() {
        let mut record = EventFields::default();
        record.set_str("file", "a".into());
        record.set_str("detail", String::new());
        assert_eq!(record.file_label(), "a");
    }
}
