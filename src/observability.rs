//! Observer hooks for discovery and sync outcomes.
//!
//! A [`Telemetry`] handle (an observer plus an alert threshold) is passed explicitly to
//! [`crate::catalog::discover`] and [`crate::sync::sync`]; nothing in the library reaches for
//! global logging state except through [`TracingObserver`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use std::{fmt, io};

use crate::error::TapError;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TapSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (I/O or transport failures).
    Critical,
}

impl TapSeverity {
    /// Severity of a failure.
    pub fn for_error(e: &TapError) -> Self {
        match e {
            TapError::Io(_) | TapError::Http(_) => Self::Critical,
            TapError::Api { status, .. } if *status == 401 || *status == 403 => Self::Critical,
            TapError::Api { .. } | TapError::Json(_) | TapError::Config { .. } | TapError::Catalog { .. } => {
                Self::Error
            }
        }
    }
}

/// Which phase produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapPhase {
    /// Schema inference.
    Discover,
    /// Record emission.
    Sync,
}

/// Context about the stream being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamContext {
    /// Phase the event belongs to.
    pub phase: TapPhase,
    /// Remote table name.
    pub table: String,
    /// Stream identifier (normalized table name).
    pub stream: String,
}

/// Stats reported when a stream finishes a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    /// Rows read from the source.
    pub rows: usize,
    /// Schema properties (discovery) or record messages written (sync).
    pub emitted: usize,
}

/// Observer interface for tap outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait TapObserver: Send + Sync {
    /// Called when a stream starts a phase.
    fn on_start(&self, _ctx: &StreamContext) {}

    /// Called when a stream finishes a phase.
    fn on_success(&self, _ctx: &StreamContext, _stats: StreamStats) {}

    /// Called when a stream fails.
    fn on_failure(&self, _ctx: &StreamContext, _severity: TapSeverity, _error: &TapError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl TapObserver for NoopObserver {}

/// Fans callbacks out to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn TapObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn TapObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl TapObserver for CompositeObserver {
    fn on_start(&self, ctx: &StreamContext) {
        for o in &self.observers {
            o.on_start(ctx);
        }
    }

    fn on_success(&self, ctx: &StreamContext, stats: StreamStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TapObserver for TracingObserver {
    fn on_start(&self, ctx: &StreamContext) {
        match ctx.phase {
            TapPhase::Discover => tracing::info!(stream = %ctx.stream, table = %ctx.table, "discovering stream"),
            TapPhase::Sync => tracing::info!(stream = %ctx.stream, table = %ctx.table, "syncing stream"),
        }
    }

    fn on_success(&self, ctx: &StreamContext, stats: StreamStats) {
        match ctx.phase {
            TapPhase::Discover => tracing::info!(
                stream = %ctx.stream,
                rows_sampled = stats.rows,
                properties = stats.emitted,
                "inferred schema"
            ),
            TapPhase::Sync => tracing::info!(
                stream = %ctx.stream,
                rows = stats.rows,
                records = stats.emitted,
                "finished syncing stream"
            ),
        }
    }

    fn on_failure(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        tracing::error!(
            phase = ?ctx.phase,
            stream = %ctx.stream,
            table = %ctx.table,
            severity = ?severity,
            error = %error,
            "stream failed"
        );
    }

    fn on_alert(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        tracing::error!(
            alert = true,
            phase = ?ctx.phase,
            stream = %ctx.stream,
            table = %ctx.table,
            severity = ?severity,
            error = %error,
            "stream failed"
        );
    }
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are logged at warn level.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        let res: io::Result<()> = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = res {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append event log");
        }
    }
}

impl TapObserver for FileObserver {
    fn on_success(&self, ctx: &StreamContext, stats: StreamStats) {
        self.append_line(&format!(
            "{} ok phase={:?} stream={} table={} rows={} emitted={}",
            unix_ts(),
            ctx.phase,
            ctx.stream,
            ctx.table,
            stats.rows,
            stats.emitted
        ));
    }

    fn on_failure(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        self.append_line(&format!(
            "{} fail severity={:?} phase={:?} stream={} table={} err={}",
            unix_ts(),
            severity,
            ctx.phase,
            ctx.stream,
            ctx.table,
            error
        ));
    }

    fn on_alert(&self, ctx: &StreamContext, severity: TapSeverity, error: &TapError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} phase={:?} stream={} table={} err={}",
            unix_ts(),
            severity,
            ctx.phase,
            ctx.stream,
            ctx.table,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Telemetry handle threaded through discovery and sync.
///
/// Wraps an observer together with the severity at which failures also raise an alert.
#[derive(Clone, Copy)]
pub struct Telemetry<'a> {
    observer: &'a dyn TapObserver,
    alert_at_or_above: TapSeverity,
}

impl<'a> Telemetry<'a> {
    /// Report to `observer`, alerting on [`TapSeverity::Critical`] failures.
    pub fn new(observer: &'a dyn TapObserver) -> Self {
        Self {
            observer,
            alert_at_or_above: TapSeverity::Critical,
        }
    }

    /// Change the alert threshold.
    pub fn with_alert_threshold(mut self, alert_at_or_above: TapSeverity) -> Self {
        self.alert_at_or_above = alert_at_or_above;
        self
    }

    /// Forward a phase start.
    pub fn start(&self, ctx: &StreamContext) {
        self.observer.on_start(ctx);
    }

    /// Forward a phase completion.
    pub fn success(&self, ctx: &StreamContext, stats: StreamStats) {
        self.observer.on_success(ctx, stats);
    }

    /// Report a failure, alerting when its severity meets the threshold.
    pub fn failure(&self, ctx: &StreamContext, error: &TapError) {
        let sev = TapSeverity::for_error(error);
        self.observer.on_failure(ctx, sev, error);
        if sev >= self.alert_at_or_above {
            self.observer.on_alert(ctx, sev, error);
        }
    }
}

impl fmt::Debug for Telemetry<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish_non_exhaustive()
    }
}
