//! The diagnostic log: a severity-filtered ring buffer with shutdown hooks.
//!
//! # Concurrency note
//!
//! A `DiagnosticLog` is shared as `Arc<DiagnosticLog>` by every request
//! task. Appends and evictions happen under one `parking_lot::Mutex`, and
//! the sink renders while that lock is held, so the buffer (and the
//! console) reflect a single global order. The threshold is an atomic so
//! that filtering a message never takes a lock.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::panic::{self, AssertUnwindSafe, Location};
use std::process;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::Local;
use parking_lot::Mutex;

use crate::{ConsoleSink, Level, LogError, LogMessage, LogSink};

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

/// Settings fixed when the log is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    /// Minimum level that gets recorded.
    pub level: Level,

    /// Maximum number of retained messages. Must be at least 1.
    pub capacity: usize,

    /// Whether the sink may colorize the level label.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Trace,
            capacity: 32,
            color: true,
        }
    }
}

// ---------------------------------------------------------------------------
// DiagnosticLog
// ---------------------------------------------------------------------------

type ShutdownHook = Box<dyn FnOnce() + Send + 'static>;

/// Process-wide record of recent diagnostic messages.
///
/// ## Lifecycle
///
/// ```text
/// new() ──→ record()* ──→ fatal() ──→ shutdown hooks ──→ exit(1)
///              │
///              ▼
///        [ring buffer, oldest evicted first]
/// ```
///
/// The log is infrastructure: after construction none of its methods
/// return an error or panic at the caller. A message whose `Display`
/// implementation fails is kept with whatever text it produced, followed
/// by `<formatting error>`.
pub struct DiagnosticLog {
    level: AtomicU8,
    capacity: usize,
    color: bool,
    buffer: Mutex<VecDeque<LogMessage>>,
    hooks: Mutex<Vec<ShutdownHook>>,
    sink: Box<dyn LogSink>,
}

impl DiagnosticLog {
    /// Creates an empty log that renders to the console.
    ///
    /// # Errors
    /// Returns [`LogError::ZeroCapacity`] if `config.capacity` is 0.
    pub fn new(config: LogConfig) -> Result<Self, LogError> {
        Self::with_sink(config, ConsoleSink)
    }

    /// Creates an empty log that renders to the given sink.
    ///
    /// # Errors
    /// Returns [`LogError::ZeroCapacity`] if `config.capacity` is 0.
    pub fn with_sink(config: LogConfig, sink: impl LogSink) -> Result<Self, LogError> {
        if config.capacity == 0 {
            return Err(LogError::ZeroCapacity);
        }

        Ok(Self {
            level: AtomicU8::new(config.level as u8),
            capacity: config.capacity,
            color: config.color,
            buffer: Mutex::new(VecDeque::with_capacity(config.capacity)),
            hooks: Mutex::new(Vec::new()),
            sink: Box::new(sink),
        })
    }

    /// Current threshold.
    pub fn level(&self) -> Level {
        Level::from_u8(self.level.load(Ordering::Relaxed))
    }

    /// Replaces the threshold. Messages already in the buffer are kept.
    pub fn set_level(&self, level: Level) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    /// Maximum number of retained messages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of messages currently retained.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Returns `true` if nothing has been recorded (or everything was
    /// filtered).
    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }

    /// Returns `true` if a message at `level` would be recorded right now.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level()
    }

    pub fn is_trace(&self) -> bool {
        self.enabled(Level::Trace)
    }

    pub fn is_debug(&self) -> bool {
        self.enabled(Level::Debug)
    }

    pub fn is_info(&self) -> bool {
        self.enabled(Level::Info)
    }

    pub fn is_warn(&self) -> bool {
        self.enabled(Level::Warn)
    }

    pub fn is_error(&self) -> bool {
        self.enabled(Level::Error)
    }

    /// Records a message attributed to the caller's source location.
    ///
    /// Below-threshold messages return before `message` is formatted, so
    /// passing `format_args!(..)` costs nothing when filtered.
    #[track_caller]
    pub fn record(&self, level: Level, message: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }
        let location = Location::caller();
        self.append(level, location.file(), location.line(), &message);
    }

    /// Records a message with an explicit origin. Used when the call site
    /// is known from elsewhere (e.g. `tracing` metadata).
    pub fn record_at(&self, level: Level, file: &'static str, line: u32, message: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }
        self.append(level, file, line, &message);
    }

    #[track_caller]
    pub fn trace(&self, message: impl fmt::Display) {
        self.record(Level::Trace, message);
    }

    #[track_caller]
    pub fn debug(&self, message: impl fmt::Display) {
        self.record(Level::Debug, message);
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.record(Level::Info, message);
    }

    #[track_caller]
    pub fn warn(&self, message: impl fmt::Display) {
        self.record(Level::Warn, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.record(Level::Error, message);
    }

    /// Returns the last `n` messages, oldest first.
    ///
    /// If fewer than `n` are retained, returns all of them.
    pub fn recent(&self, n: usize) -> Vec<LogMessage> {
        let buffer = self.buffer.lock();
        let skip = buffer.len().saturating_sub(n);
        buffer.iter().skip(skip).cloned().collect()
    }

    /// Registers a callback to run before a fatal exit.
    pub fn register_shutdown_hook(&self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Runs every registered shutdown hook once, in registration order.
    ///
    /// A hook that panics is reported at error level and the remaining
    /// hooks still run. Hooks are removed as they run, and no log lock is
    /// held while they execute, so hooks may log.
    ///
    /// Returns the number of hooks that panicked.
    pub fn run_shutdown_hooks(&self) -> usize {
        let hooks = std::mem::take(&mut *self.hooks.lock());
        let mut panicked = 0;

        for (index, hook) in hooks.into_iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(hook)).is_err() {
                panicked += 1;
                self.error(format_args!("shutdown hook #{index} panicked"));
            }
        }

        panicked
    }

    /// Records a fatal message, runs the shutdown hooks, and exits the
    /// process with status 1.
    #[track_caller]
    pub fn fatal(&self, message: impl fmt::Display) -> ! {
        self.record(Level::Fatal, message);
        self.run_shutdown_hooks();
        process::exit(1)
    }

    fn append(&self, level: Level, file: &'static str, line: u32, message: &dyn fmt::Display) {
        let message = render_message(message);

        let mut buffer = self.buffer.lock();
        // Timestamp under the lock so buffer order and time order agree.
        buffer.push_back(LogMessage {
            timestamp: Local::now(),
            level,
            file,
            line,
            message,
        });
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
        if let Some(entry) = buffer.back() {
            self.sink.write_line(entry, self.color);
        }
    }
}

impl fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticLog")
            .field("level", &self.level())
            .field("capacity", &self.capacity)
            .field("color", &self.color)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn render_message(message: &dyn fmt::Display) -> String {
    let mut text = String::new();
    if write!(text, "{message}").is_err() {
        text.push_str("<formatting error>");
    }
    if text.contains('\n') {
        text = text.replace('\n', " ");
    }
    text
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::NullSink;

    // -- Helpers ----------------------------------------------------------

    fn log_with(level: Level, capacity: usize) -> DiagnosticLog {
        DiagnosticLog::with_sink(
            LogConfig {
                level,
                capacity,
                color: false,
            },
            NullSink,
        )
        .expect("capacity is non-zero")
    }

    fn texts(log: &DiagnosticLog, n: usize) -> Vec<String> {
        log.recent(n).into_iter().map(|m| m.message).collect()
    }

    /// Sink that remembers the text of every line it was handed.
    #[derive(Clone, Default)]
    struct CaptureSink(Arc<Mutex<Vec<String>>>);

    impl LogSink for CaptureSink {
        fn write_line(&self, message: &LogMessage, _color: bool) {
            self.0.lock().push(message.message.clone());
        }
    }

    /// Display impl that writes a prefix and then fails.
    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("partial")?;
            Err(fmt::Error)
        }
    }

    // =====================================================================
    // new()
    // =====================================================================

    #[test]
    fn test_new_zero_capacity_returns_error() {
        let result = DiagnosticLog::with_sink(
            LogConfig {
                capacity: 0,
                ..LogConfig::default()
            },
            NullSink,
        );

        assert!(matches!(result, Err(LogError::ZeroCapacity)));
    }

    #[test]
    fn test_new_starts_empty() {
        let log = log_with(Level::Trace, 4);

        assert!(log.is_empty());
        assert_eq!(log.capacity(), 4);
        assert!(log.recent(10).is_empty());
    }

    #[test]
    fn test_log_config_default_matches_startup_log() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::Trace);
        assert_eq!(config.capacity, 32);
        assert!(config.color);
    }

    // =====================================================================
    // record()
    // =====================================================================

    #[test]
    fn test_record_below_threshold_is_dropped() {
        let log = log_with(Level::Warn, 8);

        log.trace("t");
        log.debug("d");
        log.info("i");

        assert!(log.is_empty(), "nothing below warn should be recorded");
    }

    #[test]
    fn test_record_at_or_above_threshold_is_kept() {
        let log = log_with(Level::Warn, 8);

        log.warn("w");
        log.error("e");

        assert_eq!(texts(&log, 8), vec!["w", "e"]);
    }

    #[test]
    fn test_record_filtered_message_is_never_formatted() {
        struct Counting<'a>(&'a AtomicUsize);

        impl fmt::Display for Counting<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fetch_add(1, Ordering::SeqCst);
                f.write_str("counted")
            }
        }

        let calls = AtomicUsize::new(0);
        let log = log_with(Level::Error, 8);

        log.debug(Counting(&calls));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_record_captures_caller_location() {
        let log = log_with(Level::Trace, 8);

        let line = line!() + 1;
        log.info("here");

        let message = &log.recent(1)[0];
        assert_eq!(message.file, file!());
        assert_eq!(message.line, line);
        assert_eq!(message.level, Level::Info);
    }

    #[test]
    fn test_record_replaces_newlines() {
        let log = log_with(Level::Trace, 8);

        log.info("first\nsecond\nthird");

        assert_eq!(texts(&log, 1), vec!["first second third"]);
    }

    #[test]
    fn test_record_formatting_error_is_swallowed() {
        let log = log_with(Level::Trace, 8);

        log.error(Broken);

        assert_eq!(texts(&log, 1), vec!["partial<formatting error>"]);
    }

    #[test]
    fn test_record_evicts_oldest_beyond_capacity() {
        for capacity in 1..=5 {
            let log = log_with(Level::Trace, capacity);
            let total = capacity + 7;

            for i in 0..total {
                log.info(i);
            }

            let expected: Vec<String> = (total - capacity..total).map(|i| i.to_string()).collect();
            assert_eq!(log.len(), capacity);
            assert_eq!(texts(&log, total), expected, "capacity {capacity}");
        }
    }

    #[test]
    fn test_record_at_uses_given_origin() {
        let log = log_with(Level::Trace, 8);

        log.record_at(Level::Debug, "elsewhere.rs", 7, "moved");

        let message = &log.recent(1)[0];
        assert_eq!((message.file, message.line), ("elsewhere.rs", 7));
    }

    #[test]
    fn test_record_renders_to_sink_in_buffer_order() {
        let sink = CaptureSink::default();
        let log = DiagnosticLog::with_sink(
            LogConfig {
                level: Level::Info,
                capacity: 2,
                color: false,
            },
            sink.clone(),
        )
        .unwrap();

        log.info("a");
        log.debug("filtered");
        log.info("b");
        log.info("c");

        assert_eq!(*sink.0.lock(), vec!["a", "b", "c"]);
        assert_eq!(texts(&log, 2), vec!["b", "c"]);
    }

    // =====================================================================
    // recent()
    // =====================================================================

    #[test]
    fn test_recent_more_than_available_returns_all() {
        let log = log_with(Level::Trace, 8);
        log.info("one");
        log.info("two");

        assert_eq!(texts(&log, 100), vec!["one", "two"]);
    }

    #[test]
    fn test_recent_returns_newest_oldest_first() {
        let log = log_with(Level::Trace, 8);
        for i in 0..6 {
            log.info(i);
        }

        assert_eq!(texts(&log, 3), vec!["3", "4", "5"]);
        assert!(log.recent(0).is_empty());
    }

    // =====================================================================
    // levels
    // =====================================================================

    #[test]
    fn test_level_predicates_follow_threshold() {
        let log = log_with(Level::Info, 8);

        assert!(!log.is_trace());
        assert!(!log.is_debug());
        assert!(log.is_info());
        assert!(log.is_warn());
        assert!(log.is_error());
    }

    #[test]
    fn test_set_level_changes_filtering() {
        let log = log_with(Level::Error, 8);
        log.info("dropped");

        log.set_level(Level::Debug);
        log.info("kept");

        assert_eq!(log.level(), Level::Debug);
        assert_eq!(texts(&log, 8), vec!["kept"]);
    }

    // =====================================================================
    // shutdown hooks
    // =====================================================================

    #[test]
    fn test_run_shutdown_hooks_runs_in_registration_order() {
        let log = log_with(Level::Trace, 8);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            log.register_shutdown_hook(move || order.lock().push(i));
        }

        assert_eq!(log.run_shutdown_hooks(), 0);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_run_shutdown_hooks_continues_after_panic() {
        let log = log_with(Level::Trace, 8);
        let ran = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&ran);
        log.register_shutdown_hook(move || {
            first.fetch_add(1, Ordering::SeqCst);
        });
        log.register_shutdown_hook(|| panic!("hook failure"));
        let last = Arc::clone(&ran);
        log.register_shutdown_hook(move || {
            last.fetch_add(1, Ordering::SeqCst);
        });

        let panicked = log.run_shutdown_hooks();

        assert_eq!(panicked, 1);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(texts(&log, 1), vec!["shutdown hook #1 panicked"]);
    }

    #[test]
    fn test_run_shutdown_hooks_runs_each_hook_once() {
        let log = log_with(Level::Trace, 8);
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        log.register_shutdown_hook(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        log.run_shutdown_hooks();
        log.run_shutdown_hooks();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_hook_may_log() {
        let log = Arc::new(log_with(Level::Trace, 8));
        let inner = Arc::clone(&log);
        log.register_shutdown_hook(move || inner.info("flushing"));

        log.run_shutdown_hooks();

        assert_eq!(texts(&log, 1), vec!["flushing"]);
    }

    // =====================================================================
    // concurrency
    // =====================================================================

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let log = Arc::new(log_with(Level::Trace, 50));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.info(format_args!("{t}-{i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 50);
        // Each thread's surviving messages keep their relative order.
        for t in 0..8 {
            let prefix = format!("{t}-");
            let seq: Vec<usize> = texts(&log, 50)
                .iter()
                .filter_map(|m| m.strip_prefix(&prefix).map(|n| n.parse().unwrap()))
                .collect();
            assert!(seq.windows(2).all(|w| w[0] < w[1]), "thread {t}: {seq:?}");
        }
    }
}
