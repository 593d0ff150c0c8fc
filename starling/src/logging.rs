// Logging System for Starling
//
// This module provides a unified logging interface for the Starling scheduler.
// It's built on top of the `tracing` ecosystem.
//
// Worker threads inherit the dispatcher that was current on the thread calling
// `Scheduler::start`, so a subscriber installed with `set_default` in a test is
// honoured by the whole runtime, not only by the main thread.
//
// # Usage
//
// ```rust,no_run
// use starling::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```

use std::io;
use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Configuration for the Starling logging system
///
/// # Examples
///
/// ```rust
/// use starling::logging::LogConfig;
/// use tracing::Level;
///
/// let custom_config = LogConfig {
///     level: Level::DEBUG,
///     json_format: true,
///     show_file_line: false,
///     show_thread_info: true,
///     show_time: true,
///     target_filters: Some("starling=debug,starling::scheduler=trace".to_string()),
/// };
/// assert!(custom_config.json_format);
/// ```
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if let Some(filters) = &config.target_filters {
        for filter in filters.split(',') {
            if let Ok(directive) = filter.parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
    }
    env_filter
}

/// Initialize the logging system with the given configuration
///
/// It's safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            Box::new(registry.with(fmt::layer().json().flatten_event(true)))
        } else {
            let fmt_layer = fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info);
            if config.show_time {
                Box::new(registry.with(fmt_layer))
            } else {
                Box::new(registry.with(fmt_layer.without_time()))
            }
        };

        set_global_subscriber(subscriber);
    });
}

// Helper function to set the global subscriber
fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// Opens `path` in append mode, creating it if it doesn't exist.
pub fn file_writer(path: &str) -> io::Result<Box<dyn io::Write + Send + Sync + 'static>> {
    use std::fs::OpenOptions;

    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(Box::new(file))
}

/// Initialize logging with both console and file output
///
/// Console output respects the ANSI detection, file output is always plain.
/// Fails if the log file cannot be opened.
pub fn init_with_file(config: LogConfig, log_file: &str) -> Result<(), io::Error> {
    // Surface an unusable path to the caller instead of silently falling back.
    drop(file_writer(log_file)?);

    INIT.call_once(|| {
        let console_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let log_file_path = log_file.to_string();
        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(move || match file_writer(&log_file_path) {
                Ok(writer) => writer,
                Err(_) => Box::new(std::io::stderr()),
            })
            .with_file(true)
            .with_line_number(true)
            .with_thread_names(true)
            .with_thread_ids(true);

        let subscriber = tracing_subscriber::registry()
            .with(env_filter(&config))
            .with(console_layer)
            .with(file_layer);

        set_global_subscriber(subscriber);
    });

    Ok(())
}

/// INFO level with human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// DEBUG level for the runtime, TRACE for the scheduler loops and timers.
pub fn init_development() {
    let config = LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("starling=debug,starling::scheduler=trace,starling_api::timer=trace".to_string()),
    };
    init(config);
}

/// JSON output, no file/line information.
pub fn init_production() {
    let config = LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    };
    init(config);
}

/// Initialize logging for testing
///
/// Only shows warnings and errors by default to keep test output clean.
///
/// ```rust
/// use starling::logging;
///
/// logging::init_test();
/// logging::init_test(); // later calls are no-ops
/// ```
pub fn init_test() {
    let config = LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    };
    init(config);
}

/// Create a span around the execution of one actor
///
/// # Examples
///
/// ```rust
/// use starling::actor_span;
///
/// let span = actor_span!("TimeoutManager", "3v0");
/// let _guard = span.enter();
///
/// let span = actor_span!("TimeoutManager", "3v0", slot = "main");
/// ```
#[macro_export]
macro_rules! actor_span {
    ($actor_name:expr, $actor_key:expr) => {
        tracing::debug_span!("actor", name = %$actor_name, key = %$actor_key)
    };
    ($actor_name:expr, $actor_key:expr, $($fields:tt)*) => {
        tracing::debug_span!("actor", name = %$actor_name, key = %$actor_key, $($fields)*)
    };
}

/// Log actor lifecycle events
///
/// ```rust
/// use starling::log_lifecycle;
///
/// log_lifecycle!("TimeoutManager", "3v0", "started");
/// log_lifecycle!("TimeoutManager", "3v0", "stopped", dropped = 2);
/// ```
#[macro_export]
macro_rules! log_lifecycle {
    ($actor_name:expr, $actor_key:expr, $event:expr) => {
        tracing::info!(actor = %$actor_name, key = %$actor_key, event = $event)
    };
    ($actor_name:expr, $actor_key:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(actor = %$actor_name, key = %$actor_key, event = $event, $($fields)*)
    };
}

/// Log scheduling events
///
/// ```rust
/// use starling::log_scheduler;
///
/// log_scheduler!("worker-0", "started");
/// log_scheduler!("main", "pass_done", executed = 3, yielded = false);
/// ```
#[macro_export]
macro_rules! log_scheduler {
    ($slot:expr, $event:expr) => {
        tracing::debug!(slot = %$slot, event = $event)
    };
    ($slot:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(slot = %$slot, event = $event, $($fields)*)
    };
}

/// Log timer activity of a slot
///
/// ```rust
/// use starling::log_timer;
///
/// log_timer!("main", "fired", count = 2);
/// ```
#[macro_export]
macro_rules! log_timer {
    ($slot:expr, $event:expr) => {
        tracing::trace!(slot = %$slot, timer_event = $event)
    };
    ($slot:expr, $event:expr, $($fields:tt)*) => {
        tracing::trace!(slot = %$slot, timer_event = $event, $($fields)*)
    };
}

/// Log error events
///
/// ```rust
/// use starling::log_error;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "spawn failed");
/// log_error!(error);
/// log_error!("actor panicked", slot = "main");
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// `Scheduler::start` captures it and installs it on every worker thread.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

// Re-export the most commonly used tracing macros for convenience
pub use tracing::{debug, error, info, trace, warn};
