//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global logging subsystem from a [`LoggingConfig`]
//! - Build subscribers for arbitrary writers (tests, embedding applications)
//! - Tolerate repeated initialization
//!
//! # Design Decisions
//! - Uses the tracing crate; `log` records are bridged by tracing-subscriber
//! - JSON format by default, plain text on request
//! - Log level configurable via config and environment

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LoggingConfig};
use crate::observability::format::RecordFormat;

static INSTALLED: AtomicBool = AtomicBool::new(false);
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Result of [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The request-logging subscriber is now the global default.
    Installed,
    /// A previous call already installed it; nothing changed.
    AlreadyInitialised,
    /// Another global logger or subscriber was installed first and is kept.
    ForeignSubscriber,
}

/// Builds the filter: `level` for every target, refined by `filter`.
///
/// Directives in `filter` take precedence over `level` for the targets they
/// name; a bare level in `filter` replaces `level`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let level = config.level.as_level_filter();
    let directives = match config.filter.as_deref().map(str::trim) {
        Some(filter) if !filter.is_empty() => format!("{level},{filter}"),
        _ => level.to_string(),
    };
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives)
}

/// Builds a subscriber that writes enriched records to `writer`.
///
/// Use with `tracing::subscriber::set_default` to scope it to one thread.
pub fn subscriber<W>(
    config: &LoggingConfig,
    writer: W,
) -> impl Subscriber + for<'a> LookupSpan<'a> + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::registry().with(env_filter(config)).with(
        tracing_subscriber::fmt::layer()
            .event_format(RecordFormat::new(config.format))
            .with_writer(writer)
            .with_ansi(false),
    )
}

/// Installs the request-logging subscriber as the process-wide default.
///
/// Safe to call more than once: later calls log a warning and keep the
/// configuration that is already in place.
pub fn init_logging(config: &LoggingConfig) -> InitOutcome {
    let _lock = INIT_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if INSTALLED.load(Ordering::SeqCst) {
        tracing::warn!("logging already initialised; keeping the existing configuration");
        return InitOutcome::AlreadyInitialised;
    }

    match subscriber(config, config.stream.make_writer()).try_init() {
        Ok(()) => {
            INSTALLED.store(true, Ordering::SeqCst);
            tracing::debug!(
                level = %config.level,
                format = %config.format,
                "request logging initialised"
            );
            InitOutcome::Installed
        }
        Err(err) => {
            tracing::warn!(
                error = %err,
                "a global logger is already installed; request logging configuration not applied"
            );
            InitOutcome::ForeignSubscriber
        }
    }
}

/// Reads [`LoggingConfig::from_env`] and initializes with it.
pub fn init_from_env() -> Result<InitOutcome, ConfigError> {
    let config = LoggingConfig::from_env()?;
    Ok(init_logging(&config))
}
