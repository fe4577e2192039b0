//! Global initialization. Kept in its own test binary since it installs the
//! process-wide subscriber.

use request_logging::config::{LogFormat, LogLevel, LoggingConfig, OutputStream};
use request_logging::context;
use request_logging::observability::{init_logging, InitOutcome};

#[test]
fn test_repeated_initialisation_is_harmless() {
    let config = LoggingConfig {
        level: LogLevel::Debug,
        stream: OutputStream::Stderr,
        ..LoggingConfig::default()
    };
    assert_eq!(init_logging(&config), InitOutcome::Installed);

    let plain = LoggingConfig {
        format: LogFormat::Plain,
        ..LoggingConfig::default()
    };
    assert_eq!(init_logging(&plain), InitOutcome::AlreadyInitialised);
    assert_eq!(init_logging(&config), InitOutcome::AlreadyInitialised);

    context::scope("after-init", || {
        tracing::info!(attempt = 3, "still logging");
    });
    assert_eq!(context::current(), None);
}
