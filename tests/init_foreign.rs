//! Initialization when another global subscriber was installed first. Kept
//! in its own test binary since it installs the process-wide subscriber.

use request_logging::config::LoggingConfig;
use request_logging::observability::{init_logging, InitOutcome};

#[test]
fn test_foreign_subscriber_is_reported_on_every_call() {
    tracing::subscriber::set_global_default(tracing_subscriber::registry()).unwrap();

    let config = LoggingConfig::default();
    assert_eq!(init_logging(&config), InitOutcome::ForeignSubscriber);
    assert_eq!(init_logging(&config), InitOutcome::ForeignSubscriber);
}
