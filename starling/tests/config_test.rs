// Integration tests for starling::config

use std::time::Duration;

use starling::SystemError;
use starling::config::*;

#[test]
fn test_scheduler_config_defaults() {
    let config = SchedulerConfig::default();

    assert_eq!(config.worker_threads, num_cpus::get());
    assert_eq!(config.thread_name_prefix, "starling-worker");
    assert_eq!(config.max_closures_per_pass, DEFAULT_MAX_CLOSURES_PER_PASS);
    assert_eq!(config.idle_wait, Duration::from_millis(100));
    assert_eq!(config.slot_count(), num_cpus::get() + 1);
    assert!(config.validate().is_ok());
}

#[test]
fn test_builder_methods() {
    let config = SchedulerConfig::default()
        .with_worker_threads(0)
        .with_thread_name_prefix("io");

    assert_eq!(config.worker_threads, 0);
    assert_eq!(config.slot_count(), 1);
    assert_eq!(config.thread_name_prefix, "io");
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_values() {
    let config = SchedulerConfig {
        max_closures_per_pass: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(SystemError::ConfigError(_))));

    let config = SchedulerConfig {
        idle_wait: Duration::ZERO,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(SystemError::ConfigError(_))));

    let config = SchedulerConfig::default().with_thread_name_prefix("");
    assert!(matches!(config.validate(), Err(SystemError::ConfigError(_))));
}

#[test]
fn test_scheduler_rejects_invalid_config() {
    let config = SchedulerConfig {
        max_closures_per_pass: 0,
        ..Default::default()
    };
    assert!(matches!(
        starling::Scheduler::with_config(config),
        Err(SystemError::ConfigError(_))
    ));
}

#[test]
fn test_config_debug_format() {
    let config = SchedulerConfig::default();
    assert!(format!("{:?}", config).contains("worker_threads"));
}
