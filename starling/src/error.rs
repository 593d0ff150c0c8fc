use starling_api::SlotId;
use thiserror::Error;

/// Errors related to spawning actors.
#[derive(Error, Debug, Clone)]
pub enum SpawnError {
    #[error("Invalid slot {slot} (scheduler has {slots} slots)")]
    InvalidSlot { slot: SlotId, slots: usize },
    #[error("Actor registry exhausted")]
    RegistryExhausted,
    #[error("System is shutting down")]
    SystemShutdown,
}

/// Errors related to the scheduler itself.
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Scheduler is already started")]
    AlreadyStarted,
    #[error("Scheduler is already shutting down")]
    ShuttingDown,
    #[error("Failed during shutdown: {0}")]
    ShutdownError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal system error: {0}")]
    Other(#[from] anyhow::Error),
}
