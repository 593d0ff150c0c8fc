use std::time::Duration;

use crate::error::SystemError;

pub const DEFAULT_MAX_CLOSURES_PER_PASS: usize = 128;
pub const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(100);

/// Configuration for the `Scheduler`.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// The number of worker threads besides the cooperative main thread.
    pub worker_threads: usize,

    /// Worker threads are named `<prefix>-<n>`.
    pub thread_name_prefix: String,

    /// Max closures one actor runs in a single pass before the slot moves on
    /// to the next ready actor.
    pub max_closures_per_pass: usize,

    /// Upper bound on how long an idle worker blocks before re-checking its
    /// timers.
    pub idle_wait: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            thread_name_prefix: "starling-worker".to_string(),
            max_closures_per_pass: DEFAULT_MAX_CLOSURES_PER_PASS,
            idle_wait: DEFAULT_IDLE_WAIT,
        }
    }
}

impl SchedulerConfig {
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Total number of slots, the main slot included.
    pub fn slot_count(&self) -> usize {
        self.worker_threads + 1
    }

    pub fn validate(&self) -> Result<(), SystemError> {
        if self.max_closures_per_pass == 0 {
            return Err(SystemError::ConfigError(
                "max_closures_per_pass must be positive".to_string(),
            ));
        }
        if self.idle_wait.is_zero() {
            return Err(SystemError::ConfigError(
                "idle_wait must be positive".to_string(),
            ));
        }
        if self.thread_name_prefix.is_empty() {
            return Err(SystemError::ConfigError(
                "thread_name_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
