//! System configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Default number of messages an actor may process per resume.
pub const DEFAULT_SCHEDULER_THROUGHPUT: usize = 300;

/// Default deadline for request/response convenience wrappers.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for graceful system shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum running actors (0 = unlimited).
pub const DEFAULT_MAX_ACTORS: usize = 0;

/// System-wide configuration for the actor runtime.
///
/// # Examples
///
/// ```rust
/// use swarm_rt::system::{SystemConfig, DEFAULT_SCHEDULER_THROUGHPUT};
/// use std::time::Duration;
///
/// let config = SystemConfig::default();
/// assert_eq!(config.scheduler_throughput, DEFAULT_SCHEDULER_THROUGHPUT);
///
/// let config = SystemConfig::builder()
///     .with_scheduler_throughput(50)
///     .with_shutdown_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(config.scheduler_throughput, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Messages an actor may process per resume before yielding.
    pub scheduler_throughput: usize,

    /// Deadline used by the async convenience wrappers.
    pub default_request_timeout: Duration,

    /// Timeout for graceful system shutdown.
    pub shutdown_timeout: Duration,

    /// Maximum running actors (0 = unlimited).
    pub max_actors: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            scheduler_throughput: DEFAULT_SCHEDULER_THROUGHPUT,
            default_request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            max_actors: DEFAULT_MAX_ACTORS,
        }
    }
}

impl SystemConfig {
    /// Create a configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler_throughput == 0 {
            return Err("scheduler_throughput must be > 0".to_string());
        }
        if self.default_request_timeout.is_zero() {
            return Err("default_request_timeout must be > 0".to_string());
        }
        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be > 0".to_string());
        }
        Ok(())
    }
}

/// Builder for [`SystemConfig`] with a fluent API.
#[derive(Debug, Clone, Default)]
pub struct SystemConfigBuilder {
    scheduler_throughput: Option<usize>,
    default_request_timeout: Option<Duration>,
    shutdown_timeout: Option<Duration>,
    max_actors: Option<usize>,
}

impl SystemConfigBuilder {
    /// Set the per-resume message budget.
    pub fn with_scheduler_throughput(mut self, throughput: usize) -> Self {
        self.scheduler_throughput = Some(throughput);
        self
    }

    /// Set the deadline of the async convenience wrappers.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.default_request_timeout = Some(timeout);
        self
    }

    /// Set the graceful-shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Cap the number of running actors (0 = unlimited).
    pub fn with_max_actors(mut self, max_actors: usize) -> Self {
        self.max_actors = Some(max_actors);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SystemConfig, String> {
        let config = SystemConfig {
            scheduler_throughput: self
                .scheduler_throughput
                .unwrap_or(DEFAULT_SCHEDULER_THROUGHPUT),
            default_request_timeout: self
                .default_request_timeout
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            shutdown_timeout: self.shutdown_timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT),
            max_actors: self.max_actors.unwrap_or(DEFAULT_MAX_ACTORS),
        };
        config.validate()?;
        Ok(config)
    }
}
