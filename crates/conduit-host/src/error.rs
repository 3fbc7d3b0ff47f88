//! Host-level error type.

use conduit_core::InstanceId;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by [`Host`](crate::Host) operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// Graph lookup or mutation failed.
    #[error(transparent)]
    Graph(#[from] conduit_core::Error),

    /// Scheduler operation failed.
    #[error(transparent)]
    Sched(#[from] conduit_sched::SchedError),

    /// Audio backend failed.
    #[error(transparent)]
    Io(#[from] conduit_io::Error),

    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No registered plugin has this URI.
    #[error("plugin not found for uri {0}")]
    PluginNotFound(String),

    /// The plugin's factory produced no processor.
    #[error("plugin {0} could not be instantiated")]
    InstantiateFailed(String),

    /// The instance's plugin has no preset with this name.
    #[error("preset '{preset}' not found for instance {instance}")]
    PresetNotFound {
        /// Instance the preset was meant for.
        instance: InstanceId,
        /// Requested preset name.
        preset: String,
    },
}

/// Convenience result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
