use thiserror::Error;

use crate::types::ConnectionHandle;

/// Errors that can occur during provisioning and time synchronization
#[derive(Debug, Error)]
pub enum TimeSyncError {
    // ===== Configuration Errors =====
    /// Local configuration is malformed
    ///
    /// Indicates a build-time misconfiguration; there is no sensible
    /// recovery at runtime.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of what is wrong with the configuration
        message: String,
    },

    /// The periodic-train interval does not resolve to a representable value
    #[error("train interval {units} out of range ({min}..={max} units of 1.25 ms)")]
    IntervalOutOfRange {
        /// The computed interval in transport units
        units: u64,
        /// Smallest representable value
        min: u64,
        /// Largest representable value
        max: u64,
    },

    // ===== Transport Errors =====
    /// A transport command was rejected on issuance
    ///
    /// Rejections for reasons other than link validity indicate a
    /// programming or configuration defect, not a transient condition.
    #[error("command {command} rejected by transport: status {status:#06x}")]
    CommandRejected {
        /// The command that was rejected
        command: &'static str,
        /// Transport status code
        status: u16,
    },

    /// A command was issued against a link that is no longer usable
    #[error("link {link} is no longer valid")]
    LinkInvalid {
        /// The unusable link
        link: ConnectionHandle,
    },

    /// An asynchronous GATT procedure completed with an error
    #[error("procedure on link {link} failed: status {status:#06x}")]
    ProcedureFailed {
        /// The link the procedure ran on
        link: ConnectionHandle,
        /// Transport status code
        status: u16,
    },

    // ===== Data Errors =====
    /// A control-channel payload had the wrong shape
    #[error("codec error: {message}")]
    Codec {
        /// Description of the error
        message: String,
    },

    // ===== State Errors =====
    /// Operation not valid in current state
    #[error("invalid state: {message} (currently {current_state})")]
    InvalidState {
        /// Description of why the state is invalid
        message: String,
        /// The current state
        current_state: String,
    },
}

impl TimeSyncError {
    /// Check whether this error allows falling back to scanning
    ///
    /// Only link-validity failures are recoverable; everything else in the
    /// command path indicates a defect and is treated as fatal by the
    /// provisioning engine.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::LinkInvalid { .. })
    }

    /// Check whether this error reports an unusable link
    #[must_use]
    pub fn is_link_invalid(&self) -> bool {
        matches!(self, Self::LinkInvalid { .. })
    }
}

/// Result type alias for time-sync operations
pub type Result<T> = std::result::Result<T, TimeSyncError>;
