//! Error types for the flow aggregator

use flowmd_types::KeyError;
use thiserror::Error;

/// Flow aggregator errors
///
/// None of these are fatal: the aggregator stays usable after every one of
/// them.
#[derive(Error, Debug)]
pub enum AggregatorError {
    /// A window's stat array could not be reserved
    #[error("Allocation failure: could not reserve {requested} {what}")]
    AllocationFailure { what: &'static str, requested: usize },

    /// Every window slot of the current report is used
    #[error("Window capacity exceeded: report already holds {max_windows} windows")]
    WindowCapacityExceeded { max_windows: usize },

    /// `activate_window` called while a window is open
    #[error("A window is already active")]
    WindowAlreadyActive,

    /// `close_active_window` called with no open window
    #[error("No active window")]
    NoActiveWindow,

    /// Malformed flow key
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] KeyError),

    /// Report serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Report delivery failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// `send_report` called before a transport was installed
    #[error("No report transport configured")]
    TransportUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for flow aggregator operations
pub type Result<T> = std::result::Result<T, AggregatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_display() {
        let err = AggregatorError::WindowCapacityExceeded { max_windows: 2 };
        assert_eq!(
            err.to_string(),
            "Window capacity exceeded: report already holds 2 windows"
        );
    }

    #[test]
    fn test_key_error_conversion() {
        let err: AggregatorError = KeyError::InvalidIpVersion(9).into();
        assert!(matches!(err, AggregatorError::InvalidArgument(_)));
        assert_eq!(
            err.to_string(),
            "Invalid argument: unsupported IP version 9 (expected 0, 4 or 6)"
        );
    }

    #[test]
    fn test_allocation_failure_display() {
        let err = AggregatorError::AllocationFailure {
            what: "window flow stats",
            requested: 12,
        };
        assert_eq!(
            err.to_string(),
            "Allocation failure: could not reserve 12 window flow stats"
        );
    }
}
