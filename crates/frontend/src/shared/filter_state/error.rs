use std::fmt;
use thiserror::Error;

/// Which mutation currently owns the filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    /// Applying undo/redo, back/forward navigation, a storage notification
    /// or the initial restoration
    Restoring,
    /// Applying a local `set_state`/`reset`/`add_filter`/`remove_filter`
    Mutating,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Restoring => "restoring",
            Phase::Mutating => "mutating",
        };
        f.write_str(name)
    }
}

/// Errors of the filter state layer. None of them is fatal: they are
/// reported on the error channel and the in-memory state stays authoritative.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("failed to serialize filter state: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("stored filter state is corrupt: {0}")]
    CorruptStorage(#[source] serde_json::Error),

    #[error("invalid filter configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("malformed import: {0}")]
    MalformedImport(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("listener failed: {0}")]
    Listener(String),

    #[error("filter state is busy ({0})")]
    Busy(Phase),
}

impl FilterError {
    /// Storage-related failures degrade to "no saved state".
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            FilterError::StorageUnavailable(_)
                | FilterError::QuotaExceeded
                | FilterError::Serialize(_)
                | FilterError::CorruptStorage(_)
        )
    }
}
