use std::fmt;

use crate::directory::DirectoryError;
use crate::wiki::WikiError;

/// Machine-readable error codes for client-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    ItemNotFound,
    ValidationFailed,
    InvalidTransition,
    UpstreamTimeout,
    UpstreamUnavailable,
    DataIntegrity,
    SnapshotWriteFailed,
    LockContention,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::ItemNotFound => "E2001",
            Self::ValidationFailed => "E2002",
            Self::InvalidTransition => "E2003",
            Self::UpstreamTimeout => "E4001",
            Self::UpstreamUnavailable => "E4002",
            Self::DataIntegrity => "E4003",
            Self::SnapshotWriteFailed => "E5001",
            Self::LockContention => "E5002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::ItemNotFound => "Item not found",
            Self::ValidationFailed => "Item validation failed",
            Self::InvalidTransition => "Invalid rental transition",
            Self::UpstreamTimeout => "Upstream service timed out",
            Self::UpstreamUnavailable => "Upstream service unavailable",
            Self::DataIntegrity => "Directory data integrity violation",
            Self::SnapshotWriteFailed => "Cache snapshot write failed",
            Self::LockContention => "Lock contention",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and clients.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in the rental config.toml and retry."),
            Self::ItemNotFound => Some("Check the item number, or run `rental cache purge`."),
            Self::ValidationFailed => {
                Some("Use `rental vocab statuses` and `rental vocab types` for accepted values.")
            }
            Self::InvalidTransition => {
                Some("Only available items can be rented and only rented items returned.")
            }
            Self::UpstreamTimeout => Some("Retry once the directory service responds again."),
            Self::UpstreamUnavailable => Some("Check the wiki server address and API token."),
            Self::DataIntegrity => Some("Report the duplicated directory entry to the admins."),
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => {
                Some("Retry after the other `rental` process releases its lock.")
            }
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by the inventory core.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The item page does not exist or carries no dataentry record.
    #[error("item {uid} not found")]
    NotFound { uid: u32 },

    /// A field value could not be coerced to its declared type.
    #[error("invalid value for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// Rent/return requested from a status that does not allow it.
    #[error("cannot {action} item {uid}: {reason}")]
    InvalidTransition {
        uid: u32,
        action: &'static str,
        reason: String,
    },

    /// A bounded upstream call ran out of time.
    #[error("{service} timed out")]
    UpstreamTimeout { service: &'static str },

    /// The wiki backend failed at the transport or API level.
    #[error("wiki backend unavailable: {0}")]
    UpstreamUnavailable(#[from] WikiError),

    /// The directory returned something that violates its contract.
    #[error("directory data integrity violation: {0}")]
    DataIntegrity(String),

    /// The directory failed for a reason other than a timeout.
    #[error("directory unavailable: {0}")]
    Directory(DirectoryError),
}

impl InventoryError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            Self::UpstreamUnavailable(_) | Self::Directory(_) => ErrorCode::UpstreamUnavailable,
            Self::DataIntegrity(_) => ErrorCode::DataIntegrity,
        }
    }

    /// Optional remediation hint for operators and clients.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

impl From<DirectoryError> for InventoryError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Timeout(_) => Self::UpstreamTimeout {
                service: "directory",
            },
            other => Self::Directory(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::ConfigParseError,
            ErrorCode::ItemNotFound,
            ErrorCode::ValidationFailed,
            ErrorCode::InvalidTransition,
            ErrorCode::UpstreamTimeout,
            ErrorCode::UpstreamUnavailable,
            ErrorCode::DataIntegrity,
            ErrorCode::SnapshotWriteFailed,
            ErrorCode::LockContention,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ValidationFailed.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn directory_timeout_maps_to_upstream_timeout() {
        let err = InventoryError::from(DirectoryError::Timeout(Duration::from_secs(5)));
        assert!(matches!(err, InventoryError::UpstreamTimeout { .. }));
        assert_eq!(err.code(), ErrorCode::UpstreamTimeout);
    }

    #[test]
    fn not_found_message_names_uid() {
        let err = InventoryError::NotFound { uid: 42 };
        assert_eq!(err.to_string(), "item 42 not found");
        assert_eq!(err.code().code(), "E2001");
        assert!(err.hint().is_some());
    }
}
