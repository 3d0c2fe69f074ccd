//! Result codes and the errno map shared with the projection driver.

use thiserror::Error;

/// Abstract result of a provider or driver operation.
///
/// Every code has a canonical POSIX errno. Event handlers report results to
/// the driver as `-errno`, with 0 meaning success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    /// Operation succeeded.
    Success,

    /// Unclassified failure.
    Invalid,

    /// Operation attempted in the wrong lifecycle phase.
    InvalidState,

    /// Malformed caller argument (e.g. wrong placeholder id length).
    InvalidArgument,

    /// Reserved surface with no implementation yet.
    NotYetImplemented,

    /// No projection session is active.
    DriverNotLoaded,

    /// File does not exist.
    FileNotFound,

    /// Path component does not exist.
    PathNotFound,

    /// Permission denied.
    AccessDenied,

    /// Directory is not empty.
    DirectoryNotEmpty,

    /// Underlying I/O failure.
    IOError,

    /// Operation conflicts with the projection state of the target,
    /// e.g. deleting a fully hydrated file as if it were a placeholder.
    VirtualizationInvalidOperation,
}

impl ResultCode {
    /// Canonical errno for this code.
    ///
    /// # Returns
    /// 0 for `Success`, a positive errno otherwise.
    pub fn to_errno(self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::Invalid => libc::EINVAL,
            ResultCode::InvalidState => libc::EBUSY,
            ResultCode::InvalidArgument => libc::EINVAL,
            ResultCode::NotYetImplemented => libc::ENOSYS,
            ResultCode::DriverNotLoaded => libc::ENODEV,
            ResultCode::FileNotFound => libc::ENOENT,
            ResultCode::PathNotFound => libc::ENOENT,
            ResultCode::AccessDenied => libc::EPERM,
            ResultCode::DirectoryNotEmpty => libc::ENOTEMPTY,
            ResultCode::IOError => libc::EIO,
            ResultCode::VirtualizationInvalidOperation => libc::EOPNOTSUPP,
        }
    }

    /// Map an errno back to a result code.
    ///
    /// The map is total: unknown errnos collapse to `Invalid`.
    ///
    /// # Arguments
    /// * `errno` - Positive errno value, or 0 for success
    pub fn from_errno(errno: i32) -> Self {
        match errno {
            0 => ResultCode::Success,
            libc::ENOENT => ResultCode::FileNotFound,
            libc::EPERM => ResultCode::AccessDenied,
            libc::ENOTEMPTY => ResultCode::DirectoryNotEmpty,
            libc::EIO => ResultCode::IOError,
            libc::ENODEV => ResultCode::DriverNotLoaded,
            libc::ENOSYS => ResultCode::NotYetImplemented,
            libc::EBUSY => ResultCode::InvalidState,
            libc::EOPNOTSUPP => ResultCode::VirtualizationInvalidOperation,
            libc::EINVAL => ResultCode::InvalidArgument,
            _ => ResultCode::Invalid,
        }
    }

    /// Whether this code is `Success`.
    pub fn is_success(self) -> bool {
        self == ResultCode::Success
    }
}

/// Out-of-band reason accompanying an update or delete failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFailureCause {
    /// The operation did not fail, or failed for an unrelated reason.
    NoFailure,

    /// The target holds data the provider would lose by proceeding.
    DirtyData,

    /// The target is not writable.
    ReadOnly,
}

/// Errors surfaced while constructing a projection session.
///
/// Only the driver binding produces these; the lifecycle collapses them to
/// [`ResultCode::Invalid`] after logging.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The driver rejected an operation.
    #[error("projection driver error in {operation}: errno {errno}")]
    Driver {
        /// Operation that failed.
        operation: String,
        /// Errno reported by the driver.
        errno: i32,
    },

    /// The virtualization root is not usable.
    #[error("invalid virtualization root: {0}")]
    InvalidRoot(String),

    /// IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
