//! Error types for netjoin

use std::fmt;

use nix::errno::Errno;
use thiserror::Error;

use crate::types::ProcessId;

/// Netjoin error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container id could not be mapped to a process id
    #[error("cannot resolve container {container}: {message}")]
    ResolutionFailed {
        /// Container identifier as given
        container: String,
        /// Reason reported by the container runtime
        message: String,
    },

    /// Target process does not exist (or has exited)
    #[error("process {pid} not found")]
    ProcessNotFound {
        /// Process that was looked up
        pid: ProcessId,
    },

    /// Permission denied
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that was denied
        operation: String,
    },

    /// The calling thread's own network namespace could not be captured
    #[error("cannot capture current network namespace: {source}")]
    OriginalCaptureFailed {
        /// Underlying OS error
        source: Errno,
    },

    /// Operation attempted on a closed namespace handle
    #[error("namespace handle is closed")]
    HandleClosed,

    /// Joining the target namespace failed; no work was run
    #[error("cannot join network namespace of process {pid}: {source}")]
    SwitchFailed {
        /// Process whose namespace was being joined
        pid: ProcessId,
        /// Underlying OS error
        source: Errno,
    },

    /// Work run inside the namespace returned an error
    #[error("work failed: {source}")]
    WorkFailure {
        /// Error returned by the work
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Work run inside the namespace panicked
    #[error("caught panic: {message}")]
    WorkPanicked {
        /// Panic payload rendered as text
        message: String,
    },

    /// Rejoining the original namespace failed
    #[error("cannot restore original network namespace: {source}")]
    RestoreFailed {
        /// Underlying OS error
        source: Errno,
    },

    /// Namespace handle closed twice
    #[error("namespace handle already closed")]
    AlreadyClosed,

    /// Releasing an OS namespace handle failed
    #[error("cannot release namespace handle: {source}")]
    ReleaseFailed {
        /// Underlying OS error
        source: Errno,
    },

    /// Namespace operation failed
    #[error("Namespace error: {message}")]
    Namespace {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// System error from nix
    #[error("System error: {0}")]
    System(#[from] nix::Error),

    /// The worker thread running a namespace switch went away without a result
    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::sync::oneshot::error::RecvError),

    /// Several independent failures
    #[error("{0}")]
    Combined(ErrorSet),
}

impl Error {
    /// Wrap an arbitrary error returned by namespace work
    pub fn work<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::WorkFailure {
            source: error.into(),
        }
    }

    /// Iterate over the individual failures in this error.
    ///
    /// A [`Error::Combined`] yields each of its members, anything else yields
    /// itself.
    pub fn failures(&self) -> impl Iterator<Item = &Self> {
        let members: &[Self] = match self {
            Self::Combined(set) => &set.errors,
            other => std::slice::from_ref(other),
        };
        members.iter()
    }
}

/// Ordered collection of failures observed along one operation.
///
/// Nothing pushed into the set is ever dropped; nested [`Error::Combined`]
/// values are flattened so every failure can be inspected on its own.
#[derive(Debug, Default)]
pub struct ErrorSet {
    errors: Vec<Error>,
}

impl ErrorSet {
    /// Create an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Record a failure
    pub fn push(&mut self, error: Error) {
        match error {
            Error::Combined(set) => self.errors.extend(set.errors),
            other => self.errors.push(other),
        }
    }

    /// Whether no failure was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of recorded failures
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over recorded failures in the order they occurred
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    /// Collapse into a single error: the only member, or [`Error::Combined`]
    #[must_use]
    pub fn into_error(mut self) -> Error {
        if self.errors.len() == 1 {
            if let Some(only) = self.errors.pop() {
                return only;
            }
        }
        Error::Combined(self)
    }

    /// `Ok(())` when empty, otherwise the collapsed error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_error())
        }
    }
}

impl fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl From<Error> for ErrorSet {
    fn from(error: Error) -> Self {
        let mut set = Self::new();
        set.push(error);
        set
    }
}

impl IntoIterator for ErrorSet {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorSet {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

/// Result type alias for netjoin operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_error_collapses() {
        let mut set = ErrorSet::new();
        set.push(Error::HandleClosed);

        assert!(matches!(set.into_error(), Error::HandleClosed));
    }

    #[test]
    fn test_multiple_errors_kept_in_order() {
        let mut set = ErrorSet::new();
        set.push(Error::WorkPanicked {
            message: "boom".to_string(),
        });
        set.push(Error::RestoreFailed {
            source: Errno::EINVAL,
        });

        let err = set.into_error();
        let kinds: Vec<_> = err.failures().collect();
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], Error::WorkPanicked { .. }));
        assert!(matches!(kinds[1], Error::RestoreFailed { .. }));

        let text = err.to_string();
        assert!(text.contains("caught panic: boom"));
        assert!(text.contains("cannot restore"));
    }

    #[test]
    fn test_nested_sets_are_flattened() {
        let mut inner = ErrorSet::new();
        inner.push(Error::AlreadyClosed);
        inner.push(Error::HandleClosed);

        let mut outer = ErrorSet::new();
        outer.push(Error::Combined(inner));
        outer.push(Error::ReleaseFailed {
            source: Errno::EBADF,
        });

        assert_eq!(outer.len(), 3);
    }

    #[test]
    fn test_empty_set_is_ok() {
        assert!(ErrorSet::new().into_result().is_ok());
    }

    #[test]
    fn test_io_error_converts() {
        let err: Error = std::io::Error::other("thread limit").into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_work_error_keeps_message() {
        let err = Error::work(std::io::Error::other("no route"));
        assert_eq!(err.to_string(), "work failed: no route");
    }
}
