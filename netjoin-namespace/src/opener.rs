//! Resolving process ids to namespace handles

use netjoin_core::{Error, ProcessId, Result};
use nix::errno::Errno;

use crate::sys::NamespaceSys;

/// Open a handle to the network namespace of `pid`.
///
/// The target process does not have to cooperate.
///
/// # Errors
/// [`Error::ProcessNotFound`] when the process does not exist (or has
/// exited), [`Error::PermissionDenied`] when the caller lacks privilege.
pub fn resolve<S: NamespaceSys>(sys: &S, pid: ProcessId) -> Result<S::Handle> {
    sys.open_process(pid).map_err(|errno| {
        tracing::debug!(pid = %pid, error = %errno, "cannot open target namespace");
        match errno {
            Errno::ESRCH | Errno::ENOENT => Error::ProcessNotFound { pid },
            Errno::EPERM | Errno::EACCES => Error::PermissionDenied {
                operation: format!("open network namespace of process {pid}"),
            },
            Errno::EINVAL => Error::InvalidConfig {
                message: format!("invalid process id {pid}"),
            },
            other => Error::Namespace {
                message: format!("cannot open network namespace of process {pid}: {other}"),
            },
        }
    })
}

/// Capture the calling thread's current network namespace.
///
/// # Errors
/// [`Error::OriginalCaptureFailed`] when the thread's own namespace cannot be opened.
pub fn capture_current<S: NamespaceSys>(sys: &S) -> Result<S::Handle> {
    sys.open_current()
        .map_err(|source| Error::OriginalCaptureFailed { source })
}
