//! OS primitives behind a namespace handle
//!
//! This module uses `unsafe` to adopt the descriptor returned by
//! `pidfd_open(2)` and to close descriptors with `close(2)` so that
//! close errors are observed instead of silently dropped.

#![allow(unsafe_code)]

use netjoin_core::ProcessId;
use nix::errno::Errno;
use nix::sched::{CloneFlags, setns};
use std::fs::File;
use std::os::fd::{FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::Path;

use crate::config::{NamespaceConfig, OpenStrategy};

/// The four OS capabilities a namespace handle is built from.
///
/// [`LinuxSys`] is the production implementation;
/// [`MockSys`](crate::MockSys) simulates per-thread namespace membership
/// for tests. Every operation reports failure as the raw `Errno`; mapping
/// onto the netjoin taxonomy happens in the callers.
pub trait NamespaceSys: Send + Sync {
    /// Exclusively-owned reference to a network namespace
    type Handle: Send;

    /// Open the calling thread's current network namespace
    fn open_current(&self) -> Result<Self::Handle, Errno>;

    /// Open the network namespace of `pid`
    fn open_process(&self, pid: ProcessId) -> Result<Self::Handle, Errno>;

    /// Move the calling thread into the namespace behind `handle`
    fn join(&self, handle: &Self::Handle) -> Result<(), Errno>;

    /// Release `handle`
    fn release(&self, handle: Self::Handle) -> Result<(), Errno>;
}

/// Linux implementation backed by file descriptors and `setns(2)`
#[derive(Debug, Clone)]
pub struct LinuxSys {
    config: NamespaceConfig,
}

impl LinuxSys {
    /// Create from configuration
    #[must_use]
    pub const fn new(config: NamespaceConfig) -> Self {
        Self { config }
    }

    fn open_path(path: &Path) -> Result<OwnedFd, Errno> {
        File::open(path)
            .map(OwnedFd::from)
            .map_err(|e| Errno::from_raw(e.raw_os_error().unwrap_or(libc::EIO)))
    }

    fn open_pidfd(pid: ProcessId) -> Result<OwnedFd, Errno> {
        // SAFETY: pidfd_open takes a pid and a flags word and returns a new
        // descriptor or -1.
        let ret = unsafe { libc::syscall(libc::SYS_pidfd_open, pid.as_raw(), 0) };
        let fd = Errno::result(ret)?;

        #[allow(clippy::cast_possible_truncation)]
        let fd = fd as RawFd;
        // SAFETY: the kernel just handed us this descriptor and nothing else owns it.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

impl Default for LinuxSys {
    fn default() -> Self {
        Self::new(NamespaceConfig::default())
    }
}

impl NamespaceSys for LinuxSys {
    type Handle = OwnedFd;

    fn open_current(&self) -> Result<OwnedFd, Errno> {
        Self::open_path(&self.config.thread_self_path())
    }

    fn open_process(&self, pid: ProcessId) -> Result<OwnedFd, Errno> {
        match self.config.open_strategy {
            OpenStrategy::PidFd => Self::open_pidfd(pid),
            OpenStrategy::ProcFs => Self::open_path(&self.config.process_path(pid.as_raw())),
            OpenStrategy::Auto => match Self::open_pidfd(pid) {
                Err(Errno::ENOSYS) => {
                    tracing::debug!(pid = %pid, "pidfd_open unavailable, using procfs");
                    Self::open_path(&self.config.process_path(pid.as_raw()))
                }
                other => other,
            },
        }
    }

    fn join(&self, handle: &OwnedFd) -> Result<(), Errno> {
        setns(handle, CloneFlags::CLONE_NEWNET)
    }

    fn release(&self, handle: OwnedFd) -> Result<(), Errno> {
        // SAFETY: into_raw_fd transfers ownership, so the descriptor is closed exactly once.
        let ret = unsafe { libc::close(handle.into_raw_fd()) };
        Errno::result(ret).map(drop)
    }
}
