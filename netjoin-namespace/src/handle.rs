//! Namespace handle: open, guarded switch/run/restore, close

use netjoin_core::{Error, ErrorSet, ProcessId, Result};
use std::any::Any;
use std::net::{TcpListener, ToSocketAddrs, UdpSocket};
use std::os::unix::net::UnixListener;
use std::path::Path;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{NamespaceConfig, RestorePolicy};
use crate::interfaces::{self, Interface};
use crate::opener;
use crate::pin::ThreadPin;
use crate::sys::{LinuxSys, NamespaceSys};

/// Lifecycle of a handle. Both OS handles live and die together.
enum State<H> {
    Open { original: H, target: H },
    Closed,
}

/// Result of running work inside a namespace.
///
/// Carries the work's value (absent when the work failed, panicked or never
/// ran) together with every failure observed on the way: switch, work and
/// restore failures, in that order.
#[derive(Debug)]
#[must_use]
pub struct Outcome<T> {
    value: Option<T>,
    errors: ErrorSet,
}

impl<T> Outcome<T> {
    fn failed(error: Error) -> Self {
        Self {
            value: None,
            errors: error.into(),
        }
    }

    /// The work's value, if it produced one
    pub const fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Every failure observed
    pub const fn errors(&self) -> &ErrorSet {
        &self.errors
    }

    /// Whether the work produced a value and nothing failed
    pub fn is_ok(&self) -> bool {
        self.value.is_some() && self.errors.is_empty()
    }

    /// Split into the value and the combined error
    pub fn into_parts(self) -> (Option<T>, Option<Error>) {
        let error = (!self.errors.is_empty()).then(|| self.errors.into_error());
        (self.value, error)
    }

    /// `Ok` only when the work produced a value and no failure was recorded.
    ///
    /// A restore failure turns an otherwise successful run into an error.
    ///
    /// # Errors
    /// The single recorded failure, or [`Error::Combined`] when there were several.
    pub fn into_result(self) -> Result<T> {
        match self.value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(self.errors.into_error()),
        }
    }
}

/// Handle onto another process's network namespace.
///
/// Holds two exclusively-owned OS handles: the namespace the opening thread
/// was in, and the target namespace. Every switch runs under a per-handle
/// lock, so at most one thread is joined through a given handle at a time.
/// Distinct handles share nothing and run fully in parallel.
///
/// # Example
/// ```no_run
/// use netjoin_core::ProcessId;
/// use netjoin_namespace::NamespaceHandle;
///
/// let handle = NamespaceHandle::open(ProcessId::from_raw(1))?;
/// for iface in handle.interfaces()? {
///     println!("{} up={}", iface.name, iface.up);
/// }
/// handle.close()?;
/// # Ok::<(), netjoin_core::Error>(())
/// ```
pub struct NamespaceHandle<S: NamespaceSys = LinuxSys> {
    sys: S,
    pid: ProcessId,
    restore_policy: RestorePolicy,
    guard: Mutex<State<S::Handle>>,
}

impl NamespaceHandle {
    /// Open the network namespace of `pid` with the default configuration
    ///
    /// # Errors
    /// See [`NamespaceHandle::open_with`].
    pub fn open(pid: ProcessId) -> Result<Self> {
        Self::open_with_config(pid, &NamespaceConfig::default())
    }

    /// Open the network namespace of `pid`
    ///
    /// # Errors
    /// See [`NamespaceHandle::open_with`].
    pub fn open_with_config(pid: ProcessId, config: &NamespaceConfig) -> Result<Self> {
        Self::open_with(LinuxSys::new(config.clone()), pid, config.clone())
    }
}

impl<S: NamespaceSys> NamespaceHandle<S> {
    /// Open the network namespace of `pid` through `sys`.
    ///
    /// Captures the calling thread's namespace first, then resolves the
    /// target. No partially initialized handle is ever returned.
    ///
    /// # Errors
    /// [`Error::OriginalCaptureFailed`], [`Error::ProcessNotFound`],
    /// [`Error::PermissionDenied`], or a combined error if releasing the
    /// already captured namespace also failed.
    pub fn open_with(sys: S, pid: ProcessId, config: NamespaceConfig) -> Result<Self> {
        let original = opener::capture_current(&sys)?;

        let target = match opener::resolve(&sys, pid) {
            Ok(target) => target,
            Err(e) => {
                let mut errors = ErrorSet::from(e);
                if let Err(source) = sys.release(original) {
                    errors.push(Error::ReleaseFailed { source });
                }
                return Err(errors.into_error());
            }
        };

        tracing::debug!(pid = %pid, "opened network namespace handle");

        Ok(Self {
            sys,
            pid,
            restore_policy: config.restore_policy,
            guard: Mutex::new(State::Open { original, target }),
        })
    }

    /// Process whose namespace this handle targets
    #[must_use]
    pub const fn pid(&self) -> ProcessId {
        self.pid
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(*self.lock(), State::Closed)
    }

    fn lock(&self) -> MutexGuard<'_, State<S::Handle>> {
        // Work panics are caught inside the critical section, so the state is
        // never observed half-updated even if the lock was poisoned.
        self.guard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` inside the target namespace.
    ///
    /// The calling thread joins the target namespace, runs `work`, and
    /// always attempts to rejoin its original namespace, also when `work`
    /// panics. A panic is caught and reported as
    /// [`Error::WorkPanicked`]; it never propagates past this call.
    pub fn exec<T, F>(&self, work: F) -> Outcome<T>
    where
        F: FnOnce() -> T,
    {
        self.try_exec(|| Ok::<T, Error>(work()))
    }

    /// Like [`exec`](Self::exec) for work that can fail; a returned error is
    /// recorded as [`Error::WorkFailure`].
    pub fn try_exec<T, E, F>(&self, work: F) -> Outcome<T>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let state = self.lock();
        let State::Open { original, target } = &*state else {
            return Outcome::failed(Error::HandleClosed);
        };

        let pin = ThreadPin::acquire();

        if let Err(source) = self.sys.join(target) {
            tracing::debug!(pid = %self.pid, error = %source, "cannot join target namespace");
            return Outcome::failed(Error::SwitchFailed {
                pid: self.pid,
                source,
            });
        }
        tracing::debug!(pid = %self.pid, tid = %pin.tid(), "joined target namespace");

        let mut errors = ErrorSet::new();
        let value = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                errors.push(Error::work(e));
                None
            }
            Err(payload) => {
                errors.push(Error::WorkPanicked {
                    message: panic_message(payload.as_ref()),
                });
                None
            }
        };

        match self.sys.join(original) {
            Ok(()) => tracing::debug!(pid = %self.pid, "restored original namespace"),
            Err(source) => {
                tracing::error!(
                    pid = %self.pid,
                    tid = %pin.tid(),
                    error = %source,
                    "failed to restore original network namespace, thread is stranded"
                );
                if self.restore_policy == RestorePolicy::Abort {
                    std::process::abort();
                }
                errors.push(Error::RestoreFailed { source });
            }
        }

        drop(pin);
        drop(state);

        Outcome { value, errors }
    }

    /// List the interfaces visible inside the target namespace
    ///
    /// # Errors
    /// Any switch, enumeration or restore failure.
    pub fn interfaces(&self) -> Result<Vec<Interface>> {
        self.try_exec(interfaces::list).into_result()
    }

    /// Bind a TCP listener inside the target namespace.
    ///
    /// The socket stays in the target namespace after the thread returns.
    ///
    /// # Errors
    /// Any switch, bind or restore failure.
    pub fn listen<A: ToSocketAddrs>(&self, addr: A) -> Result<TcpListener> {
        self.try_exec(|| TcpListener::bind(addr)).into_result()
    }

    /// Bind a UDP socket inside the target namespace
    ///
    /// # Errors
    /// Any switch, bind or restore failure.
    pub fn bind_udp<A: ToSocketAddrs>(&self, addr: A) -> Result<UdpSocket> {
        self.try_exec(|| UdpSocket::bind(addr)).into_result()
    }

    /// Bind a unix stream listener inside the target namespace.
    ///
    /// Only abstract sockets are scoped by the network namespace; a path
    /// socket lives in whatever filesystem `path` resolves to.
    ///
    /// # Errors
    /// Any switch, bind or restore failure.
    pub fn listen_unix<P: AsRef<Path>>(&self, path: P) -> Result<UnixListener> {
        self.try_exec(|| UnixListener::bind(path)).into_result()
    }

    /// Release both OS handles. The handle is dead afterwards.
    ///
    /// # Errors
    /// [`Error::AlreadyClosed`] on a second call (nothing is released twice),
    /// otherwise any [`Error::ReleaseFailed`].
    pub fn close(&self) -> Result<()> {
        let mut state = self.lock();
        let State::Open { original, target } = std::mem::replace(&mut *state, State::Closed)
        else {
            return Err(Error::AlreadyClosed);
        };

        tracing::debug!(pid = %self.pid, "closing network namespace handle");
        self.release_pair(original, target).into_result()
    }

    fn release_pair(&self, original: S::Handle, target: S::Handle) -> ErrorSet {
        let mut errors = ErrorSet::new();
        for handle in [original, target] {
            if let Err(source) = self.sys.release(handle) {
                errors.push(Error::ReleaseFailed { source });
            }
        }
        errors
    }
}

impl<S: NamespaceSys> Drop for NamespaceHandle<S> {
    fn drop(&mut self) {
        let state = std::mem::replace(
            self.guard.get_mut().unwrap_or_else(PoisonError::into_inner),
            State::Closed,
        );
        if let State::Open { original, target } = state {
            let errors = self.release_pair(original, target);
            if !errors.is_empty() {
                tracing::warn!(
                    pid = %self.pid,
                    error = %errors,
                    "failed to release namespace handle"
                );
            }
        }
    }
}

impl<S: NamespaceSys> std::fmt::Debug for NamespaceHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // try_lock: formatting from inside work must not deadlock on our own guard
        let closed = self
            .guard
            .try_lock()
            .ok()
            .map(|state| matches!(*state, State::Closed));
        f.debug_struct("NamespaceHandle")
            .field("pid", &self.pid)
            .field("closed", &closed)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
