//! Spy implementation of the namespace primitives for tests
//!
//! # Example
//! ```
//! use netjoin_core::ProcessId;
//! use netjoin_namespace::{MockSys, NamespaceConfig, NamespaceHandle};
//!
//! let sys = MockSys::new();
//! let pid = ProcessId::from_raw(42);
//! let target = sys.spawn_process(pid);
//!
//! let handle = NamespaceHandle::open_with(sys.clone(), pid, NamespaceConfig::default()).unwrap();
//! let seen = handle.exec(|| sys.current_namespace()).into_result().unwrap();
//!
//! assert_eq!(seen, target);
//! assert_eq!(sys.current_namespace(), MockSys::HOST_NAMESPACE);
//! ```

use netjoin_core::ProcessId;
use nix::errno::Errno;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::ThreadId;

use crate::sys::NamespaceSys;

/// Handle issued by [`MockSys`]
#[derive(Debug, PartialEq, Eq)]
pub struct MockHandle {
    id: u64,
    namespace: u64,
}

/// Mock namespace layer (doesn't touch the kernel)
///
/// Simulates per-thread namespace membership: every thread starts in
/// [`MockSys::HOST_NAMESPACE`] and moves only through [`NamespaceSys::join`].
/// Clones share state, so a test can keep one clone for inspection while a
/// handle owns another.
#[derive(Clone, Default)]
pub struct MockSys {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    next_namespace: u64,
    next_handle: u64,
    processes: HashMap<ProcessId, u64>,
    denied: HashSet<ProcessId>,
    threads: HashMap<ThreadId, u64>,
    live_handles: HashSet<u64>,
    open_current_error: Option<Errno>,
    join_errors: HashMap<u64, Errno>,
    release_error: Option<Errno>,
    join_calls: usize,
    release_calls: usize,
    foreign_now: usize,
    foreign_max: usize,
}

impl MockState {
    fn current(&self) -> u64 {
        self.threads
            .get(&std::thread::current().id())
            .copied()
            .unwrap_or(MockSys::HOST_NAMESPACE)
    }

    fn issue(&mut self, namespace: u64) -> MockHandle {
        self.next_handle += 1;
        self.live_handles.insert(self.next_handle);
        MockHandle {
            id: self.next_handle,
            namespace,
        }
    }
}

impl MockSys {
    /// Namespace every simulated thread starts in
    pub const HOST_NAMESPACE: u64 = 1;

    /// Create a new mock layer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a process living in a fresh namespace; returns that namespace
    pub fn spawn_process(&self, pid: ProcessId) -> u64 {
        let mut state = self.lock();
        state.next_namespace += 1;
        let namespace = Self::HOST_NAMESPACE + state.next_namespace;
        state.processes.insert(pid, namespace);
        namespace
    }

    /// Make opening `pid` fail with `EPERM`
    pub fn deny_process(&self, pid: ProcessId) {
        self.lock().denied.insert(pid);
    }

    /// Make capturing the current namespace fail
    pub fn fail_open_current(&self, errno: Errno) {
        self.lock().open_current_error = Some(errno);
    }

    /// Make joining the namespace of `pid` fail
    pub fn fail_switch(&self, pid: ProcessId, errno: Errno) {
        let mut state = self.lock();
        if let Some(&namespace) = state.processes.get(&pid) {
            state.join_errors.insert(namespace, errno);
        }
    }

    /// Make rejoining the host namespace fail
    pub fn fail_restore(&self, errno: Errno) {
        self.lock().join_errors.insert(Self::HOST_NAMESPACE, errno);
    }

    /// Make releasing handles fail (the handle is still considered released)
    pub fn fail_release(&self, errno: Errno) {
        self.lock().release_error = Some(errno);
    }

    /// Clear every injected failure
    pub fn heal(&self) {
        let mut state = self.lock();
        state.open_current_error = None;
        state.join_errors.clear();
        state.release_error = None;
        state.denied.clear();
    }

    /// Namespace the calling thread is currently in
    #[must_use]
    pub fn current_namespace(&self) -> u64 {
        self.lock().current()
    }

    /// Number of join attempts made so far
    #[must_use]
    pub fn join_calls(&self) -> usize {
        self.lock().join_calls
    }

    /// Number of release attempts made so far
    #[must_use]
    pub fn release_calls(&self) -> usize {
        self.lock().release_calls
    }

    /// Number of handles issued and not yet released
    #[must_use]
    pub fn live_handles(&self) -> usize {
        self.lock().live_handles.len()
    }

    /// Number of threads currently outside the host namespace
    #[must_use]
    pub fn joined_threads(&self) -> usize {
        self.lock().foreign_now
    }

    /// Highest number of threads simultaneously outside the host namespace
    #[must_use]
    pub fn max_concurrent_joined(&self) -> usize {
        self.lock().foreign_max
    }
}

impl NamespaceSys for MockSys {
    type Handle = MockHandle;

    fn open_current(&self) -> Result<MockHandle, Errno> {
        let mut state = self.lock();
        if let Some(errno) = state.open_current_error {
            return Err(errno);
        }
        let namespace = state.current();
        Ok(state.issue(namespace))
    }

    fn open_process(&self, pid: ProcessId) -> Result<MockHandle, Errno> {
        let mut state = self.lock();
        if state.denied.contains(&pid) {
            return Err(Errno::EPERM);
        }
        let namespace = *state.processes.get(&pid).ok_or(Errno::ESRCH)?;
        Ok(state.issue(namespace))
    }

    fn join(&self, handle: &MockHandle) -> Result<(), Errno> {
        let mut state = self.lock();
        state.join_calls += 1;

        if !state.live_handles.contains(&handle.id) {
            return Err(Errno::EBADF);
        }
        if let Some(&errno) = state.join_errors.get(&handle.namespace) {
            return Err(errno);
        }

        let was_foreign = state.current() != Self::HOST_NAMESPACE;
        let is_foreign = handle.namespace != Self::HOST_NAMESPACE;
        state
            .threads
            .insert(std::thread::current().id(), handle.namespace);

        match (was_foreign, is_foreign) {
            (false, true) => {
                state.foreign_now += 1;
                state.foreign_max = state.foreign_max.max(state.foreign_now);
            }
            (true, false) => state.foreign_now -= 1,
            _ => {}
        }

        Ok(())
    }

    fn release(&self, handle: MockHandle) -> Result<(), Errno> {
        let mut state = self.lock();
        state.release_calls += 1;

        if !state.live_handles.remove(&handle.id) {
            return Err(Errno::EBADF);
        }
        state.release_error.map_or(Ok(()), Err)
    }
}
