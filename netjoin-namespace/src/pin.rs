//! Thread pinning for the switch critical section
//!
//! Namespace membership belongs to the kernel thread. Rust threads map
//! one-to-one onto kernel threads, so pinning amounts to making sure the
//! code between "join target" and "rejoin original" cannot move to another
//! thread: the pin is `!Send`, lives on the stack of the switching call, and
//! the work it brackets is a synchronous closure (no `.await` can yield the
//! task to another worker in the middle).

use nix::unistd::{Pid, gettid};
use std::marker::PhantomData;

/// Marker held for the duration of a namespace switch
#[derive(Debug)]
pub struct ThreadPin {
    tid: Pid,
    _not_send: PhantomData<*const ()>,
}

impl ThreadPin {
    /// Pin the caller to its current kernel thread
    #[must_use]
    pub fn acquire() -> Self {
        let tid = gettid();
        tracing::trace!(tid = %tid, "pinned to thread");
        Self {
            tid,
            _not_send: PhantomData,
        }
    }

    /// Kernel thread id the pin was taken on
    #[must_use]
    pub const fn tid(&self) -> Pid {
        self.tid
    }

    /// Whether the caller is still on the pinned thread
    #[must_use]
    pub fn is_current(&self) -> bool {
        gettid() == self.tid
    }
}

impl Drop for ThreadPin {
    fn drop(&mut self) {
        if self.is_current() {
            tracing::trace!(tid = %self.tid, "unpinned from thread");
        } else {
            tracing::error!(
                pinned = %self.tid,
                current = %gettid(),
                "thread pin released on a different thread"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_records_current_thread() {
        let pin = ThreadPin::acquire();
        assert!(pin.is_current());
        assert_eq!(pin.tid(), gettid());
    }

    #[test]
    fn test_pins_differ_across_threads() {
        let here = ThreadPin::acquire().tid();
        let there = std::thread::spawn(|| ThreadPin::acquire().tid())
            .join()
            .unwrap();
        assert_ne!(here, there);
    }
}
