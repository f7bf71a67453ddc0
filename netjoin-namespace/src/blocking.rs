//! Bridge from async code to the synchronous switch

use netjoin_core::Result;
use std::sync::Arc;
use std::thread;
use tokio::sync::oneshot;

use crate::NamespaceHandle;
use crate::handle::Outcome;
use crate::interfaces::Interface;
use crate::sys::NamespaceSys;

/// Run `job` on a fresh OS thread that exits as soon as `job` returns.
///
/// A thread whose restore failed stays in the target namespace until it
/// exits, so switches never run on a pooled thread that is handed to
/// unrelated work afterwards.
async fn on_switch_thread<R, F>(job: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> R + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name("netjoin-switch".to_string())
        .spawn(move || {
            // The receiver is gone only if the caller stopped waiting
            let _ = tx.send(job());
        })?;

    Ok(rx.await?)
}

/// Run `work` inside the namespace without blocking the async runtime.
///
/// The switch happens on a dedicated OS thread for its whole duration, so
/// no async task is ever suspended while joined to the target namespace.
///
/// # Errors
/// [`Error::Io`](netjoin_core::Error::Io) if the thread cannot be spawned,
/// [`Error::TaskJoin`](netjoin_core::Error::TaskJoin) if it exits without a
/// result; every namespace failure is reported inside the returned [`Outcome`].
pub async fn exec_blocking<S, T, F>(
    handle: Arc<NamespaceHandle<S>>,
    work: F,
) -> Result<Outcome<T>>
where
    S: NamespaceSys + 'static,
    S::Handle: 'static,
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    on_switch_thread(move || handle.exec(work)).await
}

/// List interfaces inside the namespace from async code
///
/// # Errors
/// Any switch, enumeration, restore or thread failure.
pub async fn interfaces_blocking<S>(handle: Arc<NamespaceHandle<S>>) -> Result<Vec<Interface>>
where
    S: NamespaceSys + 'static,
    S::Handle: 'static,
{
    on_switch_thread(move || handle.interfaces()).await?
}
