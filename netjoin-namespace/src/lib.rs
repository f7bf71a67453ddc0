//! Temporarily joining another process's network namespace
//!
//! This crate lets a thread step into the network namespace of another
//! process, run arbitrary work there, and always step back out:
//! - [`NamespaceHandle`] - owns the original and target namespace handles
//!   and runs work through a guarded switch/run/restore sequence
//! - [`opener`] - resolves process ids to namespace handles
//! - [`interfaces`] - lists the interfaces of the namespace the thread is in
//! - [`NamespaceSys`] - the OS primitives, with [`LinuxSys`] for real use and
//!   [`MockSys`] for tests

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod blocking;
pub mod config;
pub mod handle;
pub mod interfaces;
pub mod mock;
pub mod opener;
pub mod pin;
pub mod sys;

pub use blocking::{exec_blocking, interfaces_blocking};
pub use config::{NamespaceConfig, OpenStrategy, RestorePolicy};
pub use handle::{NamespaceHandle, Outcome};
pub use interfaces::{HardwareAddr, Interface};
pub use mock::{MockHandle, MockSys};
pub use pin::ThreadPin;
pub use sys::{LinuxSys, NamespaceSys};
