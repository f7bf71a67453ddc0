//! Netjoin Core - shared error taxonomy and identifiers
//!
//! This crate provides the types every other netjoin crate speaks in:
//! the [`Error`] taxonomy, the [`ErrorSet`] aggregate used when more than
//! one failure has to be reported, and validated process/container ids.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{Error, ErrorSet, Result};
pub use types::{ContainerId, ProcessId};
