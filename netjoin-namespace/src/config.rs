//! Namespace handle configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the target process's network namespace is opened
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenStrategy {
    /// `pidfd_open(2)`, falling back to procfs when the kernel lacks it
    #[default]
    Auto,
    /// `pidfd_open(2)` only
    PidFd,
    /// `<proc_root>/<pid>/ns/net` only
    ProcFs,
}

/// What to do when the original namespace cannot be rejoined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestorePolicy {
    /// Log and return the failure alongside the work result
    #[default]
    Report,
    /// Log and abort the process; the thread is stranded in the target namespace
    Abort,
}

/// Namespace handle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// How target namespaces are opened
    pub open_strategy: OpenStrategy,

    /// Reaction to a failed restore
    pub restore_policy: RestorePolicy,

    /// Mount point of procfs
    pub proc_root: PathBuf,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            open_strategy: OpenStrategy::Auto,
            restore_policy: RestorePolicy::Report,
            proc_root: PathBuf::from("/proc"),
        }
    }
}

impl NamespaceConfig {
    /// Create a new namespace configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select how target namespaces are opened
    #[must_use]
    pub const fn with_open_strategy(mut self, strategy: OpenStrategy) -> Self {
        self.open_strategy = strategy;
        self
    }

    /// Select the reaction to a failed restore
    #[must_use]
    pub const fn with_restore_policy(mut self, policy: RestorePolicy) -> Self {
        self.restore_policy = policy;
        self
    }

    /// Use a procfs mounted somewhere other than `/proc`
    #[must_use]
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    /// Pseudo-file naming the calling thread's network namespace
    #[must_use]
    pub fn thread_self_path(&self) -> PathBuf {
        self.proc_root.join("thread-self/ns/net")
    }

    /// Pseudo-file naming the network namespace of `pid`
    #[must_use]
    pub fn process_path(&self, pid: i32) -> PathBuf {
        self.proc_root.join(pid.to_string()).join("ns/net")
    }

    /// Mount point of procfs
    #[must_use]
    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NamespaceConfig::default();
        assert_eq!(config.open_strategy, OpenStrategy::Auto);
        assert_eq!(config.restore_policy, RestorePolicy::Report);
        assert_eq!(config.proc_root(), Path::new("/proc"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = NamespaceConfig::new()
            .with_open_strategy(OpenStrategy::ProcFs)
            .with_restore_policy(RestorePolicy::Abort)
            .with_proc_root("/host/proc");

        assert_eq!(config.open_strategy, OpenStrategy::ProcFs);
        assert_eq!(config.restore_policy, RestorePolicy::Abort);
        assert_eq!(
            config.process_path(42),
            PathBuf::from("/host/proc/42/ns/net")
        );
        assert_eq!(
            config.thread_self_path(),
            PathBuf::from("/host/proc/thread-self/ns/net")
        );
    }

    #[test]
    fn test_strategy_names() {
        let json = serde_json::to_string(&OpenStrategy::PidFd).unwrap();
        assert_eq!(json, "\"pidfd\"");
        let parsed: RestorePolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(parsed, RestorePolicy::Abort);
    }
}
