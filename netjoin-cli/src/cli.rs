//! CLI argument definitions

use clap::{Parser, ValueEnum};
use netjoin_namespace::{NamespaceConfig, OpenStrategy, RestorePolicy};

#[derive(Parser, Debug)]
#[command(name = "lsnet")]
#[command(
    about = "List network interfaces as seen from other processes and containers",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Print rows as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// How target namespaces are opened
    #[arg(long, value_enum, default_value_t = OpenMode::Auto)]
    pub open_strategy: OpenMode,

    /// Abort if a thread cannot return to its original namespace
    #[arg(long)]
    pub abort_on_restore_failure: bool,

    /// Container lookup timeout in seconds
    #[arg(long, default_value = "10")]
    pub resolve_timeout: u64,

    /// Process ids, or 12-character container ids
    #[arg(value_name = "PID|CONTAINER")]
    pub targets: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// pidfd_open, falling back to procfs
    Auto,
    /// pidfd_open only
    Pidfd,
    /// /proc/<pid>/ns/net only
    Procfs,
}

impl Cli {
    /// Namespace configuration selected on the command line
    pub fn namespace_config(&self) -> NamespaceConfig {
        let strategy = match self.open_strategy {
            OpenMode::Auto => OpenStrategy::Auto,
            OpenMode::Pidfd => OpenStrategy::PidFd,
            OpenMode::Procfs => OpenStrategy::ProcFs,
        };
        let policy = if self.abort_on_restore_failure {
            RestorePolicy::Abort
        } else {
            RestorePolicy::Report
        };

        NamespaceConfig::new()
            .with_open_strategy(strategy)
            .with_restore_policy(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["lsnet", "1", "abc123def456"]);

        assert_eq!(cli.targets, vec!["1", "abc123def456"]);
        assert_eq!(cli.resolve_timeout, 10);
        assert_eq!(cli.namespace_config(), NamespaceConfig::default());
    }

    #[test]
    fn test_config_flags() {
        let cli = Cli::parse_from([
            "lsnet",
            "--open-strategy",
            "procfs",
            "--abort-on-restore-failure",
            "42",
        ]);
        let config = cli.namespace_config();

        assert_eq!(config.open_strategy, OpenStrategy::ProcFs);
        assert_eq!(config.restore_policy, RestorePolicy::Abort);
    }
}
