//! Batch inspection of targets

use anyhow::{Context, Result};
use async_trait::async_trait;
use netjoin_core::{ContainerId, ProcessId};
use netjoin_docker::{ContainerResolver, DockerResolver};
use netjoin_namespace::{Interface, NamespaceConfig, NamespaceHandle, interfaces_blocking};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::table::{self, Row};

/// Where interface lists come from
#[async_trait]
pub trait InterfaceSource: Send + Sync {
    /// Interfaces visible in the network namespace of `pid`
    async fn interfaces(&self, pid: ProcessId) -> netjoin_core::Result<Vec<Interface>>;
}

/// Opens the namespace of each pid and enumerates inside it
pub struct NamespaceSource {
    config: NamespaceConfig,
}

impl NamespaceSource {
    pub const fn new(config: NamespaceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl InterfaceSource for NamespaceSource {
    async fn interfaces(&self, pid: ProcessId) -> netjoin_core::Result<Vec<Interface>> {
        let handle = Arc::new(NamespaceHandle::open_with_config(pid, &self.config)?);
        let result = interfaces_blocking(Arc::clone(&handle)).await;

        if let Err(e) = handle.close() {
            warn!(pid = %pid, error = %e, "cannot close namespace handle");
        }

        result
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        info!("Not running as root, joining foreign namespaces will likely be denied");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending container lookups");
            on_interrupt.cancel();
        }
    });

    let resolver = DockerResolver::new()
        .with_timeout(Duration::from_secs(cli.resolve_timeout))
        .with_cancellation(cancel);
    let source = NamespaceSource::new(cli.namespace_config());

    let rows = collect_rows(&cli.targets, &resolver, &source).await;
    debug!(rows = rows.len(), "inspection finished");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        serde_json::to_writer_pretty(&mut out, &rows).context("Failed to write JSON")?;
        writeln!(out).context("Failed to write JSON")?;
    } else {
        table::render(&rows, &mut out).context("Failed to write table")?;
    }

    Ok(())
}

/// Inspect every target; failures are logged and the argument skipped
pub async fn collect_rows(
    targets: &[String],
    resolver: &dyn ContainerResolver,
    source: &dyn InterfaceSource,
) -> Vec<Row> {
    let mut rows = Vec::new();

    for arg in targets {
        let Some(pid) = resolve_target(arg, resolver).await else {
            continue;
        };

        let interfaces = match source.interfaces(pid).await {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!(arg = %arg, pid = %pid, error = %e, "cannot list interfaces");
                continue;
            }
        };

        debug!(arg = %arg, pid = %pid, count = interfaces.len(), "listed interfaces");
        rows.extend(interfaces.into_iter().map(|interface| Row {
            target: arg.clone(),
            pid,
            interface,
        }));
    }

    rows
}

/// Map one argument to a pid: 12 characters means a container id, anything else a pid
async fn resolve_target(arg: &str, resolver: &dyn ContainerResolver) -> Option<ProcessId> {
    if ContainerId::looks_like_short_id(arg) {
        let resolved = match ContainerId::new(arg) {
            Ok(id) => resolver.resolve(&id).await,
            Err(e) => Err(e),
        };
        return resolved
            .inspect_err(|e| warn!(arg = %arg, error = %e, "invalid container id"))
            .ok();
    }

    arg.parse::<ProcessId>()
        .inspect_err(|e| warn!(arg = %arg, error = %e, "invalid pid"))
        .ok()
}
