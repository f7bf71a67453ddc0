//! Container id resolution for netjoin
//!
//! Maps a container identifier to the process id whose network namespace
//! should be joined:
//! - [`ContainerResolver`] - the lookup contract
//! - [`DockerResolver`] - asks the Docker engine API
//! - [`StaticResolver`] - fixed table for tests and offline use

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::InspectContainerOptions;
use netjoin_core::{ContainerId, Error, ProcessId, Result};
use netjoin_namespace::{NamespaceConfig, NamespaceHandle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

/// Trait for container-id lookups
///
/// # Thread Safety
/// All implementations must be `Send + Sync` for use across async tasks.
#[async_trait]
pub trait ContainerResolver: Send + Sync {
    /// Resolve `id` to the pid of the container's main process
    ///
    /// # Errors
    /// [`Error::ResolutionFailed`] when the container is unknown, not
    /// running, or the runtime cannot be reached.
    async fn resolve(&self, id: &ContainerId) -> Result<ProcessId>;
}

/// Resolver backed by the Docker engine API
///
/// # Example
/// ```no_run
/// use netjoin_core::ContainerId;
/// use netjoin_docker::{ContainerResolver, DockerResolver};
///
/// # async fn demo() -> netjoin_core::Result<()> {
/// let resolver = DockerResolver::new();
/// let pid = resolver.resolve(&ContainerId::new("abc123def456")?).await?;
/// println!("container runs as pid {pid}");
/// # Ok(())
/// # }
/// ```
pub struct DockerResolver {
    client: OnceCell<Docker>,
    cancel: Option<CancellationToken>,
    timeout: Duration,
}

impl DockerResolver {
    /// Default limit for a single inspect call
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a resolver that connects from the environment (`DOCKER_HOST` etc.) on first use
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: OnceCell::new(),
            cancel: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Use an already connected client
    #[must_use]
    pub fn with_client(mut self, client: Docker) -> Self {
        self.client = OnceCell::new_with(Some(client));
        self
    }

    /// Abort pending lookups when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Limit the duration of a single lookup
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn client(&self) -> std::result::Result<&Docker, bollard::errors::Error> {
        self.client
            .get_or_try_init(|| async { Docker::connect_with_defaults() })
            .await
    }
}

impl std::fmt::Debug for DockerResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerResolver")
            .field("connected", &self.client.initialized())
            .field("cancellable", &self.cancel.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for DockerResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerResolver for DockerResolver {
    async fn resolve(&self, id: &ContainerId) -> Result<ProcessId> {
        let failed = |message: String| Error::ResolutionFailed {
            container: id.to_string(),
            message,
        };

        let cancel = self.cancel.clone().unwrap_or_else(CancellationToken::new);
        if cancel.is_cancelled() {
            return Err(failed("lookup cancelled".to_string()));
        }

        let client = self.client().await.map_err(|e| failed(e.to_string()))?;

        tracing::debug!(container = %id, "inspecting container");
        let options = InspectContainerOptions { size: false };
        let inspect = client.inspect_container(id.as_str(), Some(options));

        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(failed("lookup cancelled".to_string())),
            response = tokio::time::timeout(self.timeout, inspect) => response
                .map_err(|_| failed(format!("lookup timed out after {:?}", self.timeout)))?
                .map_err(|e| failed(e.to_string()))?,
        };

        let pid = response.state.and_then(|state| state.pid).unwrap_or(0);
        if pid <= 0 {
            return Err(failed("container is not running".to_string()));
        }

        let pid = i32::try_from(pid).map_err(|_| failed(format!("pid {pid} out of range")))?;
        tracing::debug!(container = %id, pid, "resolved container");

        Ok(ProcessId::from_raw(pid))
    }
}

/// Resolver with a fixed id-to-pid table
///
/// Records every lookup so tests can assert which arguments were routed here.
#[derive(Debug, Default)]
pub struct StaticResolver {
    table: HashMap<String, ProcessId>,
    lookups: Mutex<Vec<ContainerId>>,
}

impl StaticResolver {
    /// Create an empty resolver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping
    #[must_use]
    pub fn with(mut self, id: impl Into<String>, pid: ProcessId) -> Self {
        self.table.insert(id.into(), pid);
        self
    }

    /// Ids looked up so far, in order
    #[must_use]
    pub fn lookups(&self) -> Vec<ContainerId> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ContainerResolver for StaticResolver {
    async fn resolve(&self, id: &ContainerId) -> Result<ProcessId> {
        self.lookups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id.clone());

        self.table
            .get(id.as_str())
            .copied()
            .ok_or_else(|| Error::ResolutionFailed {
                container: id.to_string(),
                message: "no such container".to_string(),
            })
    }
}

/// Resolve `id` and open a handle onto its network namespace
///
/// # Errors
/// Any resolution or open failure.
pub async fn open_container<R>(
    resolver: &R,
    id: &ContainerId,
    config: &NamespaceConfig,
) -> Result<NamespaceHandle>
where
    R: ContainerResolver + ?Sized,
{
    let pid = resolver.resolve(id).await?;
    NamespaceHandle::open_with_config(pid, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver_records_lookups() {
        let resolver = StaticResolver::new().with("abc123def456", ProcessId::from_raw(1234));
        let known = ContainerId::new("abc123def456").unwrap();
        let unknown = ContainerId::new("fff000fff000").unwrap();

        assert_eq!(resolver.resolve(&known).await.unwrap().as_raw(), 1234);
        assert!(matches!(
            resolver.resolve(&unknown).await,
            Err(Error::ResolutionFailed { .. })
        ));
        assert_eq!(resolver.lookups(), vec![known, unknown]);
    }

    #[tokio::test]
    async fn test_cancelled_lookup() {
        let token = CancellationToken::new();
        token.cancel();
        let resolver = DockerResolver::new().with_cancellation(token);

        let err = resolver
            .resolve(&ContainerId::new("abc123def456").unwrap())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_open_container_unknown_process() {
        let resolver = StaticResolver::new().with("abc123def456", ProcessId::from_raw(999_999_999));
        let id = ContainerId::new("abc123def456").unwrap();

        let result = open_container(&resolver, &id, &NamespaceConfig::default()).await;
        assert!(matches!(result, Err(Error::ProcessNotFound { .. })));
    }
}
