// Copyright (c) 2025 - Cowboy AI, Inc.
//! Throwaway Neo4j containers for local development and integration tests
//!
//! Built on `testcontainers`: `start` runs the image with the bolt port
//! exposed and waits for the server to log that bolt is enabled, `uri`
//! resolves the host port bolt is published on. The container is removed
//! when [`Neo4jContainer`] is dropped or stopped.
//!
//! ```rust,no_run
//! use cim_graph_query::container::{ContainerConfiguration, Neo4jContainer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (container, config) =
//!         Neo4jContainer::start_with_neo4j_config(ContainerConfiguration::new("5", "neo4j", "s3cr3t")).await?;
//!     println!("bolt available at {}", config.uri);
//!     container.stop().await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt, TestcontainersError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Neo4jConfig;

/// Bolt port inside the container
pub const BOLT_PORT: u16 = 7687;

/// Log line printed once the server accepts bolt connections
pub const BOLT_READY_LOG: &str = "Bolt enabled";

/// How long `start` waits for the readiness log line
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

const NEO4J_IMAGE: &str = "neo4j";

/// Errors raised while managing a container
#[derive(Debug, Error)]
pub enum ContainerError {
    /// Docker or the container itself failed
    #[error("container error: {0}")]
    Testcontainers(#[from] TestcontainersError),
}

/// Result type for container operations
pub type ContainerResult<T> = Result<T, ContainerError>;

/// What to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfiguration {
    /// Image tag, e.g. `5` or `4.4-enterprise`
    pub neo4j_version: String,
    pub username: String,
    pub password: String,
    /// URI scheme clients should use, e.g. `bolt` or `neo4j`
    pub scheme: String,
    pub startup_timeout: Duration,
}

impl ContainerConfiguration {
    pub fn new(
        neo4j_version: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            neo4j_version: neo4j_version.into(),
            username: username.into(),
            password: password.into(),
            scheme: "bolt".to_string(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn image(&self) -> String {
        format!("{}:{}", NEO4J_IMAGE, self.neo4j_version)
    }

    /// Value of `NEO4J_AUTH`
    pub fn auth_env_var(&self) -> String {
        format!("{}/{}", self.username, self.password)
    }

    pub fn environment(&self) -> Vec<(&'static str, String)> {
        vec![
            ("NEO4J_AUTH", self.auth_env_var()),
            ("NEO4J_ACCEPT_LICENSE_AGREEMENT", "yes".to_string()),
        ]
    }

    /// `<scheme>://<host>:<port>`
    pub fn uri(&self, host: impl fmt::Display, port: u16) -> String {
        format!("{}://{}:{}", self.scheme, host, port)
    }

    /// Connection settings for a server reachable at `uri`
    pub fn neo4j_config(&self, uri: impl Into<String>) -> Neo4jConfig {
        Neo4jConfig::new(uri, self.username.clone(), self.password.clone())
    }
}

/// A running container, removed on drop
pub struct Neo4jContainer {
    container: ContainerAsync<GenericImage>,
    config: ContainerConfiguration,
}

impl fmt::Debug for Neo4jContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neo4jContainer")
            .field("id", &self.container.id())
            .field("config", &self.config)
            .finish()
    }
}

impl Neo4jContainer {
    /// Run the image and wait until bolt is enabled
    pub async fn start(config: ContainerConfiguration) -> ContainerResult<Self> {
        info!("Starting container from image {}", config.image());

        let image = GenericImage::new(NEO4J_IMAGE, config.neo4j_version.as_str())
            .with_exposed_port(BOLT_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout(BOLT_READY_LOG));
        let request = config
            .environment()
            .into_iter()
            .fold(image.with_startup_timeout(config.startup_timeout), |request, (name, value)| {
                request.with_env_var(name, value)
            });

        let container = request.start().await?;
        info!("Container {} ready", container.id());
        Ok(Self { container, config })
    }

    /// Start a container and resolve its connection settings
    ///
    /// The container is stopped again when the settings cannot be resolved.
    pub async fn start_with_neo4j_config(
        config: ContainerConfiguration,
    ) -> ContainerResult<(Self, Neo4jConfig)> {
        let container = Self::start(config).await?;
        let resolved = container.neo4j_config().await;
        release_on_error(container, resolved, Neo4jContainer::stop).await
    }

    pub fn id(&self) -> &str {
        self.container.id()
    }

    pub fn configuration(&self) -> &ContainerConfiguration {
        &self.config
    }

    /// Host port the bolt port is published on
    pub async fn mapped_port(&self) -> ContainerResult<u16> {
        Ok(self.container.get_host_port_ipv4(BOLT_PORT.tcp()).await?)
    }

    /// `<scheme>://<host>:<mapped port>`
    pub async fn uri(&self) -> ContainerResult<String> {
        let host = self.container.get_host().await?;
        let port = self.mapped_port().await?;
        Ok(self.config.uri(host, port))
    }

    /// Connection settings for this container
    pub async fn neo4j_config(&self) -> ContainerResult<Neo4jConfig> {
        Ok(self.config.neo4j_config(self.uri().await?))
    }

    /// Remove the container now
    pub async fn stop(self) -> ContainerResult<()> {
        info!("Stopping container {}", self.container.id());
        self.container.rm().await?;
        Ok(())
    }
}

/// Pair `resolved` with `container`, releasing the container when it failed
async fn release_on_error<C, T, F, Fut>(
    container: C,
    resolved: ContainerResult<T>,
    release: F,
) -> ContainerResult<(C, T)>
where
    F: FnOnce(C) -> Fut,
    Fut: Future<Output = ContainerResult<()>>,
{
    match resolved {
        Ok(value) => Ok((container, value)),
        Err(e) => {
            debug!("Releasing container after failed setup: {}", e);
            if let Err(release_error) = release(container).await {
                warn!("Failed to remove container: {}", release_error);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn config() -> ContainerConfiguration {
        ContainerConfiguration::new("4.4-enterprise", "neo4j", "s3cr3t")
    }

    fn setup_failure() -> ContainerError {
        ContainerError::Testcontainers(TestcontainersError::other("port not exposed"))
    }

    #[test]
    fn test_image_and_auth() {
        let config = config();
        assert_eq!(config.image(), "neo4j:4.4-enterprise");
        assert_eq!(config.auth_env_var(), "neo4j/s3cr3t");
        assert_eq!(config.scheme, "bolt");
        assert_eq!(config.startup_timeout, DEFAULT_STARTUP_TIMEOUT);
    }

    #[test]
    fn test_environment() {
        assert_eq!(
            config().environment(),
            vec![
                ("NEO4J_AUTH", "neo4j/s3cr3t".to_string()),
                ("NEO4J_ACCEPT_LICENSE_AGREEMENT", "yes".to_string()),
            ]
        );
    }

    #[test]
    fn test_uri_uses_scheme() {
        assert_eq!(config().uri("localhost", 49153), "bolt://localhost:49153");
        assert_eq!(
            config().with_scheme("neo4j").uri("127.0.0.1", 32768),
            "neo4j://127.0.0.1:32768"
        );
    }

    #[test]
    fn test_neo4j_config_uses_credentials() {
        let neo4j = config().neo4j_config("bolt://localhost:49153");
        assert_eq!(neo4j.uri, "bolt://localhost:49153");
        assert_eq!(neo4j.user, "neo4j");
        assert_eq!(neo4j.password, "s3cr3t");
    }

    #[tokio::test]
    async fn test_failed_setup_releases_the_container() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let result = release_on_error("container", Err::<Neo4jConfig, _>(setup_failure()), |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ContainerError::Testcontainers(_))));
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_release_keeps_the_setup_error() {
        let result = release_on_error("container", Err::<Neo4jConfig, _>(setup_failure()), |_| async {
            Err(ContainerError::Testcontainers(TestcontainersError::other("remove failed")))
        })
        .await;

        let message = result.unwrap_err().to_string();
        assert!(message.contains("port not exposed"), "{}", message);
    }

    #[tokio::test]
    async fn test_successful_setup_keeps_the_container() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);

        let (container, uri) = release_on_error("container", Ok("bolt://localhost:7687"), |_| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(container, "container");
        assert_eq!(uri, "bolt://localhost:7687");
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[ignore] // Requires a docker daemon
    async fn test_start_and_stop() {
        let (container, neo4j) = Neo4jContainer::start_with_neo4j_config(ContainerConfiguration::new("5", "neo4j", "s3cr3t"))
            .await
            .expect("Failed to start container");
        assert!(neo4j.uri.starts_with("bolt://"));
        assert!(container.mapped_port().await.unwrap() > 0);
        container.stop().await.unwrap();
    }
}
