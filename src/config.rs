use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// The configuration a service is launched with.
///
/// Resolved once at creation time from a [`ConfigResolver`] and persisted
/// as part of the service record. An empty `image` means "no such service
/// definition".
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Image reference to run the service from.
    pub image: String,

    /// Memory limit in bytes, 0 for unlimited.
    pub memory: i64,

    /// Port specs of the form `host:container`, or a bare container port
    /// for an engine-assigned host port.
    pub ports: Vec<String>,

    /// Volume binds, `host-path:container-path`.
    pub volumes: Vec<String>,

    /// Environment entries, `KEY=value`.
    pub env: Vec<String>,
}

/// Launch parameters derived from a [`ServiceConfig`].
///
/// Built once per start/restart and shared by every container of the
/// service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub memory: i64,
    pub ports: Vec<String>,
    pub binds: Vec<String>,
    pub privileged: bool,
    pub restart_policy: RestartPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    pub attempt: i64,
    pub name: String,
}

impl HostConfig {
    /// Derives the launch parameters for a service. Containers always run
    /// unprivileged with an always-restart policy bounded at 10 attempts.
    pub fn for_service(config: &ServiceConfig) -> Self {
        Self {
            memory: config.memory,
            ports: config.ports.clone(),
            binds: config.volumes.clone(),
            privileged: false,
            restart_policy: RestartPolicy {
                attempt: 10,
                name: "always".to_owned(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Store(#[from] berth_store::Error),
}

/// Source of service definitions, looked up by service name.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    /// Resolves the configuration for the named service.
    ///
    /// An unknown name resolves to the default (empty-image) configuration
    /// rather than an error; creation treats the empty image as "no such
    /// service definition".
    async fn resolve(&self, name: &str) -> Result<ServiceConfig, ConfigError>;
}

/// Service definitions stored as JSON files, one per service name.
#[derive(Debug, Clone)]
pub struct FsConfigSource {
    store: berth_store::Store,
}

impl FsConfigSource {
    pub fn new(store: berth_store::Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ConfigResolver for FsConfigSource {
    async fn resolve(&self, name: &str) -> Result<ServiceConfig, ConfigError> {
        match self.store.read(name).await {
            Ok(config) => Ok(config),
            Err(err) if err.is_not_found() => {
                trace!(service = name, "no definition file");
                Ok(ServiceConfig::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}
