use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use bollard::models;

use crate::config::{HostConfig, ServiceConfig};
use crate::types::ContainerId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type for runtime driver operations.
///
/// A driver failure either refers to an object the runtime no longer
/// knows about ([`DriverError::is_not_found`]) or is a plain failure.
/// The distinction is part of the driver contract: removal of a
/// container that is already gone must be recognizable without
/// inspecting message text.
#[derive(Debug, thiserror::Error)]
pub struct DriverError {
    kind: ErrorKind,
    source: BoxError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorKind {
    NotFound,
    Failed,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl DriverError {
    /// A failure meaning the referenced object is absent at the runtime
    /// level.
    pub fn not_found<E: Into<BoxError>>(source: E) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            source: source.into(),
        }
    }

    /// Any other runtime failure.
    pub fn failed<E: Into<BoxError>>(source: E) -> Self {
        Self {
            kind: ErrorKind::Failed,
            source: source.into(),
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl From<berth_oci::Error> for DriverError {
    fn from(value: berth_oci::Error) -> Self {
        if value.is_not_found() {
            Self::not_found(value)
        } else {
            Self::failed(value)
        }
    }
}

/// Registry credentials for image pulls. The default carries no
/// credentials at all (anonymous pull).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryAuth {
    pub username: Option<String>,
    pub password: Option<String>,
    pub server: Option<String>,
}

impl RegistryAuth {
    fn is_anonymous(&self) -> bool {
        *self == Self::default()
    }
}

/// Everything the runtime needs to create a new container for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    pub memory: i64,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub env: Vec<String>,
}

impl From<&ServiceConfig> for ContainerSpec {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            image: config.image.clone(),
            memory: config.memory,
            ports: config.ports.clone(),
            volumes: config.volumes.clone(),
            env: config.env.clone(),
        }
    }
}

/// Abstraction over the container runtime.
///
/// The lifecycle core only ever talks to the runtime through this trait;
/// the production implementation is [`EngineDriver`].
#[async_trait]
pub trait RuntimeDriver: Send + Sync {
    /// Pulls the given image.
    async fn pull_image(&self, image: &str, auth: &RegistryAuth) -> Result<(), DriverError>;

    /// Creates and starts a new container, returning the identifier the
    /// runtime assigned to it.
    async fn run_container(
        &self,
        spec: &ContainerSpec,
        host: &HostConfig,
    ) -> Result<ContainerId, DriverError>;

    /// Starts an existing container. Starting an already-running container
    /// is a no-op at the runtime level.
    async fn start_container(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Stops a running container.
    async fn stop_container(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Restarts an existing container. The host configuration is part of
    /// the interface contract even though some runtimes (the engine
    /// included) apply the configuration recorded at creation instead.
    async fn restart_container(
        &self,
        id: &ContainerId,
        host: &HostConfig,
    ) -> Result<(), DriverError>;

    /// Removes a container. A container that is already gone surfaces as
    /// a [`DriverError::is_not_found`] error.
    async fn remove_container(&self, id: &ContainerId) -> Result<(), DriverError>;

    /// Returns the host ports bound to a container.
    async fn inspect_container(&self, id: &ContainerId) -> Result<Vec<u16>, DriverError>;
}

/// [`RuntimeDriver`] backed by the container engine.
#[derive(Debug, Clone)]
pub struct EngineDriver {
    client: berth_oci::Client,
}

impl EngineDriver {
    pub fn new(client: berth_oci::Client) -> Self {
        Self { client }
    }
}

// Translates `host:container` (or bare `container`) port specs into the
// engine's binding map. Bare container ports get an engine-assigned host
// port. Malformed specs are skipped rather than failing the launch.
fn port_bindings(ports: &[String]) -> models::PortMap {
    let mut bindings: models::PortMap = HashMap::new();
    for spec in ports {
        let (host, container) = match spec.split_once(':') {
            Some((host, container)) => (Some(host.to_owned()), container),
            None => (None, spec.as_str()),
        };
        if container.is_empty() {
            continue;
        }
        let key = if container.contains('/') {
            container.to_owned()
        } else {
            format!("{container}/tcp")
        };
        if let Some(bound) = bindings.entry(key).or_insert_with(|| Some(Vec::new())) {
            bound.push(models::PortBinding {
                host_ip: None,
                host_port: host,
            });
        }
    }
    bindings
}

fn engine_host_config(host: &HostConfig, ports: &[String]) -> models::HostConfig {
    models::HostConfig {
        memory: (host.memory > 0).then_some(host.memory),
        binds: (!host.binds.is_empty()).then(|| host.binds.clone()),
        port_bindings: (!ports.is_empty()).then(|| port_bindings(ports)),
        privileged: Some(host.privileged),
        restart_policy: Some(models::RestartPolicy {
            name: Some(models::RestartPolicyNameEnum::ALWAYS),
            maximum_retry_count: Some(host.restart_policy.attempt),
        }),
        ..Default::default()
    }
}

#[async_trait]
impl RuntimeDriver for EngineDriver {
    async fn pull_image(&self, image: &str, auth: &RegistryAuth) -> Result<(), DriverError> {
        let creds = (!auth.is_anonymous()).then(|| berth_oci::Credentials {
            username: auth.username.clone(),
            password: auth.password.clone(),
            serveraddress: auth.server.clone(),
            ..Default::default()
        });
        self.client.image().pull(image, creds).await?;
        Ok(())
    }

    async fn run_container(
        &self,
        spec: &ContainerSpec,
        host: &HostConfig,
    ) -> Result<ContainerId, DriverError> {
        let body = models::ContainerCreateBody {
            image: Some(spec.image.clone()),
            env: (!spec.env.is_empty()).then(|| spec.env.clone()),
            host_config: Some(engine_host_config(host, &spec.ports)),
            ..Default::default()
        };

        let container = self.client.container();
        let id = container.create(body).await?;
        container.start(&id).await?;
        Ok(ContainerId::from(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.client.container().start(id.as_str()).await?;
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.client.container().stop(id.as_str()).await?;
        Ok(())
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        _host: &HostConfig,
    ) -> Result<(), DriverError> {
        self.client.container().restart(id.as_str()).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.client.container().remove(id.as_str()).await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<Vec<u16>, DriverError> {
        let ports = self.client.container().host_ports(id.as_str()).await?;
        Ok(ports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn port_specs_translate_to_binding_map() {
        let ports = vec!["8080:80".to_owned(), "6379".to_owned()];
        let bindings = port_bindings(&ports);

        let web = bindings.get("80/tcp").unwrap().as_ref().unwrap();
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].host_port.as_deref(), Some("8080"));

        // bare container port: engine assigns the host port
        let redis = bindings.get("6379/tcp").unwrap().as_ref().unwrap();
        assert_eq!(redis[0].host_port, None);
    }

    #[test]
    fn malformed_port_specs_are_skipped() {
        let ports = vec!["8080:".to_owned(), String::new()];
        let bindings = port_bindings(&ports);
        assert!(bindings.is_empty());
    }

    #[test]
    fn not_found_errors_are_typed() {
        let err = DriverError::not_found("No such container: c1");
        assert!(err.is_not_found());
        let err = DriverError::failed("engine exploded");
        assert!(!err.is_not_found());
    }
}
