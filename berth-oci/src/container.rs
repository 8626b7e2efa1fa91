use bollard::models::ContainerCreateBody;
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};

use super::{Client, Error, Result, WithContext};

#[derive(Debug, Clone)]
pub struct Container<'a>(&'a Client);

impl<'a> Container<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self(client)
    }
}

impl Container<'_> {
    /// Creates a new container from the given configuration and returns the
    /// identifier assigned by the engine.
    pub async fn create(&self, config: ContainerCreateBody) -> Result<String> {
        let res = self
            .0
            .inner()
            .create_container(None::<CreateContainerOptions>, config)
            .await;
        let created = res
            .map_err(Error::from)
            .context("failed to create container")?;

        Ok(created.id)
    }

    /// Starts a created or stopped container.
    pub async fn start(&self, container_id: &str) -> Result<()> {
        self.0
            .inner()
            .start_container(container_id, None::<StartContainerOptions>)
            .await
            .map_err(Error::from)
            .with_context(|| format!("failed to start container {container_id}"))?;

        Ok(())
    }

    /// Stops a running container.
    pub async fn stop(&self, container_id: &str) -> Result<()> {
        self.0
            .inner()
            .stop_container(container_id, None::<StopContainerOptions>)
            .await
            .map_err(Error::from)
            .with_context(|| format!("failed to stop container {container_id}"))?;

        Ok(())
    }

    /// Restarts a container.
    pub async fn restart(&self, container_id: &str) -> Result<()> {
        self.0
            .inner()
            .restart_container(container_id, None::<RestartContainerOptions>)
            .await
            .map_err(Error::from)
            .with_context(|| format!("failed to restart container {container_id}"))?;

        Ok(())
    }

    /// Removes a container.
    ///
    /// A missing container is reported as an error with
    /// [`Error::is_not_found`] returning true; callers decide whether that
    /// counts as failure.
    pub async fn remove(&self, container_id: &str) -> Result<()> {
        self.0
            .inner()
            .remove_container(container_id, None::<RemoveContainerOptions>)
            .await
            .map_err(Error::from)
            .with_context(|| format!("failed to remove container {container_id}"))?;

        Ok(())
    }

    /// Returns the host ports bound to a container, sorted and
    /// deduplicated.
    pub async fn host_ports(&self, container_id: &str) -> Result<Vec<u16>> {
        let res = self
            .0
            .inner()
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await;
        let info = res
            .map_err(Error::from)
            .with_context(|| format!("failed to inspect container {container_id}"))?;

        let mut ports = Vec::new();
        let bindings = info
            .network_settings
            .and_then(|settings| settings.ports)
            .unwrap_or_default();

        for bound in bindings.into_values().flatten() {
            for binding in bound {
                if let Some(port) = binding.host_port.as_deref()
                    && let Ok(port) = port.parse::<u16>()
                {
                    ports.push(port);
                }
            }
        }

        // the engine reports bindings as a map, keep the list deterministic
        ports.sort_unstable();
        ports.dedup();

        Ok(ports)
    }
}
