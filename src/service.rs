use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::{HostConfig, ServiceConfig};
use crate::context::Context;
use crate::driver::{ContainerSpec, RegistryAuth};
use crate::types::{ContainerId, Uuid};
use crate::{Error, Result};

/// Tag assigned to a service at creation.
pub const DEFAULT_TAG: &str = "latest";

/// The service lifecycle status.
///
/// Kept in the record and updated together with the container set, so
/// the state machine is explicit instead of being inferred from set
/// emptiness alone. Old records without the field read as `Pending`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Pending,
    Running,
    Stopped,
    Removed,
}

/// The handle a service keeps for one of its runtime containers.
///
/// Deliberately minimal: no cached status or start time. Any present
/// entry means "may be running"; the runtime driver is the ground truth
/// when it matters.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: ContainerId,
}

/// A named, versioned deployable unit mapped onto zero or more runtime
/// containers.
///
/// The persisted record is the sole durable source of truth for the
/// container set; field names below (including the singular `container`
/// map key) are the wire contract and must not change.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Service {
    /// Unique identity, assigned once by [`Service::create`]. Empty means
    /// the service does not exist yet.
    pub uuid: Uuid,

    /// Human-assigned unique name; the record store lookup key.
    pub name: String,

    /// Release label.
    pub tag: String,

    /// The containers believed to currently back this service.
    #[serde(rename = "container", default)]
    pub containers: BTreeMap<ContainerId, ContainerRef>,

    /// Launch configuration resolved at creation time.
    #[serde(default)]
    pub config: ServiceConfig,

    #[serde(default)]
    pub status: ServiceStatus,
}

impl Service {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_identity(&self) -> Result<()> {
        if self.uuid.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Loads the record stored under `key` into this entity.
    ///
    /// Store failures, including a missing record, propagate to the
    /// caller unmodified.
    pub async fn get(&mut self, ctx: &Context, key: &str) -> Result<()> {
        info!(service = key, "get service");

        *self = ctx.records.read(key).await?;

        Ok(())
    }

    /// Persists the full entity under its name.
    pub async fn update(&self, ctx: &Context) -> Result<()> {
        info!(service = %self.name, "update service");

        self.require_identity()?;

        ctx.records.write(&self.name, self).await?;

        Ok(())
    }

    /// Creates the service: assigns a fresh identity, resolves the launch
    /// configuration by name and writes the initial record.
    ///
    /// This is the only operation permitted on an entity without an
    /// identity. A definition that resolves to an empty image is treated
    /// as "no such service" and nothing is written.
    pub async fn create(&mut self, ctx: &Context, name: &str) -> Result<()> {
        info!(service = name, "create service");

        self.uuid = Uuid::generate();
        self.name = name.to_owned();
        self.tag = DEFAULT_TAG.to_owned();
        self.containers = BTreeMap::new();
        self.status = ServiceStatus::Pending;

        self.config = ctx.configs.resolve(name).await?;
        if self.config.image.is_empty() {
            return Err(Error::NotFound);
        }

        ctx.records.write(&self.name, self).await?;

        Ok(())
    }

    /// Pulls the service image with default (anonymous) credentials.
    ///
    /// A driver failure is returned without touching persisted state; on
    /// success the record is rewritten as an audit point even though no
    /// fields change.
    pub async fn pull(&self, ctx: &Context) -> Result<()> {
        info!(image = %self.config.image, "pull service image");

        let auth = RegistryAuth::default();
        if let Err(err) = ctx.driver.pull_image(&self.config.image, &auth).await {
            error!(%err, image = %self.config.image, "image pull failed");
            return Err(err.into());
        }

        self.update(ctx).await
    }

    /// Starts the service.
    ///
    /// Known containers are started in place. With no containers yet,
    /// exactly one is created from the service configuration; the
    /// creation loop repeats only while the set stays empty, which guards
    /// against a driver handing back an empty identifier. Running more
    /// than one container per service is future work.
    pub async fn start(&mut self, ctx: &Context) -> Result<()> {
        info!(service = %self.name, "start service");

        self.require_identity()?;

        let host = HostConfig::for_service(&self.config);

        // run containers if they exist
        for container in self.containers.values() {
            if let Err(err) = ctx.driver.start_container(&container.id).await {
                error!(%err, container = %container.id, "failed to start container");
                return Err(err.into());
            }
        }

        while self.containers.is_empty() {
            let spec = ContainerSpec::from(&self.config);

            let id = match ctx.driver.run_container(&spec, &host).await {
                Ok(id) => id,
                Err(err) => {
                    error!(%err, "failed to run container");
                    return Err(err.into());
                }
            };

            if id.is_empty() {
                continue;
            }

            self.containers.insert(id.clone(), ContainerRef { id });
        }

        self.status = ServiceStatus::Running;
        self.update(ctx).await
    }

    /// Stops every container with a known identifier.
    ///
    /// References with an empty identifier never existed at the runtime
    /// level and are skipped. The first stop failure aborts the loop;
    /// remaining containers are left running and nothing is persisted.
    pub async fn stop(&mut self, ctx: &Context) -> Result<()> {
        info!(service = %self.name, "stop service");

        self.require_identity()?;

        for container in self.containers.values() {
            if container.id.is_empty() {
                continue;
            }

            if let Err(err) = ctx.driver.stop_container(&container.id).await {
                error!(%err, container = %container.id, "failed to stop container");
                return Err(err.into());
            }
        }

        self.status = ServiceStatus::Stopped;
        self.update(ctx).await
    }

    /// Restarts the service: existing containers are restarted in place,
    /// or one is created as in [`Service::start`] when the set is empty.
    ///
    /// Persists after mutating, like every other operation here.
    pub async fn restart(&mut self, ctx: &Context) -> Result<()> {
        info!(service = %self.name, "restart service");

        self.require_identity()?;

        let host = HostConfig::for_service(&self.config);

        for container in self.containers.values() {
            if let Err(err) = ctx.driver.restart_container(&container.id, &host).await {
                error!(%err, container = %container.id, "failed to restart container");
                return Err(err.into());
            }
        }

        while self.containers.is_empty() {
            let spec = ContainerSpec::from(&self.config);

            let id = match ctx.driver.run_container(&spec, &host).await {
                Ok(id) => id,
                Err(err) => {
                    error!(%err, "failed to run container");
                    return Err(err.into());
                }
            };

            if id.is_empty() {
                continue;
            }

            self.containers.insert(id.clone(), ContainerRef { id });
        }

        self.status = ServiceStatus::Running;
        self.update(ctx).await
    }

    /// Removes every container of the service.
    ///
    /// A container the runtime no longer knows about counts as removed:
    /// its reference is cleared and the loop continues. Any other driver
    /// failure aborts immediately, leaving unprocessed references (and
    /// the persisted record) untouched.
    pub async fn remove(&mut self, ctx: &Context) -> Result<()> {
        info!(service = %self.name, "remove service");

        self.require_identity()?;

        let keys: Vec<ContainerId> = self.containers.keys().cloned().collect();
        for key in keys {
            let id = self.containers[&key].id.clone();

            if !id.is_empty() {
                if let Err(err) = ctx.driver.remove_container(&id).await {
                    if err.is_not_found() {
                        info!(container = %id, service = %self.name, "container already gone, clearing reference");
                        self.containers.remove(&key);
                        continue;
                    }

                    error!(%err, container = %id, "failed to remove container");
                    return Err(err.into());
                }
            }

            self.containers.remove(&key);
        }

        self.status = ServiceStatus::Removed;
        self.update(ctx).await
    }

    /// Removes all containers, then deletes the record.
    ///
    /// Delegates to [`Service::remove`] first; if that fails the record
    /// is left in place. The delete is keyed by the service uuid while
    /// writes are keyed by name. The in-memory identity is left stale on
    /// purpose: the entity is dead after this call and must not be
    /// reused.
    pub async fn destroy(&mut self, ctx: &Context) -> Result<()> {
        info!(service = %self.name, "destroy service");

        self.require_identity()?;

        self.remove(ctx).await?;

        ctx.records.remove(self.uuid.as_str()).await?;

        Ok(())
    }

    /// Returns the host ports bound across all containers of the service.
    ///
    /// An empty container set yields an empty list without consulting the
    /// driver.
    pub async fn ports(&self, ctx: &Context) -> Result<Vec<u16>> {
        let mut ports = Vec::new();

        if self.containers.is_empty() {
            return Ok(ports);
        }

        for container in self.containers.values() {
            match ctx.driver.inspect_container(&container.id).await {
                Ok(bound) => ports.extend(bound),
                Err(err) => {
                    error!(%err, container = %container.id, "failed to inspect container");
                    return Err(err.into());
                }
            }
        }

        Ok(ports)
    }
}
