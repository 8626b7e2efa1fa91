//! Service lifecycle core.
//!
//! A **service** is a named, versioned unit mapped onto zero or more
//! runtime containers. This crate owns the lifecycle state machine
//! (create, pull, start, stop, restart, remove, destroy) over a
//! persisted service record, coordinating a record store and a
//! container-runtime driver behind explicit collaborator traits.
//!
//! Production wiring uses the filesystem record store from
//! [`berth_store`] and the engine client from [`berth_oci`]:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use berth::{Context, EngineDriver, FsConfigSource, FsRecords, Services};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = berth_oci::Client::connect().await?;
//! let ctx = Context::new(
//!     Arc::new(FsRecords::new(berth_store::Store::new("/var/lib/berth/services"))),
//!     Arc::new(EngineDriver::new(engine)),
//!     Arc::new(FsConfigSource::new(berth_store::Store::new("/etc/berth/definitions"))),
//! );
//!
//! let services = Services::new(ctx);
//! services.create("redis").await?;
//! services.start("redis").await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod driver;
mod manager;
mod records;
mod service;
mod types;

#[cfg(test)]
mod mock;

pub use config::{
    ConfigError, ConfigResolver, FsConfigSource, HostConfig, RestartPolicy, ServiceConfig,
};
pub use context::Context;
pub use driver::{ContainerSpec, DriverError, EngineDriver, RegistryAuth, RuntimeDriver};
pub use manager::Services;
pub use records::{FsRecords, RecordStore, StoreError};
pub use service::{ContainerRef, DEFAULT_TAG, Service, ServiceStatus};
pub use types::{ContainerId, Uuid};

/// The error type for lifecycle operations.
///
/// `NotFound` covers both an entity without an identity and a record
/// absent from the store; runtime and persistence failures are passed
/// through verbatim. A driver-level "object absent" condition stays a
/// [`DriverError`]; the one place it gets special treatment is
/// [`Service::remove`], which recovers from it locally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("service not found")]
    NotFound,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        if value.is_not_found() {
            Self::NotFound
        } else {
            Self::Store(value)
        }
    }
}

/// A specialized [`Result`] type for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;
