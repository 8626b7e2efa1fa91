use async_trait::async_trait;
use thiserror::Error;

use crate::service::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The error type for record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key has no stored record.
    #[error("no record for `{0}`")]
    NotFound(String),

    /// The backing store failed.
    #[error(transparent)]
    Backend(BoxError),
}

impl StoreError {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Durable key/value persistence for service records.
///
/// The stored record is the sole durable source of truth for a service's
/// container set; implementations must keep serialization stable and
/// tolerate unknown fields so that records written by newer versions
/// still read.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Loads the record stored under the given key.
    async fn read(&self, key: &str) -> Result<Service, StoreError>;

    /// Creates or replaces the record stored under the given key.
    async fn write(&self, key: &str, record: &Service) -> Result<(), StoreError>;

    /// Deletes the record stored under the given key, if any.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// [`RecordStore`] over a [`berth_store::Store`] directory.
#[derive(Debug, Clone)]
pub struct FsRecords {
    store: berth_store::Store,
}

impl FsRecords {
    pub fn new(store: berth_store::Store) -> Self {
        Self { store }
    }
}

fn map_err(key: &str, err: berth_store::Error) -> StoreError {
    if err.is_not_found() {
        StoreError::NotFound(key.to_owned())
    } else {
        StoreError::Backend(Box::new(err))
    }
}

#[async_trait]
impl RecordStore for FsRecords {
    async fn read(&self, key: &str) -> Result<Service, StoreError> {
        self.store.read(key).await.map_err(|err| map_err(key, err))
    }

    async fn write(&self, key: &str, record: &Service) -> Result<(), StoreError> {
        self.store
            .write(key, record)
            .await
            .map_err(|err| map_err(key, err))
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.store
            .delete(key)
            .await
            .map(|_| ())
            .map_err(|err| map_err(key, err))
    }
}
