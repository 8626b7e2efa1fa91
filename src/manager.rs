use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::context::Context;
use crate::service::Service;
use crate::Result;

/// Per-name lock table.
///
/// Locks are created on first use and kept for the lifetime of the
/// table; the set of service names is small and bounded by what the
/// caller deploys, so entries are never reaped.
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    fn get(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.inner.lock().expect("lock table poisoned");
        locks.entry(key.to_owned()).or_default().clone()
    }
}

/// Serialized front over the lifecycle operations.
///
/// Entity methods on [`Service`] assume a single owner; two callers
/// working on the same name can otherwise interleave their
/// read-mutate-write sequences and lose updates or double-create
/// containers. `Services` closes that race by scoping every operation
/// (fresh read included) under a per-name mutex. Operations on
/// different names proceed in parallel.
pub struct Services {
    ctx: Context,
    locks: KeyedLocks,
}

impl Services {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            locks: KeyedLocks::default(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Loads the named service.
    pub async fn get(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        Ok(svc)
    }

    /// Creates the named service from its definition.
    pub async fn create(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.create(&self.ctx, name).await?;
        Ok(svc)
    }

    /// Pulls the image of the named service.
    pub async fn pull(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.pull(&self.ctx).await?;
        Ok(svc)
    }

    /// Starts the named service.
    pub async fn start(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.start(&self.ctx).await?;
        Ok(svc)
    }

    /// Stops the named service.
    pub async fn stop(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.stop(&self.ctx).await?;
        Ok(svc)
    }

    /// Restarts the named service.
    pub async fn restart(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.restart(&self.ctx).await?;
        Ok(svc)
    }

    /// Removes the containers of the named service.
    pub async fn remove(&self, name: &str) -> Result<Service> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.remove(&self.ctx).await?;
        Ok(svc)
    }

    /// Destroys the named service: containers removed, record deleted.
    pub async fn destroy(&self, name: &str) -> Result<()> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.destroy(&self.ctx).await
    }

    /// Reports the host ports bound across the named service's
    /// containers.
    pub async fn ports(&self, name: &str) -> Result<Vec<u16>> {
        let lock = self.locks.get(name);
        let _guard = lock.lock().await;

        let mut svc = Service::new();
        svc.get(&self.ctx, name).await?;
        svc.ports(&self.ctx).await
    }
}
