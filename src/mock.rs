//! Hand-written mock collaborators for lifecycle tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{ConfigError, ConfigResolver, HostConfig, ServiceConfig};
use crate::context::Context;
use crate::driver::{ContainerSpec, DriverError, RegistryAuth, RuntimeDriver};
use crate::records::{RecordStore, StoreError};
use crate::service::Service;
use crate::types::ContainerId;

/// Scripted result for a single mock driver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    NotFound,
    Fail,
}

impl Outcome {
    fn apply(self, id: &ContainerId) -> Result<(), DriverError> {
        match self {
            Self::Ok => Ok(()),
            Self::NotFound => Err(DriverError::not_found(format!("No such container: {id}"))),
            Self::Fail => Err(DriverError::failed(format!("engine failure on {id}"))),
        }
    }
}

/// Mock runtime driver recording every call in invocation order.
#[derive(Default)]
pub struct MockDriver {
    /// Identifiers handed out by `run_container`, front first. When the
    /// queue runs dry, `"c1"` is handed out.
    pub run_ids: Mutex<VecDeque<String>>,
    pub stop_outcomes: Mutex<HashMap<String, Outcome>>,
    pub remove_outcomes: Mutex<HashMap<String, Outcome>>,
    pub ports: Mutex<HashMap<String, Vec<u16>>>,
    pub fail_pull: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockDriver {
    pub fn with_run_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        let mock = Self::default();
        mock.run_ids
            .lock()
            .unwrap()
            .extend(ids.into_iter().map(str::to_owned));
        mock
    }

    pub fn script_stop(&self, id: &str, outcome: Outcome) {
        self.stop_outcomes
            .lock()
            .unwrap()
            .insert(id.to_owned(), outcome);
    }

    pub fn script_remove(&self, id: &str, outcome: Outcome) {
        self.remove_outcomes
            .lock()
            .unwrap()
            .insert(id.to_owned(), outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn outcome_for(outcomes: &Mutex<HashMap<String, Outcome>>, id: &ContainerId) -> Outcome {
        outcomes
            .lock()
            .unwrap()
            .get(id.as_str())
            .copied()
            .unwrap_or(Outcome::Ok)
    }
}

#[async_trait]
impl RuntimeDriver for MockDriver {
    async fn pull_image(&self, image: &str, _auth: &RegistryAuth) -> Result<(), DriverError> {
        self.log(format!("pull {image}"));
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(DriverError::failed("registry unavailable"));
        }
        Ok(())
    }

    async fn run_container(
        &self,
        _spec: &ContainerSpec,
        _host: &HostConfig,
    ) -> Result<ContainerId, DriverError> {
        self.log("run".to_owned());
        let id = self
            .run_ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "c1".to_owned());
        Ok(ContainerId::from(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.log(format!("start {id}"));
        Ok(())
    }

    async fn stop_container(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.log(format!("stop {id}"));
        Self::outcome_for(&self.stop_outcomes, id).apply(id)
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        _host: &HostConfig,
    ) -> Result<(), DriverError> {
        self.log(format!("restart {id}"));
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), DriverError> {
        self.log(format!("remove {id}"));
        Self::outcome_for(&self.remove_outcomes, id).apply(id)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<Vec<u16>, DriverError> {
        self.log(format!("inspect {id}"));
        Ok(self
            .ports
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory record store with write accounting.
#[derive(Default)]
pub struct MockRecords {
    pub records: Mutex<HashMap<String, Service>>,
    pub writes: AtomicUsize,
    pub removed: Mutex<Vec<String>>,
    pub fail_writes: AtomicBool,
}

impl MockRecords {
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn stored(&self, key: &str) -> Option<Service> {
        self.records.lock().unwrap().get(key).cloned()
    }

    pub fn removed_keys(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MockRecords {
    async fn read(&self, key: &str) -> Result<Service, StoreError> {
        self.records
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }

    async fn write(&self, key: &str, record: &Service) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(key.to_owned(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.removed.lock().unwrap().push(key.to_owned());
        self.records.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Fixed set of service definitions; unknown names resolve to the
/// empty-image default, like the production resolver.
#[derive(Default)]
pub struct MockConfigs {
    pub definitions: Mutex<HashMap<String, ServiceConfig>>,
}

impl MockConfigs {
    pub fn define(&self, name: &str, config: ServiceConfig) {
        self.definitions
            .lock()
            .unwrap()
            .insert(name.to_owned(), config);
    }
}

#[async_trait]
impl ConfigResolver for MockConfigs {
    async fn resolve(&self, name: &str) -> Result<ServiceConfig, ConfigError> {
        Ok(self
            .definitions
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Bundles the three mocks and hands out [`Context`]s over them.
pub struct Harness {
    pub driver: Arc<MockDriver>,
    pub records: Arc<MockRecords>,
    pub configs: Arc<MockConfigs>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_driver(MockDriver::default())
    }

    pub fn with_driver(driver: MockDriver) -> Self {
        Self {
            driver: Arc::new(driver),
            records: Arc::new(MockRecords::default()),
            configs: Arc::new(MockConfigs::default()),
        }
    }

    pub fn context(&self) -> Context {
        Context::new(
            self.records.clone(),
            self.driver.clone(),
            self.configs.clone(),
        )
    }

    /// Registers a minimal definition (just an image) under a name.
    pub fn define(&self, name: &str, image: &str) {
        self.configs.define(
            name,
            ServiceConfig {
                image: image.to_owned(),
                ..Default::default()
            },
        );
    }
}
