use std::sync::Arc;

use crate::config::ConfigResolver;
use crate::driver::RuntimeDriver;
use crate::records::RecordStore;

/// The collaborator bundle threaded through every lifecycle operation.
///
/// All wiring is explicit: the record store, runtime driver and config
/// resolver are handles passed in by the embedding application, never
/// process globals. Logging is ambient through `tracing` and needs no
/// handle here.
#[derive(Clone)]
pub struct Context {
    pub records: Arc<dyn RecordStore>,
    pub driver: Arc<dyn RuntimeDriver>,
    pub configs: Arc<dyn ConfigResolver>,
}

impl Context {
    pub fn new(
        records: Arc<dyn RecordStore>,
        driver: Arc<dyn RuntimeDriver>,
        configs: Arc<dyn ConfigResolver>,
    ) -> Self {
        Self {
            records,
            driver,
            configs,
        }
    }
}
