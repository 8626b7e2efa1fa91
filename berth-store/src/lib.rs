//! Filesystem backed record store.
//!
//! [`Store`] is a very simple mechanism for persisting JSON documents on
//! disk, keyed by name. Writes are atomic (temp file + sync + rename) but
//! the store provides no concurrency control of its own; callers that may
//! mutate the same key concurrently need to serialize access themselves.
//!
//! # Example
//!
//! ```no_run
//! use berth_store::Store;
//!
//! # async fn example() -> berth_store::Result<()> {
//! let store = Store::new("/var/lib/berth");
//! store.write("my-service", &serde_json::json!({ "tag": "latest" })).await?;
//! # Ok(())
//! # }
//! ```

mod fs;
mod store;

pub use store::{Error, Result, Store};
