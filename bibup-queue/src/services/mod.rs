//! Collaborators of the update queue
//!
//! The queue core only talks to these traits. Concrete implementations live in
//! the submodules (HTTP metadata source, connectivity flag, tracing sink) and in
//! `crate::db` (SQLite record store).

pub mod connectivity;
pub mod diagnostics;
pub mod metadata_client;

use async_trait::async_trait;
use bibup_common::{ItemId, Record, Result};
use std::sync::Arc;

use crate::error::FetchError;
use crate::schema::ItemSchema;

pub use connectivity::{spawn_reachability_probe, AlwaysOnline, OnlineFlag};
pub use diagnostics::TracingDiagnostics;
pub use metadata_client::HttpMetadataSource;

/// Storage of bibliographic records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a record; `Ok(None)` when the item does not exist
    async fn get_record(&self, item_id: ItemId) -> Result<Option<Record>>;

    /// Persist a whole record in one transaction
    ///
    /// The creator list is replaced wholesale; no intermediate state is visible.
    async fn save_record(&self, item_id: ItemId, record: &Record) -> Result<()>;
}

/// External lookup of updated metadata for a record
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// `Ok(None)` means no update is available, not an error
    async fn fetch_updated_metadata(
        &self,
        item_id: ItemId,
        record: &Record,
    ) -> std::result::Result<Option<Record>, FetchError>;
}

/// Polled connectivity check
pub trait Connectivity: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// Sink for errors that are logged but never shown raw to the user
pub trait DiagnosticsSink: Send + Sync {
    fn log_error(&self, context: &str, error: &(dyn std::error::Error + 'static));
}

/// Everything the queue core needs from the outside world
#[derive(Clone)]
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub source: Arc<dyn MetadataSource>,
    pub connectivity: Arc<dyn Connectivity>,
    pub schema: Arc<dyn ItemSchema>,
    pub diagnostics: Arc<dyn DiagnosticsSink>,
}
