//! Test doubles for the queue collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use bibup_common::events::{EventBus, UpdateEvent};
use bibup_common::{Creator, ItemId, Record, RowSnapshot, RowStatus};
use bibup_queue::config::QueueConfig;
use bibup_queue::error::FetchError;
use bibup_queue::schema::TableSchema;
use bibup_queue::services::{
    Collaborators, Connectivity, DiagnosticsSink, MetadataSource, RecordStore,
};
use bibup_queue::MetadataUpdater;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Semaphore};
use tokio::time::Instant;

/// In-memory record store
#[derive(Default)]
pub struct MemoryRecordStore {
    records: Mutex<HashMap<ItemId, Record>>,
    saves: AtomicUsize,
}

impl MemoryRecordStore {
    pub fn insert(&self, item_id: ItemId, record: Record) {
        self.records.lock().unwrap().insert(item_id, record);
    }

    pub fn remove(&self, item_id: ItemId) {
        self.records.lock().unwrap().remove(&item_id);
    }

    pub fn get(&self, item_id: ItemId) -> Option<Record> {
        self.records.lock().unwrap().get(&item_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_record(&self, item_id: ItemId) -> bibup_common::Result<Option<Record>> {
        Ok(self.get(item_id))
    }

    async fn save_record(&self, item_id: ItemId, record: &Record) -> bibup_common::Result<()> {
        let mut records = self.records.lock().unwrap();
        if !records.contains_key(&item_id) {
            return Err(bibup_common::Error::NotFound(format!("item {}", item_id)));
        }
        records.insert(item_id, record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Canned lookup outcome
#[derive(Debug, Clone)]
pub enum Scripted {
    Update(Record),
    NoUpdate,
    Alert(String),
    Error(String),
}

/// Metadata source answering from a script
///
/// With a gate, every lookup waits for one permit before answering.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<ItemId, Scripted>>,
    calls: Mutex<Vec<(ItemId, Instant)>>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedSource {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn script(&self, item_id: ItemId, response: Scripted) {
        self.responses.lock().unwrap().insert(item_id, response);
    }

    pub fn calls(&self) -> Vec<ItemId> {
        self.calls.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl MetadataSource for ScriptedSource {
    async fn fetch_updated_metadata(
        &self,
        item_id: ItemId,
        _record: &Record,
    ) -> Result<Option<Record>, FetchError> {
        self.calls.lock().unwrap().push((item_id, Instant::now()));

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let response = self
            .responses
            .lock()
            .unwrap()
            .get(&item_id)
            .cloned()
            .unwrap_or(Scripted::NoUpdate);

        match response {
            Scripted::Update(record) => Ok(Some(record)),
            Scripted::NoUpdate => Ok(None),
            Scripted::Alert(message) => Err(FetchError::Alert(message)),
            Scripted::Error(message) => Err(FetchError::Other(anyhow::anyhow!(message))),
        }
    }
}

/// Reports offline for the first `offline_checks` polls
#[derive(Default)]
pub struct CountingConnectivity {
    offline_checks: usize,
    checks: Mutex<Vec<Instant>>,
}

impl CountingConnectivity {
    pub fn offline_for(offline_checks: usize) -> Self {
        Self {
            offline_checks,
            checks: Mutex::new(Vec::new()),
        }
    }

    pub fn check_times(&self) -> Vec<Instant> {
        self.checks.lock().unwrap().clone()
    }
}

impl Connectivity for CountingConnectivity {
    fn is_offline(&self) -> bool {
        let mut checks = self.checks.lock().unwrap();
        checks.push(Instant::now());
        checks.len() <= self.offline_checks
    }
}

/// Diagnostics sink keeping every reported error
#[derive(Default)]
pub struct RecordingDiagnostics {
    errors: Mutex<Vec<(String, String)>>,
}

impl RecordingDiagnostics {
    pub fn errors(&self) -> Vec<(String, String)> {
        self.errors.lock().unwrap().clone()
    }
}

impl DiagnosticsSink for RecordingDiagnostics {
    fn log_error(&self, context: &str, error: &(dyn std::error::Error + 'static)) {
        self.errors
            .lock()
            .unwrap()
            .push((context.to_string(), error.to_string()));
    }
}

pub struct Harness {
    pub updater: Arc<MetadataUpdater>,
    pub records: Arc<MemoryRecordStore>,
    pub source: Arc<ScriptedSource>,
    pub connectivity: Arc<CountingConnectivity>,
    pub diagnostics: Arc<RecordingDiagnostics>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ScriptedSource::default(), CountingConnectivity::default(), QueueConfig::default())
    }

    pub fn build(
        source: ScriptedSource,
        connectivity: CountingConnectivity,
        config: QueueConfig,
    ) -> Self {
        let records = Arc::new(MemoryRecordStore::default());
        let source = Arc::new(source);
        let connectivity = Arc::new(connectivity);
        let diagnostics = Arc::new(RecordingDiagnostics::default());

        let collaborators = Collaborators {
            records: records.clone(),
            source: source.clone(),
            connectivity: connectivity.clone(),
            schema: Arc::new(TableSchema::builtin()),
            diagnostics: diagnostics.clone(),
        };

        let updater = Arc::new(MetadataUpdater::ready(EventBus::new(1000), collaborators, config));

        Self {
            updater,
            records,
            source,
            connectivity,
            diagnostics,
        }
    }

    pub async fn row(&self, item_id: ItemId) -> RowSnapshot {
        self.updater
            .state()
            .rows
            .get(item_id)
            .await
            .expect("row should exist")
    }
}

pub fn book(title: &str) -> Record {
    Record::new("book")
        .with_creator(Creator::new("author", "Ada", "Lovelace"))
        .with_field("title", title)
        .with_field("publisher", "Taylor")
        .with_field("date", "1843")
}

pub fn journal_article(title: &str) -> Record {
    Record::new("journalArticle")
        .with_creator(Creator::new("editor", "Ada", "Lovelace"))
        .with_field("title", title)
        .with_field("date", "1843")
}

pub fn field_names(row: &RowSnapshot) -> Vec<&str> {
    row.fields.iter().map(|f| f.field_name.as_str()).collect()
}

/// Drain every event currently buffered on a receiver
pub fn drain_events(rx: &mut broadcast::Receiver<UpdateEvent>) -> Vec<UpdateEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Count rows in Processing in a RowsChanged event
pub fn processing_count(event: &UpdateEvent) -> Option<usize> {
    match event {
        UpdateEvent::RowsChanged { rows, .. } => Some(
            rows.iter()
                .filter(|r| r.status == RowStatus::Processing)
                .count(),
        ),
        _ => None,
    }
}
