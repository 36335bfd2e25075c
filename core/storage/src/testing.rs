//! Test doubles shared by the provider tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use authbackup_common::{Error, Result, StorageLocation};
use authbackup_settings::{MemoryBackend, SettingKey, SettingsStore};

use crate::export::ExportSource;
use crate::provider::ProviderContext;
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Answers requests from a queue and records what was sent.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, status: u16, body: Value) {
        self.push(Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn respond_text(&self, status: u16, body: &str) {
        self.push(Ok(HttpResponse::new(status, body)));
    }

    pub fn fail(&self, message: &str) {
        self.push(Err(Error::Transport(message.to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn push(&self, response: Result<HttpResponse>) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transport(format!("unexpected request to {}", request.url))))
    }
}

/// Returns the same snapshot every time and remembers what was asked for.
pub struct StaticExport {
    snapshot: Value,
    pub requested: Mutex<Vec<bool>>,
}

impl StaticExport {
    pub fn new(snapshot: Value) -> Arc<Self> {
        Arc::new(Self {
            snapshot,
            requested: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ExportSource for StaticExport {
    async fn export(&self, encrypted: bool) -> Result<Value> {
        self.requested.lock().unwrap().push(encrypted);
        Ok(self.snapshot.clone())
    }
}

/// Seed the local partition.
pub fn seed(backend: &MemoryBackend, values: &[(SettingKey, Value)]) {
    let mut record = backend.partition(StorageLocation::Local);
    for (key, value) in values {
        record.set(key, value.clone());
    }
    backend.seed(StorageLocation::Local, record);
}

/// A provider context pinned to 2024-01-15.
pub fn context(
    backend: &MemoryBackend,
    transport: &Arc<ScriptedTransport>,
    export: &Arc<StaticExport>,
) -> ProviderContext {
    ProviderContext::new(
        SettingsStore::new(Arc::new(backend.clone())),
        transport.clone(),
        export.clone(),
    )
    .with_clock(|| Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
}
