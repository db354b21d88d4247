//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use relay::error::{AppError, Result};
use relay::models::{Config, Detail, MessageHandle, Record, SourceConfig};
use relay::notify::Messenger;
use relay::services::{DetailSource, Source};
use relay::storage::{MemoryStore, RecordStore};

/// A source whose fetch results are set by the test.
#[derive(Clone)]
pub struct ScriptedSource {
    name: String,
    records: Arc<Mutex<Vec<Record>>>,
    failing: Arc<Mutex<bool>>,
    details: Option<Arc<Mutex<HashMap<String, Result<Detail>>>>>,
    detail_calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            records: Arc::default(),
            failing: Arc::default(),
            details: None,
            detail_calls: Arc::default(),
        }
    }

    /// Give the source a detail capability.
    pub fn with_details(mut self) -> Self {
        self.details = Some(Arc::default());
        self
    }

    pub fn set_records(&self, records: Vec<Record>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn set_detail(&self, key: &str, detail: Result<Detail>) {
        if let Some(details) = &self.details {
            details.lock().unwrap().insert(key.to_string(), detail);
        }
    }

    pub fn detail_calls(&self) -> Vec<String> {
        self.detail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Source for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<Record>> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::fetch(&self.name, "scripted outage"));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    fn details(&self) -> Option<&dyn DetailSource> {
        self.details.as_ref().map(|_| self as &dyn DetailSource)
    }

    fn build_message(&self, record: &Record, _config: &SourceConfig) -> String {
        format!("{}: {}", record.id, record.content)
    }
}

#[async_trait]
impl DetailSource for ScriptedSource {
    async fn fetch_detail(&self, key: &str) -> Result<Detail> {
        self.detail_calls.lock().unwrap().push(key.to_string());
        let details = self.details.as_ref().map(|d| d.lock().unwrap().remove(key));
        match details.flatten() {
            Some(result) => result,
            None => Err(AppError::fetch(&self.name, format!("no detail for {key}"))),
        }
    }
}

/// One call made against the messenger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Text {
        text: String,
        thread_id: Option<i64>,
    },
    Photo {
        url: String,
        caption: String,
    },
    Group {
        urls: Vec<String>,
        caption: String,
    },
    Edit {
        handle: MessageHandle,
        text: String,
    },
}

#[derive(Default)]
struct MessengerState {
    calls: Vec<Call>,
    next_handle: i64,
    fail_sends: VecDeque<bool>,
    fail_edits: VecDeque<bool>,
}

/// Records every call and hands out increasing handles starting at 1.
#[derive(Clone, Default)]
pub struct RecordingMessenger {
    state: Arc<Mutex<MessengerState>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Fail the next send.
    pub fn fail_next_send(&self) {
        self.state.lock().unwrap().fail_sends.push_back(true);
    }

    /// Fail the next edit.
    pub fn fail_next_edit(&self) {
        self.state.lock().unwrap().fail_edits.push_back(true);
    }

    fn send(&self, call: Call) -> Result<MessageHandle> {
        let mut state = self.state.lock().unwrap();
        if state.fail_sends.pop_front().unwrap_or(false) {
            return Err(AppError::telegram("send", "scripted failure"));
        }
        state.calls.push(call);
        state.next_handle += 1;
        Ok(MessageHandle(state.next_handle))
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, text: &str, thread_id: Option<i64>) -> Result<MessageHandle> {
        self.send(Call::Text {
            text: text.to_string(),
            thread_id,
        })
    }

    async fn send_photo(
        &self,
        url: &str,
        caption: &str,
        _thread_id: Option<i64>,
    ) -> Result<MessageHandle> {
        self.send(Call::Photo {
            url: url.to_string(),
            caption: caption.to_string(),
        })
    }

    async fn send_media_group(
        &self,
        urls: &[String],
        caption: &str,
        _thread_id: Option<i64>,
    ) -> Result<MessageHandle> {
        self.send(Call::Group {
            urls: urls.to_vec(),
            caption: caption.to_string(),
        })
    }

    async fn edit_text(&self, handle: MessageHandle, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_edits.pop_front().unwrap_or(false) {
            return Err(AppError::telegram("editMessageText", "scripted failure"));
        }
        state.calls.push(Call::Edit {
            handle,
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Memory-backed store whose `fail_on`-th save (1-based) errors.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    saves: Arc<AtomicUsize>,
    fail_on: usize,
}

impl FlakyStore {
    pub fn failing_save(fail_on: usize) -> Self {
        Self {
            fail_on,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn load_row(&self, source: &str) -> Result<Option<String>> {
        self.inner.load_row(source).await
    }

    async fn save_row(&self, source: &str, blob: &str) -> Result<()> {
        let attempt = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt == self.fail_on {
            return Err(AppError::Io(std::io::Error::other("disk full")));
        }
        self.inner.save_row(source, blob).await
    }
}

/// Config with the given sources and no pacing delays.
pub fn config_with(sources: Vec<SourceConfig>) -> Config {
    let mut config = Config::default();
    config.telegram.bot_token = "123:abc".into();
    config.telegram.chat_id = "-100".into();
    config.relay.dispatch_delay_ms = 0;
    config.relay.detail_delay_ms = 0;
    config.sources = sources;
    config
}

/// A source that edits by prefix on `_`.
pub fn correlated(name: &str) -> SourceConfig {
    SourceConfig {
        event_prefix_separator: Some('_'),
        enable_message_edit: true,
        ..SourceConfig::new(name)
    }
}

pub fn record(id: &str, date: &str) -> Record {
    Record::new(id, id).with_content(id).with_create_date(date)
}
