//! Shared helpers for autosave session tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sitebook_autosave::{
    AutosaveConfig, AutosaveEvent, AutosaveHandle, BatchUpsert, UpsertError, spawn_session,
};
use sitebook_types::{BatchResult, ItemUpdate, VersionToken};
use tokio::sync::broadcast;

/// Default debounce + batch window, with a little slack.
pub const SETTLE: Duration = Duration::from_millis(600);

/// One scripted answer to a `batch_upsert` call.
pub enum Reply {
    Results(Vec<BatchResult>),
    Fail(UpsertError),
    /// Never answers.
    Hang,
    /// Answers after a delay.
    Delayed(Duration, Vec<BatchResult>),
}

/// Records every request and answers from a script. With the script
/// exhausted it acknowledges every row with a fresh `v<n>` version.
#[derive(Default)]
pub struct ScriptedStore {
    calls: Mutex<Vec<Vec<ItemUpdate>>>,
    replies: Mutex<VecDeque<Reply>>,
    next_version: AtomicU64,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Vec<ItemUpdate>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Vec<ItemUpdate> {
        self.calls.lock().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl BatchUpsert for ScriptedStore {
    async fn batch_upsert(&self, items: Vec<ItemUpdate>) -> Result<Vec<BatchResult>, UpsertError> {
        self.calls.lock().push(items.clone());
        let reply = self.replies.lock().pop_front();
        match reply {
            None => Ok(items
                .iter()
                .map(|item| {
                    let n = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
                    BatchResult::saved(item.id.clone(), VersionToken::from(format!("v{n}")))
                })
                .collect()),
            Some(Reply::Results(results)) => Ok(results),
            Some(Reply::Fail(err)) => Err(err),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Delayed(delay, results)) => {
                tokio::time::sleep(delay).await;
                Ok(results)
            }
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Spawn a session with default timings over `store`.
pub fn session(store: &Arc<ScriptedStore>) -> AutosaveHandle {
    session_with(store, AutosaveConfig::default())
}

pub fn session_with(store: &Arc<ScriptedStore>, config: AutosaveConfig) -> AutosaveHandle {
    init_tracing();
    spawn_session(Arc::clone(store), config)
}

/// Let the actor run without moving the clock much.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn drain(rx: &mut broadcast::Receiver<AutosaveEvent>) -> Vec<AutosaveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn qty(id: &str, quantity: f64) -> ItemUpdate {
    ItemUpdate::new(id).with_quantity(quantity)
}
