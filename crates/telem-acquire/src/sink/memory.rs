//! In-memory sink
//!
//! Keeps every published document. Can be switched into a failing state to
//! exercise publisher error handling.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{SinkError, SnapshotDocument, SnapshotSink};

#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<Vec<SnapshotDocument>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail with `SinkError::Unavailable`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// All documents published so far, oldest first
    pub fn documents(&self) -> Vec<SnapshotDocument> {
        self.documents.lock().clone()
    }

    /// Most recent document
    pub fn last(&self) -> Option<SnapshotDocument> {
        self.documents.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.documents.lock().len()
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    async fn publish(&self, doc: &SnapshotDocument) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("memory sink set to fail".into()));
        }
        self.documents.lock().push(doc.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
