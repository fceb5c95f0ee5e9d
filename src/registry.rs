use std::time::{Duration, Instant};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// progress of a single upload, keyed by its id (the uploaded file name)
#[derive(Debug, Clone, PartialEq)]
pub struct UploadProgress {
    pub id: String,
    pub total_size: u64,
    pub bytes_transferred: u64,
    pub status_message: String,
    pub done: bool,
    pub done_at: Option<Instant>,
    /// set together with `done` when the upload ended on an i/o error
    pub failed: bool,
}

impl UploadProgress {
    /// fresh entry for an upload that has not transferred anything yet
    pub fn new(id: impl Into<String>, total_size: u64) -> Self {
        Self {
            id: id.into(),
            total_size,
            bytes_transferred: 0,
            status_message: "Starting upload".to_string(),
            done: false,
            done_at: None,
            failed: false,
        }
    }

    pub fn record_chunk(&mut self, n: usize) {
        self.bytes_transferred += n as u64;
        self.status_message = "Uploading".to_string();
    }

    pub fn complete(&mut self) {
        self.finish("Upload complete".to_string(), false);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.finish(message.into(), true);
    }

    // done_at is only ever set once
    fn finish(&mut self, message: String, failed: bool) {
        if self.done {
            return;
        }
        self.status_message = message;
        self.failed = failed;
        self.done = true;
        self.done_at = Some(Instant::now());
    }

    /// percentage of the declared size transferred so far, clamped to 100.
    /// a zero-length upload counts as fully transferred.
    pub fn percent(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        (self.bytes_transferred as f64 / self.total_size as f64 * 100.0).min(100.0)
    }

    /// whether the entry finished more than `grace` before `now`
    pub fn is_expired(&self, now: Instant, grace: Duration) -> bool {
        match (self.done, self.done_at) {
            (true, Some(done_at)) => now.saturating_duration_since(done_at) > grace,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("an upload named {0} is already in progress")]
    UploadInProgress(String),
}

/// what a `for_each` visitor wants done with the entry it just saw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Keep,
    Remove,
}

/// receives every snapshot an upload worker publishes
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, progress: &UploadProgress);
}

/// shared map of upload id -> last published progress
#[derive(Debug, Default)]
pub struct ProgressRegistry {
    entries: DashMap<String, UploadProgress>,
    // ids with a worker attached; never visible to readers
    claims: DashMap<String, ()>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            claims: DashMap::new(),
        }
    }

    /// insert or replace the entry for `progress.id`
    pub fn upsert(&self, progress: UploadProgress) {
        self.entries.insert(progress.id.clone(), progress);
    }

    /// reserve `id` for one upload without publishing anything. held until the
    /// returned claim is dropped; a second claim on the same id fails meanwhile.
    pub fn claim(&self, id: &str) -> Result<UploadClaim<'_>, RegistryError> {
        match self.claims.entry(id.to_string()) {
            Entry::Occupied(_) => {
                tracing::warn!("Rejecting upload {}: already in progress", id);
                Err(RegistryError::UploadInProgress(id.to_string()))
            }
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(UploadClaim {
                    registry: self,
                    id: id.to_string(),
                })
            }
        }
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.claims.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<UploadProgress> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// removing an id that is not present is a no-op
    pub fn remove(&self, id: &str) -> Option<UploadProgress> {
        self.entries.remove(id).map(|(_, progress)| progress)
    }

    /// point-in-time copies of every entry, in no particular order
    pub fn snapshot(&self) -> Vec<UploadProgress> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// visit a snapshot of all entries. an entry the visitor asks to remove is
    /// only deleted if it has not been republished since the snapshot was taken.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&UploadProgress) -> Visit,
    {
        for progress in self.snapshot() {
            if visitor(&progress) == Visit::Remove {
                let removed = self
                    .entries
                    .remove_if(&progress.id, |_, current| *current == progress);
                if removed.is_some() {
                    tracing::trace!("Evicted progress entry: {}", progress.id);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProgressPublisher for ProgressRegistry {
    fn publish(&self, progress: &UploadProgress) {
        self.upsert(progress.clone());
    }
}

/// exclusive right to publish under one id, released on drop
#[derive(Debug)]
pub struct UploadClaim<'a> {
    registry: &'a ProgressRegistry,
    id: String,
}

impl UploadClaim<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for UploadClaim<'_> {
    fn drop(&mut self) {
        self.registry.claims.remove(&self.id);
    }
}
