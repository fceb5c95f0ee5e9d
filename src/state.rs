use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::registry::ProgressRegistry;
use crate::reporter::ProgressReporter;
use crate::template::ProgressTemplate;
use crate::worker::CHUNK_SIZE;

/// shared application state
#[derive(Clone)]
pub struct AppState {
    pub files_dir: PathBuf,
    /// progress of uploads in flight and recently finished
    pub registry: Arc<ProgressRegistry>,
    /// cloned for every observer that connects
    pub reporter: ProgressReporter,
    pub chunk_size: usize,
}

impl AppState {
    /// create a new app state with an empty registry and plain progress lines
    pub fn new(files_dir: PathBuf) -> Self {
        let registry = Arc::new(ProgressRegistry::new());
        let reporter = ProgressReporter::new(registry.clone(), Arc::new(ProgressTemplate::plain()));
        Self {
            files_dir,
            registry,
            reporter,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_template(mut self, template: ProgressTemplate) -> Self {
        self.reporter = ProgressReporter::new(self.registry.clone(), Arc::new(template))
            .with_timing(self.reporter.tick(), self.reporter.grace());
        self
    }

    pub fn with_timing(mut self, tick: Duration, grace: Duration) -> Self {
        self.reporter = self.reporter.with_timing(tick, grace);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}
