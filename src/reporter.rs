use async_stream::stream;
use futures_util::Stream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

use crate::registry::{ProgressRegistry, UploadProgress, Visit};
use crate::template::ProgressTemplate;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);
pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// sent instead of an empty batch
pub const NO_UPLOADS_LINE: &str = "No uploads in progress";

/// one rendered registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct StatusLine {
    pub id: String,
    pub percent: f64,
    pub text: String,
}

impl StatusLine {
    pub fn from_progress(progress: &UploadProgress) -> Self {
        let percent = progress.percent();
        let text = if progress.failed {
            format!("{} {}", progress.id, progress.status_message)
        } else {
            format!("{} {:.2}%", progress.id, percent)
        };
        Self {
            id: progress.id.clone(),
            percent,
            text,
        }
    }
}

/// periodically renders the registry for one observer and evicts entries
/// whose grace window has passed
#[derive(Clone)]
pub struct ProgressReporter {
    registry: Arc<ProgressRegistry>,
    template: Arc<ProgressTemplate>,
    tick: Duration,
    grace: Duration,
}

impl ProgressReporter {
    pub fn new(registry: Arc<ProgressRegistry>, template: Arc<ProgressTemplate>) -> Self {
        Self {
            registry,
            template,
            tick: DEFAULT_TICK,
            grace: DEFAULT_GRACE,
        }
    }

    /// a zero tick falls back to the default cadence
    pub fn with_timing(mut self, tick: Duration, grace: Duration) -> Self {
        self.tick = if tick.is_zero() {
            tracing::warn!("Progress tick must be non-zero, using {:?}", DEFAULT_TICK);
            DEFAULT_TICK
        } else {
            tick
        };
        self.grace = grace;
        self
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// one pass over the registry: a status line per entry, evicting finished
    /// entries older than the grace window after they are rendered
    pub fn status_lines(&self, now: Instant) -> Vec<StatusLine> {
        let mut lines = Vec::new();
        self.registry.for_each(|progress| {
            lines.push(StatusLine::from_progress(progress));
            if progress.is_expired(now, self.grace) {
                tracing::debug!("Evicting finished upload: {}", progress.id);
                Visit::Remove
            } else {
                Visit::Keep
            }
        });
        lines
    }

    /// the templated batch for one tick; never empty
    pub fn render(&self, now: Instant) -> Vec<String> {
        let lines = self.status_lines(now);
        if lines.is_empty() {
            return vec![NO_UPLOADS_LINE.to_string()];
        }
        lines
            .iter()
            .map(|line| self.template.render(&line.text, line.percent))
            .collect()
    }

    /// one rendered batch per tick, forever. dropping the stream (the observer
    /// disconnecting) is the only way the loop ends.
    pub fn batches(&self) -> impl Stream<Item = Vec<String>> + Send + 'static {
        let reporter = self.clone();
        stream! {
            let mut interval = tokio::time::interval(reporter.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                yield reporter.render(Instant::now());
            }
        }
    }
}
