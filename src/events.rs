use std::ops::Range;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::models::session::SessionId;

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EntriesAppended { session: SessionId, range: Range<usize> },
    EntryUpdated { index: usize },
    HydrationFailed { index: usize, cause: String },
    NoResults { term: String },
    NetworkError { cause: String },
    ParseError { cause: String },
    /// The last page of the current session has been merged.
    Exhausted,
    SaveComplete { saved: usize },
    SaveError { index: usize, cause: String },
}

pub trait EventSink: Send + Sync {
    fn on_event(&self, event: Event);
}

pub struct ChannelSink {
    tx: UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: Event) {
        // A closed receiver means nobody renders any more.
        let _ = self.tx.send(event);
    }
}

impl Event {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::HydrationFailed { .. } | Event::NetworkError { .. } | Event::ParseError { .. } | Event::SaveError { .. }
        )
    }
}

/// Writes every event to the log; failures at `warn`.
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&self, event: Event) {
        if event.is_failure() {
            warn!(?event, "pipeline event");
        } else {
            info!(?event, "pipeline event");
        }
    }
}

/// Hands each event to every inner sink, in order.
pub struct TeeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for TeeSink {
    fn on_event(&self, event: Event) {
        for sink in &self.sinks {
            sink.on_event(event.clone());
        }
    }
}
