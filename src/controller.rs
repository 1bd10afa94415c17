//! Single owning context for the search pipeline.
//!
//! Background tasks never touch the result list; they report a
//! [`Completion`] and the controller applies it. Appends, thumbnail
//! updates and selection changes therefore all happen on whoever drives
//! [`SearchController::apply`], and no lock guards the entries.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::api::client::Fetcher;
use crate::error::PipelineError;
use crate::events::{Event, EventSink};
use crate::models::entry::ResultEntry;
use crate::models::session::{SearchSession, SessionId};
use crate::pipeline::hydrator::{self, HydrationOutcome};
use crate::pipeline::paginator::{PageOutcome, SearchPaginator, SearchSettings};
use crate::pipeline::save::{BatchId, SaveBatch, SaveCoordinator, SaveItem, SaveProgress};
use crate::pipeline::{Completion, Dispatcher, StageDepths};
use crate::storage::PhotoStore;

pub struct SearchController {
    paginator: SearchPaginator,
    saver: SaveCoordinator,
    dispatch: Dispatcher,
    rx: UnboundedReceiver<Completion>,
    sink: Arc<dyn EventSink>,
}

fn failure_event(error: &PipelineError) -> Event {
    let cause = error.to_string();
    if error.is_parse() {
        Event::ParseError { cause }
    } else {
        Event::NetworkError { cause }
    }
}

impl SearchController {
    pub fn new(settings: SearchSettings, fetcher: Arc<dyn Fetcher>, store: Arc<dyn PhotoStore>, sink: Arc<dyn EventSink>) -> Self {
        let (dispatch, rx) = Dispatcher::new(fetcher);
        Self {
            paginator: SearchPaginator::new(settings),
            saver: SaveCoordinator::new(store),
            dispatch,
            rx,
            sink,
        }
    }

    pub fn search(&mut self, term: &str) -> SessionId {
        match self.paginator.start_search(term, &self.dispatch) {
            Ok(id) => id,
            Err(e) => {
                self.sink.on_event(failure_event(&e));
                self.paginator.session().map(|s| s.id()).unwrap_or(SessionId(0))
            }
        }
    }

    pub fn cancel(&mut self) {
        self.paginator.cancel();
    }

    /// Call when the entry at `index` is displayed. Returns whether a page
    /// request was issued.
    pub fn on_visible(&mut self, index: usize) -> bool {
        match self.paginator.request_next_page_if_needed(index, &self.dispatch) {
            Ok(issued) => issued,
            Err(e) => {
                self.sink.on_event(failure_event(&e));
                false
            }
        }
    }

    /// Requests a thumbnail for one entry. Returns whether a fetch was issued.
    pub fn hydrate(&mut self, index: usize) -> bool {
        let Some(session) = self.paginator.session_mut() else {
            return false;
        };
        let id = session.id();
        let Some(entry) = session.entry_mut(index) else {
            return false;
        };
        match hydrator::hydrate(id, index, entry, &self.dispatch) {
            Ok(issued) => issued,
            Err(e) => {
                warn!(index, "thumbnail request rejected: {}", e);
                self.sink.on_event(Event::HydrationFailed { index, cause: e.to_string() });
                false
            }
        }
    }

    pub fn session(&self) -> Option<&SearchSession> {
        self.paginator.session()
    }

    pub fn entries(&self) -> &[ResultEntry] {
        self.paginator.session().map(|s| s.entries()).unwrap_or(&[])
    }

    pub fn exhausted(&self) -> bool {
        self.paginator.session().map(|s| s.exhausted()).unwrap_or(false)
    }

    pub fn depths(&self) -> StageDepths {
        self.dispatch.gauges().depths()
    }

    /// State of a save batch that still has writes in flight.
    pub fn save_batch(&self, id: BatchId) -> Option<&SaveBatch> {
        self.saver.batch(id)
    }

    pub fn active_saves(&self) -> usize {
        self.saver.active()
    }

    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        match self.paginator.session_mut().and_then(|s| s.entry_mut(index)) {
            Some(entry) => {
                entry.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn toggle_selected(&mut self, index: usize) -> bool {
        let current = self.entries().get(index).map(|e| e.selected);
        match current {
            Some(selected) => self.set_selected(index, !selected),
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        if let Some(session) = self.paginator.session_mut() {
            for index in 0..session.entries().len() {
                if let Some(entry) = session.entry_mut(index) {
                    entry.selected = false;
                }
            }
        }
    }

    pub fn selected_count(&self) -> usize {
        self.entries().iter().filter(|e| e.selected).count()
    }

    /// Saves every selected entry that has a full-size url.
    pub fn save_selected(&mut self) -> Option<BatchId> {
        let selected = self.selected_count();
        let items: Vec<SaveItem> = self
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| e.selected)
            .filter_map(|(index, e)| e.full_size_url.clone().map(|url| SaveItem { index, url }))
            .collect();
        if items.len() < selected {
            warn!(skipped = selected - items.len(), "selected entries without a full-size url are not saved");
        }
        self.saver.save_all(items, &self.dispatch)
    }

    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    pub fn apply(&mut self, completion: Completion) {
        self.dispatch.retire(&completion);
        match completion {
            Completion::Page { session, page, result } => self.apply_page(session, page, result),
            Completion::Thumbnail { session, index, result } => {
                match hydrator::apply_thumbnail(self.paginator.session_mut(), session, index, result) {
                    HydrationOutcome::Updated => self.sink.on_event(Event::EntryUpdated { index }),
                    HydrationOutcome::Failed(e) => self.sink.on_event(Event::HydrationFailed { index, cause: e.to_string() }),
                    HydrationOutcome::Stale | HydrationOutcome::Unchanged => {}
                }
            }
            Completion::Save { batch, index, result } => match self.saver.apply_outcome(batch, index, result) {
                SaveProgress::Complete { batch } => self.sink.on_event(Event::SaveComplete { saved: batch.saved }),
                SaveProgress::Failed { error, .. } => self.sink.on_event(Event::SaveError { index, cause: error.to_string() }),
                SaveProgress::Saved { .. } | SaveProgress::Drained { .. } | SaveProgress::Unknown => {}
            },
        }
    }

    fn apply_page(&mut self, session: SessionId, page: u32, result: Result<crate::models::page::SearchPage, PipelineError>) {
        match self.paginator.apply_page(session, page, result) {
            PageOutcome::Stale => {}
            PageOutcome::Failed(e) => self.sink.on_event(failure_event(&e)),
            PageOutcome::NoResults => {
                let term = self.paginator.session().map(|s| s.term().to_string()).unwrap_or_default();
                self.sink.on_event(Event::NoResults { term });
            }
            PageOutcome::Appended { range, exhausted } => {
                self.sink.on_event(Event::EntriesAppended { session, range: range.clone() });
                for index in range {
                    self.hydrate(index);
                }
                if exhausted {
                    self.sink.on_event(Event::Exhausted);
                }
            }
        }
    }

    /// Applies completions until no spawned task is outstanding.
    pub async fn settle(&mut self) {
        while self.dispatch.gauges().pending() > 0 {
            match self.rx.recv().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
        debug!("pipeline settled");
    }

    /// Drops any session and logs what is still in flight.
    pub fn shutdown(&mut self) {
        self.cancel();
        let depths = self.depths();
        if depths.page + depths.thumbnail + depths.save > 0 {
            info!(?depths, "shutting down with tasks in flight");
        }
    }
}
