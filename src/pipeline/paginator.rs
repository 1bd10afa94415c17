use std::ops::Range;

use tracing::{debug, info, warn};

use crate::api::client::{search_url, DEFAULT_ENDPOINT};
use crate::error::PipelineError;
use crate::models::entry::ResultEntry;
use crate::models::page::SearchPage;
use crate::models::session::{SearchSession, SessionId};
use crate::pipeline::{Completion, Dispatcher, Stage};
use crate::utils::config::Config;

#[derive(Clone, Debug)]
pub struct SearchSettings {
    pub endpoint: String,
    pub api_key: String,
    pub per_page: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { endpoint: DEFAULT_ENDPOINT.to_string(), api_key: String::new(), per_page: 20 }
    }
}

impl From<&Config> for SearchSettings {
    fn from(cfg: &Config) -> Self {
        Self { endpoint: cfg.endpoint.clone(), api_key: cfg.api_key.clone(), per_page: cfg.per_page }
    }
}

#[derive(Debug)]
pub enum PageOutcome {
    /// The page belongs to a session that has since been replaced.
    Stale,
    NoResults,
    Failed(PipelineError),
    Appended { range: Range<usize>, exhausted: bool },
}

/// Drives page-by-page retrieval for the current search term.
pub struct SearchPaginator {
    settings: SearchSettings,
    generation: u64,
    session: Option<SearchSession>,
}

impl SearchPaginator {
    pub fn new(settings: SearchSettings) -> Self {
        Self { settings, generation: 0, session: None }
    }

    pub fn session(&self) -> Option<&SearchSession> {
        self.session.as_ref()
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut SearchSession> {
        self.session.as_mut()
    }

    /// Replaces the current session and requests page 1. The reset happens
    /// even when the request cannot be built.
    pub fn start_search(&mut self, term: &str, dispatch: &Dispatcher) -> Result<SessionId, PipelineError> {
        self.generation += 1;
        let id = SessionId(self.generation);
        self.session = Some(SearchSession::new(id, term));
        info!(session = id.0, term, "search started");
        self.fetch_page(1, dispatch)?;
        Ok(id)
    }

    /// Drops the current session. Completions still in flight become stale.
    pub fn cancel(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session = session.id().0, term = session.term(), "search cancelled");
        }
    }

    /// Issues the request for `page`. Returns `Ok(false)` when there is no
    /// session or a page request for it is already in flight.
    pub fn fetch_page(&mut self, page: u32, dispatch: &Dispatcher) -> Result<bool, PipelineError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(false);
        };
        if session.in_flight {
            debug!(session = session.id().0, page, "page request already in flight");
            return Ok(false);
        }
        let url = search_url(&self.settings.endpoint, &self.settings.api_key, self.settings.per_page, page, session.term())?;
        session.in_flight = true;
        let id = session.id();
        let fetcher = dispatch.fetcher();
        debug!(session = id.0, page, "requesting page");
        dispatch.spawn(
            Stage::Page,
            async move {
                let result = match fetcher.get(&url).await {
                    Ok(body) => SearchPage::parse(&body),
                    Err(e) => Err(PipelineError::from(e)),
                };
                Completion::Page { session: id, page, result }
            },
            move |e| Completion::Page { session: id, page, result: Err(e) },
        );
        Ok(true)
    }

    /// Sole pagination trigger: fetches the next page once the last entry
    /// becomes visible and pages remain.
    pub fn request_next_page_if_needed(&mut self, visible_index: usize, dispatch: &Dispatcher) -> Result<bool, PipelineError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(false);
        };
        if session.exhausted() || session.entries().len().checked_sub(1) != Some(visible_index) {
            return Ok(false);
        }
        let next = session.current_page();
        self.fetch_page(next, dispatch)
    }

    pub fn apply_page(&mut self, id: SessionId, page: u32, result: Result<SearchPage, PipelineError>) -> PageOutcome {
        let Some(session) = self.session.as_mut().filter(|s| s.id() == id) else {
            debug!(session = id.0, page, "dropping page for superseded session");
            return PageOutcome::Stale;
        };
        session.in_flight = false;

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                warn!(session = id.0, page, "page fetch failed: {}", e);
                return PageOutcome::Failed(e);
            }
        };
        if body.results.is_empty() {
            info!(session = id.0, page, term = session.term(), "no results");
            return PageOutcome::NoResults;
        }

        let entries: Vec<ResultEntry> = body.results.into_iter().map(ResultEntry::from).collect();
        let start = session.merge_page(body.total_pages, entries);
        let range = start..session.entries().len();
        let exhausted = session.exhausted();
        info!(
            session = id.0,
            page,
            appended = range.len(),
            total_pages = ?session.total_pages(),
            exhausted,
            "page merged"
        );
        PageOutcome::Appended { range, exhausted }
    }
}
