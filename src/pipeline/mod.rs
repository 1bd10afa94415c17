pub mod hydrator;
pub mod paginator;
pub mod save;

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::DynamicImage;
use reqwest::Url;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::client::Fetcher;
use crate::error::PipelineError;
use crate::models::page::SearchPage;
use crate::models::session::SessionId;
use self::save::BatchId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Page,
    Thumbnail,
    Save,
}

/// Result of one background fetch, delivered back to the owning context.
#[derive(Debug)]
pub enum Completion {
    Page {
        session: SessionId,
        page: u32,
        result: Result<SearchPage, PipelineError>,
    },
    Thumbnail {
        session: SessionId,
        index: usize,
        result: Result<DynamicImage, PipelineError>,
    },
    Save {
        batch: BatchId,
        index: usize,
        result: Result<PathBuf, PipelineError>,
    },
}

impl Completion {
    pub fn stage(&self) -> Stage {
        match self {
            Completion::Page { .. } => Stage::Page,
            Completion::Thumbnail { .. } => Stage::Thumbnail,
            Completion::Save { .. } => Stage::Save,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDepths {
    pub page: usize,
    pub thumbnail: usize,
    pub save: usize,
}

/// Tasks spawned but not yet applied, per stage.
#[derive(Default)]
pub struct StageGauges {
    pub page: AtomicUsize,
    pub thumbnail: AtomicUsize,
    pub save: AtomicUsize,
}

impl StageGauges {
    fn gauge(&self, stage: Stage) -> &AtomicUsize {
        match stage {
            Stage::Page => &self.page,
            Stage::Thumbnail => &self.thumbnail,
            Stage::Save => &self.save,
        }
    }

    pub fn depths(&self) -> StageDepths {
        StageDepths {
            page: self.page.load(Ordering::Relaxed),
            thumbnail: self.thumbnail.load(Ordering::Relaxed),
            save: self.save.load(Ordering::Relaxed),
        }
    }

    pub fn pending(&self) -> usize {
        let d = self.depths();
        d.page + d.thumbnail + d.save
    }
}

/// Spawns fetch tasks and routes their completions onto one channel.
#[derive(Clone)]
pub struct Dispatcher {
    fetcher: Arc<dyn Fetcher>,
    tx: UnboundedSender<Completion>,
    gauges: Arc<StageGauges>,
}

impl Dispatcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> (Self, UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Self { fetcher, tx, gauges: Arc::new(StageGauges::default()) };
        (dispatcher, rx)
    }

    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        self.fetcher.clone()
    }

    pub fn gauges(&self) -> &Arc<StageGauges> {
        &self.gauges
    }

    /// Runs `task` and reports its completion. If the task panics or is
    /// aborted, `on_abort` builds the failed completion sent in its place,
    /// so every spawn is matched by exactly one completion.
    pub(crate) fn spawn<F, A>(&self, stage: Stage, task: F, on_abort: A)
    where
        F: Future<Output = Completion> + Send + 'static,
        A: FnOnce(PipelineError) -> Completion + Send + 'static,
    {
        self.gauges.gauge(stage).fetch_add(1, Ordering::Relaxed);
        let tx = self.tx.clone();
        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            let completion = match handle.await {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::warn!(?stage, "task did not finish: {}", e);
                    on_abort(PipelineError::from(e))
                }
            };
            if tx.send(completion).is_err() {
                tracing::debug!(?stage, "completion receiver dropped");
            }
        });
    }

    /// Marks a received completion as applied.
    pub(crate) fn retire(&self, completion: &Completion) {
        self.gauges.gauge(completion.stage()).fetch_sub(1, Ordering::Relaxed);
    }
}

/// Fetches image bytes and decodes them off the async executor.
pub(crate) async fn fetch_image(fetcher: &dyn Fetcher, url: &Url) -> Result<DynamicImage, PipelineError> {
    let bytes = fetcher.get(url).await?;
    let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await??;
    Ok(image)
}
