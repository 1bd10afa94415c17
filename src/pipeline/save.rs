use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::client::{parse_url, Fetcher};
use crate::error::PipelineError;
use crate::pipeline::{fetch_image, Completion, Dispatcher, Stage};
use crate::storage::{file_name_for, PhotoStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub u64);

/// One image to save: its index in the result list and full-size url.
#[derive(Debug, Clone)]
pub struct SaveItem {
    pub index: usize,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveBatch {
    pub id: BatchId,
    pub total: usize,
    pub completed: usize,
    pub saved: usize,
    pub failed: usize,
}

impl SaveBatch {
    fn new(id: BatchId, total: usize) -> Self {
        Self { id, total, completed: 0, saved: 0, failed: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}

#[derive(Debug)]
pub enum SaveProgress {
    /// Completion for a batch this coordinator never opened.
    Unknown,
    Saved { path: PathBuf },
    /// Last write landed and every write in the batch succeeded.
    Complete { batch: SaveBatch },
    /// `finished` carries the final counts when this was the last write.
    Failed { error: PipelineError, finished: Option<SaveBatch> },
    /// Last write landed but an earlier one failed.
    Drained { batch: SaveBatch },
}

/// Fan-out/join of full-size saves. Batches outlive search sessions and
/// are never cancelled once started. A batch is forgotten once its last
/// write lands.
pub struct SaveCoordinator {
    store: Arc<dyn PhotoStore>,
    next_id: u64,
    batches: HashMap<BatchId, SaveBatch>,
}

impl SaveCoordinator {
    pub fn new(store: Arc<dyn PhotoStore>) -> Self {
        Self { store, next_id: 0, batches: HashMap::new() }
    }

    /// State of a batch that still has writes in flight.
    pub fn batch(&self, id: BatchId) -> Option<&SaveBatch> {
        self.batches.get(&id)
    }

    pub fn active(&self) -> usize {
        self.batches.len()
    }

    pub fn save_all(&mut self, items: Vec<SaveItem>, dispatch: &Dispatcher) -> Option<BatchId> {
        if items.is_empty() {
            return None;
        }
        self.next_id += 1;
        let id = BatchId(self.next_id);
        self.batches.insert(id, SaveBatch::new(id, items.len()));
        info!(batch = id.0, total = items.len(), "saving images");

        for item in items {
            let fetcher = dispatch.fetcher();
            let store = self.store.clone();
            let index = item.index;
            dispatch.spawn(
                Stage::Save,
                async move {
                    let result = save_one(fetcher.as_ref(), store.as_ref(), &item).await;
                    Completion::Save { batch: id, index: item.index, result }
                },
                move |e| Completion::Save { batch: id, index, result: Err(e) },
            );
        }
        Some(id)
    }

    pub fn apply_outcome(&mut self, id: BatchId, index: usize, result: Result<PathBuf, PipelineError>) -> SaveProgress {
        let Some(batch) = self.batches.get_mut(&id) else {
            debug!(batch = id.0, index, "completion for unknown save batch");
            return SaveProgress::Unknown;
        };
        batch.completed += 1;
        let failure = match result {
            Ok(path) => {
                batch.saved += 1;
                debug!(batch = id.0, index, path = %path.display(), "image saved");
                if !batch.is_done() {
                    return SaveProgress::Saved { path };
                }
                None
            }
            Err(error) => {
                batch.failed += 1;
                warn!(batch = id.0, index, "save failed: {}", error);
                if !batch.is_done() {
                    return SaveProgress::Failed { error, finished: None };
                }
                Some(error)
            }
        };

        let Some(batch) = self.batches.remove(&id) else {
            return SaveProgress::Unknown;
        };
        match failure {
            Some(error) => {
                info!(batch = id.0, saved = batch.saved, failed = batch.failed, "save batch finished with failures");
                SaveProgress::Failed { error, finished: Some(batch) }
            }
            None if batch.failed == 0 => {
                info!(batch = id.0, saved = batch.saved, "all images saved");
                SaveProgress::Complete { batch }
            }
            None => {
                info!(batch = id.0, saved = batch.saved, failed = batch.failed, "save batch finished with failures");
                SaveProgress::Drained { batch }
            }
        }
    }
}

async fn save_one(fetcher: &dyn Fetcher, store: &dyn PhotoStore, item: &SaveItem) -> Result<PathBuf, PipelineError> {
    let url = parse_url(&item.url)?;
    let image = fetch_image(fetcher, &url).await?;
    let name = file_name_for(&url, item.index);
    Ok(store.write(&name, image).await?)
}
