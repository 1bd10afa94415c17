//! Thumbnail hydration: fetch and attach a preview to an entry that
//! already sits in the result list. Entries are updated in place, so
//! completion order never affects list order.

use image::DynamicImage;
use tracing::{debug, warn};

use crate::api::client::parse_url;
use crate::error::PipelineError;
use crate::models::entry::ResultEntry;
use crate::models::session::{SearchSession, SessionId};
use crate::pipeline::{fetch_image, Completion, Dispatcher, Stage};

#[derive(Debug)]
pub enum HydrationOutcome {
    Stale,
    Updated,
    /// The entry already had a thumbnail; the new one was discarded.
    Unchanged,
    Failed(PipelineError),
}

/// Starts a thumbnail fetch for `entry`. No-op (`Ok(false)`) when the entry
/// already has a thumbnail, one is in flight, or it has no thumbnail url.
pub fn hydrate(session: SessionId, index: usize, entry: &mut ResultEntry, dispatch: &Dispatcher) -> Result<bool, PipelineError> {
    if entry.thumbnail.is_some() || entry.hydrating {
        return Ok(false);
    }
    let Some(raw) = entry.thumbnail_url.as_deref() else {
        return Ok(false);
    };
    let url = parse_url(raw)?;
    entry.hydrating = true;
    let fetcher = dispatch.fetcher();
    dispatch.spawn(
        Stage::Thumbnail,
        async move {
            let result = fetch_image(fetcher.as_ref(), &url).await;
            Completion::Thumbnail { session, index, result }
        },
        move |e| Completion::Thumbnail { session, index, result: Err(e) },
    );
    Ok(true)
}

pub fn apply_thumbnail(
    current: Option<&mut SearchSession>,
    session: SessionId,
    index: usize,
    result: Result<DynamicImage, PipelineError>,
) -> HydrationOutcome {
    let Some(entry) = current.filter(|s| s.id() == session).and_then(|s| s.entry_mut(index)) else {
        debug!(session = session.0, index, "dropping thumbnail for superseded session");
        return HydrationOutcome::Stale;
    };
    entry.hydrating = false;
    match result {
        Ok(_) if entry.thumbnail.is_some() => HydrationOutcome::Unchanged,
        Ok(image) => {
            entry.thumbnail = Some(image);
            HydrationOutcome::Updated
        }
        Err(e) => {
            warn!(session = session.0, index, "thumbnail hydration failed: {}", e);
            HydrationOutcome::Failed(e)
        }
    }
}
