use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Durable photo storage. `name` is a file stem without extension.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn write(&self, name: &str, image: DynamicImage) -> Result<PathBuf, StoreError>;
}

/// Writes JPEG files into one directory, created on first write.
pub struct DirectoryStore {
    root: PathBuf,
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DirectoryStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root, claimed: Mutex::new(HashSet::new()) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Concurrent saves may share a stem; each gets its own numbered path.
    // A path stays claimed only while its write is in flight.
    fn claim(&self, name: &str) -> PathBuf {
        let mut claimed = self.claimed.lock();
        let mut n = 0usize;
        loop {
            let file = if n == 0 { format!("{}.jpg", name) } else { format!("{}-{}.jpg", name, n) };
            let candidate = self.root.join(file);
            if !claimed.contains(&candidate) && !candidate.exists() {
                claimed.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }
}

#[async_trait]
impl PhotoStore for DirectoryStore {
    async fn write(&self, name: &str, image: DynamicImage) -> Result<PathBuf, StoreError> {
        let path = self.claim(name);
        let dst = path.clone();
        let written = tokio::task::spawn_blocking(move || write_jpeg(&dst, &image)).await;
        // Once the file is on disk `exists()` guards the name.
        self.claimed.lock().remove(&path);
        written.map_err(|e| StoreError::Task(e.to_string()))??;
        debug!(path = %path.display(), "photo written");
        Ok(path)
    }
}

fn write_jpeg(dst: &Path, image: &DynamicImage) -> Result<(), StoreError> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let result = image.to_rgb8().save_with_format(dst, ImageFormat::Jpeg);

    // Clean up partial file on failure
    if let Err(e) = result {
        if dst.exists() {
            if let Err(rm_err) = std::fs::remove_file(dst) {
                warn!("Failed to clean up partial photo {:?} after write error: {}", dst, rm_err);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

/// File stem for a saved image: the url's last path segment, decoded and
/// reduced to `[A-Za-z0-9_-]`, or `image-<index>` when nothing is left.
pub fn file_name_for(url: &Url, index: usize) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let stem = match decoded.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => decoded.as_str(),
    };
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        format!("image-{}", index)
    } else {
        cleaned.to_string()
    }
}
