use image::DynamicImage;

use crate::models::page::RawResult;

/// One discovered image. Its identity is its index in the session's list.
#[derive(Debug, Clone, Default)]
pub struct ResultEntry {
    pub description: Option<String>,
    pub author: Option<String>,
    pub thumbnail_url: Option<String>,
    pub full_size_url: Option<String>,
    pub thumbnail: Option<DynamicImage>,
    pub selected: bool,
    pub(crate) hydrating: bool,
}

impl ResultEntry {
    /// A thumbnail fetch for this entry is in flight.
    pub fn is_hydrating(&self) -> bool {
        self.hydrating
    }

    pub fn can_save(&self) -> bool {
        self.full_size_url.is_some()
    }
}

impl From<RawResult> for ResultEntry {
    fn from(raw: RawResult) -> Self {
        let (full_size_url, thumbnail_url) = match raw.urls {
            Some(urls) => (urls.regular, urls.thumb),
            None => (None, None),
        };
        Self {
            description: raw.description,
            author: raw.user.and_then(|u| u.name),
            thumbnail_url,
            full_size_url,
            ..Self::default()
        }
    }
}
