use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::client::DEFAULT_ENDPOINT;

#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: String,
    pub api_key: String,
    pub per_page: u32,
    pub output: PathBuf,
    pub timeout: Duration,
    pub max_pages: u32,
    pub save_count: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let endpoint = env::var("IMAGE_SAVER_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let api_key = env::var("IMAGE_SAVER_API_KEY").unwrap_or_default();
        let per_page = env::var("IMAGE_SAVER_PER_PAGE").ok().and_then(|v| v.parse().ok()).unwrap_or(20);
        let output = env::var("IMAGE_SAVER_OUTPUT").unwrap_or_else(|_| "./saved-photos".to_string());
        let timeout_secs = env::var("IMAGE_SAVER_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(30);
        let max_pages = env::var("IMAGE_SAVER_MAX_PAGES").ok().and_then(|v| v.parse().ok()).unwrap_or(1);
        let save_count = env::var("IMAGE_SAVER_SAVE_COUNT").ok().and_then(|v| v.parse().ok()).unwrap_or(0);
        Self {
            endpoint,
            api_key,
            per_page,
            output: PathBuf::from(output),
            timeout: Duration::from_secs(timeout_secs),
            max_pages,
            save_count,
        }
    }
}
