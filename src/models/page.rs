use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Response body of one search page.
///
/// `results` must be an array of objects; every field inside a record is
/// optional and a field of the wrong type reads as absent.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SearchPage {
    #[serde(default, deserialize_with = "lenient")]
    pub total_pages: Option<u32>,
    pub results: Vec<RawResult>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawResult {
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub user: Option<RawUser>,
    #[serde(default, deserialize_with = "lenient")]
    pub urls: Option<RawUrls>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawUser {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawUrls {
    #[serde(default, deserialize_with = "lenient")]
    pub regular: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub thumb: Option<String>,
}

fn lenient<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(de)?;
    Ok(serde_json::from_value(value).ok())
}

impl SearchPage {
    pub fn parse(body: &[u8]) -> Result<Self, PipelineError> {
        Ok(serde_json::from_slice(body)?)
    }
}
