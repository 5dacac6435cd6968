use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{Error, Result};

pub const MAX_CONTENT_ID_LEN: usize = 128;
pub const MAX_TITLE_LEN: usize = 300;
pub const DEFAULT_CONTENT_TITLE: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Show,
    Movie,
    Anime,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Movie => "movie",
            Self::Anime => "anime",
        }
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "show" => Ok(Self::Show),
            "movie" => Ok(Self::Movie),
            "anime" => Ok(Self::Anime),
            other => Err(Error::InvalidContent(format!("Unknown content type '{other}'"))),
        }
    }
}

/// What the room is watching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: String,
    pub episode_id: Option<String>,
}

impl ContentRef {
    /// Build a content reference from raw client input.
    pub fn parse(content_type: &str, content_id: &str, episode_id: Option<&str>) -> Result<Self> {
        Ok(Self {
            content_type: content_type.parse()?,
            content_id: validate_content_id(content_id)?,
            episode_id: normalize_optional(episode_id),
        })
    }
}

/// Display metadata supplied by the content catalog. Opaque to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub content_title: String,
    pub content_poster: Option<String>,
    pub episode_title: Option<String>,
}

impl ContentMetadata {
    #[must_use]
    pub fn new(
        content_title: Option<&str>,
        content_poster: Option<&str>,
        episode_title: Option<&str>,
    ) -> Self {
        Self {
            content_title: normalize_optional(content_title)
                .map_or_else(|| DEFAULT_CONTENT_TITLE.to_string(), |t| truncate(&t, MAX_TITLE_LEN)),
            content_poster: normalize_optional(content_poster),
            episode_title: normalize_optional(episode_title).map(|t| truncate(&t, MAX_TITLE_LEN)),
        }
    }
}

pub(crate) fn validate_content_id(content_id: &str) -> Result<String> {
    let trimmed = content_id.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidContent("Content id is required".to_string()));
    }
    if trimmed.len() > MAX_CONTENT_ID_LEN {
        return Err(Error::InvalidContent(format!(
            "Content id must be at most {MAX_CONTENT_ID_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
