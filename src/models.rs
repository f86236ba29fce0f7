use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rating value for entries whose source does not publish one
pub const RATING_UNKNOWN: f32 = -1.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MangaSource {
    MerlinToon,
}

impl MangaSource {
    /// Stable identifier, also used to seed entity ids
    pub fn name(&self) -> &'static str {
        match self {
            MangaSource::MerlinToon => "MERLINTOON",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MangaSource::MerlinToon => "MerlinToon",
        }
    }

    pub fn locale(&self) -> &'static str {
        match self {
            MangaSource::MerlinToon => "tr",
        }
    }

    pub fn content_rating(&self) -> Option<ContentRating> {
        match self {
            MangaSource::MerlinToon => Some(ContentRating::Safe),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "MERLINTOON" => Some(MangaSource::MerlinToon),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentRating {
    Safe,
    Suggestive,
    Adult,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MangaState {
    Ongoing,
    Finished,
    Abandoned,
    Paused,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    Updated,
    Popularity,
    Newest,
    Alphabetical,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct MangaTag {
    /// Value the site expects in filter URLs
    pub key: String,
    /// Text the site shows on detail pages
    pub title: String,
    pub source: MangaSource,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Manga {
    pub id: i64,
    /// Canonical URL, relative to the source domain where possible
    pub url: String,
    pub public_url: String,
    pub title: String,
    pub alt_titles: HashSet<String>,
    pub cover_url: Option<String>,
    pub tags: HashSet<MangaTag>,
    pub description: Option<String>,
    pub state: Option<MangaState>,
    pub authors: HashSet<String>,
    pub rating: f32,
    pub content_rating: Option<ContentRating>,
    pub source: MangaSource,
    /// Only populated by a details fetch
    pub chapters: Option<Vec<MangaChapter>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MangaChapter {
    pub id: i64,
    pub title: Option<String>,
    pub number: f32,
    pub volume: i32,
    pub url: String,
    pub scanlator: Option<String>,
    pub upload_date: Option<DateTime<Utc>>,
    pub branch: Option<String>,
    pub source: MangaSource,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
pub struct MangaPage {
    pub id: i64,
    pub url: String,
    pub preview: Option<String>,
    pub source: MangaSource,
}

/// Query the host passes to `list_page`
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct MangaListFilter {
    pub query: Option<String>,
    pub tags: HashSet<MangaTag>,
}

impl MangaListFilter {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn with_tags(tags: impl IntoIterator<Item = MangaTag>) -> Self {
        Self {
            query: None,
            tags: tags.into_iter().collect(),
        }
    }

    /// Non-empty search text, if any
    pub fn search_query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterCapabilities {
    pub search: bool,
    pub search_with_filters: bool,
    pub multiple_tags: bool,
    pub tag_exclusion: bool,
    pub year: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub available_tags: HashSet<MangaTag>,
}
