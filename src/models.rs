use serde::{Deserialize, Serialize};

/// Discriminator the media API reports per result. Anything outside these
/// three is dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
    Person,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
            MediaKind::Person => "person",
        }
    }
}

/// Normalized catalog entry. Built fresh from each API response batch and
/// never mutated; a re-fetch supersedes rather than updates.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    pub id: i64,
    pub display_title: String,
    pub poster_path: Option<String>,
    pub vote_average: f64,
    /// Movie release date or TV first air date, as reported.
    pub primary_date: Option<String>,
    /// Always `Movie` or `Tv` here; `Person` results live in [`PersonResult`].
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonResult {
    pub id: i64,
    pub name: String,
    pub profile_path: Option<String>,
}

/// Union of the two disjoint variants a multi-kind search can surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchHit {
    Media(MediaItem),
    Person(PersonResult),
}

impl SearchHit {
    pub fn id(&self) -> i64 {
        match self {
            SearchHit::Media(m) => m.id,
            SearchHit::Person(p) => p.id,
        }
    }

    pub fn display_title(&self) -> &str {
        match self {
            SearchHit::Media(m) => &m.display_title,
            SearchHit::Person(p) => &p.name,
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            SearchHit::Media(m) => m.kind,
            SearchHit::Person(_) => MediaKind::Person,
        }
    }

    pub fn as_media(&self) -> Option<&MediaItem> {
        match self {
            SearchHit::Media(m) => Some(m),
            SearchHit::Person(_) => None,
        }
    }
}

/// One page of normalized media results plus the pagination metadata the
/// remote reports alongside it.
#[derive(Debug, Clone)]
pub struct MediaPage {
    pub results: Vec<MediaItem>,
    pub page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone)]
pub struct PersonPage {
    pub results: Vec<PersonResult>,
    pub page: u32,
    pub total_pages: u32,
}

/// Remote trending-counter document, keyed by search term.
#[derive(Debug, Clone)]
pub struct TrendingRecord {
    pub document_id: String,
    pub search_term: String,
    pub movie_id: i64,
    pub count: i64,
    pub title: String,
    pub poster_url: String,
    pub vote_average: f64,
    pub media_type: String,
}

/// Remote saved-item document, one per `(user_id, movie_id)` pair.
#[derive(Debug, Clone)]
pub struct SavedRecord {
    pub document_id: String,
    pub created_at: String,
    pub user_id: String,
    pub movie_id: i64,
    pub title: String,
    pub poster_url: String,
    pub vote_average: f64,
    pub release_date: String,
    pub media_type: String,
}

/// Denormalized fields callers pass when saving an item.
#[derive(Debug, Clone)]
pub struct SaveInput {
    pub movie_id: i64,
    pub title: String,
    pub poster_url: String,
    pub vote_average: f64,
    pub release_date: String,
    pub media_type: MediaKind,
}
