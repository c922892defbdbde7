use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::env;
use tracing::warn;

use crate::error::NetworkError;
use crate::models::{MediaItem, MediaKind, MediaPage, PersonPage, PersonResult};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";

/// Scope for the trending endpoint when no query is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    All,
    Movie,
    Tv,
}

impl KindFilter {
    fn path(&self) -> &'static str {
        match self {
            KindFilter::All => "all",
            KindFilter::Movie => "movie",
            KindFilter::Tv => "tv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovieList {
    Popular,
    TopRated,
    Upcoming,
    NowPlaying,
}

impl MovieList {
    fn path(&self) -> &'static str {
        match self {
            MovieList::Popular => "popular",
            MovieList::TopRated => "top_rated",
            MovieList::Upcoming => "upcoming",
            MovieList::NowPlaying => "now_playing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvList {
    Popular,
    TopRated,
    OnTheAir,
    AiringToday,
}

impl TvList {
    fn path(&self) -> &'static str {
        match self {
            TvList::Popular => "popular",
            TvList::TopRated => "top_rated",
            TvList::OnTheAir => "on_the_air",
            TvList::AiringToday => "airing_today",
        }
    }
}

/// Curated list endpoint selector. Invalid kind/list combinations are
/// unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryList {
    Movie(MovieList),
    Tv(TvList),
}

impl CategoryList {
    fn kind(&self) -> MediaKind {
        match self {
            CategoryList::Movie(_) => MediaKind::Movie,
            CategoryList::Tv(_) => MediaKind::Tv,
        }
    }

    fn path(&self) -> String {
        match self {
            CategoryList::Movie(l) => format!("movie/{}", l.path()),
            CategoryList::Tv(l) => format!("tv/{}", l.path()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

/// The seam the list controller and search flow depend on; integration
/// tests substitute a fake.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    /// Multi-kind search when `query` is non-empty, weekly trending scoped
    /// by `kind_filter` otherwise. Results are narrowed to movie/tv and
    /// sorted by popularity descending (stable, missing popularity = 0).
    async fn search_or_trending(
        &self,
        query: &str,
        page: u32,
        kind_filter: KindFilter,
    ) -> Result<MediaPage>;

    /// Same search endpoint, narrowed to persons, same sort rule.
    async fn search_persons(&self, query: &str, page: u32) -> Result<PersonPage>;

    /// Curated list page, pre-ordered upstream; no re-sort, no kind filter.
    async fn fetch_category_list(&self, list: CategoryList, page: u32) -> Result<Vec<MediaItem>>;
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        Ok(Self::new(api_key))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let res = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| NetworkError(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            return Err(NetworkError(status.to_string()).into());
        }
        let text = res.text().await.context("reading body failed")?;
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn search_or_trending(
        &self,
        query: &str,
        page: u32,
        kind_filter: KindFilter,
    ) -> Result<MediaPage> {
        let url = if query.is_empty() {
            format!(
                "{TMDB_BASE}/trending/{}/week?page={page}",
                kind_filter.path()
            )
        } else {
            format!(
                "{TMDB_BASE}/search/multi?query={}&include_adult=true&page={page}",
                urlencoding::encode(query)
            )
        };
        let data: SearchResponse = self.get_json(&url).await?;
        let results = narrow_to_media(data.results);
        Ok(MediaPage {
            results,
            page: data.page,
            total_pages: data.total_pages,
        })
    }

    async fn search_persons(&self, query: &str, page: u32) -> Result<PersonPage> {
        let url = format!(
            "{TMDB_BASE}/search/multi?query={}&include_adult=true&page={page}",
            urlencoding::encode(query)
        );
        let data: SearchResponse = self.get_json(&url).await?;
        let results = narrow_to_persons(data.results);
        Ok(PersonPage {
            results,
            page: data.page,
            total_pages: data.total_pages,
        })
    }

    async fn fetch_category_list(&self, list: CategoryList, page: u32) -> Result<Vec<MediaItem>> {
        let url = format!("{TMDB_BASE}/{}?page={page}", list.path());
        // Curated lists are decorative: degrade to empty rather than surface
        // an error to the list view.
        match self.get_json::<serde_json::Value>(&url).await {
            Ok(value) => Ok(parse_list_results(&value, list.kind())),
            Err(e) => {
                warn!("Curated list fetch failed for {}: {}", list.path(), e);
                Ok(Vec::new())
            }
        }
    }
}

impl TmdbClient {
    pub async fn fetch_media_details(&self, id: i64, kind: MediaKind) -> Result<MediaDetails> {
        let url = format!("{TMDB_BASE}/{}/{id}", kind.as_str());
        self.get_json(&url).await
    }

    pub async fn fetch_trailers(&self, id: i64, kind: MediaKind) -> Vec<Video> {
        let url = format!("{TMDB_BASE}/{}/{id}/videos?language=en-US", kind.as_str());
        match self.get_json::<Videos>(&url).await {
            Ok(v) => v.results,
            Err(e) => {
                warn!("Trailer fetch failed for {} {}: {}", kind.as_str(), id, e);
                Vec::new()
            }
        }
    }

    /// Providers for the IN region, falling back to US, falling back to an
    /// empty set.
    pub async fn fetch_watch_providers(&self, id: i64, kind: MediaKind) -> WatchProviders {
        let url = format!("{TMDB_BASE}/{}/{id}/watch/providers", kind.as_str());
        match self.get_json::<ProvidersResponse>(&url).await {
            Ok(mut data) => data
                .results
                .remove("IN")
                .or_else(|| data.results.remove("US"))
                .map(|r| WatchProviders {
                    link: r.link.unwrap_or_default(),
                    flatrate: r.flatrate,
                    buy: r.buy,
                    rent: r.rent,
                })
                .unwrap_or_default(),
            Err(e) => {
                warn!("Watch provider fetch failed for {} {}: {}", kind.as_str(), id, e);
                WatchProviders::default()
            }
        }
    }

    pub async fn fetch_credits(&self, id: i64, kind: MediaKind) -> Vec<CastMember> {
        let url = format!("{TMDB_BASE}/{}/{id}/credits", kind.as_str());
        match self.get_json::<Credits>(&url).await {
            Ok(c) => c.cast,
            Err(e) => {
                warn!("Credits fetch failed for {} {}: {}", kind.as_str(), id, e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_media_images(&self, id: i64, kind: MediaKind) -> Vec<ImageInfo> {
        let url = format!("{TMDB_BASE}/{}/{id}/images", kind.as_str());
        match self.get_json::<ImageSets>(&url).await {
            Ok(sets) => sets.posters,
            Err(e) => {
                warn!("Images fetch failed for {} {}: {}", kind.as_str(), id, e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_person_pictures(&self, person_id: i64) -> Vec<ImageInfo> {
        let url = format!("{TMDB_BASE}/person/{person_id}/images");
        match self.get_json::<ImageSets>(&url).await {
            Ok(sets) => sets.profiles,
            Err(e) => {
                warn!("Person pictures fetch failed for {}: {}", person_id, e);
                Vec::new()
            }
        }
    }

    /// Unlike the other detail fetches this one propagates: a season screen
    /// has nothing to show without it.
    pub async fn fetch_tv_season_details(
        &self,
        id: i64,
        season_number: i64,
    ) -> Result<SeasonDetails> {
        let url = format!("{TMDB_BASE}/tv/{id}/season/{season_number}");
        self.get_json(&url).await
    }

    pub async fn fetch_genres(&self, kind: MediaKind) -> Vec<Genre> {
        let url = format!("{TMDB_BASE}/genre/{}/list", kind.as_str());
        match self.get_json::<GenreList>(&url).await {
            Ok(g) => g.genres,
            Err(e) => {
                warn!("Genres fetch failed for {}: {}", kind.as_str(), e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_person_details(&self, person_id: i64) -> Option<PersonDetails> {
        let url = format!("{TMDB_BASE}/person/{person_id}?language=en-US");
        match self.get_json::<PersonDetails>(&url).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Person details fetch failed for {}: {}", person_id, e);
                None
            }
        }
    }

    pub async fn fetch_person_movie_credits(&self, person_id: i64) -> Vec<MediaItem> {
        let url = format!("{TMDB_BASE}/person/{person_id}/movie_credits");
        match self.get_json::<PersonCredits>(&url).await {
            Ok(c) => c
                .cast
                .into_iter()
                .map(|raw| raw.into_media(MediaKind::Movie))
                .collect(),
            Err(e) => {
                warn!("Person movie credits fetch failed for {}: {}", person_id, e);
                Vec::new()
            }
        }
    }

    pub async fn fetch_person_tv_credits(&self, person_id: i64) -> Vec<MediaItem> {
        let url = format!("{TMDB_BASE}/person/{person_id}/tv_credits");
        match self.get_json::<PersonCredits>(&url).await {
            Ok(c) => c
                .cast
                .into_iter()
                .map(|raw| raw.into_media(MediaKind::Tv))
                .collect(),
            Err(e) => {
                warn!("Person TV credits fetch failed for {}: {}", person_id, e);
                Vec::new()
            }
        }
    }
}

/// Full-size poster URL for stored denormalized records; empty string when
/// the item has no poster path.
pub fn poster_url(path: Option<&str>) -> String {
    path.map(|p| format!("{POSTER_BASE}{p}")).unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RawItem>,
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default)]
    total_pages: u32,
}

fn first_page() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
struct RawItem {
    id: i64,
    media_type: Option<String>,
    title: Option<String>,
    name: Option<String>,
    original_title: Option<String>,
    original_name: Option<String>,
    poster_path: Option<String>,
    profile_path: Option<String>,
    vote_average: Option<f64>,
    popularity: Option<f64>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

impl RawItem {
    fn into_media(self, kind: MediaKind) -> MediaItem {
        let (title, date) = match kind {
            MediaKind::Tv => (
                self.name.or(self.original_name),
                self.first_air_date,
            ),
            _ => (
                self.title.or(self.original_title),
                self.release_date,
            ),
        };
        MediaItem {
            id: self.id,
            display_title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            poster_path: self.poster_path,
            vote_average: self.vote_average.unwrap_or(0.0),
            primary_date: date,
            kind,
        }
    }
}

/// Keep only movie/tv entries, then sort by popularity descending. The sort
/// must be stable so equal-popularity items preserve input order.
fn narrow_to_media(items: Vec<RawItem>) -> Vec<MediaItem> {
    let mut kept: Vec<(MediaKind, RawItem)> = items
        .into_iter()
        .filter_map(|item| match item.media_type.as_deref() {
            Some("movie") => Some((MediaKind::Movie, item)),
            Some("tv") => Some((MediaKind::Tv, item)),
            _ => None,
        })
        .collect();
    kept.sort_by(|a, b| {
        let pa = a.1.popularity.unwrap_or(0.0);
        let pb = b.1.popularity.unwrap_or(0.0);
        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
    });
    kept.into_iter()
        .map(|(kind, raw)| raw.into_media(kind))
        .collect()
}

fn narrow_to_persons(items: Vec<RawItem>) -> Vec<PersonResult> {
    let mut kept: Vec<RawItem> = items
        .into_iter()
        .filter(|item| item.media_type.as_deref() == Some("person"))
        .collect();
    kept.sort_by(|a, b| {
        let pa = a.popularity.unwrap_or(0.0);
        let pb = b.popularity.unwrap_or(0.0);
        pb.partial_cmp(&pa).unwrap_or(std::cmp::Ordering::Equal)
    });
    kept.into_iter()
        .map(|raw| PersonResult {
            id: raw.id,
            name: raw
                .name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string()),
            profile_path: raw.profile_path,
        })
        .collect()
}

/// Curated list payloads carry no `media_type`; the kind comes from the
/// endpoint that was called. A missing or malformed `results` field reads
/// as an empty page, and individually malformed entries are skipped.
fn parse_list_results(value: &serde_json::Value, kind: MediaKind) -> Vec<MediaItem> {
    let Some(entries) = value.get("results").and_then(|r| r.as_array()) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<RawItem>(entry.clone()).ok())
        .map(|raw| raw.into_media(kind))
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaDetails {
    pub id: i64,
    pub title: Option<String>,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct GenreList {
    #[serde(default)]
    genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
struct Videos {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub key: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    #[serde(default)]
    results: std::collections::HashMap<String, RegionProviders>,
}

#[derive(Debug, Deserialize)]
struct RegionProviders {
    link: Option<String>,
    #[serde(default)]
    flatrate: Vec<Provider>,
    #[serde(default)]
    buy: Vec<Provider>,
    #[serde(default)]
    rent: Vec<Provider>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Provider {
    pub provider_name: String,
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WatchProviders {
    pub link: String,
    pub flatrate: Vec<Provider>,
    pub buy: Vec<Provider>,
    pub rent: Vec<Provider>,
}

/// Both `/images` payload shapes: media carries `posters`, persons carry
/// `profiles`. The unused set defaults to empty.
#[derive(Debug, Deserialize)]
struct ImageSets {
    #[serde(default)]
    posters: Vec<ImageInfo>,
    #[serde(default)]
    profiles: Vec<ImageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    pub file_path: String,
    pub vote_average: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeasonDetails {
    pub id: i64,
    pub season_number: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub poster_path: Option<String>,
    pub air_date: Option<String>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub episode_number: i64,
    pub name: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub still_path: Option<String>,
    pub vote_average: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonDetails {
    pub id: i64,
    pub name: String,
    pub biography: Option<String>,
    pub birthday: Option<String>,
    pub place_of_birth: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PersonCredits {
    #[serde(default)]
    cast: Vec<RawItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: i64, media_type: &str, popularity: Option<f64>) -> RawItem {
        RawItem {
            id,
            media_type: Some(media_type.to_string()),
            title: Some(format!("Title {id}")),
            name: Some(format!("Name {id}")),
            original_title: None,
            original_name: None,
            poster_path: None,
            profile_path: None,
            vote_average: Some(5.0),
            popularity,
            release_date: None,
            first_air_date: None,
        }
    }

    #[test]
    fn popularity_sort_is_stable_and_descending() {
        let items = vec![
            raw(0, "movie", Some(10.0)),
            raw(1, "tv", Some(5.0)),
            raw(2, "movie", Some(10.0)),
            raw(3, "tv", Some(3.0)),
        ];
        let sorted = narrow_to_media(items);
        let ids: Vec<i64> = sorted.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 2, 1, 3]);
    }

    #[test]
    fn missing_popularity_sorts_as_zero() {
        let items = vec![raw(0, "movie", None), raw(1, "movie", Some(1.0))];
        let ids: Vec<i64> = narrow_to_media(items).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 0]);
    }

    #[test]
    fn persons_are_dropped_from_media_results() {
        let items = vec![
            raw(0, "movie", Some(1.0)),
            raw(1, "person", Some(99.0)),
            raw(2, "tv", Some(2.0)),
        ];
        let out = narrow_to_media(items);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|m| m.kind != MediaKind::Person));
    }

    #[test]
    fn tv_items_use_name_and_first_air_date() {
        let mut item = raw(7, "tv", Some(1.0));
        item.first_air_date = Some("2023-04-01".to_string());
        let media = narrow_to_media(vec![item]).remove(0);
        assert_eq!(media.display_title, "Name 7");
        assert_eq!(media.primary_date.as_deref(), Some("2023-04-01"));
        assert_eq!(media.kind, MediaKind::Tv);
    }

    #[test]
    fn blank_title_falls_back_to_untitled() {
        let mut item = raw(9, "movie", Some(1.0));
        item.title = Some("  ".to_string());
        item.original_title = None;
        let media = narrow_to_media(vec![item]).remove(0);
        assert_eq!(media.display_title, "Untitled");
    }

    #[test]
    fn malformed_list_results_read_as_empty() {
        let missing = json!({ "page": 1 });
        assert!(parse_list_results(&missing, MediaKind::Movie).is_empty());
        let not_an_array = json!({ "results": "nope" });
        assert!(parse_list_results(&not_an_array, MediaKind::Movie).is_empty());
    }

    #[test]
    fn list_results_take_kind_from_endpoint() {
        let value = json!({
            "results": [
                { "id": 1, "name": "Show", "first_air_date": "2020-01-01" },
                { "id": "bad" },
            ]
        });
        let out = parse_list_results(&value, MediaKind::Tv);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MediaKind::Tv);
        assert_eq!(out[0].display_title, "Show");
    }

    #[test]
    fn image_payloads_default_missing_sets_to_empty() {
        let media: ImageSets = serde_json::from_value(json!({
            "id": 5,
            "posters": [{ "file_path": "/a.jpg", "width": 500, "height": 750 }]
        }))
        .unwrap();
        assert_eq!(media.posters.len(), 1);
        assert_eq!(media.posters[0].file_path, "/a.jpg");
        assert!(media.profiles.is_empty());

        let person: ImageSets = serde_json::from_value(json!({
            "id": 9,
            "profiles": [{ "file_path": "/p.jpg" }]
        }))
        .unwrap();
        assert_eq!(person.profiles.len(), 1);
        assert!(person.posters.is_empty());
    }

    #[test]
    fn season_details_parse_with_episodes() {
        let season: SeasonDetails = serde_json::from_value(json!({
            "id": 3624,
            "season_number": 1,
            "name": "Season 1",
            "air_date": "2011-04-17",
            "episodes": [
                { "id": 63056, "episode_number": 1, "name": "Winter Is Coming" },
                { "id": 63057, "episode_number": 2 },
            ]
        }))
        .unwrap();
        assert_eq!(season.season_number, 1);
        assert_eq!(season.episodes.len(), 2);
        assert_eq!(season.episodes[0].name.as_deref(), Some("Winter Is Coming"));
        assert_eq!(season.episodes[1].episode_number, 2);
    }

    #[test]
    fn poster_url_is_empty_without_path() {
        assert_eq!(poster_url(None), "");
        assert_eq!(
            poster_url(Some("/abc.jpg")),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
    }
}
