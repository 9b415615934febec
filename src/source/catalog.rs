// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use bytes::Bytes;
use chrono::Datelike;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::source::link::SourceLink;

const API_BASE: &str = "https://api.spotify.com/v1";
const RETRY_ATTEMPTS: usize = 3;
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Whether a catalog item is a music track or a podcast episode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Track,
    Episode,
}

/// A single entry of the source catalog, in playlist/show order
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub id: String,
    pub kind: ItemKind,
    pub name: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub release_year: Option<i32>,
    pub disc_number: Option<u32>,
    pub track_number: Option<u32>,
    pub duration_ms: u64,
    pub playable: bool,
    pub image_url: Option<String>,
}

impl SourceItem {
    /// Human readable title, also the base for the chapter join key
    pub fn display_title(&self) -> String {
        match self.artists.first() {
            Some(artist) => format!("{} - {}", artist, self.name),
            None => self.name.clone(),
        }
    }

    /// Playback duration in seconds
    pub fn seconds(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    album: Option<AlbumObject>,
    disc_number: Option<u32>,
    track_number: Option<u32>,
    duration_ms: u64,
    is_playable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<ImageObject>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EpisodeObject {
    id: Option<String>,
    name: String,
    duration_ms: u64,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<ImageObject>,
    is_playable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Fetch the full, ordered catalog behind a source link
///
/// Pages through the Web API following the `next` cursor. Entries that the
/// API reports as null (e.g. local files in a playlist) are dropped.
pub async fn fetch_catalog<C: HttpClient + ?Sized>(
    client: &C,
    token: &str,
    link: &SourceLink,
    reporter: &SharedProgressReporter,
) -> Result<Vec<SourceItem>, CatalogError> {
    reporter.report(ProgressEvent::FetchingCatalog {
        source: link.id().to_string(),
    });

    let items = match link {
        SourceLink::Playlist(id) => {
            let url = format!("{API_BASE}/playlists/{id}/tracks?limit=100&market=from_token");
            fetch_pages::<_, PlaylistItem>(client, token, url, reporter)
                .await?
                .into_iter()
                .filter_map(track_to_item)
                .collect::<Vec<_>>()
        }
        SourceLink::Show(id) => {
            let url = format!("{API_BASE}/shows/{id}/episodes?limit=50&market=from_token");
            fetch_pages::<_, Option<EpisodeObject>>(client, token, url, reporter)
                .await?
                .into_iter()
                .flatten()
                .filter_map(episode_to_item)
                .collect::<Vec<_>>()
        }
    };

    reporter.report(ProgressEvent::CatalogFetched {
        total_items: items.len(),
    });

    Ok(items)
}

async fn fetch_pages<C, T>(
    client: &C,
    token: &str,
    first_url: String,
    reporter: &SharedProgressReporter,
) -> Result<Vec<T>, CatalogError>
where
    C: HttpClient + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let mut items = Vec::new();
    let mut next = Some(first_url);

    while let Some(url) = next {
        let body = get_with_retry(client, token, &url, reporter).await?;

        let page: Page<T> = serde_json::from_slice(&body).map_err(|e| {
            CatalogError::DecodeFailed {
                url: url.clone(),
                source: e,
            }
        })?;

        items.extend(page.items);
        next = page.next;
    }

    Ok(items)
}

/// GET a catalog URL, retrying transient failures with a fixed backoff
async fn get_with_retry<C: HttpClient + ?Sized>(
    client: &C,
    token: &str,
    url: &str,
    reporter: &SharedProgressReporter,
) -> Result<Bytes, CatalogError> {
    let mut attempt = 0;

    loop {
        match get_once(client, token, url).await {
            Ok(body) => return Ok(body),
            Err(error) => {
                attempt += 1;
                if attempt >= RETRY_ATTEMPTS {
                    return Err(error);
                }

                reporter.report(ProgressEvent::CatalogRetry {
                    attempt,
                    max_attempts: RETRY_ATTEMPTS,
                    error: error.to_string(),
                });
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }
    }
}

async fn get_once<C: HttpClient + ?Sized>(
    client: &C,
    token: &str,
    url: &str,
) -> Result<Bytes, CatalogError> {
    let response =
        client
            .get_authorized(url, token)
            .await
            .map_err(|e| CatalogError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

    if response.status >= 400 {
        let message = serde_json::from_slice::<ApiErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.error)
            .and_then(|detail| detail.message)
            .unwrap_or_else(|| "received an empty response".to_string());

        return Err(CatalogError::Api {
            url: url.to_string(),
            status: response.status,
            message,
        });
    }

    Ok(response.body)
}

fn track_to_item(item: PlaylistItem) -> Option<SourceItem> {
    let track = item.track?;
    // Local files have no Spotify id and cannot be streamed
    let id = track.id?;

    let (album, release_year, image_url) = match track.album {
        Some(album) => (
            Some(album.name),
            album.release_date.as_deref().and_then(release_year),
            largest_image(&album.images),
        ),
        None => (None, None, None),
    };

    Some(SourceItem {
        id,
        kind: ItemKind::Track,
        name: track.name,
        artists: track.artists.into_iter().map(|a| a.name).collect(),
        album,
        release_year,
        disc_number: track.disc_number,
        track_number: track.track_number,
        duration_ms: track.duration_ms,
        playable: track.is_playable.unwrap_or(true),
        image_url,
    })
}

fn episode_to_item(episode: EpisodeObject) -> Option<SourceItem> {
    let id = episode.id?;

    Some(SourceItem {
        id,
        kind: ItemKind::Episode,
        name: episode.name,
        artists: Vec::new(),
        album: None,
        release_year: episode.release_date.as_deref().and_then(release_year),
        disc_number: None,
        track_number: None,
        duration_ms: episode.duration_ms,
        playable: episode.is_playable.unwrap_or(true),
        image_url: largest_image(&episode.images),
    })
}

/// The API reports dates at year, month or day precision
fn release_year(date: &str) -> Option<i32> {
    if let Ok(parsed) = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        return Some(parsed.year());
    }
    date.split('-').next()?.parse().ok()
}

fn largest_image(images: &[ImageObject]) -> Option<String> {
    images
        .iter()
        .max_by_key(|img| img.width.unwrap_or(0))
        .map(|img| img.url.clone())
}
