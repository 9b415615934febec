// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use crate::error::{DownloadError, ItemError, SyncError, TonieError};
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::source::catalog::{SourceItem, fetch_catalog};
use crate::source::link::SourceLink;
use crate::source::session::AudioSource;
use crate::state::DataDir;
use crate::tonie::client::TonieClient;
use crate::tonie::model::CreativeTonie;
use crate::tonie::reconcile::{DesiredChapter, ReconcileSummary, reconcile};
use crate::track::download::{Throttle, download_audio};
use crate::track::filename::{cache_filename, chapter_title};
use crate::track::transcode::{embed_artwork, finalize_file, transcode_to_mp3, write_tags};

/// Options for a sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Pace downloads against track duration to look less like a scraper
    pub ban_protection: bool,
}

/// Result of a sync run
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Number of items freshly downloaded into the cache
    pub downloaded: usize,
    /// Number of items already present in the cache
    pub cached: usize,
    /// Number of items that failed to download
    pub failed: usize,
    /// Details of failed items (title, error message)
    pub failed_items: Vec<(String, String)>,
    /// Outcome of the device reconciliation
    pub reconcile: ReconcileSummary,
}

/// Resolve household and Creative Tonie by name; both must exist
pub async fn find_creative_tonie<T: TonieClient + ?Sized>(
    client: &T,
    household_name: &str,
    tonie_name: &str,
) -> Result<CreativeTonie, TonieError> {
    let household = client
        .households()
        .await?
        .into_iter()
        .find(|h| h.name == household_name)
        .ok_or_else(|| TonieError::HouseholdNotFound(household_name.to_string()))?;

    client
        .creative_tonies(&household.id)
        .await?
        .into_iter()
        .find(|t| t.name == tonie_name)
        .ok_or_else(|| TonieError::TonieNotFound(tonie_name.to_string()))
}

/// Mirror a playlist or show onto a Creative Tonie.
///
/// Runs strictly sequentially:
/// 1. Fetch the ordered source catalog
/// 2. Download, transcode and tag anything missing from the local cache,
///    skipping failed items
/// 3. Reconcile the device chapter list against the desired list
pub async fn sync_source<C, S, T>(
    client: &C,
    source: &S,
    tonie_client: &T,
    tonie: &CreativeTonie,
    link: &SourceLink,
    data_dir: &DataDir,
    options: &SyncOptions,
    reporter: SharedProgressReporter,
) -> Result<SyncReport, SyncError>
where
    C: HttpClient + ?Sized,
    S: AudioSource + ?Sized,
    T: TonieClient + ?Sized,
{
    let token = source.access_token().await?;
    let items = fetch_catalog(client, &token, link, &reporter).await?;

    data_dir.ensure()?;
    let cleaned = data_dir.clean_partials()?;
    if cleaned > 0 {
        reporter.report(ProgressEvent::PartialFilesCleanedUp { count: cleaned });
    }

    let download_dir = data_dir.download_dir();
    let total_items = items.len();

    let mut desired: Vec<DesiredChapter> = Vec::new();
    let mut downloaded = 0;
    let mut cached = 0;
    let mut failed = 0;
    let mut failed_items = Vec::new();

    for (item_index, item) in items.iter().enumerate() {
        let title = chapter_title(item);

        reporter.report(ProgressEvent::ItemStarting {
            item_index,
            total_items,
            title: title.clone(),
        });

        // Titles are the join key; a duplicate title is the same chapter
        if desired.iter().any(|d| d.title == title) {
            continue;
        }

        let path = download_dir.join(cache_filename(&title));

        if path.exists() {
            reporter.report(ProgressEvent::ItemCached {
                title: title.clone(),
            });
            cached += 1;
            desired.push(DesiredChapter {
                title,
                path,
                seconds: item.seconds(),
            });
            continue;
        }

        if !item.playable {
            reporter.report(ProgressEvent::ItemUnavailable { title });
            continue;
        }

        match process_item(client, source, item, &title, &path, &download_dir, options, &reporter)
            .await
        {
            Ok(()) => {
                downloaded += 1;
                desired.push(DesiredChapter {
                    title,
                    path,
                    seconds: item.seconds(),
                });
            }
            Err(error) => {
                failed += 1;
                failed_items.push((title.clone(), error.to_string()));
                reporter.report(ProgressEvent::ItemFailed {
                    title,
                    error: error.to_string(),
                });
            }
        }
    }

    let reconcile_summary = reconcile(tonie_client, tonie, &desired, &reporter).await?;

    reporter.report(ProgressEvent::SyncCompleted {
        downloaded_count: downloaded,
        cached_count: cached,
        failed_count: failed,
        uploaded_count: reconcile_summary.uploaded,
        removed_count: reconcile_summary.removed,
        skipped_capacity_count: reconcile_summary.skipped_capacity,
    });

    Ok(SyncReport {
        downloaded,
        cached,
        failed,
        failed_items,
        reconcile: reconcile_summary,
    })
}

/// Download one item into the cache: stream to a temp file, transcode to a
/// `.partial` mp3, tag it, then rename into place. The temp file is removed
/// on every exit path; a failed `.partial` is removed immediately.
async fn process_item<C, S>(
    client: &C,
    source: &S,
    item: &SourceItem,
    title: &str,
    final_path: &Path,
    download_dir: &Path,
    options: &SyncOptions,
    reporter: &SharedProgressReporter,
) -> Result<(), ItemError>
where
    C: HttpClient + ?Sized,
    S: AudioSource + ?Sized,
{
    let stream = source.open(item).await?;

    // Keep the temp file on the same filesystem as the cache; it is
    // deleted when this guard drops
    let raw = tempfile::Builder::new()
        .prefix(".raw-")
        .suffix(".ogg")
        .tempfile_in(download_dir)
        .map_err(|e| {
            ItemError::Download(DownloadError::FileCreateFailed {
                path: download_dir.to_path_buf(),
                source: e,
            })
        })?;
    let raw_path = raw.path().to_path_buf();

    let throttle = options
        .ban_protection
        .then(|| Throttle::new(item.duration_ms));

    download_audio(
        stream,
        raw_path.clone(),
        throttle,
        title.to_string(),
        reporter.clone(),
    )
    .await?;

    reporter.report(ProgressEvent::Transcoding {
        title: title.to_string(),
    });

    let partial = partial_path(final_path);
    let result = finalize_item(client, item, &raw_path, &partial, final_path).await;
    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result?;

    reporter.report(ProgressEvent::ItemReady {
        title: title.to_string(),
    });

    Ok(())
}

async fn finalize_item<C: HttpClient + ?Sized>(
    client: &C,
    item: &SourceItem,
    raw_path: &Path,
    partial: &Path,
    final_path: &Path,
) -> Result<(), ItemError> {
    transcode_to_mp3(raw_path, partial).await?;
    write_tags(partial, item)?;
    if let Some(image_url) = &item.image_url {
        embed_artwork(client, partial, image_url).await?;
    }
    finalize_file(partial, final_path)?;
    Ok(())
}

fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}
