// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::TonieError;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::tonie::client::TonieClient;
use crate::tonie::model::{Chapter, CreativeTonie};

/// A chapter the device should end up with, derived from the source catalog
/// in playlist order. Titles are the join key against remote chapters.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredChapter {
    pub title: String,
    pub path: PathBuf,
    pub seconds: f64,
}

/// Result of the removal pass
#[derive(Debug, Clone)]
pub struct RemovalPlan {
    /// Chapters to keep, relative order preserved
    pub keep: Vec<Chapter>,
    /// Chapters whose title no longer appears in the desired set
    pub remove: Vec<Chapter>,
}

/// Remote chapters whose titles are absent from the desired set get dropped
pub fn plan_removals(remote: &[Chapter], desired: &[DesiredChapter]) -> RemovalPlan {
    let wanted: HashSet<&str> = desired.iter().map(|d| d.title.as_str()).collect();

    let (keep, remove) = remote
        .iter()
        .cloned()
        .partition(|chapter| wanted.contains(chapter.title.as_str()));

    RemovalPlan { keep, remove }
}

/// A desired chapter that did not fit into the remaining capacity
#[derive(Debug, Clone)]
pub struct SkippedChapter {
    pub chapter: DesiredChapter,
    pub needed_secs: f64,
    pub free_secs: f64,
}

/// Result of the upload pass
#[derive(Debug, Clone)]
pub struct UploadPlan {
    /// Chapters to upload, in desired order
    pub upload: Vec<DesiredChapter>,
    /// Chapters that were skipped for lack of capacity
    pub skipped: Vec<SkippedChapter>,
    /// Desired chapters already present on the device
    pub present: Vec<DesiredChapter>,
}

/// Decide which desired chapters to upload against the device's remaining
/// seconds. Capacity is decremented locally per accepted chapter; the device
/// is not re-queried between uploads.
pub fn plan_uploads(
    desired: &[DesiredChapter],
    remote: &[Chapter],
    seconds_remaining: f64,
) -> UploadPlan {
    let have: HashSet<&str> = remote.iter().map(|c| c.title.as_str()).collect();

    let mut free = seconds_remaining;
    let mut upload = Vec::new();
    let mut skipped = Vec::new();
    let mut present = Vec::new();

    for chapter in desired {
        if have.contains(chapter.title.as_str()) {
            present.push(chapter.clone());
        } else if free - chapter.seconds > 0.0 {
            free -= chapter.seconds;
            upload.push(chapter.clone());
        } else {
            skipped.push(SkippedChapter {
                chapter: chapter.clone(),
                needed_secs: chapter.seconds,
                free_secs: free,
            });
        }
    }

    UploadPlan {
        upload,
        skipped,
        present,
    }
}

/// Splice remote chapters into desired order.
///
/// Walks the desired list by index; any matching remote chapter found at a
/// different index is removed and reinserted at the target position (clamped
/// to the list length). Desired titles missing from the device are skipped.
/// Returns None when the order is already correct.
pub fn plan_reorder(remote: &[Chapter], desired: &[DesiredChapter]) -> Option<Vec<Chapter>> {
    let mut chapters = remote.to_vec();
    let mut changed = false;

    for (target, want) in desired.iter().enumerate() {
        let Some(current) = chapters.iter().position(|c| c.title == want.title) else {
            continue;
        };

        if current != target {
            let chapter = chapters.remove(current);
            let insert_at = target.min(chapters.len());
            chapters.insert(insert_at, chapter);
            changed = true;
        }
    }

    changed.then_some(chapters)
}

/// Outcome of a full reconciliation
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub removed: usize,
    pub uploaded: usize,
    pub skipped_capacity: usize,
    pub already_present: usize,
    pub reordered: bool,
}

/// Run the three reconciliation passes against the device.
///
/// Each pass that mutates the chapter list commits once; the tonie snapshot
/// is re-fetched between passes because the device owns the list. There is
/// no rollback: a failed upload aborts with chapters already added.
pub async fn reconcile<T: TonieClient + ?Sized>(
    client: &T,
    tonie: &CreativeTonie,
    desired: &[DesiredChapter],
    reporter: &SharedProgressReporter,
) -> Result<ReconcileSummary, TonieError> {
    let mut summary = ReconcileSummary::default();

    // Removal pass: drop orphaned chapters, one commit for the whole batch
    let removals = plan_removals(&tonie.chapters, desired);
    for chapter in &removals.remove {
        reporter.report(ProgressEvent::RemovingChapter {
            title: chapter.title.clone(),
        });
    }
    if !removals.remove.is_empty() {
        client.set_chapters(tonie, &removals.keep).await?;
    }
    summary.removed = removals.remove.len();

    let tonie = client.refresh(tonie).await?;

    // Upload pass: capacity is tracked locally, no re-query per chapter
    let uploads = plan_uploads(desired, &tonie.chapters, tonie.seconds_remaining);
    for chapter in &uploads.present {
        reporter.report(ProgressEvent::ChapterPresent {
            title: chapter.title.clone(),
        });
    }
    summary.already_present = uploads.present.len();

    let mut free = tonie.seconds_remaining;
    for chapter in &uploads.upload {
        reporter.report(ProgressEvent::UploadingChapter {
            title: chapter.title.clone(),
        });
        client
            .upload_chapter(&tonie, &chapter.path, &chapter.title)
            .await?;
        free -= chapter.seconds;
        reporter.report(ProgressEvent::ChapterUploaded {
            title: chapter.title.clone(),
            seconds_remaining: free,
        });
        summary.uploaded += 1;
    }
    for skipped in &uploads.skipped {
        reporter.report(ProgressEvent::ChapterSkippedNoSpace {
            title: skipped.chapter.title.clone(),
            needed_secs: skipped.needed_secs,
            free_secs: skipped.free_secs,
        });
    }
    summary.skipped_capacity = uploads.skipped.len();

    let tonie = client.refresh(&tonie).await?;

    // Reorder pass: one commit if anything moved
    if let Some(sorted) = plan_reorder(&tonie.chapters, desired) {
        let moves = sorted
            .iter()
            .zip(&tonie.chapters)
            .filter(|(a, b)| a.title != b.title)
            .count();
        client.set_chapters(&tonie, &sorted).await?;
        reporter.report(ProgressEvent::ChaptersReordered { moves });
        summary.reordered = true;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{NoopReporter, ProgressReporter};
    use crate::tonie::model::Household;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn remote(titles: &[&str]) -> Vec<Chapter> {
        titles
            .iter()
            .enumerate()
            .map(|(i, title)| Chapter {
                id: format!("chapter-{i}"),
                title: title.to_string(),
                file: format!("file-{i}"),
                seconds: 60.0,
                transcoding: false,
            })
            .collect()
    }

    fn wanted(titles: &[&str]) -> Vec<DesiredChapter> {
        titles
            .iter()
            .map(|title| DesiredChapter {
                title: title.to_string(),
                path: PathBuf::from(format!("/cache/{title}.mp3")),
                seconds: 60.0,
            })
            .collect()
    }

    #[test]
    fn removal_drops_orphans_and_preserves_order() {
        let remote = remote(&["A", "gone", "B", "also gone", "C"]);
        let desired = wanted(&["C", "B", "A"]);

        let plan = plan_removals(&remote, &desired);

        let kept: Vec<_> = plan.keep.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(kept, ["A", "B", "C"]);
        let removed: Vec<_> = plan.remove.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(removed, ["gone", "also gone"]);
    }

    #[test]
    fn removal_is_empty_when_everything_matches() {
        let remote = remote(&["A", "B"]);
        let desired = wanted(&["A", "B"]);

        let plan = plan_removals(&remote, &desired);
        assert!(plan.remove.is_empty());
        assert_eq!(plan.keep.len(), 2);
    }

    #[test]
    fn uploads_only_missing_chapters() {
        let remote = remote(&["A"]);
        let desired = wanted(&["A", "B", "C"]);

        let plan = plan_uploads(&desired, &remote, 3600.0);

        let titles: Vec<_> = plan.upload.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["B", "C"]);
        assert_eq!(plan.present.len(), 1);
        assert_eq!(plan.present[0].title, "A");
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn capacity_is_decremented_locally() {
        let desired = wanted(&["A", "B", "C"]); // 60s each
        // Fits two chapters, the third would hit zero
        let plan = plan_uploads(&desired, &[], 150.0);

        let titles: Vec<_> = plan.upload.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].chapter.title, "C");
        assert_eq!(plan.skipped[0].free_secs, 30.0);
    }

    #[test]
    fn exact_fit_is_rejected() {
        // remaining - seconds must stay positive, equality does not fit
        let desired = wanted(&["A"]);
        let plan = plan_uploads(&desired, &[], 60.0);

        assert!(plan.upload.is_empty());
        assert_eq!(plan.skipped.len(), 1);
    }

    #[test]
    fn later_small_chapter_can_still_fit() {
        let mut desired = wanted(&["big", "small"]);
        desired[0].seconds = 500.0;
        desired[1].seconds = 30.0;

        let plan = plan_uploads(&desired, &[], 100.0);

        let titles: Vec<_> = plan.upload.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["small"]);
        assert_eq!(plan.skipped[0].chapter.title, "big");
    }

    #[test]
    fn reorder_moves_chapters_into_desired_order() {
        let remote = remote(&["C", "A", "B"]);
        let desired = wanted(&["A", "B", "C"]);

        let sorted = plan_reorder(&remote, &desired).unwrap();
        let titles: Vec<_> = sorted.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn reorder_returns_none_when_already_sorted() {
        let remote = remote(&["A", "B", "C"]);
        let desired = wanted(&["A", "B", "C"]);

        assert!(plan_reorder(&remote, &desired).is_none());
    }

    #[test]
    fn reorder_ignores_desired_titles_missing_remotely() {
        // "B" was skipped during upload (capacity), device only has A and C
        let remote = remote(&["C", "A"]);
        let desired = wanted(&["A", "B", "C"]);

        let sorted = plan_reorder(&remote, &desired).unwrap();
        let titles: Vec<_> = sorted.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["A", "C"]);
    }

    #[test]
    fn reorder_keeps_unknown_remote_chapters_stable() {
        // Chapters the desired set does not know about keep their relative
        // order behind the sorted prefix
        let remote = remote(&["X", "B", "A"]);
        let desired = wanted(&["A", "B"]);

        let sorted = plan_reorder(&remote, &desired).unwrap();
        let titles: Vec<_> = sorted.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "X"]);
    }

    /// Records API calls and serves a scripted sequence of tonie snapshots
    struct MockTonieClient {
        snapshots: Mutex<Vec<CreativeTonie>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockTonieClient {
        fn new(snapshots: Vec<CreativeTonie>) -> Self {
            Self {
                snapshots: Mutex::new(snapshots),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TonieClient for MockTonieClient {
        async fn households(&self) -> Result<Vec<Household>, TonieError> {
            unimplemented!()
        }

        async fn creative_tonies(
            &self,
            _household_id: &str,
        ) -> Result<Vec<CreativeTonie>, TonieError> {
            unimplemented!()
        }

        async fn refresh(&self, _tonie: &CreativeTonie) -> Result<CreativeTonie, TonieError> {
            self.calls.lock().unwrap().push("refresh".to_string());
            Ok(self.snapshots.lock().unwrap().remove(0))
        }

        async fn upload_chapter(
            &self,
            _tonie: &CreativeTonie,
            _path: &Path,
            title: &str,
        ) -> Result<(), TonieError> {
            self.calls.lock().unwrap().push(format!("upload:{title}"));
            Ok(())
        }

        async fn set_chapters(
            &self,
            _tonie: &CreativeTonie,
            chapters: &[Chapter],
        ) -> Result<(), TonieError> {
            let titles: Vec<_> = chapters.iter().map(|c| c.title.as_str()).collect();
            self.calls
                .lock()
                .unwrap()
                .push(format!("set:{}", titles.join(",")));
            Ok(())
        }
    }

    fn tonie_with(chapters: Vec<Chapter>, seconds_remaining: f64) -> CreativeTonie {
        CreativeTonie {
            id: "tonie-1".to_string(),
            household_id: "household-1".to_string(),
            name: "Bear".to_string(),
            seconds_remaining,
            seconds_present: 0.0,
            chapters_remaining: 99,
            chapters_present: chapters.len() as u32,
            chapters,
        }
    }

    #[tokio::test]
    async fn full_reconcile_removes_uploads_and_reorders() {
        // Device: [stale, B]; desired: [A, B]
        let initial = tonie_with(remote(&["stale", "B"]), 5400.0);
        // After removal commit
        let after_removal = tonie_with(remote(&["B"]), 5400.0);
        // After upload of A
        let after_upload = tonie_with(remote(&["B", "A"]), 5340.0);

        let client = MockTonieClient::new(vec![after_removal, after_upload]);
        let desired = wanted(&["A", "B"]);
        let reporter = NoopReporter::shared();

        let summary = reconcile(&client, &initial, &desired, &reporter)
            .await
            .unwrap();

        assert_eq!(summary.removed, 1);
        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.already_present, 1);
        assert!(summary.reordered);

        let calls = client.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            [
                "set:B",      // removal commit keeps only B
                "refresh",
                "upload:A",
                "refresh",
                "set:A,B",    // reorder commit
            ]
        );
    }

    #[tokio::test]
    async fn noop_when_device_already_matches() {
        let initial = tonie_with(remote(&["A", "B"]), 5400.0);
        let snapshot1 = tonie_with(remote(&["A", "B"]), 5400.0);
        let snapshot2 = tonie_with(remote(&["A", "B"]), 5400.0);

        let client = MockTonieClient::new(vec![snapshot1, snapshot2]);
        let desired = wanted(&["A", "B"]);
        let reporter = NoopReporter::shared();

        let summary = reconcile(&client, &initial, &desired, &reporter)
            .await
            .unwrap();

        assert_eq!(summary.removed, 0);
        assert_eq!(summary.uploaded, 0);
        assert_eq!(summary.already_present, 2);
        assert!(!summary.reordered);

        // Only the two refreshes, no mutating calls
        let calls = client.calls.lock().unwrap().clone();
        assert_eq!(calls, ["refresh", "refresh"]);
    }

    /// Collects the titles of already-present chapter events
    #[derive(Default)]
    struct PresentRecorder {
        titles: Mutex<Vec<String>>,
    }

    impl ProgressReporter for PresentRecorder {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::ChapterPresent { title } = event {
                self.titles.lock().unwrap().push(title);
            }
        }
    }

    #[tokio::test]
    async fn present_chapters_are_reported_and_not_reuploaded() {
        let initial = tonie_with(remote(&["A", "B"]), 5400.0);
        let snapshot1 = tonie_with(remote(&["A", "B"]), 5400.0);
        let snapshot2 = tonie_with(remote(&["A", "B"]), 5400.0);

        let client = MockTonieClient::new(vec![snapshot1, snapshot2]);
        let desired = wanted(&["A", "B"]);
        let recorder = Arc::new(PresentRecorder::default());
        let reporter: SharedProgressReporter = recorder.clone();

        let summary = reconcile(&client, &initial, &desired, &reporter)
            .await
            .unwrap();

        assert_eq!(summary.already_present, 2);
        assert_eq!(summary.uploaded, 0);
        assert_eq!(*recorder.titles.lock().unwrap(), ["A", "B"]);
    }

    #[tokio::test]
    async fn capacity_skips_are_reported_not_fatal() {
        let initial = tonie_with(vec![], 90.0);
        let snapshot1 = tonie_with(vec![], 90.0);
        let snapshot2 = tonie_with(remote(&["A"]), 30.0);

        let client = MockTonieClient::new(vec![snapshot1, snapshot2]);
        let desired = wanted(&["A", "B"]); // 60s each, only A fits
        let reporter = NoopReporter::shared();

        let summary = reconcile(&client, &initial, &desired, &reporter)
            .await
            .unwrap();

        assert_eq!(summary.uploaded, 1);
        assert_eq!(summary.skipped_capacity, 1);
    }
}
