use std::sync::Arc;

/// Events emitted during a sync run for progress reporting
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The source catalog (playlist or show) is being fetched
    FetchingCatalog { source: String },

    /// A catalog request failed and is being retried
    CatalogRetry {
        attempt: usize,
        max_attempts: usize,
        error: String,
    },

    /// The catalog has been fetched completely
    CatalogFetched { total_items: usize },

    /// Processing of a single track/episode is starting
    ItemStarting {
        item_index: usize,
        total_items: usize,
        title: String,
    },

    /// Item is already in the download cache, nothing to do
    ItemCached { title: String },

    /// Item is not playable on this account/market and is skipped
    ItemUnavailable { title: String },

    /// Audio stream download progress
    DownloadProgress {
        title: String,
        bytes_downloaded: u64,
        total_bytes: u64,
    },

    /// Raw audio downloaded, reporting wall-clock duration
    DownloadCompleted { title: String, elapsed_secs: f64 },

    /// The downloaded audio is being converted and tagged
    Transcoding { title: String },

    /// The item is finalized in the download cache
    ItemReady { title: String },

    /// Processing of an item failed, the run continues
    ItemFailed { title: String, error: String },

    /// Orphaned partial files were cleaned up from the cache
    PartialFilesCleanedUp { count: usize },

    /// A remote chapter with no matching desired title is being removed
    RemovingChapter { title: String },

    /// A desired chapter is being uploaded to the device
    UploadingChapter { title: String },

    /// Upload finished, reporting the locally tracked capacity
    ChapterUploaded {
        title: String,
        seconds_remaining: f64,
    },

    /// A chapter did not fit into the remaining capacity
    ChapterSkippedNoSpace {
        title: String,
        needed_secs: f64,
        free_secs: f64,
    },

    /// The desired chapter is already present on the device
    ChapterPresent { title: String },

    /// The device chapter order was changed and committed
    ChaptersReordered { moves: usize },

    /// Sync operation completed
    SyncCompleted {
        downloaded_count: usize,
        cached_count: usize,
        failed_count: usize,
        uploaded_count: usize,
        removed_count: usize,
        skipped_capacity_count: usize,
    },
}

/// Trait for reporting progress events during synchronization.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A no-op progress reporter that silently ignores all events.
/// Useful for tests or quiet mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {
        // Intentionally empty
    }
}

impl NoopReporter {
    /// Create a new NoopReporter wrapped in an Arc
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}
