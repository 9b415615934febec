pub mod error;
pub mod http;
pub mod progress;
pub mod source;
pub mod state;
pub mod sync;
pub mod tonie;
pub mod track;

// Re-export main types for convenience
pub use error::{
    CatalogError, DownloadError, ItemError, LinkError, SessionError, StateError, SyncError,
    TonieError, TranscodeError,
};
pub use http::{ApiResponse, HttpClient, ReqwestClient};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use source::{AudioSource, SourceItem, SourceLink, SpotifySession, fetch_catalog};
pub use state::DataDir;
pub use sync::{SyncOptions, SyncReport, find_creative_tonie, sync_source};
pub use tonie::{Chapter, CreativeTonie, Household, TonieClient, TonieHttpClient};
