use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing a Spotify link or URI
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("'{0}' is not a recognizable Spotify link or URI")]
    Unrecognized(String),

    #[error("{kind} links are not supported, pass a playlist or show instead")]
    Unsupported { kind: String },

    #[error("'{0}' is not a valid Spotify id")]
    InvalidId(String),
}

/// Errors that can occur while paging through the Spotify Web API
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Spotify API returned status {status} for {url}: {message}")]
    Api {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode response from {url}: {source}")]
    DecodeFailed {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the librespot session layer
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Spotify login failed: {0}")]
    LoginFailed(String),

    #[error("Failed to request access token: {0}")]
    TokenFailed(String),

    #[error("Failed to fetch metadata for {id}: {reason}")]
    MetadataFailed { id: String, reason: String },

    #[error("No audio file available for {id}")]
    NoAudioFile { id: String },

    #[error("Failed to request audio key for {id}: {reason}")]
    AudioKeyFailed { id: String, reason: String },

    #[error("Failed to open audio stream for {id}: {reason}")]
    StreamOpenFailed { id: String, reason: String },
}

/// Errors that can occur while streaming a track to disk
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Stream read failed: {0}")]
    StreamRead(#[source] std::io::Error),

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download task was aborted")]
    TaskAborted,
}

/// Errors from transcoding and tag writing
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("ffmpeg not found on PATH, cannot convert audio")]
    FfmpegNotFound,

    #[error("Failed to run ffmpeg: {0}")]
    FfmpegSpawnFailed(#[source] std::io::Error),

    #[error("ffmpeg exited with status {status} while writing {path}")]
    FfmpegFailed { path: PathBuf, status: i32 },

    #[error("Failed to write tags to {path}: {source}")]
    TagWriteFailed {
        path: PathBuf,
        #[source]
        source: id3::Error,
    },

    #[error("Failed to fetch artwork from {url}: {source}")]
    ArtworkFetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the Tonie cloud API client
#[derive(Error, Debug)]
pub enum TonieError {
    #[error("Tonie cloud login failed with status {status}: {message}")]
    LoginFailed { status: u16, message: String },

    #[error("Request to {url} failed: {source}")]
    RequestFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Tonie cloud returned status {status} for {url}")]
    Api { url: String, status: u16 },

    #[error("Household '{0}' not found")]
    HouseholdNotFound(String),

    #[error("Creative Tonie '{0}' not found")]
    TonieNotFound(String),

    #[error("Failed to read upload file {path}: {source}")]
    UploadReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File upload to the Tonie cloud was rejected with status {0}")]
    UploadRejected(u16),
}

/// Per-item failure during the download phase; reported and skipped
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),
}

/// Errors that can occur when managing the local data directory
#[derive(Error, Debug)]
pub enum StateError {
    #[error("No usable data directory, pass --data-path explicitly")]
    NoDataDir,

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Tonie error: {0}")]
    Tonie(#[from] TonieError),
}
