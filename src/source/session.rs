// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use librespot_audio::{AudioDecrypt, AudioFile};
use librespot_core::authentication::Credentials;
use librespot_core::cache::Cache;
use librespot_core::config::SessionConfig;
use librespot_core::keymaster;
use librespot_core::session::Session;
use librespot_core::spotify_id::SpotifyId;
use librespot_metadata::{Episode, FileFormat, Metadata, Track};

use crate::error::SessionError;
use crate::source::catalog::{ItemKind, SourceItem};

/// Public keymaster client id, the same one the web player uses
const KEYMASTER_CLIENT_ID: &str = "65b708073fc0480ea92a077233ca87bd";

const TOKEN_SCOPES: &str =
    "user-read-email,playlist-read-private,user-library-read,user-follow-read";

/// Encrypted Spotify audio carries a fixed-size header before the Ogg data
const OGG_HEADER_END: u64 = 0xa7;

const BYTES_PER_REQUEST: usize = 64 * 1024;

/// An opened audio stream, decrypted and positioned at the Ogg start.
///
/// The reader blocks while fetching, callers are expected to drain it on the
/// blocking thread pool.
pub struct AudioStream {
    /// Payload size in bytes (header already subtracted)
    pub total_size: u64,
    pub reader: Box<dyn Read + Send>,
}

/// Seam between the sync pipeline and the streaming backend
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Access token for the Web API, scoped for playlist reads
    async fn access_token(&self) -> Result<String, SessionError>;

    /// Open the audio stream behind a catalog item
    async fn open(&self, item: &SourceItem) -> Result<AudioStream, SessionError>;
}

/// Production audio source backed by a librespot session
pub struct SpotifySession {
    session: Session,
}

impl SpotifySession {
    /// Connect to Spotify, preferring credentials cached under `cache_dir`
    /// from an earlier run over the supplied username/password.
    pub async fn connect(
        username: &str,
        password: &str,
        cache_dir: &Path,
    ) -> Result<Self, SessionError> {
        let cache = Cache::new(Some(cache_dir), None, None, None)
            .map_err(|e| SessionError::LoginFailed(e.to_string()))?;

        let credentials = cache
            .credentials()
            .unwrap_or_else(|| Credentials::with_password(username, password));

        let (session, _credentials) =
            Session::connect(SessionConfig::default(), credentials, Some(cache), true)
                .await
                .map_err(|e| SessionError::LoginFailed(format!("{e:?}")))?;

        Ok(Self { session })
    }

    async fn open_track(&self, id: &str) -> Result<AudioStream, SessionError> {
        let track_id = SpotifyId::from_base62(id).map_err(|_| SessionError::MetadataFailed {
            id: id.to_string(),
            reason: "not a valid base62 id".to_string(),
        })?;

        let mut track = Track::get(&self.session, track_id)
            .await
            .map_err(|e| SessionError::MetadataFailed {
                id: id.to_string(),
                reason: format!("{e:?}"),
            })?;

        // Regional restrictions are expressed through alternative tracks
        if !track.available {
            for alt_id in track.alternatives.clone() {
                let alt = Track::get(&self.session, alt_id).await.map_err(|e| {
                    SessionError::MetadataFailed {
                        id: id.to_string(),
                        reason: format!("{e:?}"),
                    }
                })?;
                if alt.available {
                    track = alt;
                    break;
                }
            }
        }

        let file_id = [
            FileFormat::OGG_VORBIS_160,
            FileFormat::OGG_VORBIS_320,
            FileFormat::OGG_VORBIS_96,
        ]
        .iter()
        .find_map(|format| track.files.get(format).copied())
        .ok_or_else(|| SessionError::NoAudioFile { id: id.to_string() })?;

        self.open_file(track.id, file_id, id).await
    }

    async fn open_episode(&self, id: &str) -> Result<AudioStream, SessionError> {
        let episode_id = SpotifyId::from_uri(&format!("spotify:episode:{id}")).map_err(|_| {
            SessionError::MetadataFailed {
                id: id.to_string(),
                reason: "not a valid base62 id".to_string(),
            }
        })?;

        let episode = Episode::get(&self.session, episode_id)
            .await
            .map_err(|e| SessionError::MetadataFailed {
                id: id.to_string(),
                reason: format!("{e:?}"),
            })?;

        let file_id = [
            FileFormat::OGG_VORBIS_160,
            FileFormat::OGG_VORBIS_320,
            FileFormat::OGG_VORBIS_96,
        ]
        .iter()
        .find_map(|format| episode.files.get(format).copied())
        .ok_or_else(|| SessionError::NoAudioFile { id: id.to_string() })?;

        self.open_file(episode.id, file_id, id).await
    }

    async fn open_file(
        &self,
        content_id: SpotifyId,
        file_id: librespot_core::spotify_id::FileId,
        display_id: &str,
    ) -> Result<AudioStream, SessionError> {
        let key = self
            .session
            .audio_key()
            .request(content_id, file_id)
            .await
            .map_err(|e| SessionError::AudioKeyFailed {
                id: display_id.to_string(),
                reason: format!("{e:?}"),
            })?;

        let encrypted = AudioFile::open(&self.session, file_id, BYTES_PER_REQUEST, true)
            .await
            .map_err(|e| SessionError::StreamOpenFailed {
                id: display_id.to_string(),
                reason: format!("{e:?}"),
            })?;

        let controller = encrypted.get_stream_loader_controller();
        controller.set_stream_mode();
        let total_size = (controller.len() as u64).saturating_sub(OGG_HEADER_END);

        let mut decrypted = AudioDecrypt::new(key, encrypted);
        decrypted
            .seek(SeekFrom::Start(OGG_HEADER_END))
            .map_err(|e| SessionError::StreamOpenFailed {
                id: display_id.to_string(),
                reason: e.to_string(),
            })?;

        Ok(AudioStream {
            total_size,
            reader: Box::new(decrypted),
        })
    }
}

#[async_trait]
impl AudioSource for SpotifySession {
    async fn access_token(&self) -> Result<String, SessionError> {
        keymaster::get_token(&self.session, KEYMASTER_CLIENT_ID, TOKEN_SCOPES)
            .await
            .map(|token| token.access_token)
            .map_err(|e| SessionError::TokenFailed(format!("{e:?}")))
    }

    async fn open(&self, item: &SourceItem) -> Result<AudioStream, SessionError> {
        match item.kind {
            ItemKind::Track => self.open_track(&item.id).await,
            ItemKind::Episode => self.open_episode(&item.id).await,
        }
    }
}
