use std::path::Path;
use std::process::Stdio;

use id3::frame::{Content, Picture, PictureType};
use id3::{Frame, Tag, TagLike, Version};
use tokio::process::Command;

use crate::error::TranscodeError;
use crate::http::HttpClient;
use crate::source::SourceItem;

const MP3_BITRATE: &str = "160k";

/// Convert raw (Ogg Vorbis) audio into an mp3 the Tonie cloud accepts.
///
/// Shells out to ffmpeg; a missing binary is its own error so callers can
/// skip the item with a useful message.
pub async fn transcode_to_mp3(input: &Path, output: &Path) -> Result<(), TranscodeError> {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error"])
        .arg("-i")
        .arg(input)
        .args(["-c:a", "libmp3lame", "-b:a", MP3_BITRATE])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TranscodeError::FfmpegNotFound
            } else {
                TranscodeError::FfmpegSpawnFailed(e)
            }
        })?;

    if !status.success() {
        return Err(TranscodeError::FfmpegFailed {
            path: output.to_path_buf(),
            status: status.code().unwrap_or(-1),
        });
    }

    Ok(())
}

/// Write id3 frames from the catalog metadata
pub fn write_tags(path: &Path, item: &SourceItem) -> Result<(), TranscodeError> {
    let mut tag = Tag::read_from_path(path).unwrap_or_default();

    tag.set_title(item.name.clone());

    if let Some(first) = item.artists.first() {
        tag.set_album_artist(first.clone());
        tag.set_artist(item.artists.join(", "));
    }
    if let Some(album) = &item.album {
        tag.set_album(album.clone());
    }
    if let Some(year) = item.release_year {
        tag.set_year(year);
    }
    if let Some(track) = item.track_number {
        tag.set_track(track);
    }
    if let Some(disc) = item.disc_number {
        tag.set_disc(disc);
    }

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| TranscodeError::TagWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Fetch cover art and embed it as the front-cover picture frame
pub async fn embed_artwork<C: HttpClient + ?Sized>(
    client: &C,
    path: &Path,
    image_url: &str,
) -> Result<(), TranscodeError> {
    let image = client.get_bytes(image_url).await.map_err(|e| {
        TranscodeError::ArtworkFetchFailed {
            url: image_url.to_string(),
            source: e,
        }
    })?;

    let mut tag = Tag::read_from_path(path).unwrap_or_default();
    tag.add_frame(Frame::with_content(
        "APIC",
        Content::Picture(Picture {
            mime_type: "image/jpeg".to_string(),
            picture_type: PictureType::CoverFront,
            description: String::new(),
            data: image.to_vec(),
        }),
    ));

    tag.write_to_path(path, Version::Id3v24)
        .map_err(|e| TranscodeError::TagWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Move a finished `.partial` file onto its final cache name
pub fn finalize_file(partial: &Path, final_path: &Path) -> Result<(), TranscodeError> {
    std::fs::rename(partial, final_path).map_err(|e| TranscodeError::RenameFailed {
        from: partial.to_path_buf(),
        to: final_path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::ApiResponse;
    use crate::source::catalog::ItemKind;
    use async_trait::async_trait;
    use bytes::Bytes;
    use tempfile::tempdir;

    struct FakeImageClient;

    #[async_trait]
    impl HttpClient for FakeImageClient {
        async fn get_bytes(&self, _url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from_static(b"\xff\xd8jpegdata"))
        }

        async fn get_authorized(
            &self,
            _url: &str,
            _token: &str,
        ) -> Result<ApiResponse, reqwest::Error> {
            unimplemented!()
        }
    }

    fn make_item() -> SourceItem {
        SourceItem {
            id: "4cOdK2wGLETKBW3PvgPWqT".to_string(),
            kind: ItemKind::Track,
            name: "Song One".to_string(),
            artists: vec!["Artist A".to_string(), "Artist B".to_string()],
            album: Some("Album".to_string()),
            release_year: Some(2021),
            disc_number: Some(1),
            track_number: Some(3),
            duration_ms: 215_000,
            playable: true,
            image_url: Some("https://img/big".to_string()),
        }
    }

    #[test]
    fn tags_roundtrip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"fake mp3 payload").unwrap();

        write_tags(&path, &make_item()).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Song One"));
        assert_eq!(tag.artist(), Some("Artist A, Artist B"));
        assert_eq!(tag.album_artist(), Some("Artist A"));
        assert_eq!(tag.album(), Some("Album"));
        assert_eq!(tag.year(), Some(2021));
        assert_eq!(tag.track(), Some(3));
        assert_eq!(tag.disc(), Some(1));
    }

    #[test]
    fn episode_without_artists_gets_title_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("episode.mp3");
        std::fs::write(&path, b"fake mp3 payload").unwrap();

        let mut item = make_item();
        item.artists.clear();
        item.album = None;
        write_tags(&path, &item).unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Song One"));
        assert_eq!(tag.artist(), None);
        assert_eq!(tag.album(), None);
    }

    #[tokio::test]
    async fn artwork_is_embedded_as_front_cover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        std::fs::write(&path, b"fake mp3 payload").unwrap();

        write_tags(&path, &make_item()).unwrap();
        embed_artwork(&FakeImageClient, &path, "https://img/big")
            .await
            .unwrap();

        let tag = Tag::read_from_path(&path).unwrap();
        let pictures: Vec<_> = tag.pictures().collect();
        assert_eq!(pictures.len(), 1);
        assert_eq!(pictures[0].picture_type, PictureType::CoverFront);
        assert_eq!(pictures[0].data, b"\xff\xd8jpegdata");
    }

    #[test]
    fn finalize_moves_partial_into_place() {
        let dir = tempdir().unwrap();
        let partial = dir.path().join("song.mp3.partial");
        let final_path = dir.path().join("song.mp3");
        std::fs::write(&partial, b"done").unwrap();

        finalize_file(&partial, &final_path).unwrap();

        assert!(!partial.exists());
        assert_eq!(std::fs::read(&final_path).unwrap(), b"done");
    }
}
