// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::error::LinkError;

/// A parsed Spotify source reference
///
/// Only playlists and shows can be mirrored onto a Creative Tonie. Other
/// link kinds (track, album, artist, episode) are recognized so the error
/// can name them instead of reporting a generic parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLink {
    Playlist(String),
    Show(String),
}

impl SourceLink {
    /// Parse a Spotify URI (`spotify:playlist:<id>`) or an
    /// `open.spotify.com` share URL into a source link
    pub fn parse(input: &str) -> Result<Self, LinkError> {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("spotify:") {
            let mut parts = rest.splitn(2, ':');
            let kind = parts.next().unwrap_or_default();
            let id = parts.next().unwrap_or_default();
            return Self::from_kind_and_id(kind, id, input);
        }

        if let Ok(url) = Url::parse(input)
            && url
                .host_str()
                .is_some_and(|host| host == "open.spotify.com")
        {
            let mut segments = url
                .path_segments()
                .ok_or_else(|| LinkError::Unrecognized(input.to_string()))?;
            let kind = segments.next().unwrap_or_default().to_string();
            let id = segments.next().unwrap_or_default().to_string();
            return Self::from_kind_and_id(&kind, &id, input);
        }

        Err(LinkError::Unrecognized(input.to_string()))
    }

    fn from_kind_and_id(kind: &str, id: &str, input: &str) -> Result<Self, LinkError> {
        if !is_valid_id(id) {
            return Err(LinkError::InvalidId(id.to_string()));
        }

        match kind {
            "playlist" => Ok(Self::Playlist(id.to_string())),
            "show" => Ok(Self::Show(id.to_string())),
            "track" | "album" | "artist" | "episode" => Err(LinkError::Unsupported {
                kind: kind.to_string(),
            }),
            _ => Err(LinkError::Unrecognized(input.to_string())),
        }
    }

    /// The raw Spotify id
    pub fn id(&self) -> &str {
        match self {
            Self::Playlist(id) | Self::Show(id) => id,
        }
    }
}

/// Spotify ids are 22 characters of base62
fn is_valid_id(id: &str) -> bool {
    id.len() == 22 && id.chars().all(|c| c.is_ascii_alphanumeric())
}
