use serde::{Deserialize, Serialize};

/// Spotify OAuth token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: String,
}

/// Spotify user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyMarkets {
    pub markets: Vec<String>,
}

/// Generic paging object returned by every list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPage<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyOwner {
    pub id: String,
}

/// Spotify playlist from API (simplified or full, only the fields we read)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub name: String,
    pub owner: SpotifyOwner,
}

/// An entry of a playlist or of the saved tracks collection.
///
/// `track` is null for tracks removed from the catalog and holds an episode
/// object for podcast entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyLibraryItem {
    pub track: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyLinkedFrom {
    pub id: Option<String>,
}

/// Spotify track from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub album: Option<SpotifyAlbum>,
    #[serde(default)]
    pub is_playable: Option<bool>,
    #[serde(default)]
    pub linked_from: Option<SpotifyLinkedFrom>,
    #[serde(default)]
    pub is_local: bool,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
}

/// Response of `GET /tracks`; unknown ids come back as null entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTracks {
    pub tracks: Vec<Option<SpotifyTrack>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifySearchResponse {
    pub tracks: SpotifyPage<SpotifyTrack>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyErrorBody {
    pub error: SpotifyErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyErrorDetail {
    pub message: String,
}

/// OAuth tokens persisted between runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is no longer valid
    pub expires_at: i64,
    pub scope: String,
}
