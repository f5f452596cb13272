use color_eyre::eyre::Result;

/// Decoupled representation of the authenticated Spotify user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyApiUser {
    pub id: String,
    pub display_name: String,
}

/// Decoupled representation of a Spotify playlist from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyApiPlaylist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// Decoupled representation of a Spotify track from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyApiTrack {
    pub id: String,
    pub name: String,
    /// Name of the primary artist, empty when the catalog lists none
    pub artist: String,
    pub album_name: String,
    /// Playability in the market the track was requested for
    pub is_playable: bool,
    /// Id the track was requested under when Spotify relinked it to another id
    pub linked_from: Option<String>,
}

impl SpotifyApiTrack {
    /// The id under which this track is stored in a user's collection.
    pub fn library_id(&self) -> &str {
        self.linked_from.as_deref().unwrap_or(&self.id)
    }
}

/// Port trait wrapping the Spotify API capabilities used by business logic.
///
/// Collection pages are returned as one entry per listed item; `None` marks items
/// without a usable track reference (removed tracks, local files, podcast episodes)
/// so callers can still advance their offset by the page length.
///
/// Implementations live in `services::spotify::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SpotifyClient: Send + Sync {
    async fn current_user(&self) -> Result<SpotifyApiUser>;

    async fn available_markets(&self) -> Result<Vec<String>>;

    async fn current_user_playlists(&self, limit: u32, offset: u32)
    -> Result<Vec<SpotifyApiPlaylist>>;

    async fn playlist(&self, playlist_id: &str) -> Result<SpotifyApiPlaylist>;

    async fn playlist_items(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
        market: &str,
    ) -> Result<Vec<Option<SpotifyApiTrack>>>;

    async fn saved_tracks(&self, limit: u32, offset: u32) -> Result<Vec<Option<SpotifyApiTrack>>>;

    /// Resolve full details for `ids` with playability and relinking for `market`.
    async fn tracks(&self, ids: &[String], market: &str) -> Result<Vec<Option<SpotifyApiTrack>>>;

    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        market: &str,
    ) -> Result<Vec<SpotifyApiTrack>>;

    async fn playlist_add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;

    async fn playlist_remove_all_occurrences(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()>;

    async fn saved_tracks_add(&self, track_ids: &[String]) -> Result<()>;

    async fn saved_tracks_remove(&self, track_ids: &[String]) -> Result<()>;
}
