use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};

use crate::ports::spotify::{SpotifyApiPlaylist, SpotifyApiTrack, SpotifyApiUser, SpotifyClient};
use crate::spotify_rs::client::SpotifyClient as SpotifyHttpClient;
use crate::spotify_rs::types::{SpotifyLibraryItem, SpotifyPlaylist, SpotifyTrack};

/// Production implementation of the Spotify port, backed by the Web API.
pub struct SpotifyWebApi {
    client: SpotifyHttpClient,
}

impl SpotifyWebApi {
    pub fn new(access_token: String, timeout: Duration) -> Result<Self> {
        let client = SpotifyHttpClient::new(access_token, timeout)
            .wrap_err("Failed to build Spotify http client")?;
        Ok(Self { client })
    }
}

/// Convert a wire track into the port representation.
///
/// Local files, podcast episodes and tracks without an id cannot be resolved or
/// modified through the catalog and are dropped.
fn to_api_track(track: SpotifyTrack) -> Option<SpotifyApiTrack> {
    if track.is_local || track.kind.as_deref().is_some_and(|kind| kind != "track") {
        return None;
    }
    let id = track.id?;
    Some(SpotifyApiTrack {
        id,
        name: track.name,
        artist: track
            .artists
            .into_iter()
            .next()
            .map(|artist| artist.name)
            .unwrap_or_default(),
        album_name: track.album.map(|album| album.name).unwrap_or_default(),
        // Without market information Spotify omits the flag; treat that as unknown, not playable
        is_playable: track.is_playable.unwrap_or(false),
        linked_from: track.linked_from.and_then(|linked| linked.id),
    })
}

fn to_api_items(items: Vec<SpotifyLibraryItem>) -> Vec<Option<SpotifyApiTrack>> {
    items
        .into_iter()
        .map(|item| item.track.and_then(to_api_track))
        .collect()
}

fn to_api_playlist(playlist: SpotifyPlaylist) -> SpotifyApiPlaylist {
    SpotifyApiPlaylist {
        id: playlist.id,
        name: playlist.name,
        owner_id: playlist.owner.id,
    }
}

#[async_trait::async_trait]
impl SpotifyClient for SpotifyWebApi {
    async fn current_user(&self) -> Result<SpotifyApiUser> {
        let user = self
            .client
            .get_current_user()
            .await
            .wrap_err("Failed to get user info")?;
        Ok(SpotifyApiUser {
            display_name: user.display_name.unwrap_or_else(|| user.id.clone()),
            id: user.id,
        })
    }

    async fn available_markets(&self) -> Result<Vec<String>> {
        self.client
            .get_available_markets()
            .await
            .wrap_err("Failed to fetch available markets")
    }

    async fn current_user_playlists(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<SpotifyApiPlaylist>> {
        let page = self
            .client
            .get_user_playlists_page(limit, offset)
            .await
            .wrap_err("Failed to fetch spotify playlists")?;
        Ok(page.items.into_iter().map(to_api_playlist).collect())
    }

    async fn playlist(&self, playlist_id: &str) -> Result<SpotifyApiPlaylist> {
        let playlist = self
            .client
            .get_playlist(playlist_id)
            .await
            .wrap_err_with(|| format!("Failed to fetch playlist {}", playlist_id))?;
        Ok(to_api_playlist(playlist))
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
        market: &str,
    ) -> Result<Vec<Option<SpotifyApiTrack>>> {
        let page = self
            .client
            .get_playlist_items_page(playlist_id, limit, offset, market)
            .await
            .wrap_err_with(|| format!("Failed to fetch items of playlist {}", playlist_id))?;
        Ok(to_api_items(page.items))
    }

    async fn saved_tracks(&self, limit: u32, offset: u32) -> Result<Vec<Option<SpotifyApiTrack>>> {
        let page = self
            .client
            .get_saved_tracks_page(limit, offset)
            .await
            .wrap_err("Failed to fetch saved tracks")?;
        Ok(to_api_items(page.items))
    }

    async fn tracks(&self, ids: &[String], market: &str) -> Result<Vec<Option<SpotifyApiTrack>>> {
        let tracks = self
            .client
            .get_tracks(ids, market)
            .await
            .wrap_err("Failed to resolve track details")?;
        Ok(tracks
            .into_iter()
            .map(|track| track.and_then(to_api_track))
            .collect())
    }

    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        market: &str,
    ) -> Result<Vec<SpotifyApiTrack>> {
        let tracks = self
            .client
            .search_tracks(query, limit, market)
            .await
            .wrap_err_with(|| format!("Failed to search for '{}'", query))?;
        Ok(tracks.into_iter().filter_map(to_api_track).collect())
    }

    async fn playlist_add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        self.client
            .add_playlist_items(playlist_id, track_ids)
            .await
            .wrap_err("Failed to add tracks to playlist")
    }

    async fn playlist_remove_all_occurrences(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<()> {
        self.client
            .remove_playlist_items(playlist_id, track_ids)
            .await
            .wrap_err("Failed to remove tracks from playlist")
    }

    async fn saved_tracks_add(&self, track_ids: &[String]) -> Result<()> {
        self.client
            .save_tracks(track_ids)
            .await
            .wrap_err("Failed to save tracks")
    }

    async fn saved_tracks_remove(&self, track_ids: &[String]) -> Result<()> {
        self.client
            .remove_saved_tracks(track_ids)
            .await
            .wrap_err("Failed to remove saved tracks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify_rs::types::{SpotifyAlbum, SpotifyArtist, SpotifyLinkedFrom};

    fn wire_track(id: Option<&str>) -> SpotifyTrack {
        SpotifyTrack {
            id: id.map(String::from),
            name: "Song".into(),
            artists: vec![
                SpotifyArtist {
                    name: "Primary".into(),
                },
                SpotifyArtist {
                    name: "Featured".into(),
                },
            ],
            album: Some(SpotifyAlbum {
                name: "Album".into(),
            }),
            is_playable: Some(true),
            linked_from: None,
            is_local: false,
            kind: Some("track".into()),
        }
    }

    #[test]
    fn test_to_api_track_uses_primary_artist() {
        let track = to_api_track(wire_track(Some("t1"))).unwrap();
        assert_eq!(track.id, "t1");
        assert_eq!(track.artist, "Primary");
        assert_eq!(track.album_name, "Album");
        assert!(track.is_playable);
        assert_eq!(track.library_id(), "t1");
    }

    #[test]
    fn test_to_api_track_keeps_relink_origin() {
        let mut wire = wire_track(Some("B"));
        wire.linked_from = Some(SpotifyLinkedFrom {
            id: Some("A".into()),
        });
        let track = to_api_track(wire).unwrap();
        assert_eq!(track.linked_from.as_deref(), Some("A"));
        assert_eq!(track.library_id(), "A");
    }

    #[test]
    fn test_to_api_track_drops_unusable_entries() {
        assert!(to_api_track(wire_track(None)).is_none());

        let mut local = wire_track(Some("t1"));
        local.is_local = true;
        assert!(to_api_track(local).is_none());

        let mut episode = wire_track(Some("e1"));
        episode.kind = Some("episode".into());
        assert!(to_api_track(episode).is_none());
    }

    #[test]
    fn test_missing_playability_is_not_playable() {
        let mut wire = wire_track(Some("t1"));
        wire.is_playable = None;
        assert!(!to_api_track(wire).unwrap().is_playable);
    }

    #[test]
    fn test_to_api_items_keeps_page_length() {
        let items = vec![
            SpotifyLibraryItem {
                track: Some(wire_track(Some("t1"))),
            },
            SpotifyLibraryItem { track: None },
        ];
        let converted = to_api_items(items);
        assert_eq!(converted.len(), 2);
        assert!(converted[0].is_some());
        assert!(converted[1].is_none());
    }
}
