use std::collections::HashMap;

use color_eyre::eyre::Result;

use crate::ports::spotify::{SpotifyApiTrack, SpotifyClient};
use crate::services::audit::source::Source;

/// Largest page the playlist items endpoint returns
pub const PLAYLIST_PAGE_SIZE: u32 = 100;
/// Largest page the saved tracks endpoint returns
pub const SAVED_TRACKS_PAGE_SIZE: u32 = 50;

/// A track as it is listed in the audited collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRef {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
}

/// Walks a source page by page from the start until an empty page comes back.
pub struct SourcePager<'a, C: SpotifyClient> {
    client: &'a C,
    source: &'a Source,
    market: &'a str,
    offset: u32,
    exhausted: bool,
}

impl<'a, C: SpotifyClient> SourcePager<'a, C> {
    pub fn new(client: &'a C, source: &'a Source, market: &'a str) -> Self {
        Self {
            client,
            source,
            market,
            offset: 0,
            exhausted: false,
        }
    }

    /// Number of items consumed so far
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Fetch the next page, or `None` once the source is exhausted.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Option<SpotifyApiTrack>>>> {
        if self.exhausted {
            return Ok(None);
        }

        let items = match self.source {
            Source::Playlist(playlist_id) => {
                self.client
                    .playlist_items(playlist_id, PLAYLIST_PAGE_SIZE, self.offset, self.market)
                    .await?
            }
            Source::LikedSongs => {
                self.client
                    .saved_tracks(SAVED_TRACKS_PAGE_SIZE, self.offset)
                    .await?
            }
        };

        if items.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        self.offset += items.len() as u32;
        Ok(Some(items))
    }
}

/// The tracks of one page keyed by the id they are stored under in the collection.
#[derive(Debug, Default)]
pub struct PageIndex {
    ids: Vec<String>,
    originals: HashMap<String, TrackRef>,
}

impl PageIndex {
    /// Index a page, skipping entries without a track reference.
    ///
    /// Repeated entries of the same track collapse into one, keeping first-seen order.
    pub fn build(items: &[Option<SpotifyApiTrack>]) -> Self {
        let mut index = Self::default();
        for track in items.iter().flatten() {
            let id = track.library_id().to_string();
            if index.originals.contains_key(&id) {
                continue;
            }
            index.ids.push(id.clone());
            index.originals.insert(
                id.clone(),
                TrackRef {
                    id,
                    title: track.name.clone(),
                    artist: track.artist.clone(),
                    album: track.album_name.clone(),
                },
            );
        }
        index
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn get(&self, id: &str) -> Option<&TrackRef> {
        self.originals.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::spotify::MockSpotifyClient;

    pub(crate) fn track(id: &str, name: &str, artist: &str) -> SpotifyApiTrack {
        SpotifyApiTrack {
            id: id.into(),
            name: name.into(),
            artist: artist.into(),
            album_name: format!("{} Album", name),
            is_playable: true,
            linked_from: None,
        }
    }

    #[tokio::test]
    async fn test_empty_first_page_ends_pagination() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_playlist_items()
            .times(1)
            .returning(|_, _, _, _| Ok(Vec::new()));
        let source = Source::Playlist("pl".into());

        let mut pager = SourcePager::new(&client, &source, "BE");

        assert!(pager.next_page().await.unwrap().is_none());
        // Exhausted pagers do not call the API again
        assert!(pager.next_page().await.unwrap().is_none());
        assert_eq!(pager.offset(), 0);
    }

    #[tokio::test]
    async fn test_playlist_pages_advance_by_items_returned() {
        let mut client = MockSpotifyClient::new();
        client
            .expect_playlist_items()
            .returning(|playlist_id, limit, offset, market| {
                assert_eq!(playlist_id, "pl");
                assert_eq!(limit, PLAYLIST_PAGE_SIZE);
                assert_eq!(market, "BE");
                Ok(match offset {
                    0 => vec![Some(track("a", "A", "X")), None, Some(track("b", "B", "X"))],
                    3 => vec![Some(track("c", "C", "Y"))],
                    _ => Vec::new(),
                })
            });
        let source = Source::Playlist("pl".into());

        let mut pager = SourcePager::new(&client, &source, "BE");
        let mut pages = Vec::new();
        while let Some(page) = pager.next_page().await.unwrap() {
            pages.push(page.len());
        }

        assert_eq!(pages, vec![3, 1]);
        assert_eq!(pager.offset(), 4);
    }

    #[tokio::test]
    async fn test_liked_songs_use_saved_tracks_page_size() {
        let mut client = MockSpotifyClient::new();
        client.expect_saved_tracks().returning(|limit, offset| {
            assert_eq!(limit, SAVED_TRACKS_PAGE_SIZE);
            Ok(if offset == 0 {
                vec![Some(track("a", "A", "X"))]
            } else {
                Vec::new()
            })
        });
        client.expect_playlist_items().never();

        let mut pager = SourcePager::new(&client, &Source::LikedSongs, "BE");
        assert_eq!(pager.next_page().await.unwrap().unwrap().len(), 1);
        assert!(pager.next_page().await.unwrap().is_none());
    }

    #[test]
    fn test_page_index_skips_missing_and_keys_by_library_id() {
        let mut relinked = track("new", "Song", "Artist");
        relinked.linked_from = Some("old".into());
        let items = vec![
            Some(track("a", "A", "X")),
            None,
            Some(relinked),
            Some(track("a", "A", "X")),
        ];

        let index = PageIndex::build(&items);

        assert_eq!(index.ids(), &["a".to_string(), "old".to_string()]);
        assert_eq!(index.get("old").unwrap().title, "Song");
        assert_eq!(index.get("old").unwrap().album, "Song Album");
        assert!(index.get("new").is_none());
    }

    #[test]
    fn test_page_index_of_placeholders_is_empty() {
        assert!(PageIndex::build(&[None, None]).is_empty());
    }
}
