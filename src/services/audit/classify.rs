use color_eyre::eyre::{Result, WrapErr};

use crate::ports::spotify::{SpotifyApiTrack, SpotifyClient};
use crate::services::audit::fetch::{PageIndex, TrackRef};
use crate::services::audit::{AuditRecord, Reason, RunContext};

/// Number of search results considered when looking for a substitute
pub const SEARCH_CANDIDATE_LIMIT: u32 = 5;

pub fn search_query(title: &str, artist: &str) -> String {
    format!("{} artist:{}", title, artist)
}

/// First playable candidate whose title equals `title`, ignoring case.
pub fn pick_substitute<'a>(
    title: &str,
    candidates: &'a [SpotifyApiTrack],
) -> Option<&'a SpotifyApiTrack> {
    let wanted = title.to_lowercase();
    candidates
        .iter()
        .find(|candidate| candidate.is_playable && candidate.name.to_lowercase() == wanted)
}

/// Classify a resolved track against the entry it was listed as.
///
/// A relinked track is reported as such even when it is also unplayable.
pub fn classify(resolved: &SpotifyApiTrack, original: &TrackRef) -> AuditRecord {
    let mut record = AuditRecord {
        artist: original.artist.clone(),
        title: original.title.clone(),
        old_album: original.album.clone(),
        old_id: original.id.clone(),
        new_album: String::new(),
        new_id: String::new(),
        reason: Reason::Ok,
    };

    if resolved.linked_from.is_some() {
        record.reason = Reason::Relinked;
        record.new_id = resolved.id.clone();
        record.new_album = resolved.album_name.clone();
    } else if !resolved.is_playable {
        record.reason = Reason::Unplayable;
    }

    record
}

async fn find_substitute<C: SpotifyClient>(
    client: &C,
    record: &mut AuditRecord,
    market: &str,
) -> Result<()> {
    let query = search_query(&record.title, &record.artist);
    let candidates = client
        .search_tracks(&query, SEARCH_CANDIDATE_LIMIT, market)
        .await
        .wrap_err_with(|| format!("Failed to search a replacement for {}", record.old_id))?;

    match pick_substitute(&record.title, &candidates) {
        Some(substitute) => {
            record.new_id = substitute.id.clone();
            record.new_album = substitute.album_name.clone();
            println!("  > Found replacement for unplayable track.");
        }
        None => println!("  > No replacement found."),
    }
    Ok(())
}

/// Resolve every track of a page in one batch and turn it into audit records.
pub async fn audit_page<C: SpotifyClient>(
    client: &C,
    index: &PageIndex,
    context: &RunContext,
) -> Result<Vec<AuditRecord>> {
    if index.is_empty() {
        return Ok(Vec::new());
    }

    let resolved_tracks = client.tracks(index.ids(), &context.market).await?;

    let mut records = Vec::with_capacity(index.ids().len());
    // Null entries are tracks removed from the catalog
    for resolved in resolved_tracks.iter().flatten() {
        let id_in_library = resolved.library_id();
        let Some(original) = index.get(id_in_library) else {
            log::debug!("Resolved track {} is not part of the page", id_in_library);
            continue;
        };

        let mut record = classify(resolved, original);
        match record.reason {
            Reason::Relinked => {
                println!(
                    "\n[FOUND RE-LINKED TRACK]: '{}' (by '{}')",
                    record.title, record.artist
                );
            }
            Reason::Unplayable => {
                println!(
                    "\n[FOUND UNPLAYABLE TRACK]: '{}' (by '{}')",
                    record.title, record.artist
                );
                find_substitute(client, &mut record, &context.market).await?;
            }
            Reason::Ok => {}
        }
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::spotify::MockSpotifyClient;
    use crate::services::audit::fetch::tests::track;

    fn context() -> RunContext {
        RunContext {
            dry_run: true,
            market: "BE".into(),
            test_artist: None,
            source_name: "Liked Songs".into(),
        }
    }

    fn original(id: &str, title: &str, artist: &str) -> TrackRef {
        TrackRef {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: "Old Album".into(),
        }
    }

    fn unplayable(id: &str, title: &str, artist: &str) -> SpotifyApiTrack {
        SpotifyApiTrack {
            is_playable: false,
            ..track(id, title, artist)
        }
    }

    #[test]
    fn test_classify_relinked() {
        let resolved = SpotifyApiTrack {
            linked_from: Some("A".into()),
            album_name: "Remaster".into(),
            ..track("B", "Song", "Artist")
        };

        let record = classify(&resolved, &original("A", "Song", "Artist"));

        assert_eq!(record.reason, Reason::Relinked);
        assert_eq!(record.old_id, "A");
        assert_eq!(record.new_id, "B");
        assert_eq!(record.new_album, "Remaster");
        assert_eq!(record.old_album, "Old Album");
    }

    #[test]
    fn test_classify_relinked_wins_over_unplayable() {
        let resolved = SpotifyApiTrack {
            linked_from: Some("A".into()),
            ..unplayable("B", "Song", "Artist")
        };

        let record = classify(&resolved, &original("A", "Song", "Artist"));

        assert_eq!(record.reason, Reason::Relinked);
        assert_eq!(record.new_id, "B");
    }

    #[test]
    fn test_classify_unplayable_and_ok() {
        let record = classify(
            &unplayable("A", "Song", "Artist"),
            &original("A", "Song", "Artist"),
        );
        assert_eq!(record.reason, Reason::Unplayable);
        assert!(record.new_id.is_empty());

        let record = classify(&track("A", "Song", "Artist"), &original("A", "Song", "Artist"));
        assert_eq!(record.reason, Reason::Ok);
        assert!(record.new_id.is_empty());
        assert!(record.new_album.is_empty());
    }

    #[test]
    fn test_search_query() {
        assert_eq!(search_query("Yellow", "Coldplay"), "Yellow artist:Coldplay");
    }

    #[test]
    fn test_pick_substitute_first_playable_exact_title() {
        let candidates = vec![
            unplayable("x1", "Yellow", "Coldplay"),
            track("x2", "Yellow - Live", "Coldplay"),
            track("x3", "YELLOW", "Coldplay"),
            track("x4", "yellow", "Coldplay"),
        ];

        let picked = pick_substitute("Yellow", &candidates).unwrap();
        assert_eq!(picked.id, "x3");
    }

    #[test]
    fn test_pick_substitute_none() {
        let candidates = vec![track("x2", "Yellow (Remastered)", "Coldplay")];
        assert!(pick_substitute("Yellow", &candidates).is_none());
        assert!(pick_substitute("Yellow", &[]).is_none());
    }

    #[tokio::test]
    async fn test_audit_page_classifies_and_searches() {
        let page = vec![
            Some(track("ok", "Fine", "Band")),
            Some(track("A", "Moved", "Band")),
            Some(track("dead", "Gone", "Band")),
            Some(track("lost", "Lost", "Band")),
            None,
        ];
        let index = PageIndex::build(&page);

        let mut client = MockSpotifyClient::new();
        client.expect_tracks().times(1).returning(|ids, market| {
            assert_eq!(market, "BE");
            assert_eq!(ids.len(), 4);
            Ok(vec![
                Some(track("ok", "Fine", "Band")),
                Some(SpotifyApiTrack {
                    linked_from: Some("A".into()),
                    ..track("B", "Moved", "Band")
                }),
                Some(unplayable("dead", "Gone", "Band")),
                Some(unplayable("lost", "Lost", "Band")),
                None,
            ])
        });
        client
            .expect_search_tracks()
            .times(2)
            .returning(|query, limit, _| {
                assert_eq!(limit, SEARCH_CANDIDATE_LIMIT);
                Ok(match query {
                    "Gone artist:Band" => vec![track("alive", "gone", "Band")],
                    _ => vec![track("other", "Something Else", "Band")],
                })
            });

        let records = audit_page(&client, &index, &context()).await.unwrap();

        let summary: Vec<(&str, Reason, &str)> = records
            .iter()
            .map(|record| (record.old_id.as_str(), record.reason, record.new_id.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("ok", Reason::Ok, ""),
                ("A", Reason::Relinked, "B"),
                ("dead", Reason::Unplayable, "alive"),
                ("lost", Reason::Unplayable, ""),
            ]
        );
        assert_eq!(records[2].new_album, "gone Album");
    }

    #[tokio::test]
    async fn test_audit_page_skips_batch_call_for_empty_index() {
        let mut client = MockSpotifyClient::new();
        client.expect_tracks().never();

        let records = audit_page(&client, &PageIndex::build(&[None]), &context())
            .await
            .unwrap();

        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_audit_page_ignores_unknown_resolved_ids() {
        let index = PageIndex::build(&[Some(track("a", "A", "X"))]);
        let mut client = MockSpotifyClient::new();
        client
            .expect_tracks()
            .returning(|_, _| Ok(vec![Some(track("zzz", "Other", "Y"))]));

        let records = audit_page(&client, &index, &context()).await.unwrap();

        assert!(records.is_empty());
    }
}
