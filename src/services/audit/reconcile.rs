use color_eyre::eyre::Result;

use crate::error::RunError;
use crate::ports::spotify::SpotifyClient;
use crate::services::audit::source::Source;
use crate::services::audit::{AuditRecord, RunContext};

#[derive(Debug, Default)]
pub struct ReconcileSummary {
    /// Records that had a replacement
    pub candidates: usize,
    /// Records whose replacement was applied
    pub replaced: usize,
    /// Records left alone by the artist filter
    pub skipped: usize,
    pub failures: Vec<RunError>,
}

/// Console lines reported after the add and after the removal of one replacement
fn progress_lines(source: &Source, record: &AuditRecord, progress: &str) -> (String, String) {
    let indent = " ".repeat(progress.len());
    let (added, removed) = match source {
        Source::Playlist(_) => ("Added new version", "Removed old version"),
        Source::LikedSongs => ("Liked new version", "Unliked old version"),
    };
    (
        format!(
            "  {} + {}: '{}' ({})",
            progress, added, record.title, record.new_id
        ),
        format!(
            "  {} - {}: '{}' ({})",
            indent, removed, record.title, record.old_id
        ),
    )
}

/// Add the replacement, then drop every copy of the old track.
async fn replace_track<C: SpotifyClient>(
    client: &C,
    source: &Source,
    record: &AuditRecord,
    progress: &str,
) -> Result<()> {
    let new_ids = [record.new_id.clone()];
    let old_ids = [record.old_id.clone()];
    let (added_line, removed_line) = progress_lines(source, record, progress);

    match source {
        Source::Playlist(playlist_id) => {
            client.playlist_add_items(playlist_id, &new_ids).await?;
            println!("{}", added_line);
            client
                .playlist_remove_all_occurrences(playlist_id, &old_ids)
                .await?;
        }
        Source::LikedSongs => {
            client.saved_tracks_add(&new_ids).await?;
            println!("{}", added_line);
            client.saved_tracks_remove(&old_ids).await?;
        }
    }
    println!("{}", removed_line);
    Ok(())
}

/// Swap every record that has a replacement, best effort.
///
/// A failed record is reported and the remaining ones are still processed.
/// Nothing is modified on a dry run.
pub async fn reconcile<C: SpotifyClient>(
    client: &C,
    source: &Source,
    records: &[AuditRecord],
    context: &RunContext,
) -> ReconcileSummary {
    let mut summary = ReconcileSummary::default();
    if context.dry_run {
        return summary;
    }

    let to_process: Vec<&AuditRecord> = records
        .iter()
        .filter(|record| record.has_substitute())
        .collect();
    summary.candidates = to_process.len();

    if to_process.is_empty() {
        println!("\nNo tracks with found replacements to process.");
        return summary;
    }

    println!("\nStarting replacement process...");
    let total = to_process.len();
    for (index, record) in to_process.into_iter().enumerate() {
        if !context.includes_artist(&record.artist) {
            summary.skipped += 1;
            continue;
        }

        let progress = format!("({} of {})", index + 1, total);
        match replace_track(client, source, record, &progress).await {
            Ok(()) => summary.replaced += 1,
            Err(error) => {
                let failure = RunError::ReplaceFailed {
                    track_id: record.old_id.clone(),
                    reason: format!("{:#}", error),
                };
                log::error!("{:?}", error);
                println!("{}", failure);
                summary.failures.push(failure);
            }
        }
    }

    println!("\nCleanup complete!");
    if let Some(artist) = &context.test_artist {
        println!(
            "Processed {} track(s) for artist '{}'.",
            summary.replaced, artist
        );
    }
    summary
}
