//! Audit workflow: pick a source, classify every track in it, report, then
//! optionally swap broken tracks for their replacements.

pub mod classify;
pub mod fetch;
pub mod reconcile;
pub mod report;
pub mod source;

use std::fmt;
use std::path::PathBuf;

use color_eyre::eyre::Result;

use crate::error::RunError;
use crate::ports::spotify::SpotifyClient;
use crate::services::audit::fetch::{PageIndex, SourcePager};
use crate::services::audit::reconcile::ReconcileSummary;
use crate::services::audit::report::{AuditStats, ReportMetadata};
use crate::services::audit::source::{
    SelectionProvider, Source, SourceSelection, is_affirmative, select_source,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Ok,
    Relinked,
    Unplayable,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Ok => "OK",
            Self::Relinked => "Re-linked",
            Self::Unplayable => "Unplayable",
        };
        f.write_str(label)
    }
}

/// Outcome of auditing one track of the source.
///
/// `old_id` is always the id the track is stored under in the source, never the
/// id Spotify relinked it to. `new_id`/`new_album` are empty unless a replacement
/// was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub artist: String,
    pub title: String,
    pub old_album: String,
    pub old_id: String,
    pub new_album: String,
    pub new_id: String,
    pub reason: Reason,
}

impl AuditRecord {
    pub fn has_substitute(&self) -> bool {
        !self.new_id.is_empty()
    }
}

/// Read-only settings shared by every stage of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub dry_run: bool,
    /// Upper-case ISO country code
    pub market: String,
    pub test_artist: Option<String>,
    pub source_name: String,
}

impl RunContext {
    /// Whether the artist test mode allows modifying tracks by `artist`
    pub fn includes_artist(&self, artist: &str) -> bool {
        self.test_artist
            .as_deref()
            .is_none_or(|wanted| wanted.to_lowercase() == artist.to_lowercase())
    }
}

/// Validated command line input
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    pub market: String,
    pub playlist_id: Option<String>,
    pub select_from_list: bool,
    pub test_artist: Option<String>,
    pub output_dir: PathBuf,
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        stats: AuditStats,
        report_path: Option<PathBuf>,
        reconcile: Option<ReconcileSummary>,
    },
    /// The user declined to continue; nothing was changed
    Declined,
}

/// Audit every track of `source`, page by page, in collection order.
pub async fn audit_source<C: SpotifyClient>(
    client: &C,
    source: &Source,
    context: &RunContext,
) -> Result<Vec<AuditRecord>> {
    println!("\nFetching songs from {}...", context.source_name);

    let mut records = Vec::new();
    let mut pager = SourcePager::new(client, source, &context.market);
    while let Some(items) = pager.next_page().await? {
        let index = PageIndex::build(&items);
        if index.is_empty() {
            log::debug!("Page at offset {} has no resolvable tracks", pager.offset());
            continue;
        }
        records.extend(classify::audit_page(client, &index, context).await?);
        println!("Processed {} songs...", pager.offset());
    }

    Ok(records)
}

fn announce(provider: &mut impl SelectionProvider, context: &RunContext) {
    provider.show(&format!("\nAuditing Source: {}", context.source_name));
    provider.show(&format!("Using market: '{}'", context.market));
    if context.dry_run {
        provider.show("Mode: DRY RUN (no changes will be made)");
        return;
    }
    provider.show("Mode: LIVE RUN (changes WILL be made)");
    if let Some(artist) = &context.test_artist {
        provider.show(&format!(
            "--- ARTIST TEST MODE IS ACTIVE. ONLY MODIFYING TRACKS BY '{}'. ---",
            artist
        ));
    }
}

/// Run the whole audit for the authenticated user behind `client`.
pub async fn run<C, P>(client: &C, provider: &mut P, options: RunOptions) -> Result<RunOutcome>
where
    C: SpotifyClient,
    P: SelectionProvider + Send,
{
    if options
        .test_artist
        .as_deref()
        .is_some_and(|artist| artist.trim().is_empty())
    {
        return Err(RunError::EmptyArtistFilter.into());
    }
    let market = options.market.trim().to_uppercase();

    let user = client.current_user().await?;
    provider.show(&format!(
        "Authenticated as {} ({})",
        user.display_name, user.id
    ));

    let markets = client.available_markets().await?;
    if !markets.contains(&market) {
        return Err(RunError::InvalidMarket {
            market: options.market,
        }
        .into());
    }

    let selected = match select_source(
        client,
        provider,
        &user,
        options.playlist_id.as_deref(),
        options.select_from_list,
    )
    .await?
    {
        SourceSelection::Selected(selected) => selected,
        SourceSelection::Declined => return Ok(RunOutcome::Declined),
    };

    let context = RunContext {
        dry_run: options.dry_run,
        market,
        test_artist: options.test_artist,
        source_name: selected.name,
    };
    log::info!("Starting audit with {:?}", context);

    announce(provider, &context);
    if !context.dry_run {
        let answer = provider.ask("Are you sure you want to continue? (y/n): ")?;
        if !is_affirmative(&answer) {
            provider.show("Aborting.");
            return Ok(RunOutcome::Declined);
        }
    }

    let records = audit_source(client, &selected.source, &context).await?;

    let stats = AuditStats::from_records(&records);
    report::print_summary(&context.source_name, &stats);

    let metadata = ReportMetadata {
        generated_at: chrono::Local::now(),
        user_display_name: user.display_name,
        context: context.clone(),
    };
    let report_path = report::write_report(&options.output_dir, &metadata, &records)?;
    if let Some(path) = &report_path {
        println!(
            "\n[LOG CREATED]: A complete multi-sheet audit has been saved to '{}'",
            path.display()
        );
    }

    let reconcile = if context.dry_run {
        println!("\nDry run complete. No changes were made.");
        if stats.replacements_found > 0 {
            println!("To apply fixes for the found replacements, use --dry-run False.");
        }
        None
    } else {
        Some(reconcile::reconcile(client, &selected.source, &records, &context).await)
    };

    Ok(RunOutcome::Completed {
        stats,
        report_path,
        reconcile,
    })
}
