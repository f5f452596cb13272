use color_eyre::eyre::Result;

use crate::error::RunError;
use crate::ports::spotify::{SpotifyApiUser, SpotifyClient};

/// Page size used when listing the current user's playlists
const PLAYLISTS_PAGE_SIZE: u32 = 50;

pub const LIKED_SONGS_NAME: &str = "Liked Songs";

/// The collection a run audits, fixed once selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    LikedSongs,
    Playlist(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSource {
    pub source: Source,
    /// Human readable name used in console output and the report
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    Selected(SelectedSource),
    /// The user did not confirm the chosen source
    Declined,
}

/// Interactive capability used to pick a source and confirm destructive steps.
pub trait SelectionProvider {
    /// Show a line of text to the user
    fn show(&mut self, message: &str);

    /// Ask a question and return the raw answer
    fn ask(&mut self, prompt: &str) -> Result<String>;
}

/// Only an explicit "y" or "yes" counts as consent.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Resolve which collection to audit.
///
/// An interactive selection takes precedence over an explicit playlist id; without
/// either the liked songs are audited.
pub async fn select_source<C, P>(
    client: &C,
    provider: &mut P,
    user: &SpotifyApiUser,
    playlist_id: Option<&str>,
    select_from_list: bool,
) -> Result<SourceSelection>
where
    C: SpotifyClient,
    P: SelectionProvider + Send,
{
    if select_from_list {
        return choose_interactively(client, provider, user).await;
    }

    let Some(playlist_id) = playlist_id else {
        return Ok(SourceSelection::Selected(SelectedSource {
            source: Source::LikedSongs,
            name: LIKED_SONGS_NAME.to_string(),
        }));
    };

    let playlist = match client.playlist(playlist_id).await {
        Ok(playlist) => playlist,
        Err(error) => {
            log::debug!("Playlist lookup for {} failed: {:?}", playlist_id, error);
            return Err(RunError::PlaylistNotAccessible {
                playlist_id: playlist_id.to_string(),
            }
            .into());
        }
    };
    if playlist.owner_id != user.id {
        return Err(RunError::NotPlaylistOwner {
            name: playlist.name,
        }
        .into());
    }

    Ok(SourceSelection::Selected(SelectedSource {
        source: Source::Playlist(playlist.id),
        name: format!("Playlist '{}'", playlist.name),
    }))
}

/// Liked songs followed by every playlist owned by `user`, in listing order.
pub async fn list_source_options<C: SpotifyClient>(
    client: &C,
    user: &SpotifyApiUser,
) -> Result<Vec<SelectedSource>> {
    let mut options = vec![SelectedSource {
        source: Source::LikedSongs,
        name: LIKED_SONGS_NAME.to_string(),
    }];

    let mut offset = 0;
    loop {
        let page = client
            .current_user_playlists(PLAYLISTS_PAGE_SIZE, offset)
            .await?;
        if page.is_empty() {
            break;
        }
        offset += page.len() as u32;
        options.extend(
            page.into_iter()
                .filter(|playlist| playlist.owner_id == user.id)
                .map(|playlist| SelectedSource {
                    source: Source::Playlist(playlist.id),
                    name: playlist.name,
                }),
        );
    }

    Ok(options)
}

/// Parse a 1-indexed menu choice, returning the 0-based index when it is in range.
fn parse_choice(answer: &str, option_count: usize) -> Option<usize> {
    let choice: usize = answer.trim().parse().ok()?;
    (1..=option_count).contains(&choice).then(|| choice - 1)
}

async fn choose_interactively<C, P>(
    client: &C,
    provider: &mut P,
    user: &SpotifyApiUser,
) -> Result<SourceSelection>
where
    C: SpotifyClient,
    P: SelectionProvider + Send,
{
    provider.show("\nFetching your playlists...");
    let options = list_source_options(client, user).await?;

    provider.show("\nPlease choose a source to process:");
    for (index, option) in options.iter().enumerate() {
        provider.show(&format!("  {}. {}", index + 1, option.name));
    }

    let selected = loop {
        let answer = provider.ask("\nEnter the number of your choice: ")?;
        if answer.trim().parse::<usize>().is_err() {
            provider.show("Invalid input. Please enter a number.");
            continue;
        }
        match parse_choice(&answer, options.len()) {
            Some(index) => break options[index].clone(),
            None => provider.show(&format!(
                "Invalid number. Please enter a number between 1 and {}.",
                options.len()
            )),
        }
    };

    let confirmation = provider.ask(&format!(
        "You have selected '{}'. Proceed? (y/n): ",
        selected.name
    ))?;
    if !is_affirmative(&confirmation) {
        provider.show("Aborting.");
        return Ok(SourceSelection::Declined);
    }

    Ok(SourceSelection::Selected(selected))
}
