/// Broad category of a [`RunError`], used to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad command line input, detected before anything is modified
    UserInput,
    /// The requested collection cannot be read or modified by this user
    Access,
    /// A single track could not be replaced; the run carries on
    Item,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RunError {
    #[error("--artist parameter cannot be an empty string.")]
    EmptyArtistFilter,

    #[error("'{market}' is not a valid Spotify market code.")]
    InvalidMarket { market: String },

    #[error("Playlist with ID '{playlist_id}' not found or you do not have access.")]
    PlaylistNotAccessible { playlist_id: String },

    #[error("You are not the owner of the playlist '{name}'.")]
    NotPlaylistOwner { name: String },

    #[error("An error occurred while replacing track {track_id}: {reason}")]
    ReplaceFailed { track_id: String, reason: String },
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyArtistFilter | Self::InvalidMarket { .. } => ErrorKind::UserInput,
            Self::PlaylistNotAccessible { .. } | Self::NotPlaylistOwner { .. } => ErrorKind::Access,
            Self::ReplaceFailed { .. } => ErrorKind::Item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(RunError::EmptyArtistFilter.kind(), ErrorKind::UserInput);
        assert_eq!(
            RunError::InvalidMarket {
                market: "XX".into()
            }
            .kind(),
            ErrorKind::UserInput
        );
        assert_eq!(
            RunError::NotPlaylistOwner {
                name: "Mix".into()
            }
            .kind(),
            ErrorKind::Access
        );
        assert_eq!(
            RunError::ReplaceFailed {
                track_id: "t1".into(),
                reason: "boom".into()
            }
            .kind(),
            ErrorKind::Item
        );
    }

    #[test]
    fn test_replace_failed_message_names_track() {
        let error = RunError::ReplaceFailed {
            track_id: "old123".into(),
            reason: "Spotify API returned 403".into(),
        };
        assert_eq!(
            error.to_string(),
            "An error occurred while replacing track old123: Spotify API returned 403"
        );
    }
}
