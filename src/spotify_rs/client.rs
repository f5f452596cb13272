use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::spotify_rs::types::{
    SpotifyErrorBody, SpotifyLibraryItem, SpotifyMarkets, SpotifyPage, SpotifyPlaylist,
    SpotifySearchResponse, SpotifyTrack, SpotifyTracks, SpotifyUser,
};

const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Maximum number of ids `GET /tracks` accepts per request
pub const TRACKS_BATCH_LIMIT: usize = 50;
/// Maximum number of items any library mutation endpoint accepts per request
const MUTATION_BATCH_LIMIT: usize = 50;
const MAX_RETRIES: usize = 3;
/// Longest server-requested wait that is honored before giving up
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum SpotifyApiError {
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Spotify API returned {status}: {message}")]
    Status {
        status: StatusCode,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

impl SpotifyApiError {
    /// Rate limiting, server errors and dropped connections are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::FailedToSendRequest(error) => error.is_timeout() || error.is_connect(),
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::FailedToParseResponse(_) => false,
        }
    }

    /// Whether a failed `method` request may be sent again.
    ///
    /// POST is not idempotent: it is only resent when the request cannot have
    /// been applied, i.e. it never connected or it was rate limited.
    pub fn is_retryable(&self, method: &Method) -> bool {
        if *method != Method::POST {
            return self.is_transient();
        }
        match self {
            Self::FailedToSendRequest(error) => error.is_connect(),
            Self::Status { status, .. } => *status == StatusCode::TOO_MANY_REQUESTS,
            Self::FailedToParseResponse(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Delay before the next attempt: the server's `Retry-After` when given, else the backoff.
///
/// A `Retry-After` above [`MAX_RETRY_AFTER`] ends the retries so the error surfaces.
fn retry_delay(error: &SpotifyApiError, backoff: Option<Duration>) -> Option<Duration> {
    let backoff = backoff?;
    match error.retry_after() {
        Some(wait) if wait > MAX_RETRY_AFTER => {
            log::warn!(
                "Spotify asked to wait {:?} before retrying, giving up: {}",
                wait,
                error
            );
            None
        }
        Some(wait) => Some(wait),
        None => Some(backoff),
    }
}

fn track_uri(track_id: &str) -> String {
    format!("spotify:track:{}", track_id)
}

/// Spotify Web API client
pub struct SpotifyClient {
    access_token: String,
    client: reqwest::Client,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(access_token: String, timeout: Duration) -> Result<Self, SpotifyApiError> {
        Self::with_base_url(SPOTIFY_API_URL, access_token, timeout)
    }

    pub fn with_base_url(
        base_url: &str,
        access_token: String,
        timeout: Duration,
    ) -> Result<Self, SpotifyApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SpotifyApiError::FailedToSendRequest)?;
        Ok(Self {
            access_token,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, SpotifyApiError> {
        let url = format!("{}{}", self.base_url, path);
        let url = url.as_str();
        let method = &method;

        let attempt = || async move {
            log::debug!("{} {} {:?}", method, url, query);
            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&self.access_token)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request
                .send()
                .await
                .map_err(SpotifyApiError::FailedToSendRequest)?;
            check_status(response).await
        };

        attempt
            .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
            .when(|error| error.is_retryable(method))
            .adjust(retry_delay)
            .notify(|error, delay| {
                log::warn!("Retrying {} {} in {:?}: {}", method, path, delay, error)
            })
            .await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SpotifyApiError> {
        self.execute(Method::GET, path, query, None)
            .await?
            .json()
            .await
            .map_err(SpotifyApiError::FailedToParseResponse)
    }

    /// Get the current user's profile
    pub async fn get_current_user(&self) -> Result<SpotifyUser, SpotifyApiError> {
        self.get("/me", &[]).await
    }

    /// Get the list of market codes where Spotify is available
    pub async fn get_available_markets(&self) -> Result<Vec<String>, SpotifyApiError> {
        let markets: SpotifyMarkets = self.get("/markets", &[]).await?;
        Ok(markets.markets)
    }

    /// Get one page of the current user's playlists
    pub async fn get_user_playlists_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyPlaylist>, SpotifyApiError> {
        self.get(
            "/me/playlists",
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    /// Get a playlist's metadata
    pub async fn get_playlist(&self, playlist_id: &str) -> Result<SpotifyPlaylist, SpotifyApiError> {
        self.get(
            &format!("/playlists/{}", urlencoding::encode(playlist_id)),
            &[("fields", "id,name,owner(id)".to_string())],
        )
        .await
    }

    /// Get one page of a playlist's items, relinked for `market`
    pub async fn get_playlist_items_page(
        &self,
        playlist_id: &str,
        limit: u32,
        offset: u32,
        market: &str,
    ) -> Result<SpotifyPage<SpotifyLibraryItem>, SpotifyApiError> {
        self.get(
            &format!("/playlists/{}/tracks", urlencoding::encode(playlist_id)),
            &[
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
                ("market", market.to_string()),
                ("additional_types", "track".to_string()),
            ],
        )
        .await
    }

    /// Get one page of the current user's saved tracks
    pub async fn get_saved_tracks_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<SpotifyPage<SpotifyLibraryItem>, SpotifyApiError> {
        self.get(
            "/me/tracks",
            &[("limit", limit.to_string()), ("offset", offset.to_string())],
        )
        .await
    }

    /// Get full track details for `ids`, in order.
    ///
    /// The endpoint caps the number of ids per request, so larger inputs are
    /// split into several requests and the results concatenated.
    pub async fn get_tracks(
        &self,
        ids: &[String],
        market: &str,
    ) -> Result<Vec<Option<SpotifyTrack>>, SpotifyApiError> {
        let mut all_tracks = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(TRACKS_BATCH_LIMIT) {
            let response: SpotifyTracks = self
                .get(
                    "/tracks",
                    &[("ids", chunk.join(",")), ("market", market.to_string())],
                )
                .await?;
            all_tracks.extend(response.tracks);
        }
        Ok(all_tracks)
    }

    /// Search the catalog for tracks
    pub async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
        market: &str,
    ) -> Result<Vec<SpotifyTrack>, SpotifyApiError> {
        let response: SpotifySearchResponse = self
            .get(
                "/search",
                &[
                    ("q", query.to_string()),
                    ("type", "track".to_string()),
                    ("limit", limit.to_string()),
                    ("market", market.to_string()),
                ],
            )
            .await?;
        Ok(response.tracks.items)
    }

    /// Append tracks to the end of a playlist
    pub async fn add_playlist_items(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyApiError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        for chunk in track_ids.chunks(MUTATION_BATCH_LIMIT) {
            let uris: Vec<String> = chunk.iter().map(|id| track_uri(id)).collect();
            self.execute(Method::POST, &path, &[], Some(&json!({ "uris": uris })))
                .await?;
        }
        Ok(())
    }

    /// Remove every occurrence of the given tracks from a playlist
    pub async fn remove_playlist_items(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> Result<(), SpotifyApiError> {
        let path = format!("/playlists/{}/tracks", urlencoding::encode(playlist_id));
        for chunk in track_ids.chunks(MUTATION_BATCH_LIMIT) {
            let tracks: Vec<serde_json::Value> = chunk
                .iter()
                .map(|id| json!({ "uri": track_uri(id) }))
                .collect();
            self.execute(Method::DELETE, &path, &[], Some(&json!({ "tracks": tracks })))
                .await?;
        }
        Ok(())
    }

    /// Save tracks to the current user's library
    pub async fn save_tracks(&self, track_ids: &[String]) -> Result<(), SpotifyApiError> {
        for chunk in track_ids.chunks(MUTATION_BATCH_LIMIT) {
            self.execute(Method::PUT, "/me/tracks", &[], Some(&json!({ "ids": chunk })))
                .await?;
        }
        Ok(())
    }

    /// Remove tracks from the current user's library
    pub async fn remove_saved_tracks(&self, track_ids: &[String]) -> Result<(), SpotifyApiError> {
        for chunk in track_ids.chunks(MUTATION_BATCH_LIMIT) {
            self.execute(
                Method::DELETE,
                "/me/tracks",
                &[],
                Some(&json!({ "ids": chunk })),
            )
            .await?;
        }
        Ok(())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SpotifyApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let text = response
        .text()
        .await
        .unwrap_or("Failed to get error text".to_string());

    Err(SpotifyApiError::Status {
        status,
        message: error_message(&text),
        retry_after,
    })
}

/// Extract the human readable message from a Spotify error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<SpotifyErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.to_string())
}
