use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use rand::Rng;
use url::Url;

use crate::spotify_rs::types::{CachedToken, SpotifyTokenResponse};

const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Scopes needed to read and rewrite liked songs and owned playlists
pub const SPOTIFY_SCOPES: [&str; 5] = [
    "user-library-read",
    "user-library-modify",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
];

/// Tokens this close to expiry are refreshed up front
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Generate a random string for the OAuth state parameter
fn generate_random_string(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            const CHARSET: &[u8] =
                b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
            CHARSET[rng.random_range(0..CHARSET.len())] as char
        })
        .collect()
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    generate_random_string(16)
}

/// Build the URL the user has to open to grant access
pub fn authorize_url(client_id: &str, redirect_uri: &str, state: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&redirect_uri={}&state={}&scope={}",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state),
        urlencoding::encode(&SPOTIFY_SCOPES.join(" "))
    )
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("Not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("Authorization was denied: {0}")]
    Denied(String),
    #[error("The redirect URL does not contain an authorization code")]
    MissingCode,
    #[error("State mismatch, the redirect does not belong to this login attempt")]
    StateMismatch,
}

/// Extract the authorization code from the URL Spotify redirected the browser to
pub fn parse_callback_url(callback: &str, expected_state: &str) -> Result<String, CallbackError> {
    let url = Url::parse(callback.trim())
        .map_err(|error| CallbackError::InvalidUrl(error.to_string()))?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        return Err(CallbackError::Denied(error.clone()));
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(CallbackError::StateMismatch);
    }
    params
        .get("code")
        .filter(|code| !code.is_empty())
        .cloned()
        .ok_or(CallbackError::MissingCode)
}

#[derive(Debug, thiserror::Error)]
pub enum TokenRequestError {
    #[error("Token request rejected: {reason}")]
    Rejected { reason: String },
    #[error("Failed to send http request: {0}")]
    FailedToSendRequest(reqwest::Error),
    #[error("Failed to parse response: {0}")]
    FailedToParseResponse(reqwest::Error),
}

async fn request_token(
    client_id: &str,
    client_secret: &str,
    params: &HashMap<&str, &str>,
) -> Result<SpotifyTokenResponse, TokenRequestError> {
    let client = reqwest::Client::new();

    let response = client
        .post(SPOTIFY_TOKEN_URL)
        // x-www-form-urlencoded, as required by spotify
        .form(params)
        .basic_auth(client_id, Some(client_secret))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(TokenRequestError::FailedToSendRequest)?;

    if !response.status().is_success() {
        return Err(TokenRequestError::Rejected {
            reason: response
                .text()
                .await
                .unwrap_or("Failed to get error text".to_string()),
        });
    }

    response
        .json()
        .await
        .map_err(TokenRequestError::FailedToParseResponse)
}

/// Exchange authorization code for access token
/// https://developer.spotify.com/documentation/web-api/tutorials/code-flow
pub async fn exchange_code_for_token(
    client_id: &str,
    client_secret: &str,
    code: &str,
    // Must be the exact redirect URI used to start the flow
    redirect_uri: &str,
) -> Result<SpotifyTokenResponse, TokenRequestError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "authorization_code");
    params.insert("code", code);
    params.insert("redirect_uri", redirect_uri);
    request_token(client_id, client_secret, &params).await
}

/// Refresh an access token using a refresh token
pub async fn refresh_access_token(
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<SpotifyTokenResponse, TokenRequestError> {
    let mut params = HashMap::new();
    params.insert("grant_type", "refresh_token");
    params.insert("refresh_token", refresh_token);
    params.insert("client_id", client_id);
    request_token(client_id, client_secret, &params).await
}

impl CachedToken {
    /// Build the cache entry for a token response.
    /// Spotify may omit the refresh token on refresh, in which case the previous one is kept.
    pub fn from_response(
        response: SpotifyTokenResponse,
        previous_refresh_token: Option<String>,
        now: i64,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expires_at: now + response.expires_in as i64,
            scope: response.scope,
        }
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS > now
    }

    /// True when every scope this tool needs was granted
    pub fn covers_scopes(&self) -> bool {
        let granted: Vec<&str> = self.scope.split_whitespace().collect();
        SPOTIFY_SCOPES.iter().all(|scope| granted.contains(scope))
    }
}

pub fn load_token_cache(path: &Path) -> Result<Option<CachedToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read token cache: {}", path.display()))?;
    match serde_json::from_str(&contents) {
        Ok(token) => Ok(Some(token)),
        Err(error) => {
            log::warn!(
                "Ignoring unreadable token cache {}: {}",
                path.display(),
                error
            );
            Ok(None)
        }
    }
}

pub fn save_token_cache(path: &Path, token: &CachedToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(token)?;
    std::fs::write(path, contents)
        .wrap_err_with(|| format!("Failed to write token cache: {}", path.display()))?;
    Ok(())
}

/// Credentials of the Spotify developer application
#[derive(Debug, Clone)]
pub struct SpotifyApiCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Return a usable access token, reusing or refreshing the cached one when possible.
///
/// Falls back to the interactive authorization-code flow: the authorization URL is
/// shown and `ask_redirect` must return the URL the browser was redirected to.
pub async fn obtain_access_token(
    credentials: &SpotifyApiCredentials,
    cache_path: &Path,
    mut ask_redirect: impl FnMut(&str) -> Result<String>,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp();

    if let Some(cached) = load_token_cache(cache_path)?.filter(CachedToken::covers_scopes) {
        if cached.is_valid_at(now) {
            log::debug!("Using cached Spotify access token");
            return Ok(cached.access_token);
        }
        if let Some(refresh_token) = cached.refresh_token.clone() {
            log::debug!("Refreshing expired Spotify access token");
            match refresh_access_token(
                &credentials.client_id,
                &credentials.client_secret,
                &refresh_token,
            )
            .await
            {
                Ok(response) => {
                    let token = CachedToken::from_response(response, Some(refresh_token), now);
                    save_token_cache(cache_path, &token)?;
                    return Ok(token.access_token);
                }
                Err(error) => log::warn!("Token refresh failed, logging in again: {}", error),
            }
        }
    }

    let state = generate_state();
    let url = authorize_url(&credentials.client_id, &credentials.redirect_uri, &state);
    let callback = ask_redirect(&url)?;
    let code = parse_callback_url(&callback, &state)?;

    let response = exchange_code_for_token(
        &credentials.client_id,
        &credentials.client_secret,
        &code,
        &credentials.redirect_uri,
    )
    .await
    .wrap_err("Failed to exchange the authorization code")?;

    let token = CachedToken::from_response(response, None, now);
    save_token_cache(cache_path, &token)?;
    log::info!("Saved Spotify token to {}", cache_path.display());
    Ok(token.access_token)
}
