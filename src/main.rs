mod config;
mod error;
mod logging;
mod ports;
mod prompt;
mod services;
mod spotify_rs;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use color_eyre::{Result, eyre::WrapErr};

use crate::{
    config::{Config, ConfigOverrides},
    error::RunError,
    logging::setup_logging,
    prompt::ConsolePrompt,
    services::{
        audit::{RunOptions, run, source::SelectionProvider},
        spotify::client::SpotifyWebApi,
    },
    spotify_rs::auth::obtain_access_token,
};

const EXAMPLES: &str = "\
Usage Examples:
  Audit Liked Songs (Dry Run):
    spotify-relinker --dry-run True --market BE

  Audit using an interactive selection menu:
    spotify-relinker --dry-run True --market BE --select-from-list

  Audit a specific Playlist directly by ID (Dry Run):
    spotify-relinker --dry-run True --market BE --playlist-id 37i9dQZF1DXcBWIGoYBM5M";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "A tool to audit and clean your Spotify Liked Songs or a specific playlist.",
    after_help = EXAMPLES
)]
struct Args {
    /// Mandatory. 'True' or 'False' (case-insensitive)
    #[arg(long, required = true, action = clap::ArgAction::Set, value_parser = parse_bool)]
    dry_run: bool,

    /// Mandatory. The 2-letter ISO country code for your market (e.g., US, BE, GB)
    #[arg(long)]
    market: String,

    /// The ID of a playlist to process. Ignored if --select-from-list is used
    #[arg(long)]
    playlist_id: Option<String>,

    /// Show an interactive list of your Liked Songs and owned playlists to choose from
    #[arg(long)]
    select_from_list: bool,

    /// Run in test mode for a specific artist. Enclose in quotes
    #[arg(long, value_parser = parse_artist)]
    artist: Option<String>,

    /// Directory the audit report is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// The config file to use
    #[arg(short, long, env = "SPOTIFY_RELINKER_CONFIG")]
    config: Option<PathBuf>,

    /// Spotify application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    client_id: Option<String>,

    /// Spotify application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Redirect URI registered for the Spotify application
    #[arg(long, env = "SPOTIFY_REDIRECT_URI")]
    redirect_uri: Option<String>,

    /// Console log level
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level
    #[arg(long, default_value = "debug")]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "SPOTIFY_RELINKER_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("Boolean value expected (e.g., True, false, t, 1, 0).".to_string()),
    }
}

fn parse_artist(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err(RunError::EmptyArtistFilter.to_string())
    } else {
        Ok(value.to_string())
    }
}

async fn run_cli(args: Args) -> Result<()> {
    log::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load spotify-relinker config")?
    .with_overrides(ConfigOverrides {
        client_id: args.client_id,
        client_secret: args.client_secret,
        redirect_uri: args.redirect_uri,
    });

    let mut prompt = ConsolePrompt;
    let credentials = config.credentials()?;
    let access_token = obtain_access_token(&credentials, &config.token_cache_path(), |url| {
        prompt.show("\nOpen this URL in your browser and grant access:");
        prompt.show(&format!("  {}", url));
        prompt.ask("\nPaste the URL you were redirected to: ")
    })
    .await?;
    let client = SpotifyWebApi::new(access_token, config.request_timeout())?;

    let options = RunOptions {
        dry_run: args.dry_run,
        market: args.market,
        playlist_id: args.playlist_id,
        select_from_list: args.select_from_list,
        test_artist: args.artist,
        output_dir: args.output_dir,
    };
    let outcome = run(&client, &mut prompt, options).await?;
    log::debug!("Run finished: {:?}", outcome);

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(error) = color_eyre::install() {
        eprintln!("Failed to install error handler: {}", error);
        return ExitCode::FAILURE;
    }

    if std::env::args_os().len() == 1 {
        eprintln!("{}", Args::command().render_help());
        return ExitCode::FAILURE;
    }

    let args = Args::parse();
    if let Err(error) = setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)
    {
        eprintln!("{:?}", error);
        return ExitCode::FAILURE;
    }
    log::debug!("spotify-relinker starting");

    // The run may sit in a blocking stdin read, so it gets its own task to keep
    // Ctrl-C observable here.
    let task = tokio::spawn(run_cli(args));
    let result = tokio::select! {
        joined = task => joined.wrap_err("Run task failed").and_then(|result| result),
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n\nInterrupted by user - the run did not complete all of its work!");
            std::process::exit(1);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match error.downcast_ref::<RunError>() {
                Some(run_error) => eprintln!("\nError: {}", run_error),
                None => eprintln!("\n\nAn unexpected error occurred: {:?}", error),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_bool() {
        for value in ["True", "t", "1", "YES", "y"] {
            assert_eq!(parse_bool(value), Ok(true), "{}", value);
        }
        for value in ["false", "F", "0", "no", "N"] {
            assert_eq!(parse_bool(value), Ok(false), "{}", value);
        }
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "spotify-relinker",
            "--dry-run",
            "False",
            "--market",
            "be",
            "--artist",
            "Daft Punk",
            "--select-from-list",
        ])
        .unwrap();

        assert!(!args.dry_run);
        assert_eq!(args.market, "be");
        assert_eq!(args.artist.as_deref(), Some("Daft Punk"));
        assert!(args.select_from_list);
        assert_eq!(args.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_dry_run_and_market_are_required() {
        assert!(Args::try_parse_from(["spotify-relinker", "--market", "BE"]).is_err());
        assert!(Args::try_parse_from(["spotify-relinker", "--dry-run", "true"]).is_err());
    }

    #[test]
    fn test_empty_artist_rejected() {
        let error = Args::try_parse_from([
            "spotify-relinker",
            "--dry-run",
            "true",
            "--market",
            "BE",
            "--artist",
            "  ",
        ])
        .unwrap_err();
        assert!(error.to_string().contains("--artist parameter cannot be an empty string"));
    }

    #[test]
    fn test_invalid_boolean_rejected() {
        assert!(
            Args::try_parse_from(["spotify-relinker", "--dry-run", "perhaps", "--market", "BE"])
                .is_err()
        );
    }
}
