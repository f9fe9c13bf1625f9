//! aiponge operator CLI.
//!
//! Idempotent relationship backfills and an offline lyrics synchronizer.
//!
//! ```bash
//! aiponge-admin backfill-self
//! aiponge-admin auto-follow-librarians <member-id>
//! aiponge-admin sync-lyrics song.txt --duration 183.5 --lrc
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aiponge_common::Config;
use aiponge_core::{
    CreatorMemberService, adjust_timestamps_to_song_duration, format_lrc,
    generate_lyrics_timestamps,
};
use aiponge_db::repositories::{CreatorMemberRepository, UserRepository};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// aiponge administration tool
#[derive(Parser, Debug)]
#[command(name = "aiponge-admin", version)]
#[command(about = "Maintenance commands for creator-member relationships and lyrics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Give every user a self relationship
    BackfillSelf,
    /// Make every user follow every librarian
    BackfillLibrarians,
    /// Make one member follow every librarian
    AutoFollowLibrarians {
        /// Member user ID
        member_id: String,
    },
    /// Make every user follow one librarian
    AddAllUsers {
        /// Librarian user ID
        librarian_id: String,
    },
    /// Estimate line timestamps for a lyrics file
    SyncLyrics {
        /// Plain-text lyrics with optional [Section] headers
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Song length in seconds; the last line ends here
        #[arg(long)]
        duration: Option<f64>,

        /// Always stretch to --duration, even for small corrections
        #[arg(long, requires = "duration")]
        exact: bool,

        /// Print LRC instead of JSON
        #[arg(long)]
        lrc: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aiponge_admin=info,aiponge_core=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let inserted = match cli.command {
        Command::SyncLyrics {
            file,
            duration,
            exact,
            lrc,
        } => return sync_lyrics(&file, duration, exact, lrc),
        Command::BackfillSelf => connect().await?.backfill_self_relationships().await?,
        Command::BackfillLibrarians => {
            connect().await?.backfill_librarian_relationships().await?
        }
        Command::AutoFollowLibrarians { member_id } => {
            connect().await?.auto_follow_all_librarians(&member_id).await?
        }
        Command::AddAllUsers { librarian_id } => {
            connect().await?.add_all_users_to_librarian(&librarian_id).await?
        }
    };

    println!("{}", serde_json::json!({ "inserted": inserted }));
    Ok(())
}

async fn connect() -> anyhow::Result<CreatorMemberService> {
    let config = Config::load().context("Failed to load configuration")?;
    let db = Arc::new(aiponge_db::init(&config).await?);
    info!("Connected to database");

    Ok(CreatorMemberService::new(
        CreatorMemberRepository::new(Arc::clone(&db)),
        UserRepository::new(db),
    ))
}

fn sync_lyrics(file: &Path, duration: Option<f64>, exact: bool, lrc: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let lines = match duration {
        Some(secs) if exact => {
            adjust_timestamps_to_song_duration(generate_lyrics_timestamps(&content, None), secs)
        }
        _ => generate_lyrics_timestamps(&content, duration),
    };
    info!(lines = lines.len(), "Lyrics synchronized");

    if lrc {
        print!("{}", format_lrc(&lines));
    } else {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    }

    Ok(())
}
