//! cadenza-ingest - media library ingestion runner
//!
//! Imports audio into the library from the command line. A directory import
//! copies the files into a scratch directory under the root folder and runs
//! them through the background ingest queue, the same path uploads take.

use anyhow::{Context, Result};
use cadenza_common::config::{self, Settings};
use cadenza_ingest::models::{BatchState, PlaylistId, UserId};
use cadenza_ingest::services::file_scanner::is_supported;
use cadenza_ingest::Library;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Debug, Parser)]
#[command(name = "cadenza-ingest", version, about = "Media library ingestion")]
struct Cli {
    /// Config file (defaults to ~/.config/cadenza/cadenza.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root folder holding the database and blobs
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import every supported file under a directory
    Import {
        dir: PathBuf,
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        playlist: Option<PlaylistId>,
    },
    /// Import a single file
    File {
        path: PathBuf,
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        playlist: Option<PlaylistId>,
    },
    /// List songs similar to a stored song
    Similar {
        song_id: i64,
        #[arg(long)]
        top: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml = config::load_or_default(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.root_folder.as_deref(), &toml)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting cadenza-ingest {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", settings.root_folder.display());

    let library = Library::from_settings(&settings)
        .await
        .context("failed to open library")?;

    let outcome = match cli.command {
        Command::Import { dir, user, playlist } => import_dir(&library, &settings, &dir, user, playlist).await,
        Command::File { path, user, playlist } => {
            let outcome = library
                .ingest(&path, user, playlist)
                .await
                .with_context(|| format!("failed to ingest {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Command::Similar { song_id, top } => {
            let similar = library.similar_songs(song_id, top).await?;
            println!("{}", serde_json::to_string_pretty(&similar)?);
            Ok(())
        }
    };

    library.shutdown().await;
    outcome
}

async fn import_dir(
    library: &Library,
    settings: &Settings,
    dir: &Path,
    user: UserId,
    playlist: Option<PlaylistId>,
) -> Result<()> {
    let scratch = settings
        .root_folder
        .join("scratch")
        .join(uuid::Uuid::new_v4().to_string());
    let staged = stage_uploads(dir, &scratch)
        .with_context(|| format!("failed to stage {}", dir.display()))?;
    info!(files = staged, scratch = %scratch.display(), "Staged uploads");

    let batch_id = library.ingest_batch(scratch, user, playlist).await?;

    let status = tokio::select! {
        status = library.queue().wait(batch_id) => status,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling batch");
            library.queue().cancel(batch_id).await;
            library.queue().wait(batch_id).await
        }
    };

    let status = status.context("batch status lost")?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    if status.state == BatchState::Cancelled {
        anyhow::bail!("import cancelled");
    }
    Ok(())
}

/// Copy supported files into `scratch`, keeping the source folder name and
/// relative paths
///
/// Folder names are kept because genre resolution reads them.
fn stage_uploads(src: &Path, scratch: &Path) -> Result<usize> {
    let base = match src.file_name() {
        Some(name) => scratch.join(name),
        None => scratch.to_path_buf(),
    };
    std::fs::create_dir_all(&base)?;

    let mut staged = 0;
    for entry in WalkDir::new(src) {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_supported(entry.path()) {
            continue;
        }

        let relative = entry.path().strip_prefix(src)?;
        let target = base.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(entry.path(), &target)?;
        staged += 1;
    }
    Ok(staged)
}
