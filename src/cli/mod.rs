use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config;
use crate::http::server::HttpServer;
use crate::player::Player;
use crate::storage::db::i64_seconds_to_local_time;
use crate::storage::operations::Storage;

#[derive(Parser)]
#[command(name = "tapedeck")]
#[command(version = "0.1")]
#[command(about = "Upload audio files and play them back in the browser")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run http server hosting the player page
    Serve,
    /// List stored tracks
    List,
    /// Store audio files, directories are searched recursively
    Import {
        /// Files or directories to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Follow symbolic links while walking directories
        #[arg(short, long)]
        follow_symlinks: bool,
    },
    /// Show what would be restored on the next start
    Status,
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = config::Config::load(&cli.config)?;
    log::debug!("loaded config version {}", cfg.version);

    let storage = Storage::open(&cfg.database).with_context(|| "Failed to initialize storage")?;

    match cli.command {
        Commands::Serve => {
            let player = Player::start(storage, cfg.playback)?;
            let http_server = HttpServer::new(player, cfg.http);

            println!(
                "HTTP server running at http://{}:{}",
                http_server.config.bind_addr, http_server.config.port
            );
            http_server.run();
        }

        Commands::List => {
            let tracks = storage.list_tracks()?;
            println!("Library contains {} tracks", tracks.len());
            for track in &tracks {
                println!("  {}", track.name);
                println!("    size: {} bytes", track.size);
                println!("    digest: {}", track.digest);
                println!(
                    "    uploaded: {}",
                    i64_seconds_to_local_time(track.uploaded_at)?
                );
            }
            storage.close()?;
        }

        Commands::Import {
            paths,
            follow_symlinks,
        } => {
            let mut storage = storage;
            let report = storage.import_paths(&paths, follow_symlinks)?;

            println!("Imported {} files:", report.imported.len());
            for (name, path) in &report.imported {
                println!("    - {} from {}", name, path.to_string_lossy());
            }
            if !report.skipped.is_empty() {
                println!("Skipped {} files:", report.skipped.len());
                for (path, reason) in &report.skipped {
                    println!("    - {}: {}", path.to_string_lossy(), reason);
                }
            }
            storage.close()?;
        }

        Commands::Status => {
            let player = Player::start(storage, cfg.playback)?;

            println!("Playlist contains {} tracks", player.playlist().len());
            match player.current_source() {
                Some(source) => {
                    println!("Now playing: {}", source.track.name);
                    match source.resume_at {
                        Some(seconds) => println!("Resumes at {seconds:.1}s"),
                        None => println!("Starts from the beginning"),
                    }
                }
                None => println!("{}", player.message().unwrap_or_default()),
            }
            player.shutdown()?;
        }
    }

    Ok(())
}
