use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use tracksink_lib::catalog::{Catalog, ItunesLibrary};
use tracksink_lib::config::{default_library_path, Config};
use tracksink_lib::sink::Sink;
use tracksink_lib::sync_engine::{EnginePhase, RunOutcome, SyncOptions, SyncSession};
use tracksink_lib::{logging, SyncError};

#[derive(Parser)]
#[command(name = "tracksink")]
#[command(about = "Mirror music library playlists onto a portable player", long_about = None)]
struct Cli {
    /// Playlists to sync; defaults to the ones listed in the config file.
    playlists: Vec<String>,

    /// Path to 'iTunes Music Library.xml'
    #[arg(short, long)]
    library: Option<PathBuf>,

    /// Sync target directory
    #[arg(short, long)]
    target: Option<PathBuf>,

    #[arg(short, long)]
    config: Option<PathBuf>,

    /// -v for info output, -vv for debug output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print a summary of the library and exit
    #[arg(long)]
    print_library: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match &cli.config {
        Some(path) => Ok(Config::load(path)?),
        None => match Config::default_path() {
            Some(path) => match Config::load(&path) {
                Ok(config) => Ok(config),
                Err(SyncError::NotFound { .. }) => {
                    tracing::debug!("No config at {}", path.display());
                    Ok(Config::default())
                }
                Err(e) => Err(e.into()),
            },
            None => Ok(Config::default()),
        },
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = load_config(&cli)?;

    let library_path = cli
        .library
        .clone()
        .or_else(|| config.library.clone())
        .or_else(default_library_path)
        .ok_or_else(|| anyhow::anyhow!("Library not found: pass --library"))?;
    tracing::info!("Library: {}", library_path.display());
    let library = ItunesLibrary::load(&library_path)?;

    if cli.print_library {
        println!("Library: {}", library.path().display());
        println!("-------- Playlists ------------");
        for playlist in library.playlists() {
            println!("{}: {} tracks", playlist.name, playlist.tracks.len());
        }
        return Ok(());
    }

    let target = cli
        .target
        .clone()
        .or_else(|| config.target.clone())
        .ok_or_else(|| anyhow::anyhow!("Missing required argument: --target"))?;
    tracing::info!("Target: {}", target.display());

    let playlists = if cli.playlists.is_empty() {
        config.playlists.clone()
    } else {
        cli.playlists.clone()
    };
    if playlists.is_empty() {
        anyhow::bail!("No playlists given on the command line or in the config file");
    }
    tracing::info!("Playlists: {:?}", playlists);

    let options = SyncOptions {
        dry_run: cli.dry_run,
        ..SyncOptions::default()
    };
    if options.dry_run {
        println!("🔍 Dry-run mode - nothing will be written");
    }

    let sink = Sink::new(&target, options)?;
    let mut session = SyncSession::new(&library, sink);
    session.plan(&playlists)?;

    let pb = ProgressBar::new(session.engine().transfer_cost());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let result = session.execute(|progress| {
        pb.set_length(progress.total_bytes);
        pb.set_position(progress.processed_bytes);
        match (progress.phase, progress.current) {
            (EnginePhase::Performing, Some(current)) => pb.set_message(current),
            (phase, _) => pb.set_message(format!("{phase:?}")),
        }
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            pb.abandon_with_message("❌ Synchronization failed!");
            eprintln!("❌ Error: {e}");
            std::process::exit(1);
        }
    };

    match &report.outcome {
        RunOutcome::UpToDate => {
            pb.finish_and_clear();
            println!("✅ Everything up-to-date.");
        }
        RunOutcome::DryRun(engine) => {
            pb.finish_and_clear();
            println!("📝 {} action(s) would run", engine.actions);
        }
        RunOutcome::Applied(engine) => {
            pb.finish_with_message("✅ Synchronization complete!");
            println!();
            println!("   Bytes copied: {} MB", engine.bytes_transferred / 1_048_576);
        }
    }

    if let Some(projection) = &report.projection {
        println!(
            "💾 Free {} MB, net change {} MB",
            projection.usage.free / 1_048_576,
            projection.net_delta / 1_048_576
        );
    }

    println!("📊 Results:");
    for playlist in &report.playlists {
        println!(
            "   {}: {} synced, {} deleted, {} skipped, {} unchanged",
            playlist.name,
            playlist.syncing(),
            playlist.deleting,
            playlist.skipped,
            playlist.unchanged
        );
        if playlist.left_in_place > 0 {
            println!("   ⚠️  {} file(s) could not be removed", playlist.left_in_place);
        }
    }

    Ok(())
}
