use std::sync::Arc;

use clap::Parser;
use miette::{miette, Context, IntoDiagnostic, Result};
use time::UtcOffset;
use tracing::{info, warn};
use youtube_downloader_api::{
    actors::WorkerPool,
    cli::Args,
    config::Settings,
    io::FilenameGenerator,
    logging::init_logging,
    orchestrator::Orchestrator,
    outside::{Ffmpeg, Ytdl},
    server::{self, AppState},
};

fn main() -> Result<()> {
    // Must be read while the process is still single-threaded
    let local_offset = UtcOffset::current_local_offset();

    let args = Args::parse();
    let settings = Settings::load(&args.config)?;

    let offset = local_offset.unwrap_or(UtcOffset::UTC);
    init_logging(args.log_level, offset, settings.downloader.log_file.as_deref())?;
    if local_offset.is_err() {
        warn!("Could not get current local time offset, using UTC");
    }

    prepare_directories(&settings)?;

    let (ytdl, ffmpeg) = load_external_components()?;
    info!("Using {} and ffmpeg", ytdl.program());

    let orchestrator = Orchestrator::new(
        &settings.downloader,
        Arc::new(ytdl),
        Arc::new(ffmpeg),
        FilenameGenerator::new(offset),
    );
    let pool = Arc::new(WorkerPool::start(
        settings.server.workers,
        Arc::new(orchestrator),
    )?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
        .wrap_err("Could not start the async runtime")?;

    let state = AppState::new(Arc::new(settings), pool.clone());
    let res = runtime.block_on(server::serve(state));

    match Arc::try_unwrap(pool) {
        Ok(pool) => pool.shutdown(),
        Err(_) => warn!("Worker pool still in use, not waiting for the workers"),
    }

    res
}

/// Make sure the needed directories are created
fn prepare_directories(settings: &Settings) -> Result<()> {
    let dirs = [
        &settings.downloader.download_dir,
        &settings.downloader.temp_dir,
        &settings.server.static_dir,
    ];
    for dir in dirs {
        std::fs::create_dir_all(dir)
            .into_diagnostic()
            .wrap_err_with(|| format!("Could not create directory {}", dir.display()))?;
    }

    let index = settings.server.static_dir.join("index.html");
    if !index.exists() {
        warn!("Web client not found: {}", index.display());
    }
    Ok(())
}

/// Load the external components
fn load_external_components() -> Result<(Ytdl, Ffmpeg)> {
    // Construct the handles concurrently as executing an external program
    // is not instantaneous. That way we can avoid adding the costs
    let ytdl_thread = std::thread::spawn(Ytdl::new);
    let ffmpeg_thread = std::thread::spawn(Ffmpeg::new);

    let ytdl = ytdl_thread
        .join()
        .map_err(|_| miette!("Could not join thread"))?
        .into_diagnostic()
        .wrap_err("yt-dlp or youtube-dl is required")?;
    let ffmpeg = ffmpeg_thread
        .join()
        .map_err(|_| miette!("Could not join thread"))?
        .into_diagnostic()
        .wrap_err("ffmpeg is required")?;

    Ok((ytdl, ffmpeg))
}
