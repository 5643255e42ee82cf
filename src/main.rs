use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use clipfeed::api::ApiServer;
use clipfeed::{
    Category, Config, FileMediaAccess, LocalStore, MediaLibrary, PlaybackSession, RemoteStore,
    Storage, StorageBackend,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("clipfeed=info,warn")
        .init();

    let matches = Command::new("Clipfeed")
        .version("0.1.0")
        .about("Clip scheduling engine for a swipeable video learning feed")
        .arg(
            Arg::new("study-dir")
                .short('s')
                .long("study-dir")
                .value_name("DIR")
                .help("Directory containing study videos")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("relax-dir")
                .short('r')
                .long("relax-dir")
                .value_name("DIR")
                .help("Directory containing relax videos")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Directory for the local fallback store")
                .default_value("./data"),
        )
        .arg(
            Arg::new("backend-url")
                .short('b')
                .long("backend-url")
                .value_name("URL")
                .help("Base URL of the companion document store"),
        )
        .arg(
            Arg::new("serve")
                .long("serve")
                .help("Run the embedded document-store service")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Listen port for the embedded service")
                .default_value("5180"),
        )
        .get_matches();

    // Load configuration, then apply CLI overrides
    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    if let Some(dirs) = matches.get_many::<String>("study-dir") {
        config.library.study_dirs.extend(dirs.map(PathBuf::from));
    }
    if let Some(dirs) = matches.get_many::<String>("relax-dir") {
        config.library.relax_dirs.extend(dirs.map(PathBuf::from));
    }
    if let Some(data_dir) = matches.get_one::<String>("data-dir") {
        config.persistence.data_dir = PathBuf::from(data_dir);
    }
    if let Some(backend_url) = matches.get_one::<String>("backend-url") {
        config.persistence.backend_url = Some(backend_url.clone());
    }
    if matches.get_flag("serve") {
        config.server.enabled = true;
    }
    if let Some(port) = matches.get_one::<String>("port") {
        config.server.port = port.parse()?;
    }

    config.validate()?;
    info!("🚀 Clipfeed starting...");
    info!("{}", config.summary());

    // Embedded document-store service
    let mut server_handle = None;
    if config.server.enabled {
        let store = Arc::new(LocalStore::new(config.persistence.data_dir.clone()));
        let server = ApiServer::new(store, config.server.port);
        server_handle = Some(server.start_background());
    }

    // Storage facade: remote with local fallback, or local-only
    let storage = match &config.persistence.backend_url {
        Some(url) => {
            let remote = RemoteStore::new(url, config.persistence.request_timeout_seconds)?;
            Storage::with_remote(remote, config.persistence.data_dir.clone())
        }
        None => Storage::local_only(config.persistence.data_dir.clone()),
    };
    let storage: Arc<Storage> = Arc::new(storage);

    // Scan the video library
    let library = MediaLibrary::new().with_extensions(config.library.supported_extensions.clone());
    let mut videos = Vec::new();
    for dir in &config.library.study_dirs {
        match library.scan_directory(dir, Category::Study).await {
            Ok(mut found) => videos.append(&mut found),
            Err(e) => error!("Cannot scan study directory {}: {}", dir.display(), e),
        }
    }
    for dir in &config.library.relax_dirs {
        match library.scan_directory(dir, Category::Relax).await {
            Ok(mut found) => videos.append(&mut found),
            Err(e) => error!("Cannot scan relax directory {}: {}", dir.display(), e),
        }
    }

    if videos.is_empty() {
        warn!("No videos found; the feed will stay empty until directories are added");
    } else {
        info!("📹 Loaded {} videos", videos.len());
    }

    // Build the playback session
    let mut session =
        PlaybackSession::new(&config, videos, storage.clone(), Arc::new(FileMediaAccess)).await?;

    // Mark the app as started and cache the partition in the preference
    // record
    let user_id = config.persistence.user_id.clone();
    match storage.load_preferences(&user_id).await {
        Ok(mut prefs) => {
            prefs.app_started = true;
            prefs.clip_policy = config.scheduling.clip_policy;
            prefs.video_ranges = session.catalog().ranges_by_video();
            if let Err(e) = storage.save_preferences(&prefs).await {
                warn!("Failed to save preferences: {}", e);
            }
        }
        Err(e) => warn!("Failed to load preferences: {}", e),
    }

    match session.start().await {
        Some(entry) => info!(
            "▶️  First clip: {} [{}s..{}s] ({})",
            entry.video_name, entry.range.start_time, entry.range.end_time, entry.category
        ),
        None => info!("🎓 Nothing left to learn: every clip is memorized"),
    }

    let session = Arc::new(Mutex::new(session));
    let eviction = PlaybackSession::spawn_idle_eviction(
        session.clone(),
        std::time::Duration::from_secs(config.queue.eviction_check_secs),
    );

    if let Some(handle) = server_handle {
        // Serve until interrupted
        tokio::select! {
            result = handle => {
                if let Ok(Err(e)) = result {
                    error!("Document-store server failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("👋 Shutting down");
            }
        }
    }

    eviction.abort();
    Ok(())
}
