mod cli;

use vidserve::{
    config::{self, Config},
    server::{self, AppContext},
    storage,
};
use vidserve_common::VideoId;
use vidserve_db::{
    pool::{get_conn, init_pool},
    queries::videos::{self, NewVideo},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

/// Load the config file (or defaults) and layer environment overrides on top.
fn resolve_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = config::load_config_or_default(config_path)?;
    config::apply_env_overrides(&mut config);
    config::validate_config(&config)?;
    Ok(config)
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = resolve_config(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting vidserve");

    let db_path = config.database.path.to_string_lossy().into_owned();
    tracing::info!("Initializing catalog at {}", db_path);
    let db_pool = init_pool(&db_path).context("Failed to open catalog database")?;

    let store = storage::build_store(&config.storage).await?;
    tracing::info!(
        "Serving videos from bucket {} and covers from bucket {}",
        config.storage.video_bucket,
        config.storage.cover_bucket
    );

    let ctx = AppContext::new(config, db_pool, store);
    server::start_server(ctx).await
}

async fn add_video(
    config_path: Option<&std::path::Path>,
    new: NewVideo,
    verify: bool,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    if verify {
        let store = storage::build_store(&config.storage).await?;
        for (bucket, key) in [
            (&config.storage.video_bucket, &new.video_filename),
            (&config.storage.cover_bucket, &new.cover_filename),
        ] {
            let stat = store
                .stat(bucket, key)
                .await
                .with_context(|| format!("Object {}/{} is not readable", bucket, key))?;
            tracing::debug!("Found {}/{} ({} bytes)", bucket, key, stat.size);
        }
    }

    let db_path = config.database.path.to_string_lossy().into_owned();
    let video = tokio::task::spawn_blocking(move || -> Result<_> {
        let pool = init_pool(&db_path)?;
        let conn = get_conn(&pool)?;
        Ok(videos::create_video(&conn, &new)?)
    })
    .await??;

    println!("Registered video: {}", video.id);
    println!("  Title: {}", video.title);
    println!("  Creator: {}", video.creator);
    println!("  Uploaded: {}", video.upload_date.to_rfc3339());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vidserve=trace,vidserve_db=debug,vidserve_common=debug,tower_http=debug".to_string()
        } else {
            "vidserve=debug,vidserve_db=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::AddVideo {
            title,
            creator,
            video,
            cover,
            description,
            id,
            video_mime,
            cover_mime,
            no_verify,
        } => {
            let mut new = NewVideo::new(title, creator, video, cover);
            new.id = id.map(VideoId::from);
            new.description = description;
            new.video_mime_type = video_mime;
            new.cover_mime_type = cover_mime;

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(add_video(cli.config.as_deref(), new, !no_verify))
        }
        Commands::Version => {
            println!("vidserve {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            config::load_config(p)?
        }
        None => {
            println!("No config file specified, checking defaults");
            let mut config = Config::default();
            config::apply_env_overrides(&mut config);
            config::validate_config(&config)?;
            config
        }
    };

    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Database: {:?}", config.database.path);
    println!("  Storage backend: {:?}", config.storage.backend);
    if let Some(ref endpoint) = config.storage.endpoint {
        println!("  Storage endpoint: {}", endpoint);
    }
    println!(
        "  Buckets: {} (video), {} (cover)",
        config.storage.video_bucket, config.storage.cover_bucket
    );
    println!(
        "  Chunk size: {} bytes, timeout: {}s",
        config.streaming.chunk_size, config.streaming.chunk_timeout_secs
    );

    Ok(())
}
