use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::net::SocketAddr;
use std::sync::Arc;

use upload_progress::config::Config;
use upload_progress::state::AppState;
use upload_progress::template::ProgressTemplate;
use upload_progress::server::{build_router, print_startup_banner, start_server};

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    // logging first, so configuration warnings are not lost
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // load configuration from environment variables
    let config = Config::from_env();

    // build tokio runtime with configured worker threads
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        // create the directory if it doesn't exist
        if !config.files_dir.exists() {
            std::fs::create_dir_all(&config.files_dir).expect("Failed to create files directory");
            tracing::info!("Created files directory at: {:?}", config.files_dir);
        }

        let template = match &config.progress_template {
            Some(path) => ProgressTemplate::from_file(path).expect("Failed to read PROGRESS_TEMPLATE"),
            None => ProgressTemplate::default(),
        };

        // the registry lives for the whole process and is shared through the state
        let state = Arc::new(
            AppState::new(config.files_dir.clone())
                .with_template(template)
                .with_timing(config.tick_interval, config.grace_period)
                .with_chunk_size(config.chunk_size),
        );

        let app = build_router(state, &config);

        let addr = SocketAddr::from((
            config.host.parse::<std::net::IpAddr>()
                .expect("Invalid HOST"),
            config.port
        ));

        print_startup_banner(&config);

        if let Err(e) = start_server(app, addr, &config).await {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    });
}
