use clap::Parser;
use featx::fraud;
use featx_api::RestApi;
use featx_engine::EngineConfig;
use featx_storage::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// On-demand feature serving for the fraud-detection repository
#[derive(Parser, Debug)]
#[command(name = "featx")]
#[command(about = "On-demand feature engine", long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// JSON snapshot of precomputed feature history (.json or .json.gz)
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the lookup timeout from the config file
    #[arg(long)]
    lookup_timeout_ms: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting featx v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(ms) = args.lookup_timeout_ms {
        config.lookup_timeout_ms = ms;
    }
    info!("Lookup timeout: {:?}", config.lookup_timeout());

    let store = Arc::new(MemoryStore::new());
    let registry = Arc::new(fraud::registry(config, store.clone())?);
    info!("Feature services: {:?}", registry.list_feature_services());

    if let Some(path) = &args.snapshot {
        let stats = store.load_snapshot(path, |source| registry.precomputed_schema(source))?;
        info!("Snapshot loaded: {} entries from {} sources", stats.entries, stats.sources);
    }

    let http_port = args.http_port;
    let http_registry = registry.clone();
    let http_handle = std::thread::spawn(move || {
        info!("Starting HTTP server on port {}", http_port);
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(http_registry, http_port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
