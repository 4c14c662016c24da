use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ovnscope::config::Config;
use ovnscope::ovn::KubectlExecutor;
use ovnscope::resource::{Fetcher, ResourceKind, ResourceMap, SnapshotCache};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Snapshot and inspect OVN northbound resources
#[derive(Parser, Debug)]
#[command(name = "ovnscope", version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Snapshot cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Namespace the OVN pods run in
    #[arg(short, long)]
    namespace: Option<String>,

    /// Prefer the nbdb pod on this node
    #[arg(long)]
    node: Option<String>,

    /// Only refresh this kind (e.g. logical_router, ACL, Load_Balancer)
    #[arg(short, long)]
    kind: Option<String>,

    /// Print cached snapshots without contacting the cluster
    #[arg(long)]
    offline: bool,

    /// Request plain-text output instead of JSON
    #[arg(long)]
    text: bool,

    /// Log level for debugging (overrides the config file)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("ovnscope started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("ovnscope").join("ovnscope.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ovnscope").join("ovnscope.log");
    }
    PathBuf::from("ovnscope.log")
}

/// Render the mapping keyed by cache key, in registry order
fn render(resources: &ResourceMap) -> Result<String> {
    let mut out = Map::new();
    for (kind, items) in resources {
        out.insert(kind.key().to_string(), serde_json::to_value(items)?);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(out))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI > config file > defaults
    let (mut config, config_error) = match Config::try_load(args.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_level = args
        .log_level
        .or_else(|| LogLevel::from_str(&config.logging.level, true).ok())
        .unwrap_or(LogLevel::Off);
    let _log_guard = setup_logging(log_level)?;

    // Reported once logging is up; stderr too, since logging is off by default
    if let Some(e) = config_error {
        tracing::warn!("{:#}; using defaults", e);
        eprintln!("warning: {:#}; using defaults", e);
    }

    if let Some(ref namespace) = args.namespace {
        config.connection.namespace = namespace.clone();
    }
    if args.node.is_some() {
        config.connection.node_name = args.node.clone();
    }
    if args.cache_dir.is_some() {
        config.cache.dir = args.cache_dir.clone();
    }

    // An unknown kind is a caller mistake, not something to recover from
    let only_kind = args
        .kind
        .as_deref()
        .map(str::parse::<ResourceKind>)
        .transpose()?;

    let cache_dir = config.effective_cache_dir();
    tracing::info!("Using cache directory: {:?}", cache_dir);
    let mut cache = SnapshotCache::new(&cache_dir);

    if config.cache.load_on_startup || args.offline {
        cache.warm();
        for kind in ResourceKind::ALL {
            if let Some(age) = cache.snapshot_age(kind) {
                if age > config.cache.expiry() {
                    tracing::warn!("Cached {} snapshot is stale ({}s old)", kind, age.as_secs());
                }
            }
        }
    }

    if args.offline {
        let live = match only_kind {
            Some(kind) => ResourceMap::from([(kind, cache.live(kind).to_vec())]),
            None => cache.live_all().clone(),
        };
        println!("{}", render(&live)?);
        return Ok(());
    }

    let executor = KubectlExecutor::new(config.connection.clone());
    let mut fetcher = Fetcher::new(executor, cache).with_json(!args.text);

    let result = match only_kind {
        Some(ResourceKind::Router) => {
            ResourceMap::from([(ResourceKind::Router, fetcher.refresh_routers().await)])
        }
        Some(kind) => ResourceMap::from([(kind, fetcher.refresh_kind(kind).await)]),
        None => fetcher.refresh_all().await,
    };

    for (kind, err) in fetcher.failures() {
        eprintln!("warning: {}: {}", kind, err);
    }

    println!("{}", render(&result)?);
    Ok(())
}
