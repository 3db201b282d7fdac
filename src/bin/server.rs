use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use minisql::config::{Config, DEFAULT_CONFIG_PATH};
use minisql::server::Server;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Command-line overrides
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    port: Option<u16>,
    data: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .with_context(|| format!("missing value for {}", name))
        };
        match arg.as_str() {
            "--config" | "-c" => args.config = Some(PathBuf::from(value("--config")?)),
            "--port" | "-p" => {
                let port = value("--port")?;
                args.port = Some(port.parse().with_context(|| format!("invalid port: {}", port))?);
            }
            "--data" | "-d" => args.data = Some(PathBuf::from(value("--data")?)),
            "--help" | "-h" => {
                println!(
                    "Usage: minisql-server [--config FILE] [--port PORT] [--data DIR]\n\n\
                     Defaults to {} when it exists.",
                    DEFAULT_CONFIG_PATH
                );
                std::process::exit(0);
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    Ok(args)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::from_file(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("failed to load {}", DEFAULT_CONFIG_PATH))?,
        None => Config::new(),
    };

    if let Some(port) = args.port {
        config = config.port(port);
    }
    if let Some(data) = &args.data {
        config = config.data_path(data);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    let config = load_config(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting MiniSQL server");
    let server = Server::open(config).context("failed to open data directory")?;

    tokio::select! {
        res = server.run() => res.context("server error")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}
