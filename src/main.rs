use anyhow::{anyhow, Context};
use clap::Parser;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;

use kumo::config::Config;
use kumo::logging::LogFormat;
use kumo::server::init::build_fetcher;
use kumo::server::WeatherService;

/// Kumo - cache-aside weather API accelerator built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "kumo")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (environment variables are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Handle a single weather request, print the response and exit
    #[arg(long)]
    invoke: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path).map_err(|e| anyhow!(e))?,
        None => Config::from_env().map_err(|e| anyhow!(e))?,
    };
    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging subsystem
    kumo::logging::init_subscriber(args.log_format)
        .map_err(|e| anyhow!("Failed to initialize logging subsystem: {}", e))?;

    let config = load_config(&args).context("Failed to load configuration")?;

    tracing::info!(
        config_source = %args
            .config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string()),
        server_address = %config.server.address,
        server_port = config.server.port,
        routes = ?config.server.routes,
        cache_backend = ?config.cache.backend,
        secret_provider = ?config.secret.provider,
        "Configuration loaded successfully"
    );

    if args.test {
        println!("Configuration OK");
        return Ok(());
    }

    // Collaborators are built on their own runtime, which stays alive to drive
    // SDK background tasks; pingora runs separate runtimes for its workers
    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let fetcher = runtime
        .block_on(build_fetcher(&config))
        .map_err(|e| anyhow!("Failed to initialize fetcher: {}", e))?;

    if args.invoke {
        let response = runtime.block_on(fetcher.handle_request(None));
        let headers: serde_json::Map<String, serde_json::Value> = response
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), serde_json::Value::from(*value)))
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "statusCode": response.status,
                "headers": headers,
                "body": response.body,
            })
        );
        return Ok(());
    }

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        ..Default::default()
    };

    let mut server =
        Server::new(Some(opt)).map_err(|e| anyhow!("Failed to create Pingora server: {}", e))?;
    server.bootstrap();

    let service = WeatherService::new(Arc::new(fetcher), config.server.routes.clone());
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, service);
    proxy_service.threads = Some(config.server.threads);

    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(
        address = %listen_addr,
        threads = config.server.threads,
        "Starting Kumo weather service"
    );

    server.add_service(proxy_service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
