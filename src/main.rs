use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use flare::api::{create_router, AppState};
use flare::config::{AppConfig, LoggingConfig};
use flare::error::{FlareError, Result};
use flare::exchange::{DeltaClient, ExchangeApi};
use flare::notify::{Notifier, TelegramClient};
use flare::registry::OrderRegistry;
use flare::router::{RouterConfig, SignalRouter};
use flare::supervisor::{OrderSupervisor, SupervisorConfig};

#[derive(Parser)]
#[command(name = "flare", about = "Webhook-driven derivatives trading bot")]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook service
    Serve,
    /// Validate configuration and send a test notification
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("config: {}", e);
        }
        return Err(FlareError::Validation(errors.join("; ")));
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(config).await,
        Commands::Check => run_check(config).await,
    }
}

async fn run_serve(config: AppConfig) -> Result<()> {
    let exchange: Arc<dyn ExchangeApi> = Arc::new(DeltaClient::new(&config.exchange)?);
    let registry = OrderRegistry::new();
    let notifier = Arc::new(Notifier::new(TelegramClient::from_config(&config.telegram)));

    let supervisor = OrderSupervisor::new(
        exchange.clone(),
        registry.clone(),
        notifier.clone(),
        config.exchange.product_id,
        SupervisorConfig::from(&config.execution),
    );
    let router = SignalRouter::new(
        exchange.clone(),
        registry.clone(),
        notifier.clone(),
        supervisor,
        RouterConfig::from_config(&config),
    );

    let state = AppState::new(
        router,
        registry,
        exchange,
        config.exchange.symbol.clone(),
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    notifier.info(
        "main",
        "Bot Started",
        &format!(
            "symbol {} (product {}), lot {}, entry orders: {:?}, webhook on {}/webhook",
            config.exchange.symbol,
            config.exchange.product_id,
            config.trading.default_lot_size,
            config.trading.entry_order_type,
            addr
        ),
    );
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn run_check(config: AppConfig) -> Result<()> {
    info!(
        "configuration ok: symbol {} (product {}), lot {}, poll every {}s, auto-cancel after {}s",
        config.exchange.symbol,
        config.exchange.product_id,
        config.trading.default_lot_size,
        config.execution.poll_interval_secs,
        config.execution.max_wait_secs
    );

    match TelegramClient::from_config(&config.telegram) {
        Some(telegram) => {
            telegram
                .send_message("\u{1f9ea} Test message: configuration is valid and the bot can reach Telegram")
                .await
                .map_err(FlareError::Internal)?;
            info!("test notification sent");
        }
        None => {
            info!("telegram is not configured, skipping test notification");
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},flare=debug", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
