use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use sukashi::{Config, batch::BatchRunner, create_app, geocode, startup_checks, watermark};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Watermark a directory of images and exit
    Batch {
        /// Input directory (overrides config)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory (overrides config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Some(Commands::Batch { input, output }) => run_batch(cli.config, input, output).await,
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(cli.config, port, host, quit_after).await,
        None => run_server(cli.config, None, None, None).await,
    }
}

fn load_config(config_path: &PathBuf) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    } else {
        info!("Config file not found at {:?}, using defaults", config_path);
        Ok(Config::default())
    }
}

async fn run_server(
    config_path: PathBuf,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path)?;

    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!("Configuration loaded from: {:?}", config_path);
    info!("Time font: {:?}", config.watermark.time_font_path);
    info!("Location font: {:?}", config.watermark.location_font_path);
    info!("Geocoding provider: {}", config.geocoding.provider);

    run_startup_checks(&config, false).await?;

    let app = create_app(config.clone()).await?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn run_batch(
    config_path: PathBuf,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&config_path)?;
    if let Some(input) = input {
        config.batch.input_directory = input;
    }
    if let Some(output) = output {
        config.batch.output_directory = output;
    }

    info!(
        "Batch watermarking {:?} -> {:?}",
        config.batch.input_directory, config.batch.output_directory
    );

    run_startup_checks(&config, true).await?;

    let geocoder = geocode::create_provider(&config.geocoding)?;
    info!("Using geocoding provider: {}", geocoder.name());

    let pipeline = Arc::new(watermark::WatermarkPipeline::new(
        config.watermark.clone(),
        geocoder,
    )?);

    let runner = BatchRunner::new(
        pipeline,
        config.batch.clone(),
        config.watermark.extensions.clone(),
    );
    let summary = runner.run().await?;

    if summary.failed > 0 {
        return Err(format!("{} file(s) failed to watermark", summary.failed).into());
    }
    Ok(())
}

async fn run_startup_checks(
    config: &Config,
    batch_mode: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match startup_checks::perform_startup_checks(config, batch_mode).await {
        Ok(()) => {
            info!("All startup checks passed");
            Ok(())
        }
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }
            let critical_error = errors.iter().any(|e| e.is_critical());
            if critical_error {
                tracing::error!("Critical startup check failed, exiting");
                Err("Critical startup check failed".into())
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
                Ok(())
            }
        }
    }
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
