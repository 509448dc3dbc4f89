//! Careledger Daemon
//!
//! Patient treatment record service with an append-only feedback ledger.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (HTTP only)
//! careledger
//!
//! # Start with custom config
//! careledger --config /path/to/config.toml
//!
//! # Start with custom HTTP port
//! careledger --http-port 8086
//!
//! # Connect to NATS for feedback intake and treatment events
//! careledger --nats-url nats://localhost:4222
//! ```
//!
//! ## HTTP API
//!
//! - `GET /health` - Health check
//! - `POST/GET /v1/patients` - Create / list patients
//! - `GET/PATCH/DELETE /v1/patients/{id}` - Read, patch or delete a patient
//! - `POST/GET /v1/treatments` - Create / list treatments
//! - `GET/DELETE /v1/treatments/{id}` - Projected view, delete
//!
//! ## Messaging
//!
//! Subscribes to `treatment.action_feedback` and `treatment.value_feedback`
//! and publishes `treatment.created` after each new treatment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use careledger::messages::consumer::FeedbackConsumer;
use careledger::messages::publisher::TreatmentPublisher;
use careledger::nats::NatsClient;
use careledger::{Config, RecordDb, RecordService};

#[derive(Parser, Debug)]
#[command(name = "careledger")]
#[command(about = "Patient treatment record service")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory for the record database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long)]
    http_port: Option<u16>,

    /// NATS server URL (feedback intake and treatment events)
    #[arg(long, env = "NATS_URL")]
    nats_url: Option<String>,

    /// NATS user for authenticated servers
    #[arg(long, env = "NATS_USER")]
    nats_user: Option<String>,

    /// NATS password for authenticated servers
    #[arg(long, env = "NATS_PASSWORD")]
    nats_password: Option<String>,

    /// Disable messaging even when a NATS URL is configured
    #[arg(long)]
    no_messaging: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("careledger=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if args.nats_url.is_some() {
        config.nats_url = args.nats_url;
    }
    if args.nats_user.is_some() {
        config.nats_user = args.nats_user;
    }
    if args.nats_password.is_some() {
        config.nats_password = args.nats_password;
    }

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        "Starting careledger"
    );

    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = Arc::new(RecordDb::open(&config.data_dir)?);

    // Connect to NATS when configured
    let nats = if args.no_messaging {
        info!("Messaging disabled via --no-messaging");
        None
    } else if let Some(url) = &config.nats_url {
        match NatsClient::connect(
            url,
            config.nats_user.as_deref(),
            config.nats_password.as_deref(),
            "careledger",
        )
        .await
        {
            Ok(client) => Some(client),
            Err(e) => {
                error!("NATS connection failed: {}", e);
                return Err(e.into());
            }
        }
    } else {
        warn!("No NATS URL configured; running HTTP-only, treatment events are not published");
        None
    };

    let publisher = nats.clone().map(TreatmentPublisher::new);
    let service = RecordService::new(db.clone(), publisher);

    // Start the feedback consumer if messaging is up
    let consumer_handle = nats.map(|client| {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let consumer = FeedbackConsumer::new(client, service.clone());
        let handle = tokio::spawn(async move {
            if let Err(e) = consumer.run(shutdown_rx).await {
                error!(error = %e, "Feedback consumer failed");
            }
        });
        (handle, shutdown_tx)
    });

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    let router = careledger::http::router(service);

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET    /health               - Health check");
    info!("  POST   /v1/patients          - Create patient");
    info!("  GET    /v1/patients          - List patients");
    info!("  GET    /v1/patients/{{id}}     - Get patient");
    info!("  PATCH  /v1/patients/{{id}}     - Patch patient");
    info!("  DELETE /v1/patients/{{id}}     - Delete patient");
    info!("  POST   /v1/treatments        - Create treatment");
    info!("  GET    /v1/treatments        - List treatments");
    info!("  GET    /v1/treatments/{{id}}   - Projected treatment view");
    info!("  DELETE /v1/treatments/{{id}}   - Delete treatment");
    info!("Press Ctrl+C to stop.");

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    // Signal the consumer to stop
    if let Some((handle, shutdown_tx)) = consumer_handle {
        let _ = shutdown_tx.send(());
        let _ = handle.await;
    }

    // Print stats before exit
    if let Ok(stats) = db.stats() {
        info!(
            patients = stats.patient_count,
            treatments = stats.treatment_count,
            "Final record stats"
        );
    }

    Ok(())
}
