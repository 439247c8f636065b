//! Capbridge development node
//!
//! Runs the bridge engine against the in-memory source platform and
//! protocol gateway, seeded with a few sample devices, and serves the
//! management API. Enabled devices persist in a SQLite database.

use capbridge_api::{server, AppState};
use capbridge_engine::test_utils::{
    color_light, dimmable_light, on_off_light, unsupported_device, MockGateway,
    MockGatewayFactory, MockSourcePlatform,
};
use capbridge_engine::{BridgeConfigBuilder, BridgeManager};
use capbridge_state::SqliteSettings;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "capbridge-node")]
#[command(about = "Capability bridge development node", long_about = None)]
struct Args {
    /// Management API port
    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    /// Protocol server port
    #[arg(long, default_value_t = 5540)]
    port: u16,

    /// Node identity, usually the hub id
    #[arg(long, default_value = "capbridge-dev")]
    unique_id: String,

    /// Advertised bridge name
    #[arg(long, short, default_value = "Homey Matter Bridge")]
    name: String,

    /// Settings database path
    #[arg(long, default_value = "capbridge.db")]
    db: String,

    /// Bound on each call into the platform or gateway (e.g. "10s")
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    timeout: Duration,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting capability bridge: {}", args.name);

    let config = BridgeConfigBuilder::new()
        .unique_id(args.unique_id.clone())
        .device_name(args.name.clone())
        .port(args.port)
        .operation_timeout(args.timeout)
        .build();
    config.validate()?;

    // Initialize settings store
    let settings = Arc::new(SqliteSettings::new(&args.db).await?);
    info!("Settings database initialized: {}", args.db);

    // Simulated platform with a few devices
    let platform = Arc::new(MockSourcePlatform::new());
    platform.add_device(dimmable_light("lamp-1", true, 0.5));
    platform.add_device(on_off_light("lamp-2", false));
    platform.add_device(color_light("strip-1"));
    platform.add_device(unsupported_device("speaker-1"));

    let gateway = Arc::new(MockGateway::new());
    let factory = Arc::new(MockGatewayFactory::new(gateway));

    let bridge = Arc::new(BridgeManager::new(config, platform, factory, settings.clone()));
    bridge.start().await?;

    let state = bridge.get_state();
    info!(
        qr = state.qr_pairing_code.as_deref().unwrap_or("-"),
        manual = state.manual_pairing_code.as_deref().unwrap_or("-"),
        "Bridge ready for commissioning"
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.http_port)).await?;
    let actual_port = listener.local_addr()?.port();
    info!("═══════════════════════════════════════════════════════════");
    info!("  Management API listening on http://127.0.0.1:{}", actual_port);
    info!("  REST API: http://127.0.0.1:{}/api/", actual_port);
    info!("═══════════════════════════════════════════════════════════");

    let app = server::create_router(Arc::new(AppState::new(bridge.clone())));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down");
    bridge.shutdown().await?;
    settings.close().await;
    Ok(())
}
