/**
 * xfpad Server Entry Point
 *
 * Loads configuration, opens storage and serves the pad socket and HTTP
 * routes until Ctrl-C.
 */

#[cfg(feature = "ssr")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::net::SocketAddr;
    use tracing_subscriber::EnvFilter;
    use xfpad::backend::server::{build_app, create_engine};
    use xfpad::shared::AppConfig;

    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = AppConfig::load()?;
    let addr: SocketAddr = format!("{}:{}", config.ip, config.port).parse()?;
    tracing::info!("[Server] Storage backend: {:?}", config.db_type);

    let engine = create_engine(config).await?;
    let app = build_app(engine.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[Server] Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("[Server] Shutdown requested");
        // Upgraded sockets are not tracked by axum; close them through the hub.
        engine.shutdown().await;
    })
    .await?;

    Ok(())
}

#[cfg(not(feature = "ssr"))]
fn main() {
    eprintln!("Server requires the 'ssr' feature to be enabled.");
    eprintln!("Run with: cargo run --bin xfpad-server --features ssr");
    std::process::exit(1);
}
