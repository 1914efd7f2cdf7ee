use anyhow::{Context, Result};
use beamline_server::transport::RtcTransport;
use beamline_server::{config::Config, create_app};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beamline_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Beamline server...");

    // Load configuration
    let config = Config::load()?;

    let transport = RtcTransport::new(&config.stun_servers)
        .context("Failed to initialise WebRTC transport")?;

    let (app, room) = create_app(config.clone(), transport);
    let addr: SocketAddr = config
        .bind_address
        .parse()
        .with_context(|| format!("Invalid BIND_ADDRESS '{}'", config.bind_address))?;

    let server = async {
        if let Some((cert, key)) = config.tls_paths() {
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key)
                .await
                .context("Failed to load TLS certificate")?;
            tracing::info!("Serving at https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        } else {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("Serving at http://{}", addr);
            axum::serve(listener, app).await?;
        }
        anyhow::Ok(())
    };

    // A room failure under the fatal policy takes the whole process down
    tokio::select! {
        result = server => result,
        result = room => {
            match result.context("Room task panicked")? {
                Ok(()) => {
                    tracing::info!("Room stopped");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Room failed: {}", e);
                    Err(e.into())
                }
            }
        }
    }
}
