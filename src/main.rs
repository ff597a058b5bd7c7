use std::{net::SocketAddr, sync::Arc};

use resonode::{
    audio::{FfmpegDecoder, FfmpegPipeline},
    common::{
        AnyResult,
        banner::{BannerInfo, print_banner},
        logger,
    },
    configs::Config,
    monitoring::PlayerMetrics,
    player::PlayerServices,
    server::AppState,
    sources::SourceManager,
    transport,
    voice::DryConnector,
};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    print_banner(&BannerInfo::default());
    let config = Arc::new(Config::load()?);
    logger::init(config.logging.as_ref());

    let services = PlayerServices {
        resolver: Arc::new(SourceManager::new(&config.sources)?),
        pipeline: Arc::new(FfmpegPipeline::new(
            config.filters.clone(),
            config.sources.user_agent.clone(),
        )),
        connector: Arc::new(DryConnector::new(Arc::new(FfmpegDecoder::new(
            config.filters.ffmpeg_path.clone(),
        )))),
        metrics: PlayerMetrics::new()?,
        config: config.clone(),
    };
    info!(
        "Sources: {}",
        services.resolver.source_names().join(", ")
    );

    let state = Arc::new(AppState::new(services));
    let app = transport::http_server::router(state).layer(TraceLayer::new_for_http());

    let address: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(address).await?;
    info!("resonode v{} listening on {}", env!("CARGO_PKG_VERSION"), address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
