use std::net::SocketAddr;

use anyhow::Context;

use lessonbay_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    lessonbay_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = lessonbay_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
