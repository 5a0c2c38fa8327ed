use std::sync::Arc;

use appointment_desk::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let service = Arc::new(appointment_desk::build_service(&cfg));

    tracing::info!(
        data_file = %cfg.data_file.display(),
        today = %service.today(),
        simulated = service.is_simulation(),
        "appointment service started"
    );
    let swept = service.sweep().await;
    if swept > 0 {
        tracing::info!("startup sweep cancelled {swept} past appointments");
    }

    let app = appointment_desk::app(service);

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
