use realm::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env();
    init_logging(&config.log_filter)?;

    if config.is_dev_jwt_secret() {
        tracing::warn!("REALM_JWT_SECRET not set, using the development secret");
    }

    let verifier = JwtVerifier::new(&config.jwt_secret)?;
    let server = RealmServerBuilder::from_config(&config)
        .build(verifier)
        .await?;

    tracing::info!(
        addr = %server.local_addr()?,
        idle_threshold_secs = config.idle_threshold.as_secs(),
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "starting presence server"
    );

    server.run_until(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
