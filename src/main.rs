use fuel_price_service::{init_tracing, run, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = AppConfig::from_env()?;
    run(config).await?;
    Ok(())
}
