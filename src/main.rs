use anyhow::Result;
use fulmen::Runtime;
use fulmen::config::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    fulmen::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Fulmen {} starting up", env!("APP_VERSION"));

    let runtime = Runtime::new(config)?;

    // One-shot account linking: `fulmen link <email> <otp>`
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(String::as_str) == Some("link") {
        let (Some(email), Some(otp)) = (args.get(2), args.get(3)) else {
            anyhow::bail!("usage: fulmen link <email> <otp>");
        };
        runtime
            .token_manager()
            .verify_otp(runtime.api(), email, otp)
            .await?;
        info!("Account linked successfully");
        return Ok(());
    }

    runtime.run().await?;
    info!("Shutdown complete");
    Ok(())
}
