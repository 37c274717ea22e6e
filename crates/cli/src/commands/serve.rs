//! `edubridge serve`: start the HTTP gateway.

use edubridge_config::AppConfig;
use tracing::warn;

pub async fn run(port: Option<u16>, host: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    if config.server.bearer_tokens.is_empty() {
        warn!("server.bearer_tokens is empty; /invocations and /mcp will refuse every request");
    }

    println!("EduBridge Gateway");
    println!("   Listening: {}:{}", config.server.host, config.server.port);
    println!("   Runtime:   {}", config.runtime.mode);
    println!("   Model:     {}", config.model.model_id);

    edubridge_gateway::start(config).await?;

    Ok(())
}
