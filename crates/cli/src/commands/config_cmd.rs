//! `edubridge config`: configuration management commands.

use edubridge_config::AppConfig;
use std::path::{Path, PathBuf};

fn default_path() -> PathBuf {
    std::env::var("EDUBRIDGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| AppConfig::config_dir().join("config.toml"))
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   Model:      {} @ {}", config.model.model_id, config.model.provider_url);
    println!("   Memory:     {}", config.memory.backend);
    println!("   Directory:  {}", config.directory.backend);
    println!("   Runtime:    {}", config.runtime.mode);
    println!("   Tool gateway: {}", if config.gateway.enabled { "enabled" } else { "disabled" });
    println!("   Server:     {}:{}", config.server.host, config.server.port);
    Ok(())
}

/// Settings that load fine but will fail at first use.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut out = Vec::new();
    if config.runtime.mode == "local" && config.model.api_key.is_none() {
        out.push("No model API key set (model.api_key, EDUBRIDGE_API_KEY or OPENAI_API_KEY)");
    }
    if config.whatsapp.phone_number_id.is_none() || config.whatsapp.access_token.is_none() {
        out.push("WhatsApp phone_number_id/access_token missing; `serve` will refuse to start");
    }
    if config.server.bearer_tokens.is_empty() {
        out.push("server.bearer_tokens is empty; /invocations and /mcp refuse every request");
    }
    if config.whatsapp.app_secret.is_none() {
        out.push("whatsapp.app_secret not set; webhook signatures are not checked");
    }
    if config.memory.backend == "managed" && config.memory.endpoint.is_none() {
        out.push("memory.endpoint is required for the managed backend");
    }
    if config.directory.backend == "http" && config.directory.endpoint.is_none() {
        out.push("directory.endpoint is required for the http backend");
    }
    out
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub fn path() {
    println!("{}", default_path().display());
}

pub fn init(path: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(default_path);
    write_default(&path, force)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn init_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_default(&path, false).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.server.port, 8080);

        assert!(write_default(&path, false).is_err());
        assert!(write_default(&path, true).is_ok());
    }

    #[test]
    fn default_config_warns_about_missing_credentials() {
        let w = warnings(&AppConfig::default());
        assert!(w.iter().any(|w| w.contains("WhatsApp")));
        assert!(w.iter().any(|w| w.contains("bearer_tokens")));
    }
}
