// Configuration file loading and creation

use super::types::Config;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Get the path to the configuration file
pub fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("cardlink");

    // Create config directory if it doesn't exist
    fs::create_dir_all(&path).ok();

    path.push("config.toml");
    path
}

/// Load configuration from file, or create default if it doesn't exist
pub fn load_config() -> Result<Config, io::Error> {
    let config_path = get_config_path();

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                warn!("failed to parse config file, using defaults: {}", e);
                Ok(Config::default())
            }
        }
    } else {
        // Create default config file
        create_default_config(&config_path)?;
        Ok(Config::default())
    }
}

/// Create a default configuration file with helpful comments
pub fn create_default_config(path: &Path) -> Result<(), io::Error> {
    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    // Add helpful header comments
    let commented_toml = format!(
        "# cardlink Configuration File\n\
         # Edit this file to customize networking behavior\n\
         # After editing, restart the client for changes to take effect\n\
         #\n\
         # relay_url: base URL of the signaling relay\n\
         # poll_interval_ms: how often the handshake polls the relay\n\
         # default_format: \"standard\", \"commander\", or \"draft\"\n\n\
         {}",
        toml_string
    );

    fs::write(path, commented_toml)?;
    info!("created default config file at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        // Should round-trip cleanly — parsed values must match the original defaults
        let parsed: Config = toml::from_str(&toml_string).unwrap();

        assert_eq!(parsed.signaling.relay_url, config.signaling.relay_url);
        assert_eq!(
            parsed.signaling.poll_interval_ms,
            config.signaling.poll_interval_ms
        );
        assert_eq!(parsed.lobby.max_players, config.lobby.max_players);
        assert_eq!(parsed.lobby.default_format, config.lobby.default_format);
    }

    #[test]
    fn test_partial_config_with_defaults() {
        // Should be able to parse partial config with #[serde(default)]
        let partial_toml = r#"
            [signaling]
            relay_url = "https://relay.example.net"
            poll_interval_ms = 250
            session_ttl_secs = 60
        "#;

        let config: Config = toml::from_str(partial_toml).unwrap();

        // Custom values
        assert_eq!(config.signaling.relay_url, "https://relay.example.net");
        assert_eq!(config.signaling.poll_interval_ms, 250);

        // Default values should still be there
        assert_eq!(config.lobby.max_players, 4);
        assert_eq!(config.lobby.min_players, 2);
    }
}
