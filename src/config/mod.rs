// Configuration module for cardlink
// Handles loading and managing networking configuration from TOML file

pub mod loader;
pub mod types;

pub use loader::{create_default_config, get_config_path, load_config};
pub use types::{Config, LobbyConfig, SignalingConfig};
