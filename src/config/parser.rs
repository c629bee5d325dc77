use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Parses and validates configuration text
///
/// # Arguments
///
/// * `content` - TOML text with `[api]`, `[crawler]`, `[user-agent]` and `[output]` sections
///
/// # Returns
///
/// * `Ok(Config)` - Parsed configuration with defaults applied
/// * `Err(ConfigError)` - Not valid TOML, or a value is out of range
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Loads a configuration file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use rechtspraak_crawler::config::load_config;
///
/// let config = load_config(Path::new("rechtspraak.toml")).unwrap();
/// println!("Page size: {}", config.api.page_size);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    parse_config(&std::fs::read_to_string(path)?)
}

/// Hex-encoded SHA-256 of configuration text
pub fn hash_config(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Computes the hash of a configuration file
///
/// The hash is stored with every crawl run so a run can be traced back to
/// the configuration that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    Ok(hash_config(&std::fs::read_to_string(path)?))
}

/// Loads a configuration file together with the hash of its content
///
/// The file is read once, so the hash always matches the parsed settings.
///
/// # Returns
///
/// * `Ok((Config, String))` - Configuration and its hash
/// * `Err(ConfigError)` - Failed to read, parse or validate the file
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, hash_config(&content)))
}
