//! Configuration file support for scholar-fetch.
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! user_agent = "Mozilla/5.0 ..."
//! accept_language = "en-US,en;q=0.9"
//! request_timeout_secs = 30
//!
//! [downloads]
//! directory = "./downloads"
//! min_pdf_bytes = 1024
//! min_mirror_pdf_bytes = 10000
//! inter_attempt_delay_ms = 2000
//!
//! [mirrors]
//! download = ["https://sci-hub.se", "https://sci-hub.ru"]
//! search = ["https://sci-hub.se"]
//!
//! [sources]
//! max_results = 20
//! semantic_timeout_secs = 5
//! ```

use std::path::Path;

use super::Config;

/// Errors writing a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("config file {0} already exists")]
    AlreadyExists(String),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render the default configuration as TOML
pub fn render_default_config() -> Result<String, ConfigFileError> {
    Ok(toml::to_string_pretty(&Config::default())?)
}

/// Write the default configuration to `path`, creating parent directories.
///
/// An existing file is only replaced when `overwrite` is set.
pub fn write_default_config(path: &Path, overwrite: bool) -> Result<(), ConfigFileError> {
    if path.exists() && !overwrite {
        return Err(ConfigFileError::AlreadyExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_default_config()?)?;
    Ok(())
}
