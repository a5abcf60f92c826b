//! TOML configuration.
//!
//! Every table is optional; a missing file section falls back to the
//! defaults below. Without `--config` the CLI uses [`Config::default`].
//!
//! ```toml
//! [session]
//! greeting = true
//! summarize_analysis = true
//!
//! [simulation]
//! analysis_delay_ms = 3000
//! response_delay_ms = 1000
//! response_jitter_ms = 2000
//!
//! [render]
//! format = "text"
//!
//! [logging]
//! level = "info"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Post an assistant greeting when a document is opened.
    #[serde(default = "default_true")]
    pub greeting: bool,
    /// Post a message listing every issue once analysis completes.
    #[serde(default = "default_true")]
    pub summarize_analysis: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: true,
            summarize_analysis: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_analysis_delay")]
    pub analysis_delay_ms: u64,
    #[serde(default = "default_response_delay")]
    pub response_delay_ms: u64,
    /// Upper bound of the random extra delay added to each reply.
    #[serde(default = "default_response_jitter")]
    pub response_jitter_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            analysis_delay_ms: default_analysis_delay(),
            response_delay_ms: default_response_delay(),
            response_jitter_ms: default_response_jitter(),
        }
    }
}

fn default_analysis_delay() -> u64 {
    3000
}
fn default_response_delay() -> u64 {
    1000
}
fn default_response_jitter() -> u64 {
    2000
}

impl SimulationConfig {
    /// No artificial latency. Used by tests and `--fast`.
    pub fn instant() -> Self {
        Self {
            analysis_delay_ms: 0,
            response_delay_ms: 0,
            response_jitter_ms: 0,
        }
    }

    pub fn analysis_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_format() -> String {
    "text".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    pub fn max_level(&self) -> tracing::Level {
        self.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

pub const RENDER_FORMATS: &[&str] = &["text", "html", "json"];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if !RENDER_FORMATS.contains(&config.render.format.as_str()) {
        anyhow::bail!(
            "Unknown render.format: '{}'. Must be text, html, or json.",
            config.render.format
        );
    }

    if config.logging.level.parse::<tracing::Level>().is_err() {
        anyhow::bail!(
            "Unknown logging.level: '{}'. Must be trace, debug, info, warn, or error.",
            config.logging.level
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert!(config.session.greeting);
        assert_eq!(config.simulation.analysis_delay_ms, 3000);
        assert_eq!(config.render.format, "text");
        assert_eq!(config.logging.max_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_partial_tables() {
        let file = write_config(
            "[simulation]\nresponse_delay_ms = 5\n\n[logging]\nlevel = \"debug\"\n",
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.simulation.response_delay_ms, 5);
        assert_eq!(config.simulation.response_jitter_ms, 2000);
        assert_eq!(config.logging.max_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let file = write_config("[render]\nformat = \"pdf\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("render.format"));
    }

    #[test]
    fn test_rejects_unknown_level() {
        let file = write_config("[logging]\nlevel = \"loud\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_config(Path::new("/nonexistent/rvw.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
