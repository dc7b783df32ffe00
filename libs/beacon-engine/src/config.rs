use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;

/// Root configuration, parsed from TOML (or HCL via `beacon-config-hcl`).
#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    /// HTTP collector port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Path of the beacon endpoint the library sends to.
    #[serde(default = "default_beacon_url")]
    pub beacon_url: String,

    /// Store polling interval for count waits.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long a reached count must hold before it is accepted.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    #[serde(default)]
    pub library: LibraryConfig,
}

fn default_api_port() -> u16 {
    9200
}
fn default_beacon_url() -> String {
    "/beacon".into()
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_settle_delay_ms() -> u64 {
    1000
}
fn default_true() -> bool {
    true
}

/// Host capabilities the collector advertises to the query engine.
#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitiesConfig {
    #[serde(default = "default_true")]
    pub navigation_timing: bool,
    #[serde(default = "default_true")]
    pub resource_timing: bool,
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            navigation_timing: true,
            resource_timing: true,
        }
    }
}

/// Expected identity of the instrumented library, checked on every beacon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LibraryConfig {
    pub version: Option<String>,
    pub snippet_version: Option<String>,
    pub snippet_method: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            beacon_url: default_beacon_url(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            capabilities: CapabilitiesConfig::default(),
            library: LibraryConfig::default(),
        }
    }
}

/// Pluggable configuration format, selected by file extension.
pub trait ConfigParser: Send + Sync {
    fn extensions(&self) -> &[&str];

    fn parse(&self, content: &str) -> Result<HarnessConfig, EngineError>;
}

pub struct TomlParser;

impl ConfigParser for TomlParser {
    fn extensions(&self) -> &[&str] {
        &["toml"]
    }

    fn parse(&self, content: &str) -> Result<HarnessConfig, EngineError> {
        HarnessConfig::parse(content)
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self, EngineError> {
        Self::load_with(path, &[&TomlParser])
    }

    /// Load with the first parser claiming the file extension; TOML when none does.
    pub fn load_with(path: &str, parsers: &[&dyn ConfigParser]) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(format!("{path}: {e}")))?;
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let parser = parsers.iter().find(|p| p.extensions().contains(&ext));
        let config = match parser {
            Some(p) => p.parse(&content),
            None => Self::parse(&content),
        };
        config.map_err(|e| e.with_context(path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml_str: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.beacon_url.starts_with('/') {
            return Err(EngineError::Config(format!(
                "beacon_url '{}' must be an absolute path",
                self.beacon_url
            )));
        }
        if self.beacon_url == "/api" || self.beacon_url.starts_with("/api/") {
            return Err(EngineError::Config(format!(
                "beacon_url '{}' collides with the collector's /api routes",
                self.beacon_url
            )));
        }
        if self.beacon_url.contains(['{', '}']) {
            return Err(EngineError::Config(format!(
                "beacon_url '{}' must be a literal path",
                self.beacon_url
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(EngineError::Config("poll_interval_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
