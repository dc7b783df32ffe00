use beacon_engine::config::{ConfigParser, HarnessConfig};
use beacon_engine::error::EngineError;

/// `.hcl` harness configuration.
pub struct HclParser;

impl ConfigParser for HclParser {
    fn extensions(&self) -> &[&str] {
        &["hcl"]
    }

    fn parse(&self, content: &str) -> Result<HarnessConfig, EngineError> {
        let config: HarnessConfig =
            hcl::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
