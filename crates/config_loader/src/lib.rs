//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate node table, trigger and sink routing
//! - Generate `DaqBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("evb.toml")).unwrap();
//! println!("nodes: {}", blueprint.nodes.len());
//! ```

mod parser;
mod validator;

pub use contracts::DaqBlueprint;
pub use parser::ConfigFormat;
pub use validator::MAX_NODES;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Detects the format from the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<DaqBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load and validate configuration from a string
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<DaqBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    /// Run validation on an already constructed blueprint
    pub fn validate(blueprint: &DaqBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize DaqBlueprint to TOML string
    pub fn to_toml(blueprint: &DaqBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize DaqBlueprint to JSON string
    pub fn to_json(blueprint: &DaqBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[[nodes]]
id = 0x5555
name = "trigger"
trigger = true
window_width = 4

[[nodes]]
id = 0xaaaa
name = "tdc"
window_width = 4

[[nodes]]
id = 0xbbbb
name = "adc"
window_width = 4
offset = 2

[correlator]
prune_threshold_ms = 500

[output]
max_event_bytes = 4096

[[sinks]]
name = "log_sink"
sink_type = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.nodes.len(), 3);
        assert_eq!(bp.trigger_node().map(|n| n.id), Some(0x5555));
        assert_eq!(bp.correlator.prune_threshold_ms, 500);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.node_ids(), bp2.node_ids());
        assert_eq!(bp2.nodes[2].offset, Some(2));
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.output.max_event_bytes, bp2.output.max_event_bytes);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = MINIMAL_TOML.replace("name = \"adc\"", "name = \"tdc\"");
        let err = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("duplicate"), "got: {err}");
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();
        let bp = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(bp.sinks[0].name, "log_sink");

        let err = ConfigLoader::load_from_path(Path::new("evb.yaml")).unwrap_err();
        assert!(err.to_string().contains(".yaml"), "got: {err}");
    }
}
