//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, DaqBlueprint};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

fn parse_error<E>(format: &str, e: E) -> ContractError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ContractError::ConfigParse {
        message: format!("{format} parse error: {e}"),
        source: Some(Box::new(e)),
    }
}

/// 根据格式解析配置 (不做校验)
pub fn parse(content: &str, format: ConfigFormat) -> Result<DaqBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error("TOML", e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error("JSON", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ByteOrder, SinkType};

    #[test]
    fn test_parse_toml_defaults() {
        let content = r#"
[[nodes]]
id = 0x5555
name = "trigger"
trigger = true

[[nodes]]
id = 0xaaaa
name = "tdc"
window_width = 25
offset = -4
"#;
        let bp = parse(content, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.nodes.len(), 2);
        assert_eq!(bp.nodes[0].window_width, 10);
        assert_eq!(bp.nodes[1].offset, Some(-4));
        assert_eq!(bp.correlator.prune_threshold_ms, 2000);
        assert_eq!(bp.output.max_event_bytes, 64 * 1024);
        assert_eq!(bp.source.byte_order, ByteOrder::Little);
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_json() {
        let content = r#"{
            "nodes": [
                { "id": 1, "name": "trig", "trigger": true },
                { "id": 2, "name": "adc" }
            ],
            "source": { "byte_order": "big", "jitter_ticks": 3 },
            "sinks": [{ "name": "log", "sink_type": "log" }]
        }"#;
        let bp = parse(content, ConfigFormat::Json).unwrap();
        assert_eq!(bp.source.byte_order, ByteOrder::Big);
        assert_eq!(bp.source.jitter_ticks, 3);
        assert_eq!(bp.sinks[0].sink_type, SinkType::Log);
        assert_eq!(bp.sinks[0].queue_capacity, 100);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse("invalid toml [[[", ConfigFormat::Toml);
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
