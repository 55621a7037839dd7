//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Streaming configuration: the paired transport wrapper tokens
/// stripped from accumulated assistant content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Opening wrapper token (default: `<|im_start|>`)
    #[serde(default = "default_start_marker")]
    pub start_marker: String,

    /// Closing wrapper token (default: `<|im_end|>`)
    #[serde(default = "default_end_marker")]
    pub end_marker: String,
}

fn default_start_marker() -> String {
    "<|im_start|>".to_string()
}

fn default_end_marker() -> String {
    "<|im_end|>".to_string()
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            start_marker: default_start_marker(),
            end_marker: default_end_marker(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Streaming configuration
    #[serde(default)]
    pub stream: StreamConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_config_default() {
        let config = StreamConfig::default();
        assert_eq!(config.start_marker, "<|im_start|>");
        assert_eq!(config.end_marker, "<|im_end|>");
    }

    #[test]
    fn test_engine_config_from_empty_json() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.stream.start_marker, "<|im_start|>");
    }

    #[test]
    fn test_engine_config_partial_override() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"stream": {"start_marker": "<<begin>>"}}"#).unwrap();
        assert_eq!(config.stream.start_marker, "<<begin>>");
        assert_eq!(config.stream.end_marker, "<|im_end|>");
    }
}
