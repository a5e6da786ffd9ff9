use flux_logging::LoggingConfig;
use serde::{Deserialize, Serialize};

use crate::relay::{EncoderOverrides, EngineSection, SinkSection};

/// 中继服务全局配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub encoder: EncoderOverrides,
    #[serde(default)]
    pub sink: SinkSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 系统配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "FLUX Media Relay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
