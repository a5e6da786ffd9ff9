use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};

use crate::RelayConfig;

const DEFAULT_ENV_PREFIX: &str = "FLUX_RELAY";

/// 配置加载器
///
/// 读取 TOML 配置文件，再叠加 `FLUX_RELAY__<SECTION>__<KEY>` 形式的环境变量。
pub struct ConfigLoader {
    config_path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_path: P) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 加载配置（文件不存在时使用默认值）
    pub fn load(&self) -> Result<RelayConfig> {
        let mut builder = Config::builder();

        if self.config_path.exists() {
            let path = self
                .config_path
                .to_str()
                .ok_or_else(|| anyhow!("Invalid config path"))?;
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read {}", self.config_path.display()))?;

        let relay: RelayConfig = config
            .try_deserialize()
            .with_context(|| format!("Failed to parse {}", self.config_path.display()))?;

        Self::validate(&relay)?;
        Ok(relay)
    }

    /// 验证配置
    pub fn validate(config: &RelayConfig) -> Result<()> {
        let engine = &config.engine;

        if engine.retry_base_delay_ms == 0 {
            return Err(anyhow!("engine.retry_base_delay_ms must be greater than 0"));
        }

        if engine.stop_grace_ms == 0 {
            return Err(anyhow!("engine.stop_grace_ms must be greater than 0"));
        }

        if engine.ffmpeg_path.as_os_str().is_empty() {
            return Err(anyhow!("engine.ffmpeg_path must not be empty"));
        }

        if config.sink.url.trim().is_empty() {
            return Err(anyhow!("sink.url must not be empty"));
        }

        if config.sink.mirror && config.sink.backup_url.is_none() {
            return Err(anyhow!("sink.mirror requires sink.backup_url"));
        }

        Ok(())
    }
}
