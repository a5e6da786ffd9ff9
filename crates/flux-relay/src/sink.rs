use crate::command::tee_output;
use crate::error::{RelayError, Result};
use crate::source::Source;
use flux_config::SinkSection;

/// 生成推流参数时可用的上下文
#[derive(Debug, Clone, Copy)]
pub struct SinkContext<'a> {
    /// 即将播放的视频源
    pub source: &'a Source,
    /// 当前连续失败次数（用于主备切换）
    pub retry_count: u32,
}

/// 推流目标适配器
///
/// 引擎只通过这个接口区分不同的推流目的地。
pub trait SinkAdapter: Send + Sync {
    /// 显示名称（仅用于日志）
    fn display_name(&self) -> &str;

    /// 追加到命令行末尾的推流参数
    fn sink_arguments(&self, ctx: &SinkContext<'_>) -> Result<Vec<String>>;
}

/// 通用 RTMP/RTMPS 推流目标
#[derive(Debug, Clone)]
pub struct RtmpSink {
    name: String,
    primary: String,
    backup: Option<String>,
    stream_key: Option<String>,
    failover_after: u32,
    mirror: bool,
}

impl RtmpSink {
    pub fn new(name: impl Into<String>, primary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: primary.into(),
            backup: None,
            stream_key: None,
            failover_after: 2,
            mirror: false,
        }
    }

    pub fn from_config(config: &SinkSection) -> Self {
        Self {
            name: config.name.clone(),
            primary: config.url.clone(),
            backup: config.backup_url.clone(),
            stream_key: config.stream_key.clone(),
            failover_after: config.failover_after,
            mirror: config.mirror,
        }
    }

    pub fn with_stream_key(mut self, key: impl Into<String>) -> Self {
        self.stream_key = Some(key.into());
        self
    }

    pub fn with_backup(mut self, url: impl Into<String>, failover_after: u32) -> Self {
        self.backup = Some(url.into());
        self.failover_after = failover_after;
        self
    }

    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    /// 拼接完整推流地址；未配置密钥时地址本身即为完整地址
    fn address(&self, base: &str) -> Result<String> {
        let base = base.trim();
        if !(base.starts_with("rtmp://") || base.starts_with("rtmps://")) {
            return Err(RelayError::Sink(format!(
                "{}: unsupported ingest address '{}'",
                self.name, base
            )));
        }

        match self.stream_key.as_deref().map(str::trim) {
            Some("") => Err(RelayError::Sink(format!("{}: stream key is empty", self.name))),
            Some(key) => Ok(format!("{}/{}", base.trim_end_matches('/'), key)),
            None => Ok(base.to_string()),
        }
    }

    /// 按当前失败次数选择推流地址
    fn select_addresses(&self, retry_count: u32) -> Result<Vec<String>> {
        let primary = self.address(&self.primary)?;

        let Some(backup) = &self.backup else {
            return Ok(vec![primary]);
        };
        let backup = self.address(backup)?;

        if self.mirror {
            Ok(vec![primary, backup])
        } else if retry_count >= self.failover_after {
            Ok(vec![backup])
        } else {
            Ok(vec![primary])
        }
    }
}

impl SinkAdapter for RtmpSink {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn sink_arguments(&self, ctx: &SinkContext<'_>) -> Result<Vec<String>> {
        let addresses = self.select_addresses(ctx.retry_count)?;
        Ok(tee_output(&addresses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(sink: &RtmpSink, retry_count: u32) -> Result<Vec<String>> {
        let source = Source::classify("https://cdn.example.com/a.mp4");
        sink.sink_arguments(&SinkContext {
            source: &source,
            retry_count,
        })
    }

    #[test]
    fn test_primary_address_with_key() {
        let sink = RtmpSink::new("Ingest", "rtmp://a.example.com/live2/").with_stream_key("key-1");
        let args = args_for(&sink, 0).unwrap();

        assert_eq!(args, vec!["-f", "flv", "rtmp://a.example.com/live2/key-1"]);
        assert_eq!(sink.display_name(), "Ingest");
    }

    #[test]
    fn test_failover_to_backup() {
        let sink = RtmpSink::new("Ingest", "rtmp://a.example.com/live")
            .with_stream_key("k")
            .with_backup("rtmp://b.example.com/live", 2);

        assert_eq!(args_for(&sink, 1).unwrap().last().unwrap(), "rtmp://a.example.com/live/k");
        assert_eq!(args_for(&sink, 2).unwrap().last().unwrap(), "rtmp://b.example.com/live/k");
    }

    #[test]
    fn test_mirror_uses_tee() {
        let sink = RtmpSink::new("Ingest", "rtmp://a.example.com/live")
            .with_backup("rtmps://b.example.com/live", 2)
            .with_mirror(true);

        let args = args_for(&sink, 0).unwrap();
        assert!(args.contains(&"tee".to_string()));
        assert!(args.last().unwrap().contains("rtmps://b.example.com/live"));
    }

    #[test]
    fn test_invalid_sink_addresses() {
        let sink = RtmpSink::new("Ingest", "http://a.example.com/live");
        assert!(matches!(args_for(&sink, 0), Err(RelayError::Sink(_))));

        let sink = RtmpSink::new("Ingest", "rtmp://a.example.com/live").with_stream_key("  ");
        assert!(matches!(args_for(&sink, 0), Err(RelayError::Sink(_))));
    }

    #[test]
    fn test_from_config() {
        let section = SinkSection {
            name: "Backup ready".to_string(),
            url: "rtmp://a.example.com/live".to_string(),
            backup_url: Some("rtmp://b.example.com/live".to_string()),
            stream_key: Some("abc".to_string()),
            failover_after: 1,
            mirror: false,
        };
        let sink = RtmpSink::from_config(&section);

        assert_eq!(args_for(&sink, 1).unwrap().last().unwrap(), "rtmp://b.example.com/live/abc");
    }
}
