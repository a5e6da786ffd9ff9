use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 引擎运行配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    /// FFmpeg 可执行文件路径
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// 占位视频（队列为空时播放）
    #[serde(default = "default_placeholder_path")]
    pub placeholder_path: PathBuf,

    /// 队列播放完毕后是否循环
    #[serde(default = "default_true")]
    pub loop_queue: bool,

    /// 连续失败上限
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 重试基础延迟（毫秒），第 N 次重试等待 N 倍
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// 停止时等待进程退出的宽限期（毫秒）
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// restart 时 stop 与 start 之间的停顿（毫秒）
    #[serde(default = "default_restart_pause_ms")]
    pub restart_pause_ms: u64,

    /// 每秒最多输出的进度日志条数
    #[serde(default = "default_progress_logs_per_sec")]
    pub progress_logs_per_sec: u32,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            placeholder_path: default_placeholder_path(),
            loop_queue: true,
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            restart_pause_ms: default_restart_pause_ms(),
            progress_logs_per_sec: default_progress_logs_per_sec(),
        }
    }
}

/// 编码预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    UltraFast,
    SuperFast,
    #[default]
    VeryFast,
    Faster,
    Fast,
    Medium,
    Slow,
}

impl Preset {
    pub fn as_str(&self) -> &str {
        match self {
            Preset::UltraFast => "ultrafast",
            Preset::SuperFast => "superfast",
            Preset::VeryFast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
        }
    }
}

/// 编码参数覆盖项（未设置的字段沿用当前值）
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct EncoderOverrides {
    /// 分辨率，格式 "1280x720"
    #[serde(default)]
    pub resolution: Option<String>,

    #[serde(default)]
    pub framerate: Option<u32>,

    /// 视频码率，格式 "2500k"
    #[serde(default)]
    pub video_bitrate: Option<String>,

    /// 音频码率，格式 "128k"
    #[serde(default)]
    pub audio_bitrate: Option<String>,

    #[serde(default)]
    pub video_codec: Option<String>,

    #[serde(default)]
    pub audio_codec: Option<String>,

    #[serde(default)]
    pub preset: Option<Preset>,
}

impl EncoderOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// 推流目标配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkSection {
    /// 显示名称（仅用于日志）
    #[serde(default = "default_sink_name")]
    pub name: String,

    /// 主推流地址（不含串流密钥）
    #[serde(default = "default_sink_url")]
    pub url: String,

    /// 备用推流地址
    #[serde(default)]
    pub backup_url: Option<String>,

    #[serde(default)]
    pub stream_key: Option<String>,

    /// 连续失败多少次后切换到备用地址
    #[serde(default = "default_failover_after")]
    pub failover_after: u32,

    /// 同时推送到主备地址
    #[serde(default)]
    pub mirror: bool,
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            name: default_sink_name(),
            url: default_sink_url(),
            backup_url: None,
            stream_key: None,
            failover_after: default_failover_after(),
            mirror: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_placeholder_path() -> PathBuf {
    PathBuf::from("./media/placeholder.mp4")
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    2000
}

fn default_stop_grace_ms() -> u64 {
    5000
}

fn default_restart_pause_ms() -> u64 {
    2000
}

fn default_progress_logs_per_sec() -> u32 {
    1
}

fn default_sink_name() -> String {
    "RTMP".to_string()
}

fn default_sink_url() -> String {
    "rtmp://localhost:1935/live".to_string()
}

fn default_failover_after() -> u32 {
    2
}
