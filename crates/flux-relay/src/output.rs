use flux_logging::{LogLevel, LogSampler};
use std::fmt;
use tracing::{debug, error, info, trace, warn};

const ERROR_TOKENS: &[&str] = &[
    "error",
    "failed",
    "invalid",
    "could not",
    "unable to",
    "no such file",
    "not found",
    "connection refused",
    "broken pipe",
];

const WARNING_TOKENS: &[&str] = &[
    "warning",
    "deprecated",
    "discarding",
    "past duration",
    "non-monotonous",
    "non-monotonic",
    "non monotonically",
    "buffer underflow",
];

const PROGRESS_TOKENS: &[&str] = &["frame=", "fps=", "bitrate=", "speed=", "size=", "time="];

/// 进程输出通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChannel {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputChannel::Stdout => write!(f, "stdout"),
            OutputChannel::Stderr => write!(f, "stderr"),
        }
    }
}

/// 按关键字判断一行输出的日志级别
pub fn classify_line(line: &str, channel: OutputChannel) -> LogLevel {
    let lower = line.to_ascii_lowercase();

    if ERROR_TOKENS.iter().any(|t| lower.contains(t)) {
        LogLevel::Error
    } else if WARNING_TOKENS.iter().any(|t| lower.contains(t)) {
        LogLevel::Warn
    } else if PROGRESS_TOKENS.iter().any(|t| lower.contains(t)) {
        LogLevel::Debug
    } else if channel == OutputChannel::Stderr {
        LogLevel::Info
    } else {
        LogLevel::Debug
    }
}

/// 进程输出日志记录器
///
/// 只做观测，不影响引擎流程。进度行按速率采样，避免刷屏。
pub struct OutputLogger {
    label: String,
    progress_sampler: LogSampler,
}

impl OutputLogger {
    pub fn new(label: impl Into<String>, progress_per_sec: u32) -> Self {
        Self {
            label: label.into(),
            progress_sampler: LogSampler::per_second(progress_per_sec),
        }
    }

    /// 记录一行输出，返回判定的级别
    pub async fn emit(&self, channel: OutputChannel, line: &str) -> LogLevel {
        let line = line.trim_end();
        if line.is_empty() {
            return LogLevel::Trace;
        }

        let level = classify_line(line, channel);
        let label = self.label.as_str();

        match level {
            LogLevel::Error => error!(sink = %label, %channel, "ffmpeg: {}", line),
            LogLevel::Warn => warn!(sink = %label, %channel, "ffmpeg: {}", line),
            LogLevel::Info => info!(sink = %label, %channel, "ffmpeg: {}", line),
            LogLevel::Debug if is_progress(line) => {
                if self.progress_sampler.should_sample(LogLevel::Debug).await {
                    let suppressed = self.progress_sampler.take_suppressed();
                    debug!(sink = %label, suppressed, "ffmpeg progress: {}", line);
                }
            }
            LogLevel::Debug => debug!(sink = %label, %channel, "ffmpeg: {}", line),
            LogLevel::Trace => trace!(sink = %label, %channel, "ffmpeg: {}", line),
        }

        level
    }
}

fn is_progress(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    PROGRESS_TOKENS.iter().any(|t| lower.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_lines() {
        let level = classify_line(
            "rtmp://ingest.example.com/live/key: Connection refused",
            OutputChannel::Stderr,
        );
        assert_eq!(level, LogLevel::Error);

        let level = classify_line("/srv/a.mp4: No such file or directory", OutputChannel::Stderr);
        assert_eq!(level, LogLevel::Error);
    }

    #[test]
    fn test_warning_lines() {
        let level = classify_line(
            "[flv @ 0x55] Non-monotonous DTS; Non-monotonically increasing dts",
            OutputChannel::Stderr,
        );
        assert_eq!(level, LogLevel::Warn);
    }

    #[test]
    fn test_progress_lines() {
        let line = "frame= 1200 fps= 30 q=23.0 size=   10240kB time=00:00:40.00 bitrate=2097.2kbits/s speed=1x";
        assert_eq!(classify_line(line, OutputChannel::Stderr), LogLevel::Debug);
        assert!(is_progress(line));
    }

    #[test]
    fn test_other_lines_by_channel() {
        let line = "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'a.mp4':";
        assert_eq!(classify_line(line, OutputChannel::Stderr), LogLevel::Info);
        assert_eq!(classify_line(line, OutputChannel::Stdout), LogLevel::Debug);
    }

    #[tokio::test]
    async fn test_emit_returns_level() {
        let logger = OutputLogger::new("Ingest", 1);

        assert_eq!(logger.emit(OutputChannel::Stderr, "Conversion failed!").await, LogLevel::Error);
        assert_eq!(logger.emit(OutputChannel::Stderr, "   ").await, LogLevel::Trace);
        assert_eq!(
            logger.emit(OutputChannel::Stderr, "frame=1 fps=0.0 speed=0x").await,
            LogLevel::Debug
        );
    }
}
