use crate::level::LogLevel;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// 日志采样器（按时间窗口限速）
///
/// 警告及以上级别不参与采样，始终放行。
pub struct LogSampler {
    max_per_window: u32,
    window: Duration,
    counter: AtomicU64,
    suppressed: AtomicU64,
    window_start: RwLock<Instant>,
}

impl LogSampler {
    /// 每个窗口最多放行 `max_per_window` 条
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            counter: AtomicU64::new(0),
            suppressed: AtomicU64::new(0),
            window_start: RwLock::new(Instant::now()),
        }
    }

    /// 每秒最多 N 条
    pub fn per_second(max: u32) -> Self {
        Self::new(max, Duration::from_secs(1))
    }

    /// 判断是否应该记录
    pub async fn should_sample(&self, level: LogLevel) -> bool {
        if level >= LogLevel::Warn {
            return true;
        }

        let keep = self.check_rate_limit().await;
        if !keep {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
        keep
    }

    async fn check_rate_limit(&self) -> bool {
        let now = Instant::now();
        let mut window_start = self.window_start.write().await;

        if now.duration_since(*window_start) >= self.window {
            self.counter.store(0, Ordering::Relaxed);
            *window_start = now;
        }

        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        count < u64::from(self.max_per_window)
    }

    /// 取出并清零被丢弃的条数
    pub fn take_suppressed(&self) -> u64 {
        self.suppressed.swap(0, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limit_within_window() {
        let sampler = LogSampler::new(10, Duration::from_secs(3600));

        let mut sampled = 0;
        for _ in 0..20 {
            if sampler.should_sample(LogLevel::Debug).await {
                sampled += 1;
            }
        }

        assert_eq!(sampled, 10);
        assert_eq!(sampler.take_suppressed(), 10);
        assert_eq!(sampler.take_suppressed(), 0);
    }

    #[tokio::test]
    async fn test_warnings_bypass_limit() {
        let sampler = LogSampler::new(0, Duration::from_secs(3600));

        assert!(!sampler.should_sample(LogLevel::Debug).await);
        assert!(!sampler.should_sample(LogLevel::Info).await);
        assert!(sampler.should_sample(LogLevel::Warn).await);
        assert!(sampler.should_sample(LogLevel::Error).await);
        assert_eq!(sampler.take_suppressed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets() {
        let sampler = LogSampler::per_second(2);

        assert!(sampler.should_sample(LogLevel::Debug).await);
        assert!(sampler.should_sample(LogLevel::Debug).await);
        assert!(!sampler.should_sample(LogLevel::Debug).await);

        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(sampler.should_sample(LogLevel::Debug).await);
        assert_eq!(sampler.take_suppressed(), 1);
    }
}
