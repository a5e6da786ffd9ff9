use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 连续失败上限，超过后强制停止
    pub max_retries: u32,
    /// 基础延迟，第 N 次重试等待 N 倍
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// 进程退出后的下一步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 直接播放下一个源
    Continue,
    /// 等待后播放下一个源
    Backoff(Duration),
    /// 超过上限，停止引擎
    GiveUp,
}

/// 连续失败计数器
#[derive(Debug, Clone)]
pub struct RetryTracker {
    policy: RetryPolicy,
    count: u32,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, count: 0 }
    }

    /// 记录一次进程结果并给出决策
    pub fn record(&mut self, success: bool) -> RetryDecision {
        if success {
            self.count = 0;
            return RetryDecision::Continue;
        }

        self.count += 1;
        if self.count <= self.policy.max_retries {
            RetryDecision::Backoff(self.policy.delay_for(self.count))
        } else {
            RetryDecision::GiveUp
        }
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

}

/// 健康状态（按需计算，不缓存）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Warning,
    Error,
}

impl Health {
    pub fn derive(active: bool, retry_count: u32) -> Self {
        if !active {
            Health::Error
        } else if retry_count > 1 {
            Health::Warning
        } else {
            Health::Healthy
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => write!(f, "healthy"),
            Health::Warning => write!(f, "warning"),
            Health::Error => write!(f, "error"),
        }
    }
}
