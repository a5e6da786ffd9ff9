use crate::retry::Health;
use crate::source::Source;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 引擎状态快照（只读）
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub active: bool,
    pub display_name: String,
    pub current_source: Option<Source>,
    /// 持久队列长度
    pub queue_depth: usize,
    /// 当前播放周期剩余数量
    pub active_remaining: usize,
    pub total_played: u64,
    pub retry_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
    pub health: Health,
}

impl EngineStatus {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_json() {
        let status = EngineStatus {
            active: true,
            display_name: "Ingest".to_string(),
            current_source: Some(Source::classify("rtmp://origin.example.com/live/a")),
            queue_depth: 2,
            active_remaining: 1,
            total_played: 1,
            retry_count: 0,
            started_at: Some(Utc::now()),
            uptime_secs: 12,
            health: Health::Healthy,
        };

        let json = status.to_json().unwrap();
        assert!(json.contains("\"health\":\"healthy\""));
        assert!(json.contains("\"kind\":\"stream_protocol\""));
        assert!(json.contains("\"queue_depth\":2"));
    }
}
