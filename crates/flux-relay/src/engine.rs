use crate::catalog::SourceCatalog;
use crate::command::build_arguments;
use crate::encoder::EncoderConfig;
use crate::error::{RelayError, Result};
use crate::queue::{AddSummary, SourceQueue};
use crate::retry::{Health, RetryDecision, RetryPolicy, RetryTracker};
use crate::sink::{SinkAdapter, SinkContext};
use crate::source::Source;
use crate::status::EngineStatus;
use crate::supervisor::{shutdown_requested, ProcessOutcome, ProcessRunner};
use chrono::{DateTime, Utc};
use flux_config::{EncoderOverrides, EngineSection};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

/// 停止时在进程宽限期之外额外等待播放任务的时间
const STOP_MARGIN: Duration = Duration::from_secs(1);

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub placeholder: PathBuf,
    pub looping: bool,
    pub retry: RetryPolicy,
    pub stop_grace: Duration,
    pub restart_pause: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&EngineSection::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &EngineSection) -> Self {
        Self {
            placeholder: config.placeholder_path.clone(),
            looping: config.loop_queue,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                base_delay: Duration::from_millis(config.retry_base_delay_ms),
            },
            stop_grace: Duration::from_millis(config.stop_grace_ms),
            restart_pause: Duration::from_millis(config.restart_pause_ms),
        }
    }
}

#[derive(Debug)]
struct RunState {
    active: bool,
    current_source: Option<Source>,
    started_at: Option<DateTime<Utc>>,
    retry: RetryTracker,
}

struct PlaybackHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

struct Shared {
    sink: Arc<dyn SinkAdapter>,
    runner: Arc<dyn ProcessRunner>,
    settings: EngineSettings,
    config: RwLock<EncoderConfig>,
    queue: RwLock<SourceQueue>,
    state: RwLock<RunState>,
}

impl Shared {
    async fn is_active(&self) -> bool {
        self.state.read().await.active
    }

    /// 取出下一个源并生成完整的 FFmpeg 参数
    async fn prepare_next(&self) -> Result<Vec<String>> {
        let source = self.queue.write().await.next();

        let retry_count = self.state.read().await.retry.count();
        let sink_args = self.sink.sink_arguments(&SinkContext {
            source: &source,
            retry_count,
        })?;

        let args = {
            let config = self.config.read().await;
            build_arguments(&source, &config, &sink_args)
        };

        info!(
            sink = %self.sink.display_name(),
            source = %source.locator,
            kind = %source.kind,
            retry_count,
            "Next source prepared"
        );

        self.state.write().await.current_source = Some(source);
        Ok(args)
    }

    /// 连续失败超过上限后由播放任务自行停止
    async fn force_stop(&self) {
        let mut state = self.state.write().await;
        error!(
            sink = %self.sink.display_name(),
            retry_count = state.retry.count(),
            max_retries = self.settings.retry.max_retries,
            "Too many consecutive failures, stopping relay"
        );
        state.active = false;
        state.current_source = None;
        state.retry.reset();
    }
}

/// 持续推流引擎
///
/// 同一时刻最多只有一个播放任务，也就只有一个 FFmpeg 进程。
pub struct RelayEngine {
    shared: Arc<Shared>,
    control: Mutex<Option<PlaybackHandle>>,
}

impl RelayEngine {
    pub fn builder() -> RelayEngineBuilder {
        RelayEngineBuilder::new()
    }

    /// 启动推流
    pub async fn start(&self) -> Result<()> {
        let mut control = self.control.lock().await;
        let shared = &self.shared;

        if shared.is_active().await {
            warn!(sink = %shared.sink.display_name(), "Relay already running");
            return Ok(());
        }

        // 回收上一次已结束的播放任务
        if let Some(handle) = control.take() {
            if !handle.join_handle.is_finished() {
                let _ = handle.shutdown_tx.send(true);
            }
            let _ = handle.join_handle.await;
        }

        let placeholder = &shared.settings.placeholder;
        if !placeholder.exists() {
            error!(path = %placeholder.display(), "Placeholder media not found");
            return Err(RelayError::PlaceholderMissing(placeholder.clone()));
        }

        shared.queue.write().await.seed();
        {
            let mut state = shared.state.write().await;
            state.active = true;
            state.started_at = Some(Utc::now());
            state.retry.reset();
        }

        let first = match shared.prepare_next().await {
            Ok(args) => args,
            Err(e) => {
                let mut state = shared.state.write().await;
                state.active = false;
                state.current_source = None;
                state.started_at = None;
                error!(error = %e, "Failed to prepare first source");
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join_handle = tokio::spawn(playback_loop(shared.clone(), first, shutdown_rx));
        *control = Some(PlaybackHandle {
            shutdown_tx,
            join_handle,
        });

        info!(
            sink = %shared.sink.display_name(),
            queue_size = shared.queue.read().await.len(),
            "Relay started"
        );
        Ok(())
    }

    /// 停止推流，等待进程退出后返回
    pub async fn stop(&self) {
        let mut control = self.control.lock().await;
        let shared = &self.shared;

        {
            let mut state = shared.state.write().await;
            if !state.active {
                warn!(sink = %shared.sink.display_name(), "Relay is not running");
                return;
            }
            state.active = false;
        }

        if let Some(handle) = control.take() {
            let _ = handle.shutdown_tx.send(true);

            let mut join_handle = handle.join_handle;
            let wait = shared.settings.stop_grace.saturating_add(STOP_MARGIN);
            if timeout(wait, &mut join_handle).await.is_err() {
                warn!(?wait, "Playback task did not finish in time, aborting");
                join_handle.abort();
                let _ = join_handle.await;
            }
        }

        {
            let mut state = shared.state.write().await;
            state.current_source = None;
            state.retry.reset();
        }

        info!(sink = %shared.sink.display_name(), "Relay stopped");
    }

    /// 重启推流
    pub async fn restart(&self) -> Result<()> {
        info!(sink = %self.shared.sink.display_name(), "Restarting relay");
        self.stop().await;
        sleep(self.shared.settings.restart_pause).await;
        self.start().await
    }

    /// 更新编码参数，下一个进程生效
    pub async fn update_config(&self, overrides: &EncoderOverrides) -> Result<()> {
        let mut config = self.shared.config.write().await;
        let merged = config.merged(overrides)?;
        *config = merged;

        info!(
            resolution = %config.resolution,
            framerate = config.framerate,
            video_bitrate = %config.video_bitrate,
            "Encoder config updated, applies to next source"
        );
        Ok(())
    }

    pub async fn config(&self) -> EncoderConfig {
        self.shared.config.read().await.clone()
    }

    pub async fn status(&self) -> EngineStatus {
        let shared = &self.shared;
        let (queue_depth, active_remaining, total_played) = {
            let queue = shared.queue.read().await;
            (queue.len(), queue.active_len(), queue.played())
        };
        let state = shared.state.read().await;
        let retry_count = state.retry.count();

        let uptime_secs = match (state.active, state.started_at) {
            (true, Some(started_at)) => (Utc::now() - started_at).num_seconds().max(0) as u64,
            _ => 0,
        };

        EngineStatus {
            active: state.active,
            display_name: shared.sink.display_name().to_string(),
            current_source: state.current_source.clone(),
            queue_depth,
            active_remaining,
            total_played,
            retry_count,
            started_at: state.started_at,
            uptime_secs,
            health: Health::derive(state.active, retry_count),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.shared.is_active().await
    }

    pub async fn add_to_queue<I, S>(&self, locators: I) -> AddSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.shared.queue.write().await.add(locators)
    }

    pub async fn remove_from_queue(&self, index: usize) -> bool {
        self.shared.queue.write().await.remove(index).is_some()
    }

    pub async fn clear_queue(&self) {
        self.shared.queue.write().await.clear();
    }

    pub async fn queue_snapshot(&self) -> Vec<Source> {
        self.shared.queue.read().await.snapshot()
    }

    pub async fn set_looping(&self, looping: bool) {
        self.shared.queue.write().await.set_looping(looping);
        info!(looping, "Queue looping updated");
    }

    /// 从片源目录批量入队
    pub async fn enqueue_from_catalog(&self, catalog: &dyn SourceCatalog) -> Result<AddSummary> {
        let entries = catalog.shuffled_entries()?;
        let locators: Vec<String> = entries.into_iter().map(|e| e.locator).collect();
        Ok(self.add_to_queue(locators).await)
    }

    /// 打印队列诊断信息
    pub async fn print_queue_status(&self) {
        let status = self.status().await;
        let queue = self.shared.queue.read().await;

        info!(
            sink = %status.display_name,
            active = status.active,
            health = %status.health,
            queue_size = queue.len(),
            active_remaining = queue.active_len(),
            played = queue.played(),
            looping = queue.looping(),
            "Queue status"
        );

        if let Some(current) = &status.current_source {
            info!(source = %current.locator, kind = %current.kind, "Now playing");
        }

        for (index, source) in queue.snapshot().iter().enumerate() {
            info!(index, source = %source.locator, kind = %source.kind, "Queued");
        }

        if queue.is_empty() {
            info!(placeholder = %queue.placeholder().locator, "Queue empty, placeholder will play");
        }
    }
}

/// 播放任务未正常结束（panic 或被中止）时把引擎标记为停止，避免状态停留在运行中
struct PlaybackGuard {
    shared: Arc<Shared>,
    finished: bool,
}

impl Drop for PlaybackGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        error!(sink = %self.shared.sink.display_name(), "Playback task ended abnormally, marking relay stopped");
        if let Ok(mut state) = self.shared.state.try_write() {
            state.active = false;
            state.current_source = None;
            state.retry.reset();
        }
    }
}

/// 播放任务：逐个运行源，按结果决定继续、退避或停止
async fn playback_loop(shared: Arc<Shared>, first: Vec<String>, mut shutdown: watch::Receiver<bool>) {
    let mut guard = PlaybackGuard {
        shared: shared.clone(),
        finished: false,
    };
    let mut next: Result<Vec<String>> = Ok(first);

    loop {
        if !shared.is_active().await {
            break;
        }

        let outcome = match &next {
            Ok(args) => shared.runner.run(args, shutdown.clone()).await,
            Err(e) => {
                error!(error = %e, "Failed to prepare source");
                ProcessOutcome::SpawnFailed(e.to_string())
            }
        };

        if !shared.is_active().await {
            break;
        }

        let decision = shared.state.write().await.retry.record(outcome.is_success());
        match decision {
            RetryDecision::Continue => {}
            RetryDecision::Backoff(delay) => {
                warn!(
                    sink = %shared.sink.display_name(),
                    outcome = ?outcome,
                    ?delay,
                    "Source failed, retrying with next source"
                );
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = shutdown_requested(&mut shutdown) => break,
                }
                if !shared.is_active().await {
                    break;
                }
            }
            RetryDecision::GiveUp => {
                shared.force_stop().await;
                break;
            }
        }

        // 停止请求可能在进程退出后到达，调度下一个源之前再确认一次
        if !shared.is_active().await {
            break;
        }
        next = shared.prepare_next().await;
    }

    guard.finished = true;
    info!(sink = %shared.sink.display_name(), "Playback task finished");
}

/// 引擎构建器
pub struct RelayEngineBuilder {
    sink: Option<Arc<dyn SinkAdapter>>,
    runner: Option<Arc<dyn ProcessRunner>>,
    settings: EngineSettings,
    overrides: EncoderOverrides,
}

impl RelayEngineBuilder {
    pub fn new() -> Self {
        Self {
            sink: None,
            runner: None,
            settings: EngineSettings::default(),
            overrides: EncoderOverrides::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn SinkAdapter>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_encoder(mut self, overrides: EncoderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn build(self) -> Result<RelayEngine> {
        let sink = self.sink.ok_or(RelayError::MissingComponent("sink"))?;
        let runner = self.runner.ok_or(RelayError::MissingComponent("runner"))?;
        let config = EncoderConfig::from_overrides(&self.overrides)?;

        let placeholder = self.settings.placeholder.to_string_lossy().into_owned();
        let queue = SourceQueue::new(placeholder, self.settings.looping);
        let retry = RetryTracker::new(self.settings.retry);

        Ok(RelayEngine {
            shared: Arc::new(Shared {
                sink,
                runner,
                settings: self.settings,
                config: RwLock::new(config),
                queue: RwLock::new(queue),
                state: RwLock::new(RunState {
                    active: false,
                    current_source: None,
                    started_at: None,
                    retry,
                }),
            }),
            control: Mutex::new(None),
        })
    }
}

impl Default for RelayEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RtmpSink;
    use async_trait::async_trait;

    struct ExitImmediately;

    #[async_trait]
    impl ProcessRunner for ExitImmediately {
        async fn run(&self, _args: &[String], _shutdown: watch::Receiver<bool>) -> ProcessOutcome {
            ProcessOutcome::Exited
        }
    }

    fn engine(settings: EngineSettings) -> RelayEngine {
        RelayEngine::builder()
            .with_sink(Arc::new(RtmpSink::new("Test", "rtmp://localhost/live")))
            .with_runner(Arc::new(ExitImmediately))
            .with_settings(settings)
            .build()
            .unwrap()
    }

    #[test]
    fn test_settings_from_config() {
        let settings = EngineSettings::from_config(&EngineSection::default());

        assert!(settings.looping);
        assert_eq!(settings.retry.max_retries, 3);
        assert_eq!(settings.retry.base_delay, Duration::from_secs(2));
        assert_eq!(settings.stop_grace, Duration::from_secs(5));
        assert_eq!(settings.restart_pause, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_requires_components() {
        let result = RelayEngine::builder()
            .with_runner(Arc::new(ExitImmediately))
            .build();
        assert!(matches!(result, Err(RelayError::MissingComponent("sink"))));

        let result = RelayEngine::builder()
            .with_sink(Arc::new(RtmpSink::new("Test", "rtmp://localhost/live")))
            .with_encoder(EncoderOverrides {
                framerate: Some(0),
                ..Default::default()
            })
            .with_runner(Arc::new(ExitImmediately))
            .build();
        assert!(matches!(result, Err(RelayError::InvalidFramerate(0))));
    }

    #[tokio::test]
    async fn test_initial_status() {
        let engine = engine(EngineSettings::default());
        let status = engine.status().await;

        assert!(!status.active);
        assert_eq!(status.display_name, "Test");
        assert_eq!(status.health, Health::Error);
        assert_eq!(status.uptime_secs, 0);
        assert!(status.current_source.is_none());
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid() {
        let engine = engine(EngineSettings::default());

        let result = engine
            .update_config(&EncoderOverrides {
                resolution: Some("720p".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(RelayError::InvalidResolution(_))));
        assert_eq!(engine.config().await.resolution, "1280x720");

        engine
            .update_config(&EncoderOverrides {
                video_bitrate: Some("4000k".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(engine.config().await.video_bitrate, "4000k");
    }

    #[tokio::test]
    async fn test_queue_operations() {
        let engine = engine(EngineSettings::default());

        let summary = engine
            .add_to_queue([
                "https://cdn.example.com/a.mp4",
                "rtmp://origin.example.com/live/b",
                "https://cdn.example.com/a.mp4",
                "ftp://example.com/c.mp4",
            ])
            .await;
        assert_eq!(summary.added, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.invalid, 1);

        assert!(engine.remove_from_queue(0).await);
        assert!(!engine.remove_from_queue(5).await);
        assert_eq!(engine.queue_snapshot().await.len(), 1);

        engine.print_queue_status().await;
        engine.clear_queue().await;
        assert!(engine.queue_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let engine = engine(EngineSettings::default());
        engine.stop().await;
        assert!(!engine.is_active().await);
    }
}
