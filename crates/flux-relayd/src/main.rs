mod signal;

use anyhow::{anyhow, Context};
use clap::Parser;
use flux_config::ConfigLoader;
use flux_logging::init_logging;
use flux_relay::{
    EngineSettings, FfmpegSupervisor, OutputLogger, RelayEngine, RtmpSink, StaticCatalog,
};
use signal::{ShutdownSignal, SignalHandler, SystemSignals};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "FLUX Media Relay")]
struct Args {
    /// 配置文件路径
    #[arg(long, default_value = "./config/relay.toml")]
    config: PathBuf,

    /// 视频源（可重复）
    #[arg(long = "source")]
    sources: Vec<String>,

    /// 片源目录 JSON 文件
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// 队列播放完毕后不循环
    #[arg(long)]
    no_loop: bool,

    /// 覆盖日志级别
    #[arg(long)]
    log_level: Option<String>,

    /// 状态日志间隔（秒）
    #[arg(long, default_value_t = 30)]
    status_interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new(&args.config).load()?;
    if args.no_loop {
        config.engine.loop_queue = false;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    init_logging(&config.logging)?;
    info!(
        name = %config.system.name,
        version = %config.system.version,
        config = %args.config.display(),
        "Starting media relay"
    );

    let sink = Arc::new(RtmpSink::from_config(&config.sink));
    let logger = OutputLogger::new(config.sink.name.clone(), config.engine.progress_logs_per_sec);
    let runner = Arc::new(
        FfmpegSupervisor::new(config.engine.ffmpeg_path.clone(), logger)
            .with_grace_period(Duration::from_millis(config.engine.stop_grace_ms)),
    );

    let engine = Arc::new(
        RelayEngine::builder()
            .with_sink(sink)
            .with_runner(runner)
            .with_settings(EngineSettings::from_config(&config.engine))
            .with_encoder(config.encoder.clone())
            .build()?,
    );

    if !args.sources.is_empty() {
        engine.add_to_queue(&args.sources).await;
    }

    if let Some(path) = &args.catalog {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let catalog = StaticCatalog::from_json(&json)?;
        let summary = engine.enqueue_from_catalog(&catalog).await?;
        info!(catalog = %path.display(), added = summary.added, "Catalog loaded");
    }

    // 启动 FFmpeg 之前注册信号处理，保证任何时刻的信号都会走正常停止流程
    let mut system_signals = SystemSignals::install()?;

    engine.start().await?;
    engine.print_queue_status().await;

    let (signals, mut shutdown_rx) = SignalHandler::new();
    let signals = Arc::new(signals);

    let interval = Duration::from_secs(args.status_interval_secs.max(1));
    let status_task = tokio::spawn(report_status(engine.clone(), signals.clone(), interval));

    let received = tokio::select! {
        signal = system_signals.recv() => signal,
        Ok(signal) = shutdown_rx.recv() => signal,
    };
    status_task.abort();

    if received == ShutdownSignal::EngineStopped {
        error!("Relay gave up after repeated failures");
        return Err(anyhow!("relay stopped after repeated failures"));
    }

    info!(signal = ?received, "Shutting down media relay");
    engine.stop().await;
    Ok(())
}

/// 定期输出引擎状态；引擎自行停止时通知主流程
async fn report_status(engine: Arc<RelayEngine>, signals: Arc<SignalHandler>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let status = engine.status().await;
        if !status.active {
            signals.trigger_engine_stopped();
            return;
        }

        match status.to_json() {
            Ok(json) => info!(
                health = %status.health,
                retry_count = status.retry_count,
                uptime_secs = status.uptime_secs,
                status = %json,
                "Relay status"
            ),
            Err(e) => warn!(error = %e, "Failed to serialize relay status"),
        }
    }
}
