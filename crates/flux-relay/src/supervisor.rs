use crate::output::{OutputChannel, OutputLogger};
use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// 单行输出的最大长度，超出部分丢弃
const MAX_LINE_BYTES: usize = 8 * 1024;

/// 进程退出后等待输出读完的时间
const OUTPUT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[cfg(unix)]
const SIGINT: i32 = 2;
#[cfg(unix)]
const SIGTERM: i32 = 15;

/// 外部进程的运行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 正常退出（退出码 0）
    Exited,
    /// 被停止请求终止
    Terminated,
    /// 非正常退出
    Failed { code: Option<i32> },
    /// 进程无法启动
    SpawnFailed(String),
}

impl ProcessOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessOutcome::Exited | ProcessOutcome::Terminated)
    }
}

/// 外部进程执行器
///
/// `shutdown` 变为 `true` 时必须终止进程并返回。
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, args: &[String], shutdown: watch::Receiver<bool>) -> ProcessOutcome;
}

/// FFmpeg 进程监管
pub struct FfmpegSupervisor {
    program: PathBuf,
    grace_period: Duration,
    logger: OutputLogger,
}

impl FfmpegSupervisor {
    pub fn new(program: impl Into<PathBuf>, logger: OutputLogger) -> Self {
        Self {
            program: program.into(),
            grace_period: Duration::from_secs(5),
            logger,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// 等待进程退出，收到停止请求时主动终止
    async fn wait_or_terminate(
        &self,
        child: &mut Child,
        stdin: Option<ChildStdin>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> io::Result<(ExitStatus, bool)> {
        tokio::select! {
            status = child.wait() => status.map(|s| (s, false)),
            _ = shutdown_requested(shutdown) => {
                terminate(child, stdin, self.grace_period).await.map(|s| (s, true))
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for FfmpegSupervisor {
    async fn run(&self, args: &[String], mut shutdown: watch::Receiver<bool>) -> ProcessOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(program = %self.program.display(), error = %e, "Failed to spawn ffmpeg");
                return ProcessOutcome::SpawnFailed(e.to_string());
            }
        };

        info!(pid = ?child.id(), "ffmpeg process started");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // 输出读取与等待退出并发进行，避免管道写满导致进程阻塞
        let output = async {
            tokio::join!(
                drain(stdout, OutputChannel::Stdout, &self.logger),
                drain(stderr, OutputChannel::Stderr, &self.logger),
            );
        };
        let wait = self.wait_or_terminate(&mut child, stdin, &mut shutdown);
        tokio::pin!(output);
        tokio::pin!(wait);

        let mut output_closed = false;
        let result = loop {
            tokio::select! {
                result = &mut wait => break result,
                _ = &mut output, if !output_closed => output_closed = true,
            }
        };

        // 进程已退出，给剩余输出一点时间读完
        if !output_closed && timeout(OUTPUT_FLUSH_TIMEOUT, &mut output).await.is_err() {
            debug!("ffmpeg output still open after exit, detaching");
        }

        match result {
            Ok((status, requested)) => {
                let outcome = exit_outcome(status, requested);
                match &outcome {
                    ProcessOutcome::Failed { code } => {
                        warn!(code = ?code, "ffmpeg exited with failure")
                    }
                    other => info!(outcome = ?other, "ffmpeg exited"),
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, "Failed to wait for ffmpeg");
                ProcessOutcome::Failed { code: None }
            }
        }
    }
}

pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // 发送端已释放，不会再有停止请求
            std::future::pending::<()>().await;
        }
    }
}

/// 先请求 FFmpeg 正常退出，超过宽限期后强制结束
async fn terminate(
    child: &mut Child,
    stdin: Option<ChildStdin>,
    grace_period: Duration,
) -> io::Result<ExitStatus> {
    if let Some(mut stdin) = stdin {
        // FFmpeg 交互命令：q 退出
        let _ = stdin.write_all(b"q").await;
        let _ = stdin.flush().await;
    }

    match timeout(grace_period, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(?grace_period, "ffmpeg did not exit in time, killing");
            child.kill().await?;
            child.wait().await
        }
    }
}

fn exit_outcome(status: ExitStatus, requested: bool) -> ProcessOutcome {
    if requested {
        return ProcessOutcome::Terminated;
    }
    if status.success() {
        return ProcessOutcome::Exited;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if matches!(status.signal(), Some(SIGTERM) | Some(SIGINT)) {
            return ProcessOutcome::Terminated;
        }
    }

    ProcessOutcome::Failed {
        code: status.code(),
    }
}

/// 逐行读取输出；FFmpeg 进度行以 `\r` 分隔，这里同样视为换行
async fn drain<R>(reader: Option<R>, channel: OutputChannel, logger: &OutputLogger)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(%channel, error = %e, "Output channel read failed");
                break;
            }
        };
        if chunk.is_empty() {
            break;
        }

        let len = chunk.len();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    logger.emit(channel, &line).await;
                }
            } else if pending.len() < MAX_LINE_BYTES {
                pending.push(byte);
            }
        }
        reader.consume(len);
    }

    if !pending.is_empty() {
        let line = String::from_utf8_lossy(&pending).into_owned();
        logger.emit(channel, &line).await;
    }
}
