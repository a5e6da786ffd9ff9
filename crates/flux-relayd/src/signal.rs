use std::io;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::info;

/// 关闭信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM - 优雅关闭
    Term,

    /// SIGINT - Ctrl+C
    Interrupt,

    /// 引擎自行停止
    EngineStopped,
}

/// 系统信号监听
///
/// 创建时立即注册处理器，之后到达的信号会被缓存，直到 `recv` 读取。
pub struct SystemSignals {
    #[cfg(unix)]
    sigterm: signal::unix::Signal,
    #[cfg(unix)]
    sigint: signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: signal::windows::CtrlC,
}

impl SystemSignals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use signal::unix::{signal, SignalKind};

        Ok(Self {
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    #[cfg(windows)]
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            ctrl_c: signal::windows::ctrl_c()?,
        })
    }

    /// 等待下一个系统信号
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.sigterm.recv() => {
                info!("Received SIGTERM");
                ShutdownSignal::Term
            }
            _ = self.sigint.recv() => {
                info!("Received SIGINT");
                ShutdownSignal::Interrupt
            }
        }
    }

    /// 等待下一个系统信号（Windows 版本）
    #[cfg(windows)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        self.ctrl_c.recv().await;
        info!("Received Ctrl+C");
        ShutdownSignal::Interrupt
    }
}

/// 信号处理器
pub struct SignalHandler {
    shutdown_tx: broadcast::Sender<ShutdownSignal>,
}

impl SignalHandler {
    pub fn new() -> (Self, broadcast::Receiver<ShutdownSignal>) {
        let (tx, rx) = broadcast::channel(16);
        (Self { shutdown_tx: tx }, rx)
    }

    /// 引擎已停止，通知主流程退出
    pub fn trigger_engine_stopped(&self) {
        info!("Relay engine stopped on its own");
        let _ = self.shutdown_tx.send(ShutdownSignal::EngineStopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_engine_stopped_signal() {
        let (handler, mut rx) = SignalHandler::new();

        handler.trigger_engine_stopped();

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal, ShutdownSignal::EngineStopped);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_before_recv_is_kept() {
        use std::time::Duration;

        let mut signals = SystemSignals::install().unwrap();

        // 信号在开始等待之前到达
        let pid = std::process::id().to_string();
        let status = std::process::Command::new("kill")
            .args(["-TERM", pid.as_str()])
            .status()
            .unwrap();
        assert!(status.success());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let received = tokio::time::timeout(Duration::from_secs(5), signals.recv())
            .await
            .unwrap();
        assert_eq!(received, ShutdownSignal::Term);
    }
}
