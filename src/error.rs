//! 错误类型 (Error taxonomy)
//!
//! 所有错误都在各自的工作线程内消化,不会终止其他线程或进程。
//! 唯一致命的是启动阶段的构造错误,由二进制入口以 anyhow 上报。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    /// 摄像头/麦克风无法打开 (带退避重试)
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// 检测器/分类器调用失败 (保留上一次发布的结果)
    #[error("inference failure: {0}")]
    InferenceFailure(String),

    /// 标定矩阵非法 (保留原矩阵)
    #[error("invalid homography: {0}")]
    InvalidHomography(String),

    /// 硬件桥未连接 (命令静默丢弃)
    #[error("hardware bridge disconnected")]
    HardwareDisconnected,

    /// 存储写入失败 (跳过本周期)
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    /// 队列等待超时
    #[error("timed out waiting for data")]
    Timeout,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SentinelError> = std::result::Result<T, E>;
