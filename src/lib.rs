//! 人群风险监控 (Crowd Sentinel)
//!
//! 视频人群密度 + 音频恐慌检测 → 风险等级, 广播/记录/硬件联动
//!
//! 系统架构:
//! 1. 采集线程: 视频源打开/重连, 最新帧队列
//! 2. 推理线程: 跳帧 → 检测 → 坐标映射 → 密度分级
//! 3. 音频线程: 滑动窗口 → 分类 → 滞回
//! 4. 监控线程: 风险融合 → 广播 / 持久化 / 硬件
pub mod audio; // 音频分析系统
pub mod config; // 命令行与配置文件
pub mod detection; // 人群检测系统
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod monitor; // 风险融合监控
pub mod sentinel; // 线程编排
pub mod state; // 共享状态
pub mod utils; // 单应矩阵等工具

pub use crate::audio::{AudioClassification, AudioStatus};
pub use crate::config::{Args, SentinelConfig};
pub use crate::detection::{CoordinateMapper, DensityTier, DetectionResult};
pub use crate::error::{Result, SentinelError};
pub use crate::monitor::{fuse_risk, RiskLevel};
pub use crate::sentinel::{Collaborators, Sentinel};
pub use crate::state::{SharedState, Snapshot};
pub use crate::utils::HomographyMatrix;
