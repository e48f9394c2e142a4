//! 系统配置 - 命令行参数 + JSON配置文件
//!
//! 默认值沿用现场部署的参数 (密度阈值 5/3, 音频 22050Hz, 持续计数 3 ...)

use crate::error::{Result, SentinelError};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// 人群风险监控参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "人群风险监控 - 视频密度 + 音频恐慌融合", long_about = None)]
pub struct Args {
    /// 视频源: 纯数字为设备索引, 否则为URL/路径 ("synthetic" 使用内置测试画面)
    #[arg(short, long, env = "CAMERA_SOURCE", default_value = "synthetic")]
    pub source: String,

    /// JSON配置文件 (不存在时写入默认配置)
    #[arg(short, long, default_value = "sentinel.json")]
    pub config: PathBuf,

    /// 记录文件 (JSON Lines), 默认位于用户数据目录
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// 硬件串口设备
    #[arg(long, env = "ARDUINO_PORT")]
    pub serial_port: Option<String>,

    /// 实时预览JPEG输出路径
    #[arg(long)]
    pub preview_path: Option<PathBuf>,

    /// 运行时长(秒), 缺省则一直运行直到 Ctrl+C
    #[arg(long)]
    pub run_seconds: Option<u64>,

    /// 测试画面中的人数
    #[arg(long, default_value_t = 4)]
    pub synthetic_people: usize,
}

/// 视频链路参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub frame_skip: u32,          // 每K帧处理一帧
    pub density_high: usize,      // 人数 ≥ 此值 → HIGH
    pub density_medium: usize,    // 人数 ≥ 此值 → MEDIUM
    pub pop_timeout_ms: u64,      // 取帧超时
    pub open_backoff_ms: u64,     // 打开失败后的等待
    pub read_backoff_ms: u64,     // 读取失败后的等待
    pub blob_luma_threshold: u8,  // 内置检测器亮度阈值
    pub min_blob_area: u32,       // 内置检测器最小面积(像素)
    pub annotate_preview: bool,   // 是否生成标注预览帧
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            frame_skip: 2,
            density_high: 5,
            density_medium: 3,
            pop_timeout_ms: 1000,
            open_backoff_ms: 5000,
            read_backoff_ms: 2000,
            blob_luma_threshold: 200,
            min_blob_area: 64,
            annotate_preview: true,
        }
    }
}

impl VisionConfig {
    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn open_backoff(&self) -> Duration {
        Duration::from_millis(self.open_backoff_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }
}

/// 音频链路参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub chunk: usize,
    pub buffer_seconds: f32,      // 滑动窗口时长
    pub rms_threshold: f32,
    pub centroid_threshold: f32,  // 频谱质心阈值(Hz)
    pub persistence: u32,         // 连续多少次恐慌才判定 PANIC
    pub fallback_rates: Vec<u32>, // 默认设备失败后尝试的采样率
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            chunk: 1024,
            buffer_seconds: 1.0,
            rms_threshold: 0.05,
            centroid_threshold: 2000.0,
            persistence: 3,
            fallback_rates: vec![44100, 16000, 8000],
        }
    }
}

impl AudioConfig {
    /// 候选采样率: 配置值在前, 去重且保持顺序
    pub fn candidate_rates(&self) -> Vec<u32> {
        let mut rates = vec![self.sample_rate];
        for &rate in &self.fallback_rates {
            if !rates.contains(&rate) {
                rates.push(rate);
            }
        }
        rates
    }
}

/// 融合监控参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub tick_ms: u64,
    pub persist_interval_ms: u64,
    pub zone_id: String,
    pub subscriber_capacity: usize,
    pub vision_stale_ms: u64, // 超过此时间无视频更新视为离线
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_ms: 500,
            persist_interval_ms: 5000,
            zone_id: "main".to_string(),
            subscriber_capacity: 16,
            vision_stale_ms: 3000,
        }
    }
}

impl MonitorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }

    pub fn vision_stale_after(&self) -> Duration {
        Duration::from_millis(self.vision_stale_ms)
    }
}

/// 硬件桥参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub port: Option<String>,
    pub baud: u32,
    pub command_prefix: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            command_prefix: "RISK:".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub vision: VisionConfig,
    pub audio: AudioConfig,
    pub monitor: MonitorConfig,
    pub hardware: HardwareConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationConfig>,
}

/// 四点标定: 摄像头画面上的4个点 ↔ 平面图上的4个点
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub camera_points: Vec<(f64, f64)>,
    pub map_points: Vec<(f64, f64)>,
}

impl SentinelConfig {
    /// 从JSON文件加载配置
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| SentinelError::Config(e.to_string()))?;
        fs::write(path, json)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    /// 命令行参数覆盖配置文件
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(port) = &args.serial_port {
            self.hardware.port = Some(port.clone());
        }
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.vision;
        if v.frame_skip == 0 {
            return Err(SentinelError::Config("frame_skip must be ≥ 1".into()));
        }
        if v.density_medium >= v.density_high {
            return Err(SentinelError::Config(format!(
                "density_medium ({}) must be below density_high ({})",
                v.density_medium, v.density_high
            )));
        }
        let a = &self.audio;
        if a.chunk == 0 || a.sample_rate == 0 {
            return Err(SentinelError::Config(
                "audio chunk and sample_rate must be non-zero".into(),
            ));
        }
        if a.persistence == 0 {
            return Err(SentinelError::Config("audio persistence must be ≥ 1".into()));
        }
        if !(a.buffer_seconds > 0.0) {
            return Err(SentinelError::Config("buffer_seconds must be positive".into()));
        }
        if self.monitor.tick_ms == 0 {
            return Err(SentinelError::Config("tick_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️  当前配置:");
        info!(
            "  跳帧: 每{}帧处理1帧 | 密度阈值 HIGH≥{} MEDIUM≥{}",
            self.vision.frame_skip, self.vision.density_high, self.vision.density_medium
        );
        info!(
            "  音频: {}Hz 块{} 窗口{:.1}s 持续计数{}",
            self.audio.sample_rate,
            self.audio.chunk,
            self.audio.buffer_seconds,
            self.audio.persistence
        );
        info!(
            "  监控: 每{}ms广播 | 每{}ms记录 | 区域 {}",
            self.monitor.tick_ms, self.monitor.persist_interval_ms, self.monitor.zone_id
        );
    }
}
