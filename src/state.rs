//! 共享状态 (Shared State)
//!
//! 视频与音频各自只有一条写入路径, 每次写入在同一个临界区内完成;
//! 读取方拿到的是一份完整的时间点拷贝。临界区内不做任何阻塞操作。

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audio::{AudioClassification, AudioStatus};
use crate::detection::{DensityTier, DetectionResult, PersonPoint};
use crate::monitor::risk::{fuse_risk, RiskLevel};

struct Inner {
    vision: DetectionResult,
    audio: AudioClassification,
    frame: Option<Arc<[u8]>>,
    last_update: DateTime<Utc>,
}

/// 对外暴露的融合视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub person_count: usize,
    pub density_tier: DensityTier,
    pub coordinates: Vec<PersonPoint>,
    pub audio_status: AudioStatus,
    pub persistence_counter: u32,
    pub risk_level: RiskLevel,
    pub last_update: DateTime<Utc>,
}

pub struct SharedState {
    inner: Mutex<Inner>,
    health: Arc<SensorHealth>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// 初始值: 0人 LOW, 音频 NORMAL
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                vision: DetectionResult::default(),
                audio: AudioClassification::default(),
                frame: None,
                last_update: Utc::now(),
            }),
            health: Arc::new(SensorHealth::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 视频写入: 检测结果 + 预览帧一起替换
    pub fn update_vision(&self, result: DetectionResult, frame: Option<Vec<u8>>) {
        // 锁外完成拷贝
        let frame: Option<Arc<[u8]>> = frame.map(Arc::from);
        {
            let mut inner = self.lock();
            inner.vision = result;
            // 没有新预览帧时保留上一帧
            if frame.is_some() {
                inner.frame = frame;
            }
            inner.last_update = Utc::now();
        }
        self.health.vision_beat();
    }

    /// 音频写入
    pub fn update_audio(&self, classification: AudioClassification) {
        {
            let mut inner = self.lock();
            inner.audio = classification;
            inner.last_update = Utc::now();
        }
        self.health.audio_beat();
    }

    pub fn read_snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            person_count: inner.vision.person_count,
            density_tier: inner.vision.density_tier,
            coordinates: inner.vision.people.clone(),
            audio_status: inner.audio.status,
            persistence_counter: inner.audio.persistence_counter,
            risk_level: fuse_risk(inner.audio.status, inner.vision.density_tier),
            last_update: inner.last_update,
        }
    }

    /// 最新的标注预览帧 (JPEG)
    pub fn read_frame(&self) -> Option<Arc<[u8]>> {
        self.lock().frame.clone()
    }

    pub fn health(&self) -> Arc<SensorHealth> {
        self.health.clone()
    }
}

// ========== 传感器存活信号 ==========

/// 各传感器最近一次写入的时间, 用于区分"传感器缺失"与"一切正常"
pub struct SensorHealth {
    origin: Instant,
    vision: AtomicU64, // origin 起的毫秒数 + 1, 0 表示从未写入
    audio: AtomicU64,
    audio_online: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthView {
    pub vision_online: bool,
    pub audio_online: bool,
    pub vision_age_ms: Option<u64>,
    pub audio_age_ms: Option<u64>,
}

impl SensorHealth {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
            vision: AtomicU64::new(0),
            audio: AtomicU64::new(0),
            audio_online: AtomicBool::new(false),
        }
    }

    fn now_mark(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64 + 1
    }

    pub fn vision_beat(&self) {
        self.vision.store(self.now_mark(), Ordering::Relaxed);
    }

    pub fn audio_beat(&self) {
        self.audio.store(self.now_mark(), Ordering::Relaxed);
    }

    pub fn set_audio_online(&self, online: bool) {
        self.audio_online.store(online, Ordering::SeqCst);
    }

    pub fn audio_online(&self) -> bool {
        self.audio_online.load(Ordering::SeqCst)
    }

    fn age(&self, beat: &AtomicU64) -> Option<u64> {
        match beat.load(Ordering::Relaxed) {
            0 => None,
            mark => Some(self.now_mark().saturating_sub(mark)),
        }
    }

    pub fn view(&self, stale_after: Duration) -> HealthView {
        let stale_ms = stale_after.as_millis() as u64;
        let vision_age_ms = self.age(&self.vision);
        HealthView {
            vision_online: vision_age_ms.is_some_and(|age| age <= stale_ms),
            audio_online: self.audio_online(),
            vision_age_ms,
            audio_age_ms: self.age(&self.audio),
        }
    }
}
