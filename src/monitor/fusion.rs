//! 风险融合监控 (Risk fusion monitor)
//! 每个节拍: 读快照 → 计算风险 → 广播 → (到期则)持久化 → 投递硬件命令
//!
//! 持久化按自己的"上次写入时间"计时, 与节拍数无关;
//! 写入失败只记录日志, 计时照常前进, 下一个周期自然重试。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use super::broadcast::{BroadcastEvent, Broadcaster};
use super::hardware::HardwareDispatcher;
use super::persistence::{PersistedRecord, RecordSink};
use super::risk::RiskLevel;
use crate::config::{HardwareConfig, MonitorConfig};
use crate::state::{SharedState, Snapshot};

pub const STATE_UPDATE_EVENT: &str = "state_update";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    NotDue,
    Written,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub risk_level: RiskLevel,
    pub delivered: usize,
    pub persisted: PersistOutcome,
}

pub struct RiskFusionMonitor {
    state: Arc<SharedState>,
    broadcaster: Arc<Broadcaster>,
    sink: Box<dyn RecordSink>,
    hardware: HardwareDispatcher,

    tick_interval: Duration,
    persist_interval: Duration,
    vision_stale_after: Duration,
    zone_id: String,
    command_prefix: String,

    last_persisted: Instant,
    last_risk: Option<RiskLevel>,
    ticks: u64,
}

impl RiskFusionMonitor {
    pub fn new(
        state: Arc<SharedState>,
        broadcaster: Arc<Broadcaster>,
        sink: Box<dyn RecordSink>,
        hardware: HardwareDispatcher,
        monitor: &MonitorConfig,
        hardware_config: &HardwareConfig,
    ) -> Self {
        Self {
            state,
            broadcaster,
            sink,
            hardware,
            tick_interval: monitor.tick_interval(),
            persist_interval: monitor.persist_interval(),
            vision_stale_after: monitor.vision_stale_after(),
            zone_id: monitor.zone_id.clone(),
            command_prefix: hardware_config.command_prefix.clone(),
            last_persisted: Instant::now(),
            last_risk: None,
            ticks: 0,
        }
    }

    /// 持久化计时起点 (测试中用于固定时间轴)
    pub fn with_persist_origin(mut self, origin: Instant) -> Self {
        self.last_persisted = origin;
        self
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn run(&mut self, running: &AtomicBool) {
        info!(
            "🛰️ 监控线程启动 (节拍{}ms, 每{}s记录一次)",
            self.tick_interval.as_millis(),
            self.persist_interval.as_secs_f32()
        );
        let ticker = crossbeam_channel::tick(self.tick_interval);
        while running.load(Ordering::Relaxed) {
            if let Ok(at) = ticker.recv() {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                self.tick(at);
            }
        }
        self.hardware.shutdown();
        info!("🛑 监控线程退出 (共{}个节拍)", self.ticks);
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.ticks += 1;

        // 1. 快照 (风险等级在读取时计算)
        let snapshot = self.state.read_snapshot();
        let risk_level = snapshot.risk_level;
        self.log_transition(&snapshot);

        // 2. 广播
        let health = self.state.health().view(self.vision_stale_after);
        let delivered = self
            .broadcaster
            .emit(BroadcastEvent {
                name: STATE_UPDATE_EVENT,
                snapshot: snapshot.clone(),
                health,
            })
            .delivered;

        // 3. 持久化
        let persisted = if now.saturating_duration_since(self.last_persisted) >= self.persist_interval {
            self.last_persisted = now;
            self.persist(snapshot)
        } else {
            PersistOutcome::NotDue
        };

        // 4. 硬件 (不阻塞)
        self.hardware.dispatch(format!("{}{}", self.command_prefix, risk_level));

        TickReport {
            risk_level,
            delivered,
            persisted,
        }
    }

    fn persist(&mut self, snapshot: Snapshot) -> PersistOutcome {
        let record = PersistedRecord {
            timestamp: Utc::now(),
            zone_id: self.zone_id.clone(),
            person_count: snapshot.person_count,
            risk_level: snapshot.risk_level,
            coordinates: snapshot.coordinates,
        };
        match self.sink.append(&record) {
            Ok(()) => PersistOutcome::Written,
            Err(e) => {
                warn!("⚠️ 记录写入失败, 等待下一周期: {}", e);
                PersistOutcome::Failed
            }
        }
    }

    fn log_transition(&mut self, snapshot: &Snapshot) {
        if self.last_risk == Some(snapshot.risk_level) {
            return;
        }
        let msg = format!(
            "风险等级 → {} ({}人/{}, 音频{})",
            snapshot.risk_level, snapshot.person_count, snapshot.density_tier, snapshot.audio_status
        );
        match snapshot.risk_level {
            RiskLevel::Danger => warn!("🚨 {}", msg),
            RiskLevel::Warn => warn!("⚠️ {}", msg),
            RiskLevel::Safe => info!("✅ {}", msg),
        }
        self.last_risk = Some(snapshot.risk_level);
    }
}
