//! 系统编排 (Sentinel orchestrator)
//!
//! 启动四个常驻工作线程: capture / inference / audio / monitor
//! (monitor 另带一个 hardware-bridge 线程), 共享同一个 running 标志。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{error, info, warn};

use crate::audio::{AudioBackend, AudioClassifier, AudioLoop};
use crate::config::SentinelConfig;
use crate::detection::{CoordinateMapper, InferenceLoop, PersonDetector};
use crate::error::Result;
use crate::input::{CaptureLoop, FrameQueue, SourceId, SourceOpener};
use crate::monitor::{
    BroadcastEvent, Broadcaster, HardwareBridge, HardwareDispatcher, RecordSink, RiskFusionMonitor,
};
use crate::state::SharedState;

/// 外部协作者, 由调用方构造后注入
pub struct Collaborators {
    pub opener: Box<dyn SourceOpener>,
    pub detector: Box<dyn PersonDetector>,
    pub audio_backend: Box<dyn AudioBackend>,
    pub classifier: Box<dyn AudioClassifier>,
    pub bridge: Arc<dyn HardwareBridge>,
    pub sink: Box<dyn RecordSink>,
}

pub struct Sentinel {
    running: Arc<AtomicBool>,
    state: Arc<SharedState>,
    mapper: Arc<CoordinateMapper>,
    broadcaster: Arc<Broadcaster>,
    queue: Arc<FrameQueue>,
    workers: Vec<(&'static str, JoinHandle<()>)>,
    subscriber_capacity: usize,
}

fn spawn_worker<F>(name: &'static str, f: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new().name(name.into()).spawn(f)?)
}

impl Sentinel {
    pub fn start(config: &SentinelConfig, source: SourceId, collaborators: Collaborators) -> Result<Self> {
        Self::start_with_mapper(config, source, collaborators, Arc::new(CoordinateMapper::new()))
    }

    /// 使用已标定的坐标映射启动
    pub fn start_with_mapper(
        config: &SentinelConfig,
        source: SourceId,
        collaborators: Collaborators,
        mapper: Arc<CoordinateMapper>,
    ) -> Result<Self> {
        config.validate()?;

        let mut sentinel = Self {
            running: Arc::new(AtomicBool::new(true)),
            state: Arc::new(SharedState::new()),
            mapper,
            broadcaster: Arc::new(Broadcaster::new()),
            queue: Arc::new(FrameQueue::new()),
            workers: Vec::with_capacity(4),
            subscriber_capacity: config.monitor.subscriber_capacity,
        };

        if let Err(e) = sentinel.spawn_all(config, source, collaborators) {
            error!("❌ 工作线程启动失败: {}", e);
            sentinel.stop(Duration::from_secs(2));
            return Err(e);
        }
        info!("✅ 系统就绪, 开始监控 ({}个工作线程)", sentinel.workers.len());
        Ok(sentinel)
    }

    fn spawn_all(&mut self, config: &SentinelConfig, source: SourceId, c: Collaborators) -> Result<()> {
        let Collaborators {
            opener,
            detector,
            audio_backend,
            classifier,
            bridge,
            sink,
        } = c;

        // ========== 采集线程 ==========
        let capture = CaptureLoop::new(source, opener, self.queue.clone(), self.running.clone())
            .with_backoff(config.vision.open_backoff(), config.vision.read_backoff());
        self.workers.push(("capture", spawn_worker("capture", move || {
            let mut capture = capture;
            capture.run();
        })?));

        // ========== 推理线程 ==========
        let mut inference = InferenceLoop::new(
            self.queue.clone(),
            detector,
            self.mapper.clone(),
            self.state.clone(),
            self.running.clone(),
            &config.vision,
        );
        self.workers.push(("inference", spawn_worker("inference", move || inference.run())?));

        // ========== 音频线程 ==========
        let mut audio = AudioLoop::new(
            audio_backend,
            classifier,
            self.state.clone(),
            self.running.clone(),
            config.audio.clone(),
        );
        self.workers.push(("audio", spawn_worker("audio", move || audio.run())?));

        // ========== 监控线程 ==========
        let hardware = HardwareDispatcher::spawn(bridge)?;
        let mut monitor = RiskFusionMonitor::new(
            self.state.clone(),
            self.broadcaster.clone(),
            sink,
            hardware,
            &config.monitor,
            &config.hardware,
        );
        let running = self.running.clone();
        self.workers.push(("monitor", spawn_worker("monitor", move || monitor.run(&running))?));

        Ok(())
    }

    pub fn state(&self) -> Arc<SharedState> {
        self.state.clone()
    }

    /// 外部标定入口
    pub fn mapper(&self) -> Arc<CoordinateMapper> {
        self.mapper.clone()
    }

    pub fn broadcaster(&self) -> Arc<Broadcaster> {
        self.broadcaster.clone()
    }

    pub fn subscribe(&self) -> Receiver<BroadcastEvent> {
        self.broadcaster.subscribe(self.subscriber_capacity)
    }

    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 通知所有线程退出, 最多等待 `timeout`; 返回是否全部退出
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let deadline = Instant::now() + timeout;

        while self.workers.iter().any(|(_, h)| !h.is_finished()) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let mut all_stopped = true;
        for (name, handle) in self.workers.drain(..) {
            if handle.is_finished() {
                if handle.join().is_err() {
                    error!("❌ {} 线程异常退出", name);
                }
            } else {
                warn!("⚠️ {} 线程未在 {:?} 内退出, 不再等待", name, timeout);
                all_stopped = false;
            }
        }
        if all_stopped {
            info!("🛑 所有工作线程已退出");
        }
        all_stopped
    }
}

impl Drop for Sentinel {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
