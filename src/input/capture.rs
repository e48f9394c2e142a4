//! 采集循环 (Capture Loop)
//! 职责: 打开视频源 → 读帧 → 放入FrameQueue; 失败时退避重连,永不向调用方抛错

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use super::{Frame, FrameQueue, SourceId};
use crate::error::SentinelError;
use crate::utils::sleep_while_running;

/// 视频源读出的原始帧 (RGBA)
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba_data: Vec<u8>,
}

/// 已打开的视频源
pub trait VideoSource: Send {
    /// 阻塞读取下一帧; `Ok(None)` 表示上游已关闭
    fn read_frame(&mut self) -> anyhow::Result<Option<RawFrame>>;
}

/// 视频源工厂 (每次重连调用一次)
pub trait SourceOpener: Send {
    fn open(&mut self, source: &SourceId) -> Result<Box<dyn VideoSource>, SentinelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Opening,
    Streaming,
    Stopped,
}

pub struct CaptureLoop {
    source: SourceId,
    opener: Box<dyn SourceOpener>,
    queue: Arc<FrameQueue>,
    running: Arc<AtomicBool>,
    open_backoff: Duration,
    read_backoff: Duration,
    state: CaptureState,
    observer: Option<Sender<CaptureState>>,

    // 统计
    seq: u64,
    count: u64,
    last: Instant,
}

impl CaptureLoop {
    pub fn new(
        source: SourceId,
        opener: Box<dyn SourceOpener>,
        queue: Arc<FrameQueue>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            opener,
            queue,
            running,
            open_backoff: Duration::from_secs(5),
            read_backoff: Duration::from_secs(2),
            state: CaptureState::Stopped,
            observer: None,
            seq: 0,
            count: 0,
            last: Instant::now(),
        }
    }

    pub fn with_backoff(mut self, open_backoff: Duration, read_backoff: Duration) -> Self {
        self.open_backoff = open_backoff;
        self.read_backoff = read_backoff;
        self
    }

    /// 订阅状态迁移 (健康检查/测试)
    pub fn with_state_observer(mut self, observer: Sender<CaptureState>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state == state && state != CaptureState::Opening {
            return;
        }
        debug!("📹 采集状态: {:?} → {:?}", self.state, state);
        self.state = state;
        if let Some(observer) = &self.observer {
            let _ = observer.try_send(state);
        }
    }

    pub fn run(&mut self) {
        info!("🎬 采集线程启动: {}", self.source);

        while self.is_running() {
            self.set_state(CaptureState::Opening);

            let mut source = match self.opener.open(&self.source) {
                Ok(source) => source,
                Err(e) => {
                    warn!(
                        "⚠️ 视频源打开失败: {}, {:.0}秒后重试",
                        e,
                        self.open_backoff.as_secs_f64()
                    );
                    sleep_while_running(&self.running, self.open_backoff);
                    continue;
                }
            };

            info!("✅ 视频源连接成功,开始采集: {}", self.source);
            self.set_state(CaptureState::Streaming);
            self.stream(source.as_mut());
            drop(source);

            if self.is_running() {
                info!(
                    "🔄 视频源已关闭, {:.0}秒后重连...",
                    self.read_backoff.as_secs_f64()
                );
                sleep_while_running(&self.running, self.read_backoff);
            }
        }

        self.set_state(CaptureState::Stopped);
        info!("🛑 采集线程退出");
    }

    /// 读帧直到上游关闭、读错误或收到停止请求
    fn stream(&mut self, source: &mut dyn VideoSource) {
        loop {
            if !self.is_running() {
                return;
            }
            let raw = match source.read_frame() {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    info!("📹 上游结束推流");
                    return;
                }
                Err(e) => {
                    warn!("❌ 读帧失败: {:#}", e);
                    return;
                }
            };
            // 阻塞读取后再次检查,避免停止请求被卡住的设备拖延
            if !self.is_running() {
                return;
            }

            self.seq += 1;
            let frame = Frame::new(self.seq, raw.width, raw.height, raw.rgba_data);
            self.queue.push(frame);

            self.count += 1;
            if self.last.elapsed().as_secs_f64() >= 1.0 {
                let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
                debug!(
                    "📺 采集统计: {:.1}fps | 累计丢弃{}帧",
                    fps,
                    self.queue.dropped()
                );
                self.count = 0;
                self.last = Instant::now();
            }
        }
    }
}
