//! 音频循环 (Audio Loop)
//! 职责: 协商输入设备 → 读块 → 滑动窗口 → 分类 → 滞回 → 写入SharedState
//!
//! 没有可用设备时记录日志后退出, 音频状态保持 NORMAL,
//! 离线情况只通过 SensorHealth 体现。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::buffer::RollingBuffer;
use super::classifier::AudioClassifier;
use super::device::{negotiate, AudioBackend};
use super::hysteresis::PanicHysteresis;
use super::types::{AudioClassification, AudioStatus};
use crate::config::AudioConfig;
use crate::error::SentinelError;
use crate::state::SharedState;

/// 读取失败后的短暂等待, 避免空转
const READ_RETRY: Duration = Duration::from_millis(10);

pub struct AudioLoop {
    backend: Box<dyn AudioBackend>,
    classifier: Box<dyn AudioClassifier>,
    state: Arc<SharedState>,
    running: Arc<AtomicBool>,
    config: AudioConfig,
    hysteresis: PanicHysteresis,
    window: RollingBuffer,
    sample_rate: u32,

    // 统计
    classifier_failures: u64,
    last_failure_log: Option<Instant>,
}

impl AudioLoop {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        classifier: Box<dyn AudioClassifier>,
        state: Arc<SharedState>,
        running: Arc<AtomicBool>,
        config: AudioConfig,
    ) -> Self {
        let window = RollingBuffer::with_duration(config.sample_rate, config.buffer_seconds);
        Self {
            backend,
            classifier,
            state,
            running,
            hysteresis: PanicHysteresis::new(config.persistence),
            window,
            sample_rate: config.sample_rate,
            config,
            classifier_failures: 0,
            last_failure_log: None,
        }
    }

    pub fn run(&mut self) {
        info!("🎧 音频线程启动...");
        let health = self.state.health();

        let mut negotiated = match negotiate(self.backend.as_mut(), &self.config) {
            Ok(n) => n,
            Err(e) => {
                warn!("⚠️ {}, 音频分析已禁用 (音频状态保持 NORMAL)", e);
                health.set_audio_online(false);
                return;
            }
        };

        // 按实际采样率重建窗口
        self.sample_rate = negotiated.sample_rate;
        self.window = RollingBuffer::with_duration(self.sample_rate, self.config.buffer_seconds);
        health.set_audio_online(true);
        info!(
            "✅ 音频分析已启动: {} @ {}Hz, 窗口{}样本",
            negotiated.device,
            self.sample_rate,
            self.window.capacity()
        );

        let mut chunk = vec![0.0f32; self.config.chunk.max(1)];
        while self.running.load(Ordering::Relaxed) {
            match negotiated.input.read_chunk(&mut chunk) {
                Ok(true) => {
                    self.process_chunk(&chunk);
                }
                Ok(false) => {
                    warn!("⚠️ 音频输入流已结束");
                    break;
                }
                Err(e) => {
                    debug!("音频读取失败: {:#}", e);
                    std::thread::sleep(READ_RETRY);
                }
            }
        }

        // 离线后不能保留旧的 PANIC
        self.hysteresis.reset();
        self.state.update_audio(AudioClassification::default());
        health.set_audio_online(false);
        info!("🛑 音频线程退出 (分类失败{}次)", self.classifier_failures);
    }

    /// 处理一个音频块; 分类失败时跳过, 返回 None
    pub fn process_chunk(&mut self, chunk: &[f32]) -> Option<AudioClassification> {
        self.window.push(chunk);

        let panic_like = match self.classifier.classify(self.window.as_slice(), self.sample_rate) {
            Ok(p) => p,
            Err(e) => {
                self.classifier_failures += 1;
                // 每秒最多记录一次
                if self.last_failure_log.map_or(true, |t| t.elapsed() >= Duration::from_secs(1)) {
                    let err = SentinelError::InferenceFailure(format!("{:#}", e));
                    warn!("❌ 音频{} (累计{}次)", err, self.classifier_failures);
                    self.last_failure_log = Some(Instant::now());
                }
                return None;
            }
        };

        let previous = self.hysteresis.status();
        let classification = self.hysteresis.update(panic_like);
        if classification.status != previous {
            match classification.status {
                AudioStatus::Panic => warn!("🚨 音频状态: PANIC (连续{}次)", classification.persistence_counter),
                AudioStatus::Normal => info!("🔈 音频状态恢复: NORMAL"),
            }
        }

        self.state.update_audio(classification);
        Some(classification)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
