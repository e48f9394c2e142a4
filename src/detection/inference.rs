//! 推理循环 (Inference Loop)
//! 职责: FrameQueue取帧 → 跳帧 → 检测 → 坐标映射 → 密度分级 → 写入SharedState
//!
//! 检测在锁外完成, 结果整体发布; 单帧失败只记录日志,
//! 上一次成功的结果继续作为发布值。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::annotate::annotate_jpeg;
use super::detector::PersonDetector;
use super::mapper::CoordinateMapper;
use super::types::{BBox, DensityThresholds, DetectionResult, PersonPoint};
use crate::config::VisionConfig;
use crate::error::SentinelError;
use crate::input::{Frame, FrameQueue};
use crate::state::SharedState;
use crate::utils::HomographyMatrix;

/// 单次循环的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Idle,      // 超时未取到帧
    Skipped,   // 跳帧
    Published, // 已发布新结果
    Failed,    // 检测失败, 保留旧结果
}

pub struct InferenceLoop {
    queue: Arc<FrameQueue>,
    detector: Box<dyn PersonDetector>,
    mapper: Arc<CoordinateMapper>,
    state: Arc<SharedState>,
    running: Arc<AtomicBool>,

    frame_skip: u64,
    thresholds: DensityThresholds,
    pop_timeout: Duration,
    annotate: bool,

    frame_counter: u64,

    // 统计
    count: u64,
    failures: u64,
    last: Instant,
    current_fps: f64,
}

impl InferenceLoop {
    pub fn new(
        queue: Arc<FrameQueue>,
        detector: Box<dyn PersonDetector>,
        mapper: Arc<CoordinateMapper>,
        state: Arc<SharedState>,
        running: Arc<AtomicBool>,
        config: &VisionConfig,
    ) -> Self {
        Self {
            queue,
            detector,
            mapper,
            state,
            running,
            frame_skip: u64::from(config.frame_skip.max(1)),
            thresholds: DensityThresholds::new(config.density_high, config.density_medium),
            pop_timeout: config.pop_timeout(),
            annotate: config.annotate_preview,
            frame_counter: 0,
            count: 0,
            failures: 0,
            last: Instant::now(),
            current_fps: 0.0,
        }
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn run(&mut self) {
        info!(
            "🔍 推理线程启动 (每{}帧处理1帧, HIGH≥{} MEDIUM≥{})",
            self.frame_skip, self.thresholds.high, self.thresholds.medium
        );
        while self.running.load(Ordering::Relaxed) {
            self.step();
        }
        info!("🛑 推理线程退出 (累计失败{}次)", self.failures);
    }

    /// 取一帧并处理
    pub fn step(&mut self) -> CycleOutcome {
        match self.queue.pop(self.pop_timeout) {
            Ok(frame) => self.handle_frame(frame),
            Err(SentinelError::Timeout) => CycleOutcome::Idle,
            Err(e) => {
                warn!("⚠️ 取帧失败: {}", e);
                CycleOutcome::Idle
            }
        }
    }

    /// 跳帧策略 + 处理
    pub fn handle_frame(&mut self, frame: Frame) -> CycleOutcome {
        self.frame_counter += 1;
        if self.frame_counter % self.frame_skip != 0 {
            return CycleOutcome::Skipped;
        }
        self.process_frame(&frame)
    }

    fn process_frame(&mut self, frame: &Frame) -> CycleOutcome {
        let start = Instant::now();

        // 1. 检测 (不持有任何锁)
        let bboxes = match self.detector.detect(frame) {
            Ok(bboxes) => bboxes,
            Err(e) => {
                self.failures += 1;
                let err = SentinelError::InferenceFailure(format!("{:#}", e));
                warn!("❌ 帧#{} {}", frame.seq, err);
                return CycleOutcome::Failed;
            }
        };

        // 2. 坐标映射 + 分级 (整帧使用同一个矩阵快照)
        let matrix = self.mapper.current();
        let result = summarize(frame, &bboxes, matrix.as_deref(), &self.thresholds);

        // 3. 预览帧
        let preview = if self.annotate {
            match annotate_jpeg(frame, &bboxes, result.density_tier) {
                Ok(jpeg) => Some(jpeg),
                Err(e) => {
                    warn!("⚠️ 预览帧生成失败: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        let person_count = result.person_count;
        let tier = result.density_tier;

        // 4. 原子发布
        self.state.update_vision(result, preview);

        // 5. 统计
        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            self.current_fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            debug!(
                "📊 推理统计: {:.1}fps | 每帧{:.1}ms | {}人 ({}) | 丢弃{}帧",
                self.current_fps,
                start.elapsed().as_secs_f64() * 1000.0,
                person_count,
                tier,
                self.queue.dropped()
            );
            self.count = 0;
            self.last = Instant::now();
        }

        CycleOutcome::Published
    }
}

/// 检测框 → DetectionResult
pub fn summarize(
    frame: &Frame,
    bboxes: &[BBox],
    matrix: Option<&HomographyMatrix>,
    thresholds: &DensityThresholds,
) -> DetectionResult {
    let width = f64::from(frame.width.max(1));
    let height = f64::from(frame.height.max(1));

    let people: Vec<PersonPoint> = bboxes
        .iter()
        .map(|bbox| {
            let (cx, cy) = bbox.centroid();
            let (px, py) = (f64::from(cx), f64::from(cy));
            let mapped = matrix.and_then(|m| m.transform_point(px, py));
            PersonPoint {
                pixel_x: px,
                pixel_y: py,
                normalized_x: (px / width).clamp(0.0, 1.0),
                normalized_y: (py / height).clamp(0.0, 1.0),
                map_x: mapped.map(|(x, _)| x),
                map_y: mapped.map(|(_, y)| y),
            }
        })
        .collect();

    let person_count = people.len();
    DetectionResult {
        person_count,
        people,
        density_tier: thresholds.classify(person_count),
        produced_at: Utc::now(),
    }
}
