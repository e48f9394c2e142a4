/// 视频输入系统 (Video Input System)
///
/// 独立工作线程,负责视频源打开/重连与取帧
/// - CaptureLoop: 采集状态机 (OPENING → STREAMING → OPENING/STOPPED)
/// - FrameQueue:  容量为1的最新帧队列
/// - Synthetic:   内置测试画面 (无摄像头时演示用)
/// - Ffmpeg:      RTSP/本地摄像头解码 (ffmpeg 特性)
pub mod capture;
pub mod frame_queue;
pub mod source;
pub mod synthetic;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use capture::{CaptureLoop, CaptureState, RawFrame, SourceOpener, VideoSource};
pub use frame_queue::{send_latest, FrameQueue, LatestQueue};
pub use source::SourceId;
pub use synthetic::{SyntheticOpener, SyntheticSource};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegOpener;

use image::RgbaImage;
use std::time::Instant;

/// 采集帧 (采集线程 → 推理线程)
#[derive(Clone, Debug)]
pub struct Frame {
    pub seq: u64, // 帧序号,单调递增
    pub width: u32,
    pub height: u32,
    pub rgba_data: Vec<u8>,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(seq: u64, width: u32, height: u32, rgba_data: Vec<u8>) -> Self {
        Self {
            seq,
            width,
            height,
            rgba_data,
            captured_at: Instant::now(),
        }
    }

    /// 空白帧 (测试与占位)
    pub fn blank(seq: u64, width: u32, height: u32) -> Self {
        Self::new(seq, width, height, vec![0; (width * height * 4) as usize])
    }

    /// RGBA → RgbaImage, 尺寸与数据长度不符时返回 None
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.rgba_data.clone())
    }
}
