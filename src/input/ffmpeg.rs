//! FFmpeg 视频源 - RTSP流 / 本地摄像头
//!
//! FFmpeg 解码在独立线程中运行,滤镜把 YUV420P 帧转换成 RGBA 后
//! 通过小容量通道交给 `FfmpegSource::read_frame`。

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::frame_queue::send_latest;
use super::{RawFrame, SourceId, SourceOpener, VideoSource};
use crate::error::SentinelError;

/// 超过此时间没有新帧视为读失败
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// 解码滤镜: YUV420P → RGBA
struct RgbaFilter {
    tx: Sender<RawFrame>,
    // 通道满时从这里丢掉最旧的一帧
    stale: Receiver<RawFrame>,
    alive: Arc<AtomicBool>,
    total_frames: usize,
    dropped_frames: usize,
}

impl FrameFilter for RgbaFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        // 读取端已释放: 结束解码
        if !self.alive.load(Ordering::Relaxed) {
            return Err("source released".to_string());
        }

        self.total_frames += 1;

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            if w == 0 || h == 0 || w > 4096 || h > 4096 {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let y_plane = (*frame.as_ptr()).data[0];
            let u_plane = (*frame.as_ptr()).data[1];
            let v_plane = (*frame.as_ptr()).data[2];
            let y_stride = (*frame.as_ptr()).linesize[0] as usize;
            let uv_stride = (*frame.as_ptr()).linesize[1] as usize;

            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.dropped_frames += 1;
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize / 2) {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let mut rgba = vec![255u8; (w * h * 4) as usize]; // 预填充alpha=255
            for y in 0..h as usize {
                for x in 0..w as usize {
                    let y_val = *y_plane.add(y * y_stride + x) as f32;
                    let u_val = *u_plane.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;
                    let v_val = *v_plane.add((y / 2) * uv_stride + x / 2) as f32 - 128.0;

                    let idx = (y * w as usize + x) * 4;
                    rgba[idx] = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
                    rgba[idx + 1] = (y_val - 0.344 * u_val - 0.714 * v_val).clamp(0.0, 255.0) as u8;
                    rgba[idx + 2] = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;
                }
            }

            let raw = RawFrame {
                width: w,
                height: h,
                rgba_data: rgba,
            };
            // 读取端处理不过来: 丢弃最旧的帧, 最新帧优先
            match send_latest(&self.tx, &self.stale, raw) {
                Ok(dropped) => self.dropped_frames += dropped,
                Err(_) => return Err("source released".to_string()),
            }
        }

        Ok(Some(frame))
    }
}

/// 已连接的 FFmpeg 视频源
pub struct FfmpegSource {
    rx: Receiver<RawFrame>,
    alive: Arc<AtomicBool>,
}

impl VideoSource for FfmpegSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<RawFrame>> {
        match self.rx.recv_timeout(READ_TIMEOUT) {
            Ok(raw) => Ok(Some(raw)),
            Err(RecvTimeoutError::Timeout) => {
                anyhow::bail!("{}秒内未收到新帧", READ_TIMEOUT.as_secs())
            }
            Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct FfmpegOpener;

impl FfmpegOpener {
    pub fn new() -> Self {
        Self
    }

    /// 本地摄像头输入 - 根据平台选择
    fn camera_input(index: usize) -> Input {
        #[cfg(target_os = "windows")]
        let (format, url) = {
            let name = ez_ffmpeg::device::get_input_video_devices()
                .ok()
                .and_then(|devices| devices.into_iter().nth(index))
                .unwrap_or_default();
            ("dshow", format!("video={}", name))
        };

        #[cfg(target_os = "macos")]
        let (format, url) = ("avfoundation", format!("{}", index));

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let (format, url) = ("v4l2", format!("/dev/video{}", index));

        Input::new(url).set_format(format)
    }
}

impl SourceOpener for FfmpegOpener {
    fn open(&mut self, source: &SourceId) -> Result<Box<dyn VideoSource>, SentinelError> {
        let input = match source {
            SourceId::Device(index) => Self::camera_input(*index),
            SourceId::Uri(uri) => Input::from(uri.as_str()),
            SourceId::Synthetic => {
                return Err(SentinelError::SourceUnavailable(
                    "synthetic 不是 FFmpeg 输入".to_string(),
                ))
            }
        };

        let (tx, rx) = bounded(2);
        let alive = Arc::new(AtomicBool::new(true));
        let filter = RgbaFilter {
            tx,
            stale: rx.clone(),
            alive: alive.clone(),
            total_frames: 0,
            dropped_frames: 0,
        };

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_desc("format=yuv420p")
            .output(out)
            .build()
            .map_err(|e| SentinelError::SourceUnavailable(format!("构建失败: {}", e)))?;

        let sch = ctx
            .start()
            .map_err(|e| SentinelError::SourceUnavailable(format!("启动失败: {}", e)))?;

        let label = source.to_string();
        std::thread::Builder::new()
            .name("ffmpeg-decode".into())
            .spawn(move || {
                if let Err(e) = sch.wait() {
                    warn!("⚠️ 解码结束: {} ({})", label, e);
                } else {
                    info!("📹 解码循环结束: {}", label);
                }
            })
            .map_err(SentinelError::Io)?;

        Ok(Box::new(FfmpegSource { rx, alive }))
    }
}
