#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crowd_sentinel::audio::{AudioBackend, AudioDeviceInfo, AudioInput};
use crowd_sentinel::detection::BBox;
use crowd_sentinel::error::{Result, SentinelError};
use crowd_sentinel::input::{Frame, RawFrame, SourceId, SourceOpener, VideoSource};
use crowd_sentinel::monitor::HardwareBridge;

pub fn boxes(n: usize) -> Vec<BBox> {
    (0..n)
        .map(|i| {
            let x = (i * 20) as f32;
            BBox::person(x, 10.0, x + 10.0, 30.0, 0.8)
        })
        .collect()
}

/// 永远返回固定数量检测框的检测器
pub fn fixed_detector(n: usize) -> impl FnMut(&Frame) -> anyhow::Result<Vec<BBox>> + Send {
    move |_: &Frame| Ok(boxes(n))
}

/// 持续产出小尺寸黑帧的视频源
pub struct SteadySource {
    pub interval: Duration,
}

impl VideoSource for SteadySource {
    fn read_frame(&mut self) -> anyhow::Result<Option<RawFrame>> {
        thread::sleep(self.interval);
        Ok(Some(RawFrame {
            width: 160,
            height: 120,
            rgba_data: vec![0; 160 * 120 * 4],
        }))
    }
}

/// 前 `failures` 次打开失败, 之后成功
pub struct FlakyOpener {
    pub failures: usize,
    pub attempts: Arc<AtomicUsize>,
    pub successes: Arc<AtomicUsize>,
}

impl FlakyOpener {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: Arc::new(AtomicUsize::new(0)),
            successes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl SourceOpener for FlakyOpener {
    fn open(&mut self, source: &SourceId) -> Result<Box<dyn VideoSource>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(SentinelError::SourceUnavailable(format!("{} busy", source)));
        }
        self.successes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SteadySource {
            interval: Duration::from_millis(5),
        }))
    }
}

/// 记录所有命令的硬件桥
#[derive(Default)]
pub struct RecordingBridge {
    pub sent: Mutex<Vec<String>>,
    pub delay: Duration,
}

impl RecordingBridge {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            delay,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl HardwareBridge for RecordingBridge {
    fn send(&self, command: &str) -> Result<()> {
        thread::sleep(self.delay);
        self.sent.lock().unwrap().push(command.to_string());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// 持续产出固定电平的音频输入
pub struct ToneInput;

impl AudioInput for ToneInput {
    fn read_chunk(&mut self, buf: &mut [f32]) -> anyhow::Result<bool> {
        thread::sleep(Duration::from_millis(2));
        buf.fill(0.5);
        Ok(true)
    }
}

pub struct ToneBackend;

impl AudioBackend for ToneBackend {
    fn open_default(&mut self, _: u32, _: usize) -> anyhow::Result<Box<dyn AudioInput>> {
        Ok(Box::new(ToneInput))
    }

    fn input_devices(&mut self) -> anyhow::Result<Vec<AudioDeviceInfo>> {
        Ok(Vec::new())
    }

    fn open_device(&mut self, _: &AudioDeviceInfo, _: u32, _: usize) -> anyhow::Result<Box<dyn AudioInput>> {
        anyhow::bail!("only the default device exists")
    }
}

/// 读出 `frames` 帧后报读错误的视频源
pub struct BreakingSource {
    pub frames: usize,
}

impl VideoSource for BreakingSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<RawFrame>> {
        if self.frames == 0 {
            anyhow::bail!("connection reset by peer");
        }
        self.frames -= 1;
        Ok(Some(RawFrame {
            width: 160,
            height: 120,
            rgba_data: vec![0; 160 * 120 * 4],
        }))
    }
}

/// 每次都能打开, 但源会中途断开; 记录每次打开的时间
pub struct BreakingOpener {
    pub frames: usize,
    pub opened_at: Arc<Mutex<Vec<Instant>>>,
}

impl BreakingOpener {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            opened_at: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SourceOpener for BreakingOpener {
    fn open(&mut self, _: &SourceId) -> Result<Box<dyn VideoSource>> {
        self.opened_at.lock().unwrap().push(Instant::now());
        Ok(Box::new(BreakingSource { frames: self.frames }))
    }
}
