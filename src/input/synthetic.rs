//! 内置测试画面 - 无摄像头时的演示视频源
//!
//! 深色背景上若干亮色矩形("行人"),各自在固定的水平通道内随机游走,
//! 与 `BlobDetector` 配合即可端到端跑通整条链路。

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};

use super::{RawFrame, SourceId, SourceOpener, VideoSource};
use crate::error::SentinelError;

const PERSON_W: u32 = 24;
const PERSON_H: u32 = 48;
const BACKGROUND: Rgba<u8> = Rgba([30, 30, 30, 255]);
const FOREGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub struct SyntheticSource {
    width: u32,
    height: u32,
    people: Vec<(f32, f32)>, // 每人 (x, 通道y)
    rng: StdRng,
    frame_interval: Duration,
    last_frame: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, people: usize, seed: u64) -> Self {
        let width = width.max(PERSON_W);
        let height = height.max(PERSON_H);
        let mut rng = StdRng::seed_from_u64(seed);
        let lane = height as f32 / (people as f32 + 1.0);
        let people = (0..people)
            .map(|i| {
                let x = rng.gen_range(0.0..=(width - PERSON_W) as f32);
                let y = (lane * (i as f32 + 1.0) - PERSON_H as f32 / 2.0)
                    .clamp(0.0, (height - PERSON_H) as f32);
                (x, y)
            })
            .collect();
        Self {
            width,
            height,
            people,
            rng,
            frame_interval: Duration::from_millis(33), // ~30fps
            last_frame: None,
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    fn render(&mut self) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        let max_x = (self.width - PERSON_W) as f32;
        for (x, y) in self.people.iter_mut() {
            *x = (*x + self.rng.gen_range(-4.0..4.0)).clamp(0.0, max_x);
            draw_filled_rect_mut(
                &mut img,
                Rect::at(*x as i32, *y as i32).of_size(PERSON_W, PERSON_H),
                FOREGROUND,
            );
        }
        img
    }
}

impl VideoSource for SyntheticSource {
    fn read_frame(&mut self) -> anyhow::Result<Option<RawFrame>> {
        // 模拟摄像头帧率
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());

        let img = self.render();
        Ok(Some(RawFrame {
            width: self.width,
            height: self.height,
            rgba_data: img.into_raw(),
        }))
    }
}

/// 只接受 `SourceId::Synthetic`
pub struct SyntheticOpener {
    width: u32,
    height: u32,
    people: usize,
    opened: u64,
}

impl SyntheticOpener {
    pub fn new(width: u32, height: u32, people: usize) -> Self {
        Self {
            width,
            height,
            people,
            opened: 0,
        }
    }
}

impl SourceOpener for SyntheticOpener {
    fn open(&mut self, source: &SourceId) -> Result<Box<dyn VideoSource>, SentinelError> {
        match source {
            SourceId::Synthetic => {
                self.opened += 1;
                Ok(Box::new(SyntheticSource::new(
                    self.width,
                    self.height,
                    self.people,
                    self.opened,
                )))
            }
            other => Err(SentinelError::SourceUnavailable(format!(
                "{} 需要启用 ffmpeg 特性",
                other
            ))),
        }
    }
}
