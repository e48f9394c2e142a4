//! 音频分类器 (Audio classifier)
//!
//! `AudioClassifier` 是外部协作者接口: 给定一个滑动窗口, 判断是否"类恐慌"。
//! `HeuristicClassifier` 为内置规则: 平均RMS与平均频谱质心同时超过阈值。

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::types::AudioFeatures;
use crate::config::AudioConfig;

const FRAME_LEN: usize = 2048;
const HOP_LEN: usize = 512;

pub trait AudioClassifier: Send {
    fn classify(&mut self, window: &[f32], sample_rate: u32) -> anyhow::Result<bool>;
}

impl<F> AudioClassifier for F
where
    F: FnMut(&[f32], u32) -> anyhow::Result<bool> + Send,
{
    fn classify(&mut self, window: &[f32], sample_rate: u32) -> anyhow::Result<bool> {
        self(window, sample_rate)
    }
}

pub struct HeuristicClassifier {
    rms_threshold: f32,
    centroid_threshold: f32,
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl HeuristicClassifier {
    pub fn new(rms_threshold: f32, centroid_threshold: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FRAME_LEN);
        let hann = (0..FRAME_LEN)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / FRAME_LEN as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();
        Self {
            rms_threshold,
            centroid_threshold,
            fft,
            hann,
            scratch: vec![Complex::new(0.0, 0.0); FRAME_LEN],
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.rms_threshold, config.centroid_threshold)
    }

    /// 逐帧计算 RMS 与频谱质心后取平均
    pub fn features(&mut self, window: &[f32], sample_rate: u32) -> AudioFeatures {
        if window.is_empty() {
            return AudioFeatures::default();
        }

        // 窗口短于一帧时补零当作一帧
        let starts: Vec<usize> = if window.len() <= FRAME_LEN {
            vec![0]
        } else {
            (0..=window.len() - FRAME_LEN).step_by(HOP_LEN).collect()
        };

        let bin_hz = sample_rate as f32 / FRAME_LEN as f32;
        let mut rms_sum = 0.0;
        let mut centroid_sum = 0.0;

        for &start in &starts {
            let end = (start + FRAME_LEN).min(window.len());
            let frame = &window[start..end];

            let energy: f32 = frame.iter().map(|s| s * s).sum();
            rms_sum += (energy / FRAME_LEN as f32).sqrt();

            for (i, slot) in self.scratch.iter_mut().enumerate() {
                let sample = frame.get(i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.hann[i], 0.0);
            }
            self.fft.process(&mut self.scratch);

            let mut weighted = 0.0;
            let mut total = 0.0;
            for (k, bin) in self.scratch[..=FRAME_LEN / 2].iter().enumerate() {
                let magnitude = bin.norm();
                weighted += k as f32 * bin_hz * magnitude;
                total += magnitude;
            }
            if total > f32::EPSILON {
                centroid_sum += weighted / total;
            }
        }

        let frames = starts.len() as f32;
        AudioFeatures {
            rms: rms_sum / frames,
            centroid_hz: centroid_sum / frames,
        }
    }
}

impl AudioClassifier for HeuristicClassifier {
    fn classify(&mut self, window: &[f32], sample_rate: u32) -> anyhow::Result<bool> {
        anyhow::ensure!(sample_rate > 0, "采样率为0");
        let features = self.features(window, sample_rate);
        Ok(features.rms > self.rms_threshold && features.centroid_hz > self.centroid_threshold)
    }
}
