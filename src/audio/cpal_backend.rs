//! cpal 音频后端 (audio-device 特性)
//!
//! 回调线程把单声道样本送入通道, `read_chunk` 在音频线程里凑满一块。

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use tracing::warn;

use super::device::{AudioBackend, AudioDeviceInfo, AudioInput};

const READ_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn open(device: &cpal::Device, sample_rate: u32, chunk: usize) -> anyhow::Result<Box<dyn AudioInput>> {
        let channels = device
            .default_input_config()
            .context("读取设备默认配置失败")?
            .channels()
            .max(1);
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = bounded::<Vec<f32>>(64);
        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // 多声道混为单声道
                let mono: Vec<f32> = if channels > 1 {
                    data.chunks(channels as usize)
                        .map(|c| c.iter().sum::<f32>() / channels as f32)
                        .collect()
                } else {
                    data.to_vec()
                };
                let _ = tx.try_send(mono);
            },
            |err| warn!("⚠️ 音频流错误: {}", err),
            None,
        )?;
        stream.play()?;

        Ok(Box::new(CpalInput {
            _stream: stream,
            rx,
            pending: VecDeque::with_capacity(chunk * 2),
        }))
    }
}

impl AudioBackend for CpalBackend {
    fn open_default(&mut self, sample_rate: u32, chunk: usize) -> anyhow::Result<Box<dyn AudioInput>> {
        let host = cpal::default_host();
        let device = host.default_input_device().context("没有默认输入设备")?;
        Self::open(&device, sample_rate, chunk)
    }

    fn input_devices(&mut self) -> anyhow::Result<Vec<AudioDeviceInfo>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()?
            .enumerate()
            .map(|(index, d)| AudioDeviceInfo {
                index,
                name: d.name().unwrap_or_else(|_| format!("device#{}", index)),
                max_input_channels: d.default_input_config().map(|c| c.channels()).unwrap_or(0),
            })
            .collect();
        Ok(devices)
    }

    fn open_device(
        &mut self,
        info: &AudioDeviceInfo,
        sample_rate: u32,
        chunk: usize,
    ) -> anyhow::Result<Box<dyn AudioInput>> {
        let host = cpal::default_host();
        let device = host
            .input_devices()?
            .nth(info.index)
            .with_context(|| format!("设备 {} 已不存在", info.name))?;
        Self::open(&device, sample_rate, chunk)
    }
}

struct CpalInput {
    _stream: cpal::Stream,
    rx: Receiver<Vec<f32>>,
    pending: VecDeque<f32>,
}

impl AudioInput for CpalInput {
    fn read_chunk(&mut self, buf: &mut [f32]) -> anyhow::Result<bool> {
        while self.pending.len() < buf.len() {
            match self.rx.recv_timeout(READ_TIMEOUT) {
                Ok(samples) => self.pending.extend(samples),
                Err(RecvTimeoutError::Timeout) => anyhow::bail!("音频设备 {:?} 内无数据", READ_TIMEOUT),
                Err(RecvTimeoutError::Disconnected) => return Ok(false),
            }
        }
        for (slot, sample) in buf.iter_mut().zip(self.pending.drain(..buf.len())) {
            *slot = sample;
        }
        Ok(true)
    }
}
