//! 音频输入设备 (Audio input devices)
//!
//! 协商顺序: 默认设备@配置采样率 → 每个有输入通道的设备 × 候选采样率。
//! 全部失败时返回 `SourceUnavailable`, 由音频线程进入降级模式。

use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::error::{Result, SentinelError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub index: usize,
    pub name: String,
    pub max_input_channels: u16,
}

/// 已打开的输入流 (单声道 f32)
pub trait AudioInput {
    /// 读满 `buf`; 返回 false 表示输入流已结束
    fn read_chunk(&mut self, buf: &mut [f32]) -> anyhow::Result<bool>;
}

/// 音频后端, 输入流在音频线程内部打开
pub trait AudioBackend: Send {
    fn open_default(&mut self, sample_rate: u32, chunk: usize) -> anyhow::Result<Box<dyn AudioInput>>;
    fn input_devices(&mut self) -> anyhow::Result<Vec<AudioDeviceInfo>>;
    fn open_device(
        &mut self,
        device: &AudioDeviceInfo,
        sample_rate: u32,
        chunk: usize,
    ) -> anyhow::Result<Box<dyn AudioInput>>;
}

/// 无音频设备 (未启用 audio-device 特性时使用)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudioBackend;

impl AudioBackend for NullAudioBackend {
    fn open_default(&mut self, _: u32, _: usize) -> anyhow::Result<Box<dyn AudioInput>> {
        anyhow::bail!("未编译音频设备支持")
    }

    fn input_devices(&mut self) -> anyhow::Result<Vec<AudioDeviceInfo>> {
        Ok(Vec::new())
    }

    fn open_device(&mut self, d: &AudioDeviceInfo, _: u32, _: usize) -> anyhow::Result<Box<dyn AudioInput>> {
        anyhow::bail!("未编译音频设备支持: {}", d.name)
    }
}

pub struct NegotiatedInput {
    pub input: Box<dyn AudioInput>,
    pub device: String,
    pub sample_rate: u32,
}

impl std::fmt::Debug for NegotiatedInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiatedInput")
            .field("device", &self.device)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

pub fn negotiate(backend: &mut dyn AudioBackend, config: &AudioConfig) -> Result<NegotiatedInput> {
    // 1. 默认设备
    match backend.open_default(config.sample_rate, config.chunk) {
        Ok(input) => {
            info!("🎤 默认输入设备已连接 ({}Hz)", config.sample_rate);
            return Ok(NegotiatedInput {
                input,
                device: "default".to_string(),
                sample_rate: config.sample_rate,
            });
        }
        Err(e) => warn!("⚠️ 默认输入设备打开失败: {:#}, 开始扫描设备...", e),
    }

    // 2. 设备 × 采样率
    let devices = backend
        .input_devices()
        .map_err(|e| SentinelError::SourceUnavailable(format!("枚举音频设备失败: {:#}", e)))?;
    let rates = config.candidate_rates();

    for device in devices.iter().filter(|d| d.max_input_channels > 0) {
        for &rate in &rates {
            match backend.open_device(device, rate, config.chunk) {
                Ok(input) => {
                    info!("🎤 已连接设备 {} ({}) @ {}Hz", device.index, device.name, rate);
                    return Ok(NegotiatedInput {
                        input,
                        device: device.name.clone(),
                        sample_rate: rate,
                    });
                }
                Err(e) => debug!("设备 {} @ {}Hz 失败: {:#}", device.name, rate, e),
            }
        }
    }

    Err(SentinelError::SourceUnavailable(format!(
        "没有可用的音频输入设备 (扫描{}个设备)",
        devices.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silence;

    impl AudioInput for Silence {
        fn read_chunk(&mut self, buf: &mut [f32]) -> anyhow::Result<bool> {
            buf.fill(0.0);
            Ok(true)
        }
    }

    /// 只接受指定 (设备, 采样率) 的后端, 记录尝试顺序
    struct Picky {
        accept: Option<(usize, u32)>,
        tried: Vec<(Option<usize>, u32)>,
    }

    impl AudioBackend for Picky {
        fn open_default(&mut self, rate: u32, _: usize) -> anyhow::Result<Box<dyn AudioInput>> {
            self.tried.push((None, rate));
            anyhow::bail!("busy")
        }

        fn input_devices(&mut self) -> anyhow::Result<Vec<AudioDeviceInfo>> {
            Ok(vec![
                AudioDeviceInfo { index: 0, name: "speaker".into(), max_input_channels: 0 },
                AudioDeviceInfo { index: 1, name: "usb-mic".into(), max_input_channels: 1 },
                AudioDeviceInfo { index: 2, name: "webcam".into(), max_input_channels: 2 },
            ])
        }

        fn open_device(&mut self, d: &AudioDeviceInfo, rate: u32, _: usize) -> anyhow::Result<Box<dyn AudioInput>> {
            self.tried.push((Some(d.index), rate));
            if self.accept == Some((d.index, rate)) {
                Ok(Box::new(Silence))
            } else {
                anyhow::bail!("unsupported")
            }
        }
    }

    #[test]
    fn test_negotiation_order() {
        let mut backend = Picky { accept: Some((2, 16000)), tried: Vec::new() };
        let config = AudioConfig::default();
        let negotiated = negotiate(&mut backend, &config).unwrap();
        assert_eq!(negotiated.device, "webcam");
        assert_eq!(negotiated.sample_rate, 16000);
        assert_eq!(
            backend.tried,
            vec![
                (None, 22050),
                (Some(1), 22050),
                (Some(1), 44100),
                (Some(1), 16000),
                (Some(1), 8000),
                (Some(2), 22050),
                (Some(2), 44100),
                (Some(2), 16000),
            ]
        );
    }

    #[test]
    fn test_nothing_opens() {
        let mut backend = Picky { accept: None, tried: Vec::new() };
        let err = negotiate(&mut backend, &AudioConfig::default()).unwrap_err();
        assert!(matches!(err, SentinelError::SourceUnavailable(_)));
        assert!(negotiate(&mut NullAudioBackend, &AudioConfig::default()).is_err());
    }
}
