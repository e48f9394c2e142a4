/// 音频系统 (Audio System)
///
/// 独立工作线程,负责恐慌声检测
/// - Device:     输入设备协商 (默认设备 → 设备×采样率)
/// - Classifier: 分类器接口 + RMS/频谱质心规则
/// - Hysteresis: 连续计数, 抑制单帧噪声
/// - Engine:     音频循环
pub mod buffer;
pub mod classifier;
pub mod device;
pub mod engine;
pub mod hysteresis;
pub mod types;

#[cfg(feature = "audio-device")]
pub mod cpal_backend;

pub use buffer::RollingBuffer;
pub use classifier::{AudioClassifier, HeuristicClassifier};
pub use device::{negotiate, AudioBackend, AudioDeviceInfo, AudioInput, NegotiatedInput, NullAudioBackend};
pub use engine::AudioLoop;
pub use hysteresis::PanicHysteresis;
pub use types::{AudioClassification, AudioFeatures, AudioStatus};

#[cfg(feature = "audio-device")]
pub use cpal_backend::CpalBackend;
