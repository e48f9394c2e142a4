/// 音频分析数据结构定义
/// Data structures for the audio analysis
use serde::{Deserialize, Serialize};

/// 音频状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioStatus {
    #[default]
    Normal,
    Panic,
}

impl AudioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioStatus::Normal => "NORMAL",
            AudioStatus::Panic => "PANIC",
        }
    }
}

impl std::fmt::Display for AudioStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 音频线程 → SharedState 的一次写入
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioClassification {
    pub status: AudioStatus,
    pub persistence_counter: u32,
}

/// 一个窗口的声学特征
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioFeatures {
    pub rms: f32,
    pub centroid_hz: f32,
}
