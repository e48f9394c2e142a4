/// 风险融合规则
use serde::{Deserialize, Serialize};

use crate::audio::AudioStatus;
use crate::detection::DensityTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[default]
    Safe,
    Warn,
    Danger,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Warn => "WARN",
            RiskLevel::Danger => "DANGER",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 音频状态 × 密度等级 → 风险等级
pub fn fuse_risk(audio: AudioStatus, density: DensityTier) -> RiskLevel {
    match (audio, density) {
        (AudioStatus::Panic, DensityTier::High) => RiskLevel::Danger,
        (AudioStatus::Panic, _) => RiskLevel::Warn,
        (AudioStatus::Normal, DensityTier::High | DensityTier::Medium) => RiskLevel::Warn,
        (AudioStatus::Normal, DensityTier::Low) => RiskLevel::Safe,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fusion_table() {
        let table = [
            (AudioStatus::Panic, DensityTier::High, RiskLevel::Danger),
            (AudioStatus::Panic, DensityTier::Medium, RiskLevel::Warn),
            (AudioStatus::Panic, DensityTier::Low, RiskLevel::Warn),
            (AudioStatus::Normal, DensityTier::High, RiskLevel::Warn),
            (AudioStatus::Normal, DensityTier::Medium, RiskLevel::Warn),
            (AudioStatus::Normal, DensityTier::Low, RiskLevel::Safe),
        ];
        for (audio, density, expected) in table {
            assert_eq!(fuse_risk(audio, density), expected, "{} × {}", audio, density);
        }
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&RiskLevel::Danger).unwrap(), "\"DANGER\"");
        assert_eq!(format!("RISK:{}", RiskLevel::Warn), "RISK:WARN");
    }
}
