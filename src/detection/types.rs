/// 检测系统数据结构定义
/// Data structures for the detection system
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ========== 枚举类型 ==========

/// 人群密度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DensityTier {
    #[default]
    Low,
    Medium,
    High,
}

impl DensityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            DensityTier::Low => "LOW",
            DensityTier::Medium => "MEDIUM",
            DensityTier::High => "HIGH",
        }
    }
}

impl std::fmt::Display for DensityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 密度分级阈值: `count ≥ high → HIGH`, `count ≥ medium → MEDIUM`, 否则 LOW
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DensityThresholds {
    pub high: usize,
    pub medium: usize,
}

impl Default for DensityThresholds {
    fn default() -> Self {
        Self { high: 5, medium: 3 }
    }
}

impl DensityThresholds {
    pub fn new(high: usize, medium: usize) -> Self {
        Self { high, medium }
    }

    pub fn classify(&self, count: usize) -> DensityTier {
        if count >= self.high {
            DensityTier::High
        } else if count >= self.medium {
            DensityTier::Medium
        } else {
            DensityTier::Low
        }
    }
}

// ========== 数据结构 ==========

/// 检测框 (Detection bounding box)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: u32,
}

impl BBox {
    /// 人 (class_id=0) 的检测框
    pub fn person(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id: 0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// 中心点
    pub fn centroid(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// 单个人的位置: 像素坐标、归一化坐标、平面图坐标(仅在已标定时存在)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonPoint {
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub normalized_x: f64,
    pub normalized_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_y: Option<f64>,
}

/// 一次检测的完整结果 (推理线程 → SharedState)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub person_count: usize,
    pub people: Vec<PersonPoint>,
    pub density_tier: DensityTier,
    pub produced_at: DateTime<Utc>,
}

impl Default for DetectionResult {
    /// 尚无检测时的安全默认值: 0人, LOW
    fn default() -> Self {
        Self {
            person_count: 0,
            people: Vec::new(),
            density_tier: DensityTier::Low,
            produced_at: DateTime::<Utc>::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_thresholds() {
        let t = DensityThresholds::new(5, 3);
        assert_eq!(t.classify(0), DensityTier::Low);
        assert_eq!(t.classify(2), DensityTier::Low);
        assert_eq!(t.classify(3), DensityTier::Medium);
        assert_eq!(t.classify(4), DensityTier::Medium);
        assert_eq!(t.classify(5), DensityTier::High);
        assert_eq!(t.classify(60), DensityTier::High);
    }

    #[test]
    fn test_bbox_centroid() {
        let bbox = BBox::person(10.0, 20.0, 30.0, 60.0, 0.9);
        assert_eq!(bbox.centroid(), (20.0, 40.0));
        assert_eq!(bbox.width(), 20.0);
        assert_eq!(bbox.height(), 40.0);
    }

    #[test]
    fn test_map_coordinates_omitted_when_absent() {
        let point = PersonPoint {
            pixel_x: 1.0,
            pixel_y: 2.0,
            normalized_x: 0.1,
            normalized_y: 0.2,
            map_x: None,
            map_y: None,
        };
        let json = serde_json::to_string(&point).unwrap();
        assert!(!json.contains("map_x"));
        assert_eq!(
            serde_json::to_string(&DensityTier::Medium).unwrap(),
            "\"MEDIUM\""
        );
    }
}
