/// 检测系统 (Detection System)
///
/// 独立工作线程,负责人群分析
/// - Detector:  人检测接口 + 内置亮区检测器
/// - Mapper:    像素坐标 → 平面图坐标
/// - Inference: 推理循环 (跳帧/分级/发布)
/// - Annotate:  预览帧标注
pub mod annotate;
pub mod detector;
pub mod inference;
pub mod mapper;
pub mod types;

pub use annotate::annotate_jpeg;
pub use detector::{BlobDetector, PersonDetector};
pub use inference::{summarize, CycleOutcome, InferenceLoop};
pub use mapper::CoordinateMapper;
pub use types::{BBox, DensityThresholds, DensityTier, DetectionResult, PersonPoint};
