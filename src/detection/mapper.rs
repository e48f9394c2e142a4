//! 坐标映射 (Coordinate mapper)
//! 像素坐标 → 平面图坐标, 标定矩阵可在运行中热替换
//!
//! 写入方整体替换 `Arc<HomographyMatrix>`, 读取方先取出当前 Arc 再计算,
//! 因此一次变换要么用旧矩阵, 要么用新矩阵, 不会看到写了一半的矩阵。

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::error::Result;
use crate::utils::HomographyMatrix;

#[derive(Default)]
pub struct CoordinateMapper {
    current: RwLock<Option<Arc<HomographyMatrix>>>,
}

impl CoordinateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_matrix(matrix: HomographyMatrix) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(matrix))),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Arc<HomographyMatrix>>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Arc<HomographyMatrix>>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 设置标定矩阵; 非法矩阵被拒绝, 原矩阵(或"未标定")保持不变
    pub fn set_matrix(&self, m: [[f64; 3]; 3]) -> Result<()> {
        let matrix = HomographyMatrix::from_array(m)?;
        self.set_homography(matrix);
        Ok(())
    }

    /// 设置已校验过的矩阵
    pub fn set_homography(&self, matrix: HomographyMatrix) {
        *self.write() = Some(Arc::new(matrix));
        info!("🗺️ 标定矩阵已更新");
    }

    /// 四点标定并立即生效
    pub fn calibrate(
        &self,
        camera_points: &[(f64, f64)],
        map_points: &[(f64, f64)],
    ) -> Result<HomographyMatrix> {
        let matrix = HomographyMatrix::from_point_pairs(camera_points, map_points)?;
        self.set_homography(matrix);
        Ok(matrix)
    }

    /// 清除标定, 之后不再输出平面图坐标
    pub fn clear(&self) {
        *self.write() = None;
    }

    /// 当前矩阵快照
    pub fn current(&self) -> Option<Arc<HomographyMatrix>> {
        self.read().clone()
    }

    pub fn is_configured(&self) -> bool {
        self.read().is_some()
    }

    /// 未标定时返回 None
    pub fn transform(&self, pixel_x: f64, pixel_y: f64) -> Option<(f64, f64)> {
        self.current()?.transform_point(pixel_x, pixel_y)
    }
}
