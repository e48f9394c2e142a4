/// 单应性变换工具模块
/// 实现类似于 cv2::findHomography / cv2::perspectiveTransform 的功能
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SentinelError};

/// 单应性矩阵 (3x3), 像素坐标 → 平面图坐标
/// | h11 h12 h13 |
/// | h21 h22 h23 |
/// | h31 h32 h33 |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HomographyMatrix {
    m: [[f64; 3]; 3],
}

impl HomographyMatrix {
    /// 创建单位矩阵
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// 从3x3数组创建 (校验有限值且可逆)
    pub fn from_array(m: [[f64; 3]; 3]) -> Result<Self> {
        if m.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SentinelError::InvalidHomography(
                "matrix contains non-finite values".into(),
            ));
        }
        let matrix = Self { m };
        if matrix.is_singular() {
            return Err(SentinelError::InvalidHomography(
                "matrix is singular".into(),
            ));
        }
        Ok(matrix)
    }

    /// 从嵌套列表创建 (标定接口的JSON输入)
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != 3 || rows.iter().any(|r| r.len() != 3) {
            return Err(SentinelError::InvalidHomography(format!(
                "expected 3x3 matrix, got {} rows",
                rows.len()
            )));
        }
        let mut m = [[0.0; 3]; 3];
        for (i, row) in rows.iter().enumerate() {
            m[i].copy_from_slice(row);
        }
        Self::from_array(m)
    }

    /// 转换为3x3数组
    pub fn to_array(&self) -> [[f64; 3]; 3] {
        self.m
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// 按行范数归一化后判断奇异
    ///
    /// |det| 不超过各行范数之积, 比值与每行的缩放无关,
    /// 平面图单位很小 (例如以公里计) 的合法标定不会被误判。
    pub fn is_singular(&self) -> bool {
        let bound: f64 = self
            .m
            .iter()
            .map(|row| row.iter().map(|v| v * v).sum::<f64>().sqrt())
            .product();
        bound == 0.0 || self.determinant().abs() / bound < 1e-12
    }

    /// 应用透视变换到点 (x, y)
    ///
    /// 点落在消失线上 (w ≈ 0) 时没有有限的映射,返回 None
    pub fn transform_point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let m = &self.m;
        let w = m[2][0] * x + m[2][1] * y + m[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        let new_x = (m[0][0] * x + m[0][1] * y + m[0][2]) / w;
        let new_y = (m[1][0] * x + m[1][1] * y + m[1][2]) / w;
        Some((new_x, new_y))
    }

    /// 计算逆矩阵 (平面图 → 像素)
    pub fn inverse(&self) -> Option<Self> {
        if self.is_singular() {
            return None; // 矩阵不可逆
        }
        let det = self.determinant();
        let m = &self.m;
        let inv_det = 1.0 / det;
        let mut inv = [[0.0; 3]; 3];
        inv[0][0] = (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det;
        inv[0][1] = (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det;
        inv[0][2] = (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det;
        inv[1][0] = (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det;
        inv[1][1] = (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det;
        inv[1][2] = (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det;
        inv[2][0] = (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det;
        inv[2][1] = (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det;
        inv[2][2] = (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det;
        Some(Self { m: inv })
    }

    /// 创建平移矩阵
    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            m: [[1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]],
        }
    }

    /// 创建缩放矩阵
    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            m: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// 矩阵组合 (self * other): 先应用 other 再应用 self
    pub fn compose(&self, other: &Self) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Self { m: out }
    }

    /// 四点标定: 摄像头上的4个点 → 平面图上对应的4个点
    ///
    /// 固定 h33 = 1, 其余8个未知数由 8x8 线性方程组求解
    pub fn from_point_pairs(src: &[(f64, f64)], dst: &[(f64, f64)]) -> Result<Self> {
        if src.len() != 4 || dst.len() != 4 {
            return Err(SentinelError::InvalidHomography(format!(
                "exactly 4 point pairs required, got {}/{}",
                src.len(),
                dst.len()
            )));
        }
        if src.iter().chain(dst).any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(SentinelError::InvalidHomography(
                "calibration points must be finite".into(),
            ));
        }

        let mut a = Array2::<f64>::zeros((8, 8));
        let mut b = Array1::<f64>::zeros(8);
        for (i, (&(x, y), &(u, v))) in src.iter().zip(dst).enumerate() {
            let r = 2 * i;
            a[[r, 0]] = x;
            a[[r, 1]] = y;
            a[[r, 2]] = 1.0;
            a[[r, 6]] = -x * u;
            a[[r, 7]] = -y * u;
            b[r] = u;

            a[[r + 1, 3]] = x;
            a[[r + 1, 4]] = y;
            a[[r + 1, 5]] = 1.0;
            a[[r + 1, 6]] = -x * v;
            a[[r + 1, 7]] = -y * v;
            b[r + 1] = v;
        }

        let h = solve_linear(a, b).ok_or_else(|| {
            SentinelError::InvalidHomography("degenerate calibration points".into())
        })?;

        Self::from_array([
            [h[0], h[1], h[2]],
            [h[3], h[4], h[5]],
            [h[6], h[7], 1.0],
        ])
    }
}

/// 高斯消元 (部分主元), 奇异时返回 None
fn solve_linear(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    for col in 0..n {
        // 选主元
        let pivot = (col..n).max_by(|&i, &j| {
            a[[i, col]]
                .abs()
                .partial_cmp(&a[[j, col]].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if a[[pivot, col]].abs() < 1e-10 {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    // 回代
    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let sum: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - sum) / a[[row, row]];
    }
    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}
