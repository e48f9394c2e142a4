//! 检测器接口 (Person detector)
//!
//! 推理线程只依赖 `PersonDetector`: 给定一帧,返回人的检测框。
//! 模型本身是外部协作者; 这里附带一个基于亮度连通域的 `BlobDetector`,
//! 配合内置测试画面使用。

use std::collections::HashMap;

use anyhow::Context;
use image::{imageops, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::types::BBox;
use crate::input::Frame;

pub trait PersonDetector: Send {
    /// 检测一帧中的人, 失败时返回错误 (由推理线程捕获)
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<BBox>>;
}

impl<F> PersonDetector for F
where
    F: FnMut(&Frame) -> anyhow::Result<Vec<BBox>> + Send,
{
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<BBox>> {
        self(frame)
    }
}

/// 亮度连通域检测器: 每个足够大的亮区视为一个人
pub struct BlobDetector {
    luma_threshold: u8,
    min_area: u32,
}

impl BlobDetector {
    pub fn new(luma_threshold: u8, min_area: u32) -> Self {
        Self {
            luma_threshold,
            min_area,
        }
    }
}

impl PersonDetector for BlobDetector {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<BBox>> {
        let rgba = frame
            .to_rgba_image()
            .with_context(|| format!("帧#{} 数据长度与尺寸不符", frame.seq))?;

        // 1. 灰度 + 二值化
        let mut binary = imageops::grayscale(&rgba);
        for p in binary.pixels_mut() {
            p.0[0] = if p.0[0] >= self.luma_threshold { 255 } else { 0 };
        }

        // 2. 连通域标记
        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        // 3. 统计每个连通域的外接框和面积
        let mut regions: HashMap<u32, (u32, u32, u32, u32, u32)> = HashMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let id = label.0[0];
            if id == 0 {
                continue; // 背景
            }
            let entry = regions.entry(id).or_insert((x, y, x, y, 0));
            entry.0 = entry.0.min(x);
            entry.1 = entry.1.min(y);
            entry.2 = entry.2.max(x);
            entry.3 = entry.3.max(y);
            entry.4 += 1;
        }

        let mut bboxes: Vec<BBox> = regions
            .into_values()
            .filter(|r| r.4 >= self.min_area)
            .map(|(x1, y1, x2, y2, _)| {
                BBox::person(x1 as f32, y1 as f32, (x2 + 1) as f32, (y2 + 1) as f32, 1.0)
            })
            .collect();
        // 结果顺序稳定: 从上到下、从左到右
        bboxes.sort_by(|a, b| {
            (a.y1, a.x1)
                .partial_cmp(&(b.y1, b.x1))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(bboxes)
    }
}
