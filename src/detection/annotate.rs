//! 预览帧标注: 画检测框 → JPEG

use std::io::Cursor;

use anyhow::Context;
use image::{DynamicImage, ImageFormat, Rgb};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::types::{BBox, DensityTier};
use crate::input::Frame;

/// 框颜色随密度等级变化
fn tier_color(tier: DensityTier) -> Rgb<u8> {
    match tier {
        DensityTier::Low => Rgb([0, 220, 0]),
        DensityTier::Medium => Rgb([255, 200, 0]),
        DensityTier::High => Rgb([255, 40, 40]),
    }
}

/// 在帧上画出检测框并编码为 JPEG
pub fn annotate_jpeg(frame: &Frame, bboxes: &[BBox], tier: DensityTier) -> anyhow::Result<Vec<u8>> {
    let rgba = frame
        .to_rgba_image()
        .with_context(|| format!("帧#{} 数据长度与尺寸不符", frame.seq))?;
    // JPEG 不支持透明通道
    let mut rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let color = tier_color(tier);
    for bbox in bboxes {
        let x = bbox.x1.max(0.0) as i32;
        let y = bbox.y1.max(0.0) as i32;
        let w = (bbox.width() as u32).max(1);
        let h = (bbox.height() as u32).max(1);
        draw_hollow_rect_mut(&mut rgb, Rect::at(x, y).of_size(w, h), color);
        // 加粗一圈
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(&mut rgb, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), color);
        }
    }

    let mut jpeg = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .context("JPEG编码失败")?;
    Ok(jpeg)
}
