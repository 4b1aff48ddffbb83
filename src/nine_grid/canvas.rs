//! # 画布模块
//!
//! ## 设计思路
//!
//! 画布是单次合成独占的 RGBA 缓冲，底色不透明白。
//! 只提供三个能力：把图片缩放后贴进矩形、叠加半透明网格线、编码为 JPEG。
//!
//! ## 实现思路
//!
//! - 贴图使用 `imageops::overlay`，带透明通道的图片会透出底色。
//! - 网格线宽度以线坐标为中心（2px 线覆盖 `c-1` 与 `c` 两列/行），按不透明度线性混合。
//! - 编码前丢弃 alpha 通道（画布本身始终不透明）。

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Rgba, RgbaImage};

use super::config::{Color, GRID_DIMENSION};
use super::layout::PixelRect;
use super::output::EncodedImage;
use super::pipeline::scale_to_rgba;
use super::GridError;

/// 合成画布。
pub struct CompositeCanvas {
    pixels: RgbaImage,
}

impl CompositeCanvas {
    /// 分配 `size × size` 的画布并填充底色。
    pub fn new(size: u32, background: Color) -> Result<Self, GridError> {
        if size == 0 {
            return Err(GridError::InvalidConfig("画布尺寸必须大于 0".to_string()));
        }
        Ok(Self {
            pixels: RgbaImage::from_pixel(size, size, Rgba(background)),
        })
    }

    pub fn size(&self) -> u32 {
        self.pixels.width()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// 将图片缩放到 `rect` 尺寸后贴到 `(origin + rect.xy)`。
    pub fn draw_image(
        &mut self,
        image: &DynamicImage,
        origin: (u32, u32),
        rect: PixelRect,
        filter: FilterType,
    ) -> Result<(), GridError> {
        if rect.width == 0 || rect.height == 0 {
            return Err(GridError::Decode(format!(
                "目标区域无效：{}x{}",
                rect.width, rect.height
            )));
        }

        let scaled = scale_to_rgba(image, rect.width, rect.height, filter);
        let x = origin.0 as i64 + rect.x as i64;
        let y = origin.1 as i64 + rect.y as i64;
        imageops::overlay(&mut self.pixels, &scaled, x, y);

        Ok(())
    }

    /// 叠加网格分隔线：竖线 x = k·cell，横线 y = k·cell（k = 1..3），贯穿整张画布。
    pub fn draw_grid_lines(&mut self, cell_size: u32, line_width: u32, color: Color, alpha: f32) {
        if line_width == 0 || alpha <= 0.0 {
            return;
        }

        let size = self.size();
        let before = line_width / 2;

        for k in 1..GRID_DIMENSION {
            let center = k * cell_size;
            let start = center.saturating_sub(before);
            let end = (start + line_width).min(size);

            for line in start..end {
                for along in 0..size {
                    blend_pixel(self.pixels.get_pixel_mut(line, along), color, alpha);
                    blend_pixel(self.pixels.get_pixel_mut(along, line), color, alpha);
                }
            }
        }
    }

    /// 编码为 JPEG。
    pub fn encode_jpeg(&self, quality: u8) -> Result<EncodedImage, GridError> {
        encode_jpeg(&self.pixels, quality)
    }
}

/// 丢弃 alpha 通道后编码为 JPEG。
pub(crate) fn encode_jpeg(pixels: &RgbaImage, quality: u8) -> Result<EncodedImage, GridError> {
    let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| GridError::Encode(format!("JPEG 编码失败：{}", e)))?;

    Ok(EncodedImage::jpeg(bytes, width, height))
}

/// `out = alpha·color + (1 - alpha)·under`，结果保持不透明。
fn blend_pixel(pixel: &mut Rgba<u8>, color: Color, alpha: f32) {
    let inv = 1.0 - alpha;
    for channel in 0..3 {
        let mixed = color[channel] as f32 * alpha + pixel[channel] as f32 * inv;
        pixel[channel] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    pixel[3] = 255;
}
