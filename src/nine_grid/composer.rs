//! # 九宫格合成器
//!
//! ## 设计思路
//!
//! `GridComposer` 只处理已解码的图片，不做任何 IO：
//! 1. 校验配置（任何绘制之前）
//! 2. 分配白底画布
//! 3. 生成布局：用户图片定位，其余位置按行优先依次放入填充图片
//! 4. 逐格 letterbox 缩放并居中绘制（固定按 0..8 顺序）
//! 5. 叠加网格线
//! 6. 编码为 JPEG
//!
//! ## 实现思路
//!
//! 任何一格绘制失败都包装为 `Composition { slot }`，调用方要么拿到完整图片，要么拿到错误。

use image::RgbaImage;

use super::canvas::{CompositeCanvas, encode_jpeg};
use super::layout::{CellContent, GridLayout, letterbox_fit};
use super::progress::{ComposeStage, ProgressReporter, milestones};
use super::source::DecodedImage;
use super::{ComposeConfig, EncodedImage, GridConfig, GridError, ImageSlot};

/// 九宫格合成器。
#[derive(Debug, Clone)]
pub struct GridComposer {
    grid: GridConfig,
    options: ComposeConfig,
}

impl GridComposer {
    pub fn new(grid: GridConfig, options: ComposeConfig) -> Self {
        Self { grid, options }
    }

    pub fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// 合成并编码。
    ///
    /// `fillers` 必须恰好 8 张，顺序即填充顺序。
    ///
    /// # 示例
    /// ```rust
    /// use image::{DynamicImage, RgbaImage, Rgba};
    /// use nine_grid_generator::nine_grid::{
    ///     ComposeConfig, DecodedImage, GridComposer, GridConfig, ProgressReporter,
    /// };
    ///
    /// let solid = |w, h| DecodedImage::new(
    ///     DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 80, 80, 255]))),
    ///     "demo",
    /// );
    /// let fillers: Vec<_> = (0..8).map(|_| solid(50, 50)).collect();
    ///
    /// let composer = GridComposer::new(GridConfig::with_grid_size(90, 4), ComposeConfig::default());
    /// let encoded = composer.compose(&solid(120, 80), &fillers, &ProgressReporter::silent())?;
    /// assert_eq!((encoded.width, encoded.height), (90, 90));
    /// # Ok::<(), nine_grid_generator::nine_grid::GridError>(())
    /// ```
    pub fn compose(
        &self,
        user: &DecodedImage,
        fillers: &[DecodedImage],
        progress: &ProgressReporter,
    ) -> Result<EncodedImage, GridError> {
        let result = self.compose_inner(user, fillers, progress);
        match &result {
            Ok(_) => progress.advance(ComposeStage::Done, milestones::DONE),
            Err(err) => progress.fail(err.to_string()),
        }
        result
    }

    fn compose_inner(
        &self,
        user: &DecodedImage,
        fillers: &[DecodedImage],
        progress: &ProgressReporter,
    ) -> Result<EncodedImage, GridError> {
        progress.advance(ComposeStage::Compositing, milestones::COMPOSITING);
        let canvas = self.render(user, fillers)?;

        progress.advance(ComposeStage::Encoding, milestones::ENCODING);
        self.encode(&canvas)
    }

    /// 只绘制不编码，返回画布像素。
    pub fn render(
        &self,
        user: &DecodedImage,
        fillers: &[DecodedImage],
    ) -> Result<RgbaImage, GridError> {
        let user_position = self.grid.validate()?;
        self.options.validate()?;
        let layout = GridLayout::build(user_position, fillers.len())?;

        let cell_size = self.grid.cell_size;
        let mut canvas = CompositeCanvas::new(self.grid.grid_size, self.options.background)?;

        for (position, content) in layout.iter() {
            let (image, slot) = match content {
                CellContent::User => (user, ImageSlot::User),
                CellContent::Filler(index) => (
                    &fillers[index],
                    ImageSlot::Filler {
                        index,
                        name: fillers[index].label.clone(),
                    },
                ),
            };

            if image.width == 0 || image.height == 0 {
                return Err(GridError::Decode(format!(
                    "图片尺寸无效：{}x{}",
                    image.width, image.height
                ))
                .in_slot(slot));
            }

            let rect = letterbox_fit(image.width, image.height, cell_size, cell_size)
                .to_pixel_rect(cell_size, cell_size);
            let origin = position.origin(cell_size);

            log::debug!(
                "🧩 位置 {}（行 {} 列 {}）← {} {}x{} → {}x{} @ +{}+{}",
                position.index(),
                position.row(),
                position.col(),
                slot,
                image.width,
                image.height,
                rect.width,
                rect.height,
                origin.0 + rect.x,
                origin.1 + rect.y
            );

            canvas
                .draw_image(&image.image, origin, rect, self.options.resize_filter)
                .map_err(|e| e.in_slot(slot))?;
        }

        canvas.draw_grid_lines(
            cell_size,
            self.options.grid_line_width,
            self.options.grid_line_color,
            self.options.grid_line_alpha,
        );

        Ok(canvas.into_pixels())
    }

    /// 编码画布像素。
    pub fn encode(&self, pixels: &RgbaImage) -> Result<EncodedImage, GridError> {
        encode_jpeg(pixels, self.options.jpeg_quality).map_err(|e| e.in_slot(ImageSlot::Canvas))
    }
}
