//! # 配置模块
//!
//! ## 设计思路
//!
//! 分两层：
//! - `GridConfig`：单次合成的几何参数（画布边长、格子边长、用户图片位置），可序列化。
//! - `ComposeConfig`：加载与渲染策略（体积/像素上限、JPEG 质量、缩放滤镜、网格线样式）。
//!
//! 性能档位（quality / balanced / speed）作为高层语义，映射到缩放滤镜。
//!
//! ## 实现思路
//!
//! - `Default` 提供与线上一致的默认值（800 / 266 / 中间格）。
//! - `GridConfig::validate` 在任何绘制前执行，返回已校验的 `CellPosition`。
//! - 画布边长不能被 3 整除时只告警不修正，格子边界会有取整误差。

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

use super::GridError;

/// 每行/每列的格子数。
pub const GRID_DIMENSION: u32 = 3;
/// 格子总数。
pub const CELL_COUNT: usize = (GRID_DIMENSION * GRID_DIMENSION) as usize;
/// 填充图片数量（除用户图片外的所有格子）。
pub const FILLER_COUNT: usize = CELL_COUNT - 1;

/// 九宫格几何参数。
///
/// 反序列化时缺失的字段回退默认值；只给出 `gridSize` 时 `cellSize` 取其三分之一。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GridConfigFields", rename_all = "camelCase")]
pub struct GridConfig {
    /// 输出图片边长（正方形，像素）。
    pub grid_size: u32,
    /// 单个格子边长（像素）。
    pub cell_size: u32,
    /// 用户图片所在格子（行优先，0~8）。
    ///
    /// 使用有符号整数，外部传入的 -1 之类非法值可以被表示并在校验时拒绝。
    pub user_image_position: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_size: 800,
            cell_size: 266,
            user_image_position: 4,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridConfigFields {
    grid_size: Option<u32>,
    cell_size: Option<u32>,
    user_image_position: Option<i32>,
}

impl From<GridConfigFields> for GridConfig {
    fn from(fields: GridConfigFields) -> Self {
        let defaults = Self::default();
        let grid_size = fields.grid_size.unwrap_or(defaults.grid_size);
        let cell_size = match (fields.cell_size, fields.grid_size) {
            (Some(cell_size), _) => cell_size,
            (None, Some(grid_size)) => grid_size / GRID_DIMENSION,
            (None, None) => defaults.cell_size,
        };
        Self {
            grid_size,
            cell_size,
            user_image_position: fields
                .user_image_position
                .unwrap_or(defaults.user_image_position),
        }
    }
}

impl GridConfig {
    /// 以画布边长构建配置，格子边长取 `grid_size / 3`。
    pub fn with_grid_size(grid_size: u32, user_image_position: i32) -> Self {
        Self {
            grid_size,
            cell_size: grid_size / GRID_DIMENSION,
            user_image_position,
        }
    }

    /// 校验配置，返回已校验的用户图片位置。
    pub fn validate(&self) -> Result<CellPosition, GridError> {
        if self.grid_size == 0 {
            return Err(GridError::InvalidConfig("grid_size 必须大于 0".to_string()));
        }
        if self.cell_size == 0 {
            return Err(GridError::InvalidConfig("cell_size 必须大于 0".to_string()));
        }

        let covered = self
            .cell_size
            .checked_mul(GRID_DIMENSION)
            .ok_or_else(|| GridError::InvalidConfig("cell_size 过大导致溢出".to_string()))?;
        if covered > self.grid_size {
            return Err(GridError::InvalidConfig(format!(
                "cell_size × {} = {} 超出 grid_size {}",
                GRID_DIMENSION, covered, self.grid_size
            )));
        }
        if covered != self.grid_size {
            log::warn!(
                "⚠️ grid_size={} 与 cell_size={} 不能精确对齐，格子边界存在取整误差",
                self.grid_size,
                self.cell_size
            );
        }

        CellPosition::try_from(self.user_image_position)
    }
}

/// 已校验的格子位置（0~8，行优先）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellPosition(u8);

impl CellPosition {
    /// 所有位置，按绘制顺序。
    pub fn all() -> impl Iterator<Item = CellPosition> {
        (0..CELL_COUNT as u8).map(CellPosition)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn row(self) -> u32 {
        self.0 as u32 / GRID_DIMENSION
    }

    pub fn col(self) -> u32 {
        self.0 as u32 % GRID_DIMENSION
    }

    /// 格子左上角坐标 `(col * cell_size, row * cell_size)`。
    pub fn origin(self, cell_size: u32) -> (u32, u32) {
        (self.col() * cell_size, self.row() * cell_size)
    }
}

impl TryFrom<i32> for CellPosition {
    type Error = GridError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (0..CELL_COUNT as i32).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(GridError::InvalidConfig(format!(
                "用户图片位置 {} 超出范围（0~{}）",
                value,
                CELL_COUNT - 1
            )))
        }
    }
}

/// RGBA 颜色。
pub type Color = [u8; 4];

pub const WHITE: Color = [255, 255, 255, 255];

/// 加载与渲染配置。
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// 单张图片原始字节上限。
    pub max_file_size: u64,
    /// 网络下载超时时间（秒）。
    pub download_timeout: u64,
    /// 下载分块读取超时时间（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// JPEG 编码质量（1~100）。
    pub jpeg_quality: u8,
    /// 缩放滤镜。
    pub resize_filter: FilterType,
    /// 画布底色。
    pub background: Color,
    /// 网格线宽度（像素）。
    pub grid_line_width: u32,
    /// 网格线颜色。
    pub grid_line_color: Color,
    /// 网格线不透明度（0.0~1.0）。
    pub grid_line_alpha: f32,
    /// 是否跨请求缓存已解码的填充图片。
    pub cache_fillers: bool,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024,
            download_timeout: 30,
            stream_chunk_timeout_ms: 15_000,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            jpeg_quality: 90,
            resize_filter: FilterType::Triangle,
            background: WHITE,
            grid_line_width: 2,
            grid_line_color: WHITE,
            grid_line_alpha: 0.8,
            cache_fillers: true,
        }
    }
}

impl ComposeConfig {
    /// 校验渲染参数。
    pub fn validate(&self) -> Result<(), GridError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(GridError::InvalidConfig(format!(
                "jpeg_quality 必须在 1~100 之间：{}",
                self.jpeg_quality
            )));
        }
        if !(0.0..=1.0).contains(&self.grid_line_alpha) {
            return Err(GridError::InvalidConfig(format!(
                "grid_line_alpha 必须在 0~1 之间：{}",
                self.grid_line_alpha
            )));
        }
        if self.max_file_size == 0 {
            return Err(GridError::InvalidConfig("max_file_size 不能为 0".to_string()));
        }
        Ok(())
    }

    /// 基于当前滤镜反推性能档位。
    pub fn infer_performance_profile(&self) -> ImagePerformanceProfile {
        match self.resize_filter {
            FilterType::Lanczos3 | FilterType::CatmullRom | FilterType::Gaussian => {
                ImagePerformanceProfile::Quality
            }
            FilterType::Triangle => ImagePerformanceProfile::Balanced,
            FilterType::Nearest => ImagePerformanceProfile::Speed,
        }
    }

    /// 应用指定性能档位。
    pub fn apply_performance_profile(&mut self, profile: ImagePerformanceProfile) {
        self.resize_filter = match profile {
            ImagePerformanceProfile::Quality => FilterType::Lanczos3,
            ImagePerformanceProfile::Balanced => FilterType::Triangle,
            ImagePerformanceProfile::Speed => FilterType::Nearest,
        };
    }
}

/// 缩放性能档位。
///
/// - `Quality`：Lanczos3，最清晰
/// - `Balanced`：双线性，与浏览器画布缩放观感接近
/// - `Speed`：最近邻
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImagePerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl ImagePerformanceProfile {
    /// 从外部字符串解析档位。
    ///
    /// # 示例
    /// ```rust
    /// use nine_grid_generator::nine_grid::ImagePerformanceProfile;
    ///
    /// let p = ImagePerformanceProfile::from_str("balanced")?;
    /// assert_eq!(p.as_str(), "balanced");
    /// # Ok::<(), nine_grid_generator::nine_grid::GridError>(())
    /// ```
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(profile: &str) -> Result<Self, GridError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(GridError::InvalidConfig(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}
