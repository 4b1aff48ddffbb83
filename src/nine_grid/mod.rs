//! # 九宫格合成模块（nine_grid）
//!
//! ## 设计思路
//!
//! 该模块将“来源加载 → 解码校验 → 布局计算 → 画布绘制 → JPEG 编码”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：承载可注入状态（`NineGridService`）与请求取消
//! - `handler`：编排整条生成流水线（`NineGridGenerator`）
//! - `loader`：负责字节/Base64/文件/URL 加载与上传校验
//! - `pipeline`：负责解码、像素限制、缩放
//! - `layout`：九宫格位置分配与 letterbox 计算（纯函数）
//! - `canvas`：画布像素操作（贴图、网格线、编码）
//! - `composer`：在已解码的九张图片上完成一次合成
//! - `fillers` / `output` / `progress`：填充图片集合、输出结果、进度状态机
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型，内部细节保持 `mod` 私有。
//! 不使用全局单例：调用方自己构造 `NineGridService` 或 `NineGridGenerator` 并持有。
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! CLI / 上层调用方
//!    ↓
//! service.rs（上传校验、取消标志）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs + pipeline.rs（并发加载 9 张图片并解码）
//!    ├─ composer.rs（布局 → 绘制 → 网格线）
//!    │     ├─ layout.rs
//!    │     └─ canvas.rs
//!    └─ output.rs（JPEG 字节 / Data URL / 下载文件名）
//!    ↓
//! 返回 GridError 或 EncodedImage
//! ```
//!
//! ## 分层职责建议
//!
//! - 尺寸、位置、画质等默认值优先改 `config.rs`
//! - 填充图片清单优先改 `fillers.rs`
//! - 流程顺序变更优先改 `handler.rs`
//! - 几何计算只改 `layout.rs`，它没有任何 IO

mod canvas;
mod composer;
mod config;
mod error;
mod fillers;
mod handler;
mod layout;
mod loader;
mod output;
mod pipeline;
mod progress;
mod service;
mod source;

#[cfg(test)]
mod test_support;

pub use canvas::CompositeCanvas;
pub use composer::GridComposer;
pub use config::{
    CELL_COUNT, CellPosition, Color, ComposeConfig, FILLER_COUNT, GRID_DIMENSION, GridConfig,
    ImagePerformanceProfile, WHITE,
};
pub use error::{GridError, ImageSlot};
pub use fillers::{DEFAULT_ASSET_DIR, DEFAULT_FILLER_NAMES, FillerAsset, FillerImageSet};
pub use handler::NineGridGenerator;
pub use layout::{CellContent, GridLayout, PixelRect, Placement, letterbox_fit};
pub use loader::{ACCEPTED_EXTENSIONS, ACCEPTED_MIME_TYPES, ImageLoader};
pub use output::{DOWNLOAD_FILE_PREFIX, EncodedImage};
pub use progress::{ComposeProgress, ComposeStage, ProgressCallback, ProgressReporter};
pub use service::NineGridService;
pub use source::{DecodedImage, ImageSource, UploadFile};
