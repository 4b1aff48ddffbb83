//! # 九宫格图片合成工具：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │          调用方（CLI / HTTP 服务 / 桌面壳）               │
//! │       ↕  Result<EncodedImage, AppError>                  │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust)                           │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ settings ─── JSON 设置文件 → GridConfig/ComposeConfig │
//! │  │                                                       │
//! │  └─ nine_grid ── 九宫格合成                               │
//! │      ├─ service / handler   请求编排·取消·进度            │
//! │      ├─ loader / pipeline   加载·校验·解码·缩放           │
//! │      ├─ layout / canvas     布局·letterbox·绘制·网格线    │
//! │      └─ composer / output   合成·JPEG·Data URL           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError` |
//! | [`settings`] | 设置文件的读取、保存与默认值 |
//! | [`nine_grid`] | 把用户图片与 8 张填充图片合成为 3×3 的 JPEG |

pub mod error;
pub mod nine_grid;
pub mod settings;
