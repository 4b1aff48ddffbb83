//! # 输出模块
//!
//! 编码后的图片：原始字节、可内嵌的 Data URL、建议下载文件名、落盘。

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, TimeZone};
use std::path::Path;

use super::GridError;

/// 下载文件名前缀。
pub const DOWNLOAD_FILE_PREFIX: &str = "touhou_nine_grid";

/// 编码后的合成图片。
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub mime_type: &'static str,
}

impl EncodedImage {
    pub(crate) fn jpeg(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
            mime_type: "image/jpeg",
        }
    }

    /// `data:image/jpeg;base64,...`
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// 建议的下载文件名：`touhou_nine_grid_2026-10-16T08-30-00.jpg`。
    pub fn suggested_file_name<Tz>(&self, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}_{}.jpg",
            DOWNLOAD_FILE_PREFIX,
            now.format("%Y-%m-%dT%H-%M-%S")
        )
    }

    /// 写入文件（父目录不存在时自动创建）。
    pub fn save_to(&self, path: &Path) -> Result<(), GridError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GridError::FileSystem(format!("创建输出目录 '{}' 失败：{}", parent.display(), e))
                })?;
            }
        }

        std::fs::write(path, &self.bytes)
            .map_err(|e| GridError::FileSystem(format!("写入 '{}' 失败：{}", path.display(), e)))?;

        log::info!(
            "💾 已保存九宫格 - 路径: {} 大小: {}KB",
            path.display(),
            self.bytes.len() / 1024
        );
        Ok(())
    }
}
