//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `UploadFile` 表示用户上传的文件（带文件名与 MIME 元信息）
//! - `RawImageData` 表示已加载但未解码的字节
//! - `DecodedImage` 表示已解码、尺寸已知的位图

use std::path::PathBuf;

use image::DynamicImage;

/// 图片输入来源。
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// 内存中的原始字节，`hint` 仅用于日志与诊断。
    Bytes { data: Vec<u8>, hint: String },
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(PathBuf),
    /// 网络地址来源（仅 http / https）。
    Url(String),
}

impl ImageSource {
    pub fn bytes(data: impl Into<Vec<u8>>, hint: impl Into<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            hint: hint.into(),
        }
    }

    /// 来源描述，用于日志（不包含数据本身）。
    pub fn describe(&self) -> String {
        match self {
            Self::Bytes { data, hint } => format!("bytes:{}（{} 字节）", hint, data.len()),
            Self::Base64(data) => format!("base64（{} 字符）", data.len()),
            Self::FilePath(path) => format!("file:{}", path.display()),
            Self::Url(url) => format!("url:{}", url),
        }
    }
}

/// 用户上传的文件。
///
/// `mime_type` 可能缺失（部分浏览器/系统不提供），此时回退到扩展名判断。
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            file_name: None,
            mime_type: None,
            data,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// 小写扩展名（不含点）。
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    pub(crate) fn into_source(self) -> ImageSource {
        let hint = self.file_name.unwrap_or_else(|| "upload".to_string());
        ImageSource::Bytes {
            data: self.data,
            hint,
        }
    }
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageData {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) label: String,
}

/// 解码阶段输出：尺寸已知的位图。
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub image: DynamicImage,
    /// 来源标识，仅用于日志。
    pub label: String,
}

impl DecodedImage {
    pub fn new(image: DynamicImage, label: impl Into<String>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            image,
            label: label.into(),
        }
    }
}
