//! # 填充图片集合
//!
//! 八张固定的装饰图片，按顺序填入除用户图片外的格子。
//! 来源可以是本地资源目录、静态资源 URL 前缀，或直接给定的字节。

use std::path::{Path, PathBuf};

use super::config::FILLER_COUNT;
use super::{GridError, ImageSource};

/// 默认的角色图片文件名（顺序即填充顺序）。
pub const DEFAULT_FILLER_NAMES: [&str; FILLER_COUNT] = [
    "恋.jpg",
    "求.jpg",
    "沙.jpg",
    "猫.jpg",
    "紫.jpg",
    "芙.jpg",
    "花.jpg",
    "谁？.jpg",
];

/// 默认资源目录。
pub const DEFAULT_ASSET_DIR: &str = "images";

/// 单张填充图片。
#[derive(Debug, Clone)]
pub struct FillerAsset {
    pub name: String,
    pub source: ImageSource,
}

/// 有序的八张填充图片。
#[derive(Debug, Clone)]
pub struct FillerImageSet {
    assets: Vec<FillerAsset>,
}

impl FillerImageSet {
    /// 直接由资源列表构建，数量必须恰好为 8。
    pub fn new(assets: Vec<FillerAsset>) -> Result<Self, GridError> {
        if assets.len() != FILLER_COUNT {
            return Err(GridError::InvalidConfig(format!(
                "填充图片必须恰好 {} 张，实际 {} 张",
                FILLER_COUNT,
                assets.len()
            )));
        }
        Ok(Self { assets })
    }

    /// 资源目录下的指定文件名。
    pub fn from_dir<S: AsRef<str>>(dir: impl AsRef<Path>, names: &[S]) -> Result<Self, GridError> {
        let dir = dir.as_ref();
        let assets = names
            .iter()
            .map(|name| FillerAsset {
                name: name.as_ref().to_string(),
                source: ImageSource::FilePath(dir.join(name.as_ref())),
            })
            .collect();
        Self::new(assets)
    }

    /// 资源目录下的默认角色图片。
    pub fn default_in(dir: impl AsRef<Path>) -> Self {
        let dir: PathBuf = dir.as_ref().to_path_buf();
        Self {
            assets: DEFAULT_FILLER_NAMES
                .iter()
                .map(|name| FillerAsset {
                    name: name.to_string(),
                    source: ImageSource::FilePath(dir.join(name)),
                })
                .collect(),
        }
    }

    /// 静态资源 URL 前缀下的指定文件名，例如 `https://host/images/`。
    pub fn from_base_url<S: AsRef<str>>(base_url: &str, names: &[S]) -> Result<Self, GridError> {
        let base = base_url.trim_end_matches('/');
        let assets = names
            .iter()
            .map(|name| FillerAsset {
                name: name.as_ref().to_string(),
                source: ImageSource::Url(format!("{}/{}", base, name.as_ref())),
            })
            .collect();
        Self::new(assets)
    }

    /// 内存中的字节（测试或打包进二进制的资源）。
    pub fn from_bytes(entries: Vec<(String, Vec<u8>)>) -> Result<Self, GridError> {
        let assets = entries
            .into_iter()
            .map(|(name, data)| FillerAsset {
                source: ImageSource::bytes(data, name.clone()),
                name,
            })
            .collect();
        Self::new(assets)
    }

    pub fn assets(&self) -> &[FillerAsset] {
        &self.assets
    }

    pub fn names(&self) -> Vec<String> {
        self.assets.iter().map(|asset| asset.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
