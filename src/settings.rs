//! 设置文件（JSON）
//!
//! 文件不存在时使用默认设置；字段缺失时逐项回退默认值。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::nine_grid::{
    ComposeConfig, DEFAULT_ASSET_DIR, DEFAULT_FILLER_NAMES, FillerImageSet, GridConfig,
    ImagePerformanceProfile,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub grid: GridConfig,
    /// `quality` / `balanced` / `speed`
    pub performance_profile: String,
    pub jpeg_quality: u8,
    pub assets_dir: PathBuf,
    /// 设置后从该 URL 前缀下载填充图片，忽略 `assets_dir`。
    pub asset_base_url: Option<String>,
    pub filler_names: Vec<String>,
    pub cache_fillers: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        let compose = ComposeConfig::default();
        Self {
            grid: GridConfig::default(),
            performance_profile: compose.infer_performance_profile().as_str().to_string(),
            jpeg_quality: compose.jpeg_quality,
            assets_dir: PathBuf::from(DEFAULT_ASSET_DIR),
            asset_base_url: None,
            filler_names: DEFAULT_FILLER_NAMES.iter().map(|name| name.to_string()).collect(),
            cache_fillers: compose.cache_fillers,
        }
    }
}

impl AppSettings {
    /// 读取设置文件；文件不存在时返回默认设置。
    pub fn load_or_default(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            log::debug!("设置文件不存在，使用默认设置: {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str::<Self>(&content)
            .map_err(|e| AppError::Settings(format!("解析设置文件失败: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Settings(format!("序列化设置失败: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// 由设置构建渲染配置（档位 → 滤镜，画质，缓存开关）。
    pub fn compose_config(&self) -> Result<ComposeConfig, AppError> {
        let profile = ImagePerformanceProfile::from_str(&self.performance_profile)?;
        let mut config = ComposeConfig {
            jpeg_quality: self.jpeg_quality,
            cache_fillers: self.cache_fillers,
            ..ComposeConfig::default()
        };
        config.apply_performance_profile(profile);
        config.validate()?;
        Ok(config)
    }

    pub fn filler_set(&self) -> Result<FillerImageSet, AppError> {
        let set = match &self.asset_base_url {
            Some(base_url) => FillerImageSet::from_base_url(base_url, &self.filler_names)?,
            None => FillerImageSet::from_dir(&self.assets_dir, &self.filler_names)?,
        };
        Ok(set)
    }
}
