//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（字节 / Base64 / 本地文件 / URL）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验。目标是尽快失败，减少不必要内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - 字节：非空 + 体积限制 + 文件签名。
//! - Base64：格式解析 + 解码前体积预估 + 解码后体积限制。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - URL：协议校验 + Content-Length 预检 + 分块读取（每块超时）+ 累计体积限制。
//! - 上传文件：MIME 白名单；无 MIME 时回退扩展名白名单（两份列表保持一致，含 tiff）。
//!
//! 加载器只持有不可变配置与首次下载时创建的 HTTP 客户端，`clone` 后共享同一个客户端，
//! 可以放进任意任务中并发使用。

use base64::{Engine as _, engine::general_purpose};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::source::{DecodedImage, ImageSource, RawImageData, UploadFile};
use super::{ComposeConfig, GridError};

/// 允许的上传 MIME 类型。
pub const ACCEPTED_MIME_TYPES: [&str; 7] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// 缺少 MIME 时允许的扩展名。
pub const ACCEPTED_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"];

/// 图片加载器。
#[derive(Debug, Clone)]
pub struct ImageLoader {
    config: ComposeConfig,
    http_client: Arc<OnceLock<reqwest::Client>>,
}

impl ImageLoader {
    pub fn new(config: ComposeConfig) -> Self {
        Self {
            config,
            http_client: Arc::new(OnceLock::new()),
        }
    }

    pub fn config(&self) -> &ComposeConfig {
        &self.config
    }

    /// 加载并解码任意来源。
    ///
    /// 解码在阻塞线程池中执行，不占用异步调度线程。
    pub async fn load(&self, source: ImageSource) -> Result<DecodedImage, GridError> {
        let raw = self.fetch_raw(source).await?;
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.decode(raw))
            .await
            .map_err(|e| GridError::Decode(format!("解码任务异常退出：{}", e)))?
    }

    /// 同步加载并解码（不支持 URL 来源）。
    pub fn load_blocking(&self, source: ImageSource) -> Result<DecodedImage, GridError> {
        let raw = self.read_raw(source)?;
        self.decode(raw)
    }

    pub(crate) async fn fetch_raw(&self, source: ImageSource) -> Result<RawImageData, GridError> {
        match source {
            ImageSource::Url(url) => self.load_from_url(&url).await,
            other => self.read_raw(other),
        }
    }

    pub(crate) fn read_raw(&self, source: ImageSource) -> Result<RawImageData, GridError> {
        match source {
            ImageSource::Bytes { data, hint } => self.load_from_bytes(data, hint),
            ImageSource::Base64(data) => self.load_from_base64(&data),
            ImageSource::FilePath(path) => self.load_from_file(&path),
            ImageSource::Url(url) => Err(GridError::InvalidFormat(format!(
                "URL 来源需要异步加载：{}",
                Self::redact_url_for_log(&url)
            ))),
        }
    }

    /// 校验用户上传的文件。
    ///
    /// 顺序：空文件 → 体积 → MIME（或扩展名回退）→ 文件签名。
    pub fn validate_upload(&self, upload: &UploadFile) -> Result<(), GridError> {
        if upload.data.is_empty() {
            return Err(GridError::InvalidFormat("上传文件为空".to_string()));
        }

        self.ensure_within_size_limit(upload.data.len() as u64, "上传文件")?;

        let mime = upload
            .mime_type
            .as_deref()
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());

        match mime {
            Some(mime) => {
                if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
                    return Err(GridError::InvalidFormat(format!(
                        "不支持的文件类型：{}",
                        mime
                    )));
                }
            }
            None => {
                let extension = upload.extension().ok_or_else(|| {
                    GridError::InvalidFormat("文件缺少类型信息且没有扩展名".to_string())
                })?;
                if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
                    return Err(GridError::InvalidFormat(format!(
                        "不支持的文件扩展名：.{}",
                        extension
                    )));
                }
                log::debug!("🔎 上传文件无 MIME，按扩展名 .{} 接受", extension);
            }
        }

        Self::validate_image_signature(&upload.data)
    }

    /// 把本地文件读成待校验的上传文件；先按 metadata 检查体积再读取内容。
    pub fn read_upload_file(&self, path: &Path) -> Result<UploadFile, GridError> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| GridError::FileSystem(format!("无法读取文件信息：{}：{}", path.display(), e)))?;
        self.ensure_within_size_limit(metadata.len(), "上传文件")?;

        let data = std::fs::read(path)
            .map_err(|e| GridError::FileSystem(format!("无法读取上传文件：{}", e)))?;
        let mut upload = UploadFile::new(data);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            upload = upload.with_file_name(name);
        }
        Ok(upload)
    }

    fn load_from_bytes(&self, data: Vec<u8>, hint: String) -> Result<RawImageData, GridError> {
        self.ensure_within_size_limit(data.len() as u64, "图片数据")?;
        Self::validate_image_signature(&data)?;

        Ok(RawImageData {
            bytes: data,
            label: hint,
        })
    }

    /// 从 Base64 字符串加载图片原始字节。
    fn load_from_base64(&self, data: &str) -> Result<RawImageData, GridError> {
        log::debug!("📝 开始处理 base64 图片");

        let bytes = Self::parse_base64_with_limit(data, self.config.max_file_size)?;
        self.ensure_within_size_limit(bytes.len() as u64, "Base64 解码后数据")?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageData {
            bytes,
            label: "base64".to_string(),
        })
    }

    /// 从本地路径加载图片原始字节。
    fn load_from_file(&self, path: &Path) -> Result<RawImageData, GridError> {
        log::debug!("📁 开始读取本地图片 - 路径: {}", path.display());

        if !path.exists() {
            return Err(GridError::FileSystem(format!("文件不存在：{}", path.display())));
        }

        let metadata = std::fs::metadata(path)
            .map_err(|e| GridError::FileSystem(format!("无法读取文件信息：{}", e)))?;
        self.ensure_within_size_limit(metadata.len(), "文件")?;

        let bytes = std::fs::read(path)
            .map_err(|e| GridError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(RawImageData { bytes, label })
    }

    /// 从 URL 下载图片原始字节。
    async fn load_from_url(&self, url: &str) -> Result<RawImageData, GridError> {
        let redacted = Self::redact_url_for_log(url);
        log::info!("🌐 开始下载图片 - URL: {}", redacted);

        let parsed = reqwest::Url::parse(url)
            .map_err(|e| GridError::InvalidFormat(format!("URL 格式错误：{}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GridError::InvalidFormat(format!(
                "仅支持 http/https 协议：{}",
                parsed.scheme()
            )));
        }

        let client = self.http_client()?;
        let mut response = client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GridError::Network(format!(
                "HTTP {}：{}",
                status.as_u16(),
                Self::status_message(status.as_u16())
            )));
        }

        if let Some(length) = response.content_length() {
            self.ensure_within_size_limit(length, "下载内容")?;
        }

        let initial_capacity = response
            .content_length()
            .unwrap_or(0)
            .min(self.config.max_file_size) as usize;
        let mut bytes = Vec::with_capacity(initial_capacity);
        let chunk_timeout = Duration::from_millis(self.config.stream_chunk_timeout_ms);

        loop {
            let next = tokio::time::timeout(chunk_timeout, response.chunk())
                .await
                .map_err(|_| {
                    GridError::Timeout(format!(
                        "读取数据块超时（{}ms）",
                        self.config.stream_chunk_timeout_ms
                    ))
                })?
                .map_err(|e| self.map_reqwest_error(e, url))?;

            let Some(chunk) = next else {
                break;
            };

            let total = bytes.len() as u64 + chunk.len() as u64;
            self.ensure_within_size_limit(total, "下载内容")?;
            bytes.extend_from_slice(&chunk);
        }

        Self::validate_image_signature(&bytes)?;
        log::debug!("📥 下载完成 - URL: {} 大小: {} 字节", redacted, bytes.len());

        Ok(RawImageData {
            bytes,
            label: redacted,
        })
    }

    /// 复用已创建的客户端；并发首次创建时只保留先写入的那个。
    fn http_client(&self) -> Result<reqwest::Client, GridError> {
        if let Some(client) = self.http_client.get() {
            return Ok(client.clone());
        }
        let client = Self::build_http_client(&self.config)?;
        Ok(self.http_client.get_or_init(|| client).clone())
    }

    fn build_http_client(config: &ComposeConfig) -> Result<reqwest::Client, GridError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .build()
            .map_err(|e| GridError::Network(format!("HTTP 客户端初始化失败：{}", e)))
    }

    fn ensure_within_size_limit(&self, len: u64, what: &str) -> Result<(), GridError> {
        if len > self.config.max_file_size {
            return Err(GridError::ResourceLimit(format!(
                "{}过大：{:.2} MB（限制：{:.2} MB）",
                what,
                len as f64 / 1024.0 / 1024.0,
                self.config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }
        Ok(())
    }

    /// 日志中去掉 query 与 fragment，避免泄露签名参数。
    fn redact_url_for_log(url: &str) -> String {
        match reqwest::Url::parse(url) {
            Ok(mut parsed) => {
                parsed.set_query(None);
                parsed.set_fragment(None);
                parsed.to_string()
            }
            Err(_) => "<invalid-url>".to_string(),
        }
    }

    /// 统一映射 reqwest 错误到业务错误。
    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> GridError {
        let redacted = Self::redact_url_for_log(url);
        let message = e.to_string().replace(url, &redacted);

        if e.is_timeout() {
            GridError::Timeout(format!("下载超时（{}秒）", self.config.download_timeout))
        } else if e.is_connect() {
            GridError::Network(format!("无法连接：{}", message))
        } else {
            GridError::Network(format!("请求失败：{}", message))
        }
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }

    fn estimate_base64_decoded_upper_bound_len(base64_data: &str) -> Result<u64, GridError> {
        let len = base64_data.trim().len() as u64;
        let groups = len
            .checked_add(3)
            .ok_or_else(|| GridError::ResourceLimit("Base64 输入长度溢出".to_string()))?
            / 4;

        groups
            .checked_mul(3)
            .ok_or_else(|| GridError::ResourceLimit("Base64 解码体积估算溢出".to_string()))
    }

    /// 解析 Base64 输入（支持 Data URL / 纯 Base64），解码前按预估体积拒绝。
    fn parse_base64_with_limit(data: &str, max_file_size: u64) -> Result<Vec<u8>, GridError> {
        let normalized = data.trim();

        let payload = if normalized.starts_with("data:") {
            let marker = normalized
                .find(";base64,")
                .ok_or_else(|| GridError::InvalidFormat("缺少 base64 标记".to_string()))?;
            &normalized[marker + ";base64,".len()..]
        } else {
            normalized
        };

        let estimated_len = Self::estimate_base64_decoded_upper_bound_len(payload)?;
        if estimated_len > max_file_size {
            return Err(GridError::ResourceLimit(format!(
                "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated_len as f64 / 1024.0 / 1024.0,
                max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| GridError::Decode(format!("Base64 解码失败：{}", e)))
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    pub(crate) fn validate_image_signature(bytes: &[u8]) -> Result<(), GridError> {
        if bytes.is_empty() {
            return Err(GridError::InvalidFormat("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| GridError::InvalidFormat("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(GridError::InvalidFormat(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }
}
