//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `NineGridService` 作为外部调用方（CLI / HTTP / 桌面壳）持有的状态，替代全局单例。
//! 生命周期由调用方统一管理，测试可以创建互不影响的独立实例。
//!
//! ## 实现思路
//!
//! 对外仅暴露少量稳定 API：
//! - `generate_upload`：校验上传文件并执行完整生成链路（按 `request_id` 注册取消标志）
//! - `cancel`：按 `request_id` 取消进行中的请求
//! - `set_user_image_position` / `with_performance_profile`：运行时配置

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    ComposeConfig, EncodedImage, FillerImageSet, GridConfig, GridError, ImagePerformanceProfile,
    NineGridGenerator, ProgressReporter, UploadFile,
};

/// 九宫格服务状态。
pub struct NineGridService {
    generator: NineGridGenerator,
    cancel_flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl NineGridService {
    /// 使用默认配置与指定资源目录创建服务。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use nine_grid_generator::nine_grid::NineGridService;
    ///
    /// let service = NineGridService::new("public/images")?;
    /// # Ok::<(), nine_grid_generator::nine_grid::GridError>(())
    /// ```
    pub fn new(asset_dir: impl AsRef<std::path::Path>) -> Result<Self, GridError> {
        Self::with_config(
            GridConfig::default(),
            ComposeConfig::default(),
            FillerImageSet::default_in(asset_dir),
        )
    }

    /// 使用自定义配置创建服务。
    pub fn with_config(
        grid: GridConfig,
        options: ComposeConfig,
        fillers: FillerImageSet,
    ) -> Result<Self, GridError> {
        Ok(Self::from_generator(NineGridGenerator::new(grid, options, fillers)?))
    }

    pub fn from_generator(generator: NineGridGenerator) -> Self {
        Self {
            generator,
            cancel_flags: Mutex::new(HashMap::new()),
        }
    }

    pub fn generator(&self) -> &NineGridGenerator {
        &self.generator
    }

    /// 校验上传文件并生成九宫格。
    ///
    /// 请求期间可通过 `cancel(request_id)` 取消；结束或被丢弃后取消标志被移除。
    pub async fn generate_upload(
        &self,
        request_id: &str,
        upload: UploadFile,
        progress: &ProgressReporter,
    ) -> Result<EncodedImage, GridError> {
        if let Err(err) = self.generator.loader().validate_upload(&upload) {
            log::warn!(
                "🚫 上传文件校验失败 - request_id={} file={} {}",
                request_id,
                upload.file_name.as_deref().unwrap_or("<unnamed>"),
                err
            );
            progress.fail(err.to_string());
            return Err(err);
        }

        let request = self.register(request_id)?;
        let result = self
            .generator
            .generate_with_progress(upload.into_source(), progress, || request.is_cancelled())
            .await;
        drop(request);

        if let Err(GridError::Cancelled(_)) = &result {
            log::info!("⏹️ 请求已取消 - request_id={}", request_id);
        }
        result
    }

    /// 取消进行中的请求；请求不存在时返回 `false`。
    pub fn cancel(&self, request_id: &str) -> Result<bool, GridError> {
        let guard = self
            .cancel_flags
            .lock()
            .map_err(|_| GridError::Internal("取消标志锁已中毒".to_string()))?;

        if let Some(flag) = guard.get(request_id) {
            flag.store(true, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn set_user_image_position(&self, position: i32) -> Result<(), GridError> {
        self.generator.set_user_image_position(position)
    }

    /// 当前生效的性能档位（字符串）。
    pub fn performance_profile(&self) -> String {
        self.generator
            .compose_config()
            .infer_performance_profile()
            .as_str()
            .to_string()
    }

    /// 按档位重建生成器（填充图片缓存随之重建）。
    pub fn with_performance_profile(self, profile: &str) -> Result<Self, GridError> {
        let profile = ImagePerformanceProfile::from_str(profile)?;
        let grid = self.generator.grid_config()?;
        let mut options = self.generator.compose_config().clone();
        options.apply_performance_profile(profile);
        let fillers = FillerImageSet::new(self.generator.filler_sources().to_vec())?;

        Self::with_config(grid, options, fillers)
    }

    /// 当前登记在册、可被取消的请求数。
    pub fn active_requests(&self) -> Result<usize, GridError> {
        let guard = self
            .cancel_flags
            .lock()
            .map_err(|_| GridError::Internal("取消标志锁已中毒".to_string()))?;
        Ok(guard.len())
    }

    fn register(&self, request_id: &str) -> Result<RequestRegistration<'_>, GridError> {
        let flag = Arc::new(AtomicBool::new(false));
        let mut guard = self
            .cancel_flags
            .lock()
            .map_err(|_| GridError::Internal("取消标志锁已中毒".to_string()))?;
        if guard.insert(request_id.to_string(), Arc::clone(&flag)).is_some() {
            log::warn!("⚠️ request_id 重复，取消操作只作用于最新的请求：{}", request_id);
        }
        Ok(RequestRegistration {
            flags: &self.cancel_flags,
            request_id: request_id.to_string(),
            flag,
        })
    }
}

/// 请求的取消标志登记。
///
/// 在 `Drop` 中注销，调用方丢弃 `generate_upload` 的 future 时同样生效。
/// 只移除自己登记的那个标志，同名的新请求不受影响。
struct RequestRegistration<'a> {
    flags: &'a Mutex<HashMap<String, Arc<AtomicBool>>>,
    request_id: String,
    flag: Arc<AtomicBool>,
}

impl RequestRegistration<'_> {
    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for RequestRegistration<'_> {
    fn drop(&mut self) {
        let Ok(mut guard) = self.flags.lock() else {
            log::error!("❌ 取消标志锁已中毒，无法注销请求：{}", self.request_id);
            return;
        };
        let owned = guard
            .get(&self.request_id)
            .is_some_and(|current| Arc::ptr_eq(current, &self.flag));
        if owned {
            guard.remove(&self.request_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nine_grid::ComposeStage;
    use crate::nine_grid::test_support::png_bytes;

    fn service() -> NineGridService {
        let entries = (0..8u8)
            .map(|i| (format!("{}.png", i), png_bytes(20, 20, [0, i * 30, 0, 255])))
            .collect();
        NineGridService::with_config(
            GridConfig::with_grid_size(60, 4),
            ComposeConfig::default(),
            FillerImageSet::from_bytes(entries).expect("eight fillers"),
        )
        .expect("service init failed")
    }

    fn upload() -> UploadFile {
        UploadFile::new(png_bytes(50, 30, [255, 0, 0, 255]))
            .with_file_name("me.png")
            .with_mime_type("image/png")
    }

    #[tokio::test]
    async fn generate_upload_returns_jpeg_and_clears_flag() {
        let service = service();
        let progress = ProgressReporter::silent();

        let encoded = service
            .generate_upload("req-1", upload(), &progress)
            .await
            .expect("generate");

        assert_eq!((encoded.width, encoded.height), (60, 60));
        assert_eq!(progress.snapshot().stage, ComposeStage::Done);
        assert!(!service.cancel("req-1").expect("cancel"));
    }

    #[tokio::test]
    async fn rejected_upload_never_starts_loading() {
        let service = service();
        let progress = ProgressReporter::silent();
        let text = UploadFile::new(b"hello".to_vec())
            .with_file_name("notes.txt")
            .with_mime_type("text/plain");

        let result = service.generate_upload("req-2", text, &progress).await;

        assert!(matches!(result, Err(GridError::InvalidFormat(_))));
        let snapshot = progress.snapshot();
        assert_eq!(snapshot.stage, ComposeStage::Failed);
        assert_eq!(snapshot.percent, 0);
    }

    #[test]
    fn tiff_extension_without_mime_is_accepted_by_validation() {
        let service = service();
        let upload = UploadFile::new(png_bytes(10, 10, [1, 2, 3, 255])).with_file_name("scan.TIFF");

        service
            .generator()
            .loader()
            .validate_upload(&upload)
            .expect("extension fallback accepts tiff");
    }

    #[tokio::test]
    async fn cancel_from_progress_callback_stops_request() {
        let service = Arc::new(service());
        let canceller = Arc::clone(&service);
        let progress = ProgressReporter::with_callback(move |p| {
            if p.stage == ComposeStage::LoadingImages {
                let _ = canceller.cancel("req-3");
            }
        });

        let result = service.generate_upload("req-3", upload(), &progress).await;

        assert!(matches!(result, Err(GridError::Cancelled(_))));
        assert!(!service.cancel("req-3").expect("cancel"));
    }

    #[tokio::test]
    async fn abandoned_requests_are_unregistered() {
        let service = service();

        for i in 0..5 {
            let request_id = format!("req-abandon-{}", i);
            let loading = Arc::new(tokio::sync::Notify::new());
            let notify = Arc::clone(&loading);
            let progress = ProgressReporter::with_callback(move |p| {
                if p.stage == ComposeStage::LoadingImages {
                    notify.notify_one();
                }
            });

            tokio::select! {
                biased;
                _ = loading.notified() => {}
                _ = service.generate_upload(&request_id, upload(), &progress) => {
                    panic!("request should be abandoned while loading");
                }
            }

            assert!(!service.cancel(&request_id).expect("cancel"));
        }

        assert_eq!(service.active_requests().expect("count"), 0);
    }

    #[test]
    fn finishing_older_duplicate_keeps_newer_cancellable() {
        let service = service();

        let older = service.register("dup").expect("register older");
        let newer = service.register("dup").expect("register newer");
        drop(older);

        assert!(service.cancel("dup").expect("cancel"));
        assert!(newer.is_cancelled());

        drop(newer);
        assert_eq!(service.active_requests().expect("count"), 0);
        assert!(!service.cancel("dup").expect("cancel"));
    }

    #[test]
    fn cancel_unknown_request_returns_false() {
        assert!(!service().cancel("nope").expect("cancel"));
    }

    #[test]
    fn switching_profile_rebuilds_generator() {
        let service = service();
        assert_eq!(service.performance_profile(), "balanced");

        let service = service.with_performance_profile("speed").expect("speed");
        assert_eq!(service.performance_profile(), "speed");
        assert_eq!(service.generator().filler_image_names().len(), 8);

        assert!(matches!(
            service.with_performance_profile("ultra"),
            Err(GridError::InvalidConfig(_))
        ));
    }
}
