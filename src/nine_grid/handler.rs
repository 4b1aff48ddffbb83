//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `NineGridGenerator` 只负责流程编排与配置管理，不直接与任何界面绑定。
//! 处理链路固定为：
//! 1. 读取网格配置快照并校验（失败则不加载任何图片）
//! 2. 并发加载用户图片与 8 张填充图片
//! 3. 全部解码完成后，按位置 0..8 的固定顺序绘制
//! 4. 编码为 JPEG
//!
//! ## 实现思路
//!
//! - 网格配置通过 `RwLock<GridConfig>` 支持运行时修改用户图片位置。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 填充图片解码后放进 `OnceCell<Arc<_>>`，之后只读共享，避免重复解码。
//! - 解码结果按下标缓存，与完成顺序无关。
//! - 每个阶段之间检查取消标志；直接丢弃 future 时 `JoinSet` 会中止未完成的解码任务。
//! - 记录 `load/compose/encode/total` 阶段耗时，便于性能诊断。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use super::config::{CELL_COUNT, FILLER_COUNT};
use super::progress::{ComposeStage, ProgressReporter, milestones};
use super::{
    CellPosition, ComposeConfig, DecodedImage, EncodedImage, FillerAsset, FillerImageSet,
    GridComposer, GridConfig, GridError, ImageLoader, ImageSlot, ImageSource,
};

/// 九宫格生成器。
///
/// 持有默认网格配置、渲染配置、填充图片集合与加载器。
pub struct NineGridGenerator {
    grid: RwLock<GridConfig>,
    options: ComposeConfig,
    fillers: FillerImageSet,
    loader: ImageLoader,
    filler_cache: OnceCell<Arc<Vec<DecodedImage>>>,
}

impl NineGridGenerator {
    /// 创建生成器；配置非法时直接返回 `InvalidConfig`。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use nine_grid_generator::nine_grid::{
    ///     ComposeConfig, FillerImageSet, GridConfig, ImageSource, NineGridGenerator,
    /// };
    ///
    /// # async fn demo() -> Result<(), nine_grid_generator::nine_grid::GridError> {
    /// let generator = NineGridGenerator::new(
    ///     GridConfig::default(),
    ///     ComposeConfig::default(),
    ///     FillerImageSet::default_in("public/images"),
    /// )?;
    /// let encoded = generator.generate(ImageSource::FilePath("me.png".into())).await?;
    /// encoded.save_to("grid.jpg".as_ref())?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        grid: GridConfig,
        options: ComposeConfig,
        fillers: FillerImageSet,
    ) -> Result<Self, GridError> {
        grid.validate()?;
        options.validate()?;
        if fillers.len() != FILLER_COUNT {
            return Err(GridError::InvalidConfig(format!(
                "填充图片必须恰好 {} 张，实际 {} 张",
                FILLER_COUNT,
                fillers.len()
            )));
        }

        log::info!(
            "🧱 九宫格生成器已就绪 - grid={} cell={} position={} filter={:?} quality={}",
            grid.grid_size,
            grid.cell_size,
            grid.user_image_position,
            options.resize_filter,
            options.jpeg_quality
        );

        Ok(Self {
            grid: RwLock::new(grid),
            loader: ImageLoader::new(options.clone()),
            options,
            fillers,
            filler_cache: OnceCell::new(),
        })
    }

    /// 获取网格配置快照。
    pub fn grid_config(&self) -> Result<GridConfig, GridError> {
        self.grid
            .read()
            .map(|cfg| *cfg)
            .map_err(|_| GridError::Internal("网格配置读取锁已中毒".to_string()))
    }

    /// 替换整份网格配置（先校验，失败时保持原配置）。
    pub fn set_grid_config(&self, grid: GridConfig) -> Result<(), GridError> {
        grid.validate()?;
        let mut current = self
            .grid
            .write()
            .map_err(|_| GridError::Internal("网格配置写入锁已中毒".to_string()))?;
        *current = grid;
        Ok(())
    }

    /// 修改用户图片所在位置（0~8，行优先）。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use nine_grid_generator::nine_grid::{
    ///     ComposeConfig, FillerImageSet, GridConfig, GridError, NineGridGenerator,
    /// };
    ///
    /// let generator = NineGridGenerator::new(
    ///     GridConfig::default(),
    ///     ComposeConfig::default(),
    ///     FillerImageSet::default_in("images"),
    /// )?;
    /// generator.set_user_image_position(0)?;
    /// assert!(matches!(generator.set_user_image_position(9), Err(GridError::InvalidConfig(_))));
    /// # Ok::<(), GridError>(())
    /// ```
    pub fn set_user_image_position(&self, position: i32) -> Result<(), GridError> {
        let position = CellPosition::try_from(position)?;
        let mut current = self
            .grid
            .write()
            .map_err(|_| GridError::Internal("网格配置写入锁已中毒".to_string()))?;
        current.user_image_position = position.index() as i32;

        log::info!("📍 用户图片位置已切换为 {}", position.index());
        Ok(())
    }

    pub fn compose_config(&self) -> &ComposeConfig {
        &self.options
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// 填充图片文件名（按填充顺序）。
    pub fn filler_image_names(&self) -> Vec<String> {
        self.fillers.names()
    }

    pub fn filler_sources(&self) -> &[FillerAsset] {
        self.fillers.assets()
    }

    /// 生成九宫格（无进度、不可取消）。
    pub async fn generate(&self, source: ImageSource) -> Result<EncodedImage, GridError> {
        self.generate_with_progress(source, &ProgressReporter::silent(), || false)
            .await
    }

    /// 生成九宫格，阶段之间上报进度并检查取消标志。
    pub async fn generate_with_progress<C>(
        &self,
        source: ImageSource,
        progress: &ProgressReporter,
        is_cancelled: C,
    ) -> Result<EncodedImage, GridError>
    where
        C: Fn() -> bool + Send + Sync,
    {
        let result = self.run(source, progress, &is_cancelled).await;
        match &result {
            Ok(_) => progress.advance(ComposeStage::Done, milestones::DONE),
            Err(err) => {
                log::warn!("❌ 九宫格生成失败 - code={} stage={} {}", err.code(), err.stage(), err);
                progress.fail(err.to_string());
            }
        }
        result
    }

    async fn run<C>(
        &self,
        source: ImageSource,
        progress: &ProgressReporter,
        is_cancelled: &C,
    ) -> Result<EncodedImage, GridError>
    where
        C: Fn() -> bool + Send + Sync,
    {
        let grid = self.grid_config()?;
        grid.validate()?;
        let total_start = Instant::now();

        ensure_not_cancelled(is_cancelled)?;
        progress.advance(ComposeStage::LoadingImages, milestones::LOADING_STARTED);

        let load_start = Instant::now();
        let loaded = AtomicUsize::new(0);
        let (user, fillers) = tokio::try_join!(
            self.load_user(source, progress, &loaded),
            self.load_fillers(progress, &loaded, is_cancelled),
        )?;
        let load_elapsed = load_start.elapsed();
        progress.advance(ComposeStage::LoadingImages, milestones::LOADING_FINISHED);

        ensure_not_cancelled(is_cancelled)?;
        progress.advance(ComposeStage::Compositing, milestones::COMPOSITING);

        let composer = GridComposer::new(grid, self.options.clone());
        let compose_start = Instant::now();
        let renderer = composer.clone();
        let pixels = tokio::task::spawn_blocking(move || renderer.render(&user, &fillers))
            .await
            .map_err(|e| {
                GridError::Encode(format!("合成任务异常退出：{}", e)).in_slot(ImageSlot::Canvas)
            })??;
        let compose_elapsed = compose_start.elapsed();

        ensure_not_cancelled(is_cancelled)?;
        progress.advance(ComposeStage::Encoding, milestones::ENCODING);

        let encode_start = Instant::now();
        let encoded = tokio::task::spawn_blocking(move || composer.encode(&pixels))
            .await
            .map_err(|e| {
                GridError::Encode(format!("编码任务异常退出：{}", e)).in_slot(ImageSlot::Canvas)
            })??;
        let encode_elapsed = encode_start.elapsed();

        log::info!(
            "✅ 九宫格生成完成 - load={}ms compose={}ms encode={}ms total={}ms size={}KB",
            load_elapsed.as_millis(),
            compose_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            encoded.bytes.len() / 1024
        );

        Ok(encoded)
    }

    async fn load_user(
        &self,
        source: ImageSource,
        progress: &ProgressReporter,
        loaded: &AtomicUsize,
    ) -> Result<DecodedImage, GridError> {
        log::debug!("📥 加载用户图片：{}", source.describe());
        let user = self
            .loader
            .load(source)
            .await
            .map_err(|e| e.in_slot(ImageSlot::User))?;
        report_loaded(progress, loaded);
        Ok(user)
    }

    async fn load_fillers<C>(
        &self,
        progress: &ProgressReporter,
        loaded: &AtomicUsize,
        is_cancelled: &C,
    ) -> Result<Arc<Vec<DecodedImage>>, GridError>
    where
        C: Fn() -> bool + Send + Sync,
    {
        if !self.options.cache_fillers {
            return self.decode_fillers(progress, loaded, is_cancelled).await;
        }

        if let Some(cached) = self.filler_cache.get() {
            log::debug!("♻️ 复用已缓存的 {} 张填充图片", cached.len());
            return Ok(Arc::clone(cached));
        }

        let fillers = self
            .filler_cache
            .get_or_try_init(|| self.decode_fillers(progress, loaded, is_cancelled))
            .await?;
        Ok(Arc::clone(fillers))
    }

    async fn decode_fillers<C>(
        &self,
        progress: &ProgressReporter,
        loaded: &AtomicUsize,
        is_cancelled: &C,
    ) -> Result<Arc<Vec<DecodedImage>>, GridError>
    where
        C: Fn() -> bool + Send + Sync,
    {
        let mut tasks = JoinSet::new();
        for (index, asset) in self.fillers.assets().iter().enumerate() {
            let loader = self.loader.clone();
            let source = asset.source.clone();
            let name = asset.name.clone();
            tasks.spawn(async move {
                let result = loader.load(source).await;
                (index, name, result)
            });
        }

        let mut decoded: Vec<Option<DecodedImage>> = vec![None; self.fillers.len()];
        while let Some(joined) = tasks.join_next().await {
            ensure_not_cancelled(is_cancelled)?;

            let (index, name, result) = joined
                .map_err(|e| GridError::Decode(format!("填充图片加载任务异常退出：{}", e)))?;
            let mut image = result.map_err(|e| {
                e.in_slot(ImageSlot::Filler {
                    index,
                    name: name.clone(),
                })
            })?;
            log::debug!("🖼️ 填充图片 #{} {} 已解码 {}x{}", index, name, image.width, image.height);
            image.label = name;
            decoded[index] = Some(image);
            report_loaded(progress, loaded);
        }

        let fillers = decoded
            .into_iter()
            .zip(self.fillers.assets())
            .enumerate()
            .map(|(index, (image, asset))| {
                image.ok_or_else(|| {
                    GridError::Decode("填充图片未返回结果".to_string()).in_slot(ImageSlot::Filler {
                        index,
                        name: asset.name.clone(),
                    })
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arc::new(fillers))
    }
}

fn ensure_not_cancelled<C: Fn() -> bool>(is_cancelled: &C) -> Result<(), GridError> {
    if is_cancelled() {
        return Err(GridError::Cancelled("九宫格生成已取消".to_string()));
    }
    Ok(())
}

/// 每完成一张图片，在 5%~65% 区间内推进一次。
fn report_loaded(progress: &ProgressReporter, loaded: &AtomicUsize) {
    let done = loaded.fetch_add(1, Ordering::SeqCst) + 1;
    let span = (milestones::LOADING_FINISHED - milestones::LOADING_STARTED) as usize;
    let percent = milestones::LOADING_STARTED as usize + span * done.min(CELL_COUNT) / CELL_COUNT;
    progress.advance(ComposeStage::LoadingImages, percent as u8);
}
