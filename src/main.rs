//! # 九宫格图片合成工具：命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与结果输出。
//! 业务逻辑分布在 `nine_grid` 子模块中，详见 `lib.rs` 架构文档。

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use nine_grid_generator::error::AppError;
use nine_grid_generator::nine_grid::{
    EncodedImage, GRID_DIMENSION, ImageSource, NineGridService, ProgressReporter,
};
use nine_grid_generator::settings::AppSettings;

#[derive(Parser, Debug)]
#[command(name = "nine-grid", version, about = "把一张照片和 8 张角色图拼成九宫格 JPEG")]
struct Cli {
    /// 用户图片：本地路径、http(s) URL 或 data URL。
    input: String,

    /// 输出文件；缺省时使用 `touhou_nine_grid_<时间>.jpg`。
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 填充图片所在目录。
    #[arg(long)]
    assets: Option<PathBuf>,

    /// 用户图片所在格子（0~8，行优先）。
    #[arg(long, allow_negative_numbers = true)]
    position: Option<i32>,

    /// 输出边长（像素）；未指定 `--cell-size` 时格子边长取其三分之一。
    #[arg(long)]
    grid_size: Option<u32>,

    /// 格子边长（像素）。
    #[arg(long)]
    cell_size: Option<u32>,

    /// JPEG 质量（1~100）。
    #[arg(long)]
    quality: Option<u8>,

    /// 缩放档位：quality / balanced / speed。
    #[arg(long)]
    profile: Option<String>,

    /// JSON 设置文件。
    #[arg(long)]
    config: Option<PathBuf>,

    /// 输出 data URL 到标准输出，而不是写文件。
    #[arg(long)]
    data_url: bool,
}

impl Cli {
    /// 命令行参数覆盖设置文件。
    fn apply_to(&self, settings: &mut AppSettings) {
        if let Some(dir) = &self.assets {
            settings.assets_dir = dir.clone();
            settings.asset_base_url = None;
        }
        if let Some(grid_size) = self.grid_size {
            settings.grid.grid_size = grid_size;
            settings.grid.cell_size = grid_size / GRID_DIMENSION;
        }
        if let Some(cell_size) = self.cell_size {
            settings.grid.cell_size = cell_size;
        }
        if let Some(position) = self.position {
            settings.grid.user_image_position = position;
        }
        if let Some(quality) = self.quality {
            settings.jpeg_quality = quality;
        }
        if let Some(profile) = &self.profile {
            settings.performance_profile = profile.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ 生成失败 [{}]: {}", err.code(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut settings = match &cli.config {
        Some(path) => AppSettings::load_or_default(path)?,
        None => AppSettings::default(),
    };
    cli.apply_to(&mut settings);

    let service = NineGridService::with_config(
        settings.grid,
        settings.compose_config()?,
        settings.filler_set()?,
    )?;

    let progress = ProgressReporter::with_callback(|p| {
        log::info!("⏳ {} {}%", p.stage, p.percent);
    });

    let encoded = generate(&service, &cli.input, &progress).await?;

    if cli.data_url {
        println!("{}", encoded.to_data_url());
        return Ok(());
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(encoded.suggested_file_name(&chrono::Local::now())));
    encoded.save_to(&output)?;
    println!("{}", output.display());
    Ok(())
}

async fn generate(
    service: &NineGridService,
    input: &str,
    progress: &ProgressReporter,
) -> Result<EncodedImage, AppError> {
    if input.starts_with("http://") || input.starts_with("https://") {
        let encoded = service
            .generator()
            .generate_with_progress(ImageSource::Url(input.to_string()), progress, || false)
            .await?;
        return Ok(encoded);
    }

    if input.starts_with("data:") {
        let encoded = service
            .generator()
            .generate_with_progress(ImageSource::Base64(input.to_string()), progress, || false)
            .await?;
        return Ok(encoded);
    }

    let upload = service.generator().loader().read_upload_file(Path::new(input))?;
    Ok(service.generate_upload("cli", upload, progress).await?)
}
