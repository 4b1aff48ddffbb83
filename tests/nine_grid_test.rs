use std::io::Cursor;
use std::path::PathBuf;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};

use nine_grid_generator::nine_grid::{
    ComposeConfig, ComposeStage, DEFAULT_FILLER_NAMES, FillerImageSet, GridConfig, GridError,
    ImageSlot, ImageSource, NineGridGenerator, NineGridService, ProgressReporter, UploadFile,
};

const FILLER_COLORS: [[u8; 3]; 8] = [
    [220, 30, 30],
    [30, 200, 30],
    [30, 30, 220],
    [230, 210, 20],
    [20, 200, 210],
    [200, 20, 200],
    [120, 60, 10],
    [10, 90, 60],
];
const USER_COLOR: [u8; 3] = [40, 40, 40];

fn jpeg_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img: RgbImage = ImageBuffer::from_pixel(width, height, Rgb(color));
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut cursor, ImageFormat::Jpeg)
        .expect("failed to encode test jpeg");
    cursor.into_inner()
}

/// 在临时目录写入 8 张默认文件名的纯色填充图片。
fn write_asset_dir(test_name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nine-grid-it-{}-{}", std::process::id(), test_name));
    std::fs::create_dir_all(&dir).expect("create asset dir");
    for (name, color) in DEFAULT_FILLER_NAMES.iter().zip(FILLER_COLORS) {
        std::fs::write(dir.join(name), jpeg_bytes(300, 300, color)).expect("write filler");
    }
    dir
}

fn assert_rgb_close(actual: [u8; 3], expected: [u8; 3], tolerance: u8, what: &str) {
    for channel in 0..3 {
        assert!(
            actual[channel].abs_diff(expected[channel]) <= tolerance,
            "{}: pixel {:?} not within {} of {:?}",
            what,
            actual,
            tolerance,
            expected
        );
    }
}

fn decode(bytes: &[u8]) -> RgbImage {
    image::load_from_memory(bytes).expect("decode output").to_rgb8()
}

#[tokio::test]
async fn landscape_photo_in_center_cell_with_default_layout() {
    let dir = write_asset_dir("center");
    let service = NineGridService::new(&dir).expect("service init failed");
    let upload = UploadFile::new(jpeg_bytes(1200, 800, USER_COLOR))
        .with_file_name("photo.jpg")
        .with_mime_type("image/jpeg");

    let progress = ProgressReporter::silent();
    let encoded = service
        .generate_upload("e2e", upload, &progress)
        .await
        .expect("generate");
    let _ = std::fs::remove_dir_all(&dir);

    assert_eq!(progress.snapshot().stage, ComposeStage::Done);
    assert_eq!(progress.snapshot().percent, 100);

    let pixels = decode(&encoded.bytes);
    assert_eq!(pixels.dimensions(), (800, 800));

    // 中间格 (266,266)，照片缩放为 266x177，上下各留 44 像素白边
    assert_rgb_close(pixels.get_pixel(399, 290).0, [255, 255, 255], 8, "top letterbox");
    assert_rgb_close(pixels.get_pixel(399, 500).0, [255, 255, 255], 8, "bottom letterbox");
    assert_rgb_close(pixels.get_pixel(399, 399).0, USER_COLOR, 8, "user photo");

    // 其余格子按行优先顺序放入填充图片
    let mut filler = 0;
    for position in 0..9u32 {
        if position == 4 {
            continue;
        }
        let x = (position % 3) * 266 + 133;
        let y = (position / 3) * 266 + 133;
        assert_rgb_close(
            pixels.get_pixel(x, y).0,
            FILLER_COLORS[filler],
            10,
            &format!("filler {} at position {}", filler, position),
        );
        filler += 1;
    }
}

#[tokio::test]
async fn repeated_generation_is_byte_identical() {
    let dir = write_asset_dir("determinism");
    let generator = NineGridGenerator::new(
        GridConfig::with_grid_size(300, 0),
        ComposeConfig::default(),
        FillerImageSet::default_in(&dir),
    )
    .expect("generator init failed");

    let source = || ImageSource::bytes(jpeg_bytes(640, 480, USER_COLOR), "photo.jpg");
    let first = generator.generate(source()).await.expect("first");
    let second = generator.generate(source()).await.expect("second");
    let _ = std::fs::remove_dir_all(&dir);

    assert_eq!(first.bytes, second.bytes);
}

#[tokio::test]
async fn data_url_input_and_output() {
    let dir = write_asset_dir("data-url");
    let generator = NineGridGenerator::new(
        GridConfig::with_grid_size(150, 8),
        ComposeConfig::default(),
        FillerImageSet::default_in(&dir),
    )
    .expect("generator init failed");

    let input = format!(
        "data:image/jpeg;base64,{}",
        general_purpose::STANDARD.encode(jpeg_bytes(80, 120, USER_COLOR))
    );
    let encoded = generator
        .generate(ImageSource::Base64(input))
        .await
        .expect("generate");
    let _ = std::fs::remove_dir_all(&dir);

    let data_url = encoded.to_data_url();
    let payload = data_url
        .strip_prefix("data:image/jpeg;base64,")
        .expect("jpeg data url prefix");
    let bytes = general_purpose::STANDARD.decode(payload).expect("valid base64");
    assert_eq!(decode(&bytes).dimensions(), (150, 150));
}

#[tokio::test]
async fn out_of_range_position_fails_before_loading() {
    let generator = NineGridGenerator::new(
        GridConfig::default(),
        ComposeConfig::default(),
        FillerImageSet::default_in("/nonexistent/assets"),
    )
    .expect("generator init failed");

    assert!(matches!(
        generator.set_user_image_position(-1),
        Err(GridError::InvalidConfig(_))
    ));

    let invalid = GridConfig {
        user_image_position: 9,
        ..GridConfig::default()
    };
    assert!(matches!(
        NineGridGenerator::new(invalid, ComposeConfig::default(), FillerImageSet::default_in("x")),
        Err(GridError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn corrupt_filler_is_reported_with_its_slot() {
    let dir = write_asset_dir("corrupt");
    std::fs::write(dir.join(DEFAULT_FILLER_NAMES[2]), b"\xFF\xD8\xFF\xE0 truncated").expect("corrupt filler");

    let generator = NineGridGenerator::new(
        GridConfig::with_grid_size(120, 4),
        ComposeConfig::default(),
        FillerImageSet::default_in(&dir),
    )
    .expect("generator init failed");

    let progress = ProgressReporter::silent();
    let err = generator
        .generate_with_progress(
            ImageSource::bytes(jpeg_bytes(50, 50, USER_COLOR), "photo.jpg"),
            &progress,
            || false,
        )
        .await
        .expect_err("corrupt filler must fail");
    let _ = std::fs::remove_dir_all(&dir);

    assert_eq!(err.code(), "E_COMPOSITION");
    assert!(matches!(
        err.slot(),
        Some(ImageSlot::Filler { index: 2, name }) if name == DEFAULT_FILLER_NAMES[2]
    ));
    assert_eq!(progress.snapshot().stage, ComposeStage::Failed);
}
