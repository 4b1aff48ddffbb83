//! 单元测试共用的图片构造工具。

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::DecodedImage;

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn solid_image(width: u32, height: u32, color: [u8; 4], label: &str) -> DecodedImage {
    let buffer = ImageBuffer::from_pixel(width, height, Rgba(color));
    DecodedImage::new(DynamicImage::ImageRgba8(buffer), label)
}

pub(crate) fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgba(color));

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

/// 进程内唯一的临时路径（不创建文件）。
pub(crate) fn temp_path(name: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("nine-grid-{}-{}-{}", std::process::id(), n, name))
}

pub(crate) fn assert_close(actual: [u8; 4], expected: [u8; 4], tolerance: u8) {
    for channel in 0..4 {
        assert!(
            actual[channel].abs_diff(expected[channel]) <= tolerance,
            "pixel {:?} differs from {:?} by more than {}",
            actual,
            expected,
            tolerance
        );
    }
}
