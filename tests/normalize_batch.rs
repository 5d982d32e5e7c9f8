//! End-to-end run of the batch API on real encoded files.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use vision_prep::imaging::{NormalizeOptions, normalize_bytes};
use vision_prep::process::{REPORT_FILENAME, Report, normalize_paths};

fn noisy_rgb(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(7919) ^ y.wrapping_mul(104_729);
        Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    }))
}

fn save(img: &DynamicImage, path: &Path, format: ImageFormat) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    img.save_with_format(path, format).unwrap();
}

#[test]
fn mixed_directory_is_normalized() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("photos");

    save(&noisy_rgb(3000, 1000), &input.join("wide.png"), ImageFormat::Png);
    save(&noisy_rgb(640, 480), &input.join("small.jpg"), ImageFormat::Jpeg);
    let logo = DynamicImage::ImageRgba8(RgbaImage::from_fn(120, 120, |x, _| {
        Rgba([200, 30, 30, if x < 60 { 0 } else { 255 }])
    }));
    save(&logo, &input.join("icons/logo.png"), ImageFormat::Png);
    fs::write(input.join("readme.txt"), "not an image").unwrap();

    let out = tmp.path().join("out");
    let result = normalize_paths(&[input], &out, &NormalizeOptions::default(), true, None)
        .unwrap();

    assert!(result.report.failures.is_empty());
    assert_eq!(result.report.files.len(), 3);

    let wide = image::open(out.join("wide.jpg")).unwrap();
    assert_eq!((wide.width(), wide.height()), (2048, 683));

    let small = image::open(out.join("small.jpg")).unwrap();
    assert_eq!((small.width(), small.height()), (640, 480));

    let logo_out = image::open(out.join("icons/logo.png")).unwrap();
    assert!(logo_out.color().has_alpha());

    let report: Report =
        serde_json::from_str(&fs::read_to_string(out.join(REPORT_FILENAME)).unwrap()).unwrap();
    let wide_summary = report
        .files
        .iter()
        .find(|f| f.output == "wide.jpg")
        .unwrap();
    assert!(wide_summary.was_resized);
    assert_eq!(wide_summary.original_width, 3000);
    assert_eq!(wide_summary.media_type, "image/jpeg");
}

#[test]
fn tight_byte_cap_is_reported_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("noise.png");
    save(&noisy_rgb(800, 800), &input, ImageFormat::Png);

    let options = NormalizeOptions {
        max_bytes: 1024,
        ..NormalizeOptions::default()
    };
    let out = tmp.path().join("out");
    let result = normalize_paths(&[input], &out, &options, false, None).unwrap();

    let summary = &result.report.files[0];
    assert!(!summary.within_byte_cap);
    assert!(summary.was_compressed);
    assert!(summary.notes.iter().any(|n| n.starts_with("cap not met")));
}

#[test]
fn single_buffer_becomes_data_url() {
    let mut png = Vec::new();
    noisy_rgb(64, 32)
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();

    let normalized = normalize_bytes(&png, "image/png", &NormalizeOptions::default()).unwrap();
    assert_eq!(normalized.media_type, "image/jpeg");
    assert_eq!((normalized.width, normalized.height), (64, 32));
    assert!(normalized.data_url().starts_with("data:image/jpeg;base64,"));
}
