//! Image loading helpers shared by the CLI, the replay source and the benches

use crate::models::Frame;
use image::GenericImageView;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

fn max_dim_from_env() -> Option<u32> {
    match env::var("CODESCAN_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) | Err(_) => None,
            Ok(v) => Some(v),
        },
        Err(_) => None,
    }
}

/// Load an image as RGB bytes along with its dimensions.
///
/// Images larger than `CODESCAN_MAX_DIM` (if set) are downscaled first.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<(Vec<u8>, u32, u32), image::ImageError> {
    let img = image::open(path)?;
    let (orig_w, orig_h) = img.dimensions();
    let rgb = match max_dim_from_env() {
        Some(max_dim) if orig_w.max(orig_h) > max_dim => img
            .resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
            .to_rgb8(),
        _ => img.to_rgb8(),
    };
    let (width, height) = rgb.dimensions();
    Ok((rgb.into_raw(), width, height))
}

/// Load an image straight into a [`Frame`]
pub fn load_frame<P: AsRef<Path>>(path: P, seq: u64) -> Result<Frame, image::ImageError> {
    let (pixels, width, height) = load_rgb(path)?;
    Frame::from_rgb(pixels, width, height, seq).ok_or_else(|| {
        image::ImageError::Parameter(image::error::ParameterError::from_kind(
            image::error::ParameterErrorKind::DimensionMismatch,
        ))
    })
}

/// Synthetic RGB frame with a diagonal gradient, for benches and tests
pub fn gradient_frame(width: u32, height: u32) -> Frame {
    let rgb = image::RgbImage::from_fn(width, height, |x, y| {
        let v = ((x + y) % 256) as u8;
        image::Rgb([v, v.wrapping_add(40), v.wrapping_add(80)])
    });
    Frame::from_image(&image::DynamicImage::ImageRgb8(rgb), 0)
}

/// Iterate image paths under `root`, sorted, with an optional smoke list and limit.
///
/// With `smoke` set, paths listed in `root/_smoke.txt` are used when present.
pub fn dataset_iter<P: AsRef<Path>>(
    root: P,
    limit: Option<usize>,
    smoke: bool,
) -> impl Iterator<Item = PathBuf> {
    let root = root.as_ref();
    let mut images = if smoke {
        load_smoke_list(root).unwrap_or_else(|| collect_images(root))
    } else {
        collect_images(root)
    };

    images.sort();
    if let Some(limit) = limit {
        images.truncate(limit);
    }
    images.into_iter()
}

fn load_smoke_list(root: &Path) -> Option<Vec<PathBuf>> {
    let contents = fs::read_to_string(root.join("_smoke.txt")).ok()?;
    let paths: Vec<PathBuf> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let candidate = Path::new(line);
            if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                root.join(candidate)
            }
        })
        .filter(|path| path.exists())
        .collect();
    if paths.is_empty() { None } else { Some(paths) }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn collect_images(root: &Path) -> Vec<PathBuf> {
    let mut stack = vec![root.to_path_buf()];
    let mut images = Vec::new();

    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_image(&path) {
                images.push(path);
            }
        }
    }

    images
}

/// Read codes from a text file (one per line, blank lines and `#` comments skipped)
pub fn read_code_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
