use std::fs;

use camino::Utf8Path;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::cache::{Hash32, HashCache};
use crate::config::ImagesConfig;
use crate::error::AssetError;
use crate::glob::GlobPattern;

/// Outcome of an image run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Files written to the output tree.
    pub written: usize,
    /// How many of those came straight from the cache.
    pub cached: usize,
}

impl std::ops::Add for Summary {
    type Output = Summary;

    fn add(self, rhs: Self) -> Self::Output {
        Summary {
            written: self.written + rhs.written,
            cached: self.cached + rhs.cached,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Png,
    Jpeg,
    /// Copied as is.
    Verbatim,
}

impl Kind {
    fn of(path: &Utf8Path) -> Self {
        match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("png") => Kind::Png,
            Some("jpg" | "jpeg") => Kind::Jpeg,
            _ => Kind::Verbatim,
        }
    }
}

/// Optimizes every matched image into the output directory, keeping the
/// relative layout below the pattern root.
///
/// PNG and JPEG files are re-encoded and the smaller of the original and the
/// re-encoded file wins. Results are cached by content hash, so unchanged
/// images are never encoded twice.
pub fn optimize(config: &ImagesConfig, cache: &HashCache) -> Result<Summary, AssetError> {
    let pattern = GlobPattern::new(&config.sources)?;
    let files = pattern.walk()?;

    files
        .into_par_iter()
        .map(|path| {
            let out = config.out_dir.join(pattern.relative(&path));
            process_image(&path, &out, config.jpeg_quality, cache)
        })
        .try_reduce(Summary::default, |a, b| Ok(a + b))
}

fn process_image(
    path: &Utf8Path,
    out: &Utf8Path,
    quality: u8,
    cache: &HashCache,
) -> Result<Summary, AssetError> {
    let kind = Kind::of(path);
    let buffer = fs::read(path).map_err(AssetError::fs(path))?;

    if kind == Kind::Verbatim {
        crate::utils::write_output(out, &buffer)?;
        return Ok(Summary {
            written: 1,
            cached: 0,
        });
    }

    let ext = path.extension().unwrap_or_default();
    let hash = Hash32::hash_with(&buffer, &variant(kind, quality));

    // If this hash exists it means the work is already done.
    if let Some(hit) = cache.get(hash, ext) {
        crate::utils::copy_output(&hit, out)?;
        return Ok(Summary {
            written: 1,
            cached: 1,
        });
    }

    let encoded = encode(kind, &buffer, quality).map_err(|e| AssetError::transform("image", path, e))?;
    let smallest = if encoded.len() < buffer.len() {
        &encoded
    } else {
        &buffer
    };

    tracing::debug!(
        path = %path,
        before = buffer.len(),
        after = smallest.len(),
        "optimized image"
    );

    let cached = cache.put(hash, ext, smallest)?;
    crate::utils::copy_output(&cached, out)?;

    Ok(Summary {
        written: 1,
        cached: 0,
    })
}

/// Settings that change the encoded output are part of the cache key.
fn variant(kind: Kind, quality: u8) -> String {
    match kind {
        Kind::Png => "png-best".to_string(),
        Kind::Jpeg => format!("jpeg-q{quality}"),
        Kind::Verbatim => "verbatim".to_string(),
    }
}

fn encode(kind: Kind, buffer: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Vec::new();

    match kind {
        Kind::Png => {
            let img = image::load_from_memory_with_format(buffer, ImageFormat::Png)?;
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, FilterType::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        Kind::Jpeg => {
            let img = image::load_from_memory_with_format(buffer, ImageFormat::Jpeg)?;
            // JPEG has no alpha channel.
            let img = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
            img.write_with_encoder(encoder)?;
        }
        Kind::Verbatim => out.extend_from_slice(buffer),
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn setup() -> (tempfile::TempDir, Utf8PathBuf, ImagesConfig, HashCache) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join("src/images/icons")).unwrap();

        let config = ImagesConfig {
            sources: format!("{root}/src/images/**/*.{{png,jpg,jpeg,gif,svg}}"),
            out_dir: root.join("dist/images"),
            jpeg_quality: 80,
        };
        let cache = HashCache::new(root.join(".cache/images"));

        (dir, root, config, cache)
    }

    #[test]
    fn test_optimize_then_cache_hit() {
        let (_dir, root, config, cache) = setup();

        image::RgbImage::from_fn(64, 64, |x, _| image::Rgb([(x * 4) as u8, 0, 0]))
            .save(root.join("src/images/icons/red.png"))
            .unwrap();
        fs::write(root.join("src/images/logo.svg"), "<svg/>").unwrap();

        let first = optimize(&config, &cache).unwrap();
        assert_eq!(first, Summary { written: 2, cached: 0 });

        let out = root.join("dist/images/icons/red.png");
        let original = fs::metadata(root.join("src/images/icons/red.png")).unwrap().len();
        assert!(fs::metadata(&out).unwrap().len() <= original);
        image::open(&out).unwrap();
        assert_eq!(
            fs::read_to_string(root.join("dist/images/logo.svg")).unwrap(),
            "<svg/>"
        );

        fs::remove_dir_all(root.join("dist")).unwrap();

        let second = optimize(&config, &cache).unwrap();
        assert_eq!(second, Summary { written: 2, cached: 1 });
        assert!(out.exists());
    }

    #[test]
    fn test_jpeg_quality_is_part_of_key() {
        assert_ne!(
            Hash32::hash_with(b"same", &variant(Kind::Jpeg, 80)),
            Hash32::hash_with(b"same", &variant(Kind::Jpeg, 60)),
        );
    }

    #[test]
    fn test_corrupt_png() {
        let (_dir, root, config, cache) = setup();
        fs::write(root.join("src/images/broken.png"), "not really a png").unwrap();

        match optimize(&config, &cache).unwrap_err() {
            AssetError::Transform { tool, path, .. } => {
                assert_eq!(tool, "image");
                assert_eq!(path, root.join("src/images/broken.png"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
