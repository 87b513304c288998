use std::fs;
use std::io::ErrorKind;
use std::time::Instant;

use camino::Utf8Path;

use crate::cache::HashCache;
use crate::error::AssetError;
use crate::glob::{GlobPattern, has_magic};

/// Deletes generated output and clears the transformation cache.
///
/// Every entry of `paths` is either a plain path (file or directory, removed
/// recursively) or a glob pattern (every matching file is removed). Paths
/// which do not exist are skipped. The cache is cleared after all deletions,
/// and only then does the function return.
pub fn clean(paths: &[impl AsRef<str>], cache: &HashCache) -> Result<(), AssetError> {
    let s = Instant::now();

    for path in paths {
        let path = path.as_ref();

        if has_magic(path) {
            for file in GlobPattern::new(path)?.walk()? {
                remove(&file)?;
            }
        } else {
            remove(Utf8Path::new(path))?;
        }
    }

    cache.clear()?;

    tracing::info!("cleaned output and cache {}", crate::utils::as_overhead(s));

    Ok(())
}

fn remove(path: &Utf8Path) -> Result<(), AssetError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(AssetError::fs(path)(e)),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => {
            tracing::debug!(%path, "removed");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(AssetError::fs(path)(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Hash32;
    use camino::Utf8PathBuf;

    fn tmp() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_clean_missing_paths() {
        let (_dir, root) = tmp();
        let cache = HashCache::new(root.join(".cache"));

        let paths = [
            root.join("dist").to_string(),
            format!("{root}/dist/css/app.css*"),
            format!("{root}/dist/js/app*.js*"),
        ];

        clean(&paths, &cache).unwrap();
        clean(&paths, &cache).unwrap();
    }

    #[test]
    fn test_clean_globs_and_cache() {
        let (_dir, root) = tmp();
        let cache = HashCache::new(root.join(".cache/images"));

        fs::create_dir_all(root.join("dist/js")).unwrap();
        fs::create_dir_all(root.join("dist/css")).unwrap();
        fs::write(root.join("dist/js/app.js"), "a").unwrap();
        fs::write(root.join("dist/js/app.min.js"), "a").unwrap();
        fs::write(root.join("dist/js/vendor.js"), "v").unwrap();
        fs::write(root.join("dist/css/app.css"), "c").unwrap();
        cache.put(Hash32::hash(b"img"), "png", b"x").unwrap();

        let paths = [
            format!("{root}/dist/css/app.css*"),
            format!("{root}/dist/js/app*.js*"),
        ];
        clean(&paths, &cache).unwrap();

        assert!(!root.join("dist/js/app.js").exists());
        assert!(!root.join("dist/js/app.min.js").exists());
        assert!(!root.join("dist/css/app.css").exists());
        assert!(root.join("dist/js/vendor.js").exists());
        assert!(cache.get(Hash32::hash(b"img"), "png").is_none());
    }

    #[test]
    fn test_clean_directory() {
        let (_dir, root) = tmp();
        let cache = HashCache::new(root.join(".cache"));

        fs::create_dir_all(root.join("dist/fonts/sub")).unwrap();
        fs::write(root.join("dist/fonts/sub/a.woff"), "f").unwrap();

        clean(&[root.join("dist").as_str()], &cache).unwrap();
        assert!(!root.join("dist").exists());
    }
}
