use camino::Utf8PathBuf;

use crate::config::FontsConfig;
use crate::error::AssetError;
use crate::glob::GlobPattern;

/// Copies every matched font into the output directory unchanged.
pub fn copy(config: &FontsConfig) -> Result<Vec<Utf8PathBuf>, AssetError> {
    let pattern = GlobPattern::new(&config.sources)?;

    let mut outputs = Vec::new();
    for path in pattern.walk()? {
        let out = config.out_dir.join(pattern.relative(&path));
        crate::utils::copy_output(&path, &out)?;
        outputs.push(out);
    }

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_copy_keeps_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("src/fonts/inter")).unwrap();
        fs::write(root.join("src/fonts/inter/inter.woff2"), b"wOF2").unwrap();
        fs::write(root.join("src/fonts/icons.ttf"), b"\0\x01\0\0").unwrap();

        let config = FontsConfig {
            sources: format!("{root}/src/fonts/**/*"),
            out_dir: root.join("dist/fonts"),
        };

        let outputs = copy(&config).unwrap();

        assert_eq!(
            outputs,
            vec![
                root.join("dist/fonts/icons.ttf"),
                root.join("dist/fonts/inter/inter.woff2"),
            ]
        );
        assert_eq!(fs::read(&outputs[1]).unwrap(), b"wOF2");
    }
}
