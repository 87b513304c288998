use std::fs;
use std::process::{Command, Stdio};

use camino::Utf8PathBuf;

use crate::config::ScriptsConfig;
use crate::error::AssetError;
use crate::glob::GlobPattern;

/// Concatenates every source script into the bundle, separated by newlines.
///
/// Returns `None` when no source matched, in which case nothing is written.
pub fn concat(config: &ScriptsConfig) -> Result<Option<Utf8PathBuf>, AssetError> {
    let sources = collect_sources(&config.sources)?;

    if sources.is_empty() {
        tracing::warn!("no scripts matched {:?}", config.sources);
        return Ok(None);
    }

    let mut bundle = Vec::new();
    for (i, path) in sources.iter().enumerate() {
        if i > 0 {
            bundle.push(b'\n');
        }
        bundle.extend(fs::read(path).map_err(AssetError::fs(path))?);
    }

    crate::utils::write_output(&config.bundle, &bundle)?;
    tracing::debug!(files = sources.len(), bundle = %config.bundle, "concatenated scripts");

    Ok(Some(config.bundle.clone()))
}

/// Expands the source patterns in order.
///
/// A file matched by more than one pattern takes the position of its last
/// match, so `["src/js/*.js", "src/js/main.js"]` puts `main.js` at the end.
fn collect_sources(patterns: &[String]) -> Result<Vec<Utf8PathBuf>, AssetError> {
    let mut sources: Vec<Utf8PathBuf> = Vec::new();

    for pattern in patterns {
        for path in GlobPattern::new(pattern)?.walk()? {
            sources.retain(|p| p != &path);
            sources.push(path);
        }
    }

    Ok(sources)
}

/// Runs the configured minifier over the bundle.
///
/// The command gets the bundle path as its last argument and must print the
/// minified code to stdout. Returns `None` when there is no bundle yet.
pub fn minify(config: &ScriptsConfig) -> Result<Option<Utf8PathBuf>, AssetError> {
    let bundle = &config.bundle;

    if !bundle.is_file() {
        tracing::warn!("{bundle} does not exist, nothing to minify");
        return Ok(None);
    }

    let Some((program, args)) = config.minifier.split_first() else {
        return Err(AssetError::transform("minifier", bundle, "no minifier configured"));
    };

    let output = Command::new(program)
        .args(args)
        .arg(bundle.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| AssetError::transform("minifier", bundle, format!("couldn't run '{program}': {e}")))?;

    if !output.status.success() {
        let message = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(AssetError::transform(
            "minifier",
            bundle,
            format!("'{program}' exited with {}: {message}", output.status),
        ));
    }

    crate::utils::write_output(&config.minified, &output.stdout)?;

    Ok(Some(config.minified.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, Utf8PathBuf, ScriptsConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        fs::create_dir_all(root.join("src/js/vendor")).unwrap();
        fs::write(root.join("src/js/main.js"), "main();").unwrap();
        fs::write(root.join("src/js/alpha.js"), "alpha();").unwrap();
        fs::write(root.join("src/js/zeta.js"), "zeta();").unwrap();
        fs::write(root.join("src/js/vendor/skip.js"), "skip();").unwrap();

        let config = ScriptsConfig {
            sources: vec![format!("{root}/src/js/*.js"), format!("{root}/src/js/main.js")],
            bundle: root.join("dist/js/app.js"),
            minified: root.join("dist/js/app.min.js"),
            minifier: vec!["cat".into()],
        };

        (dir, root, config)
    }

    #[test]
    fn test_main_goes_last() {
        let (_dir, _root, config) = setup();

        let bundle = concat(&config).unwrap().unwrap();
        let text = fs::read_to_string(bundle).unwrap();

        assert_eq!(text, "alpha();\nzeta();\nmain();");
    }

    #[test]
    fn test_no_sources() {
        let (_dir, root, mut config) = setup();
        config.sources = vec![format!("{root}/src/coffee/*.coffee")];

        assert!(concat(&config).unwrap().is_none());
        assert!(!config.bundle.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_minify_with_command() {
        let (_dir, _root, config) = setup();
        concat(&config).unwrap();

        let minified = minify(&config).unwrap().unwrap();
        assert_eq!(
            fs::read_to_string(minified).unwrap(),
            fs::read_to_string(&config.bundle).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_minifier_failure() {
        let (_dir, _root, mut config) = setup();
        config.minifier = vec!["false".into()];
        concat(&config).unwrap();

        let err = minify(&config).unwrap_err();
        match err {
            AssetError::Transform { tool, path, .. } => {
                assert_eq!(tool, "minifier");
                assert_eq!(path, config.bundle);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!config.minified.exists());
    }

    #[test]
    fn test_missing_minifier_binary() {
        let (_dir, _root, mut config) = setup();
        config.minifier = vec!["definitely-not-a-minifier-binary".into()];
        concat(&config).unwrap();

        assert!(matches!(minify(&config), Err(AssetError::Transform { .. })));
    }
}
