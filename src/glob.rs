use std::fmt::{Debug, Display};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

use crate::error::{AssetError, ConfigError};

/// A compiled path pattern.
///
/// Supports `*` and `?` within one path segment, `**` across segments,
/// character classes and `{a,b}` alternation. Repeated `**` segments such as
/// `src/views/**/**/*.html` mean the same thing as a single one.
///
/// The pattern is split into a static root (the leading components without
/// any wildcard) and the rest; the root is where the files are searched for,
/// and what the watcher subscribes to.
#[derive(Clone)]
pub struct GlobPattern {
    raw: String,
    root: Utf8PathBuf,
    matcher: GlobMatcher,
}

impl GlobPattern {
    pub fn new(pattern: impl AsRef<str>) -> Result<Self, ConfigError> {
        let raw = pattern.as_ref().to_string();
        let normalized = normalize(&raw);

        let matcher = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::Pattern {
                pattern: raw.clone(),
                message: e.kind().to_string(),
            })?
            .compile_matcher();

        let root = static_root(Utf8Path::new(&normalized));

        Ok(Self { raw, root, matcher })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The longest leading path without wildcards.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether the pattern contains any wildcard at all.
    pub fn is_literal(&self) -> bool {
        self.root.as_str() == normalize(&self.raw)
    }

    pub fn matches(&self, path: impl AsRef<Utf8Path>) -> bool {
        let path = path.as_ref();
        let path = path.strip_prefix("./").unwrap_or(path);
        self.matcher.is_match(path.as_str())
    }

    /// Path of a matched file relative to the static root.
    ///
    /// For a literal pattern this is just the file name.
    pub fn relative<'a>(&self, path: &'a Utf8Path) -> &'a Utf8Path {
        let path = path.strip_prefix("./").unwrap_or(path);

        if self.is_literal() {
            return path.file_name().map(Utf8Path::new).unwrap_or(path);
        }

        path.strip_prefix(&self.root).unwrap_or(path)
    }

    /// Every existing file matching the pattern, sorted by path.
    pub fn walk(&self) -> Result<Vec<Utf8PathBuf>, AssetError> {
        let root = if self.root.as_str().is_empty() {
            Utf8Path::new(".")
        } else {
            self.root.as_path()
        };

        if !root.exists() {
            return Ok(vec![]);
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| AssetError::Walk {
                path: root.to_path_buf(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = Utf8PathBuf::try_from(entry.into_path())?;
            if self.matches(&path) {
                found.push(path);
            }
        }

        Ok(found)
    }
}

impl Debug for GlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GlobPattern({})", self.raw)
    }
}

impl Display for GlobPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Collapses runs of `**` segments and drops a leading `./`.
fn normalize(pattern: &str) -> String {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    let mut out: Vec<&str> = Vec::new();

    for segment in pattern.split('/') {
        if segment == "**" && out.last() == Some(&"**") {
            continue;
        }
        out.push(segment);
    }

    out.join("/")
}

fn static_root(pattern: &Utf8Path) -> Utf8PathBuf {
    pattern
        .components()
        .take_while(|c| !is_magic(c))
        .collect()
}

fn is_magic(component: &Utf8Component) -> bool {
    component.as_str().contains(['*', '?', '[', '{'])
}

/// Whether a string would be read as a pattern rather than a plain path.
pub(crate) fn has_magic(path: &str) -> bool {
    path.contains(['*', '?', '[', '{'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_root() {
        let pattern = GlobPattern::new("src/scss/**/*.scss").unwrap();
        assert_eq!(pattern.root().as_str(), "src/scss");
        assert!(!pattern.is_literal());

        let pattern = GlobPattern::new("src/js/main.js").unwrap();
        assert_eq!(pattern.root().as_str(), "src/js/main.js");
        assert!(pattern.is_literal());

        let pattern = GlobPattern::new("*.txt").unwrap();
        assert_eq!(pattern.root().as_str(), "");
    }

    #[test]
    fn test_matches() {
        let pattern = GlobPattern::new("src/scss/**/*.scss").unwrap();
        assert!(pattern.matches("src/scss/app.scss"));
        assert!(pattern.matches("src/scss/partials/_nav.scss"));
        assert!(pattern.matches("./src/scss/app.scss"));
        assert!(!pattern.matches("src/js/main.js"));
        assert!(!pattern.matches("src/scss/app.css"));
    }

    #[test]
    fn test_single_star_stays_in_segment() {
        let pattern = GlobPattern::new("src/js/*.js").unwrap();
        assert!(pattern.matches("src/js/app.js"));
        assert!(!pattern.matches("src/js/vendor/jquery.js"));
    }

    #[test]
    fn test_double_recursive_segment() {
        assert_eq!(normalize("src/views/**/**/*.pug"), "src/views/**/*.pug");

        let doubled = GlobPattern::new("src/views/**/**/*.html").unwrap();
        let single = GlobPattern::new("src/views/**/*.html").unwrap();

        for path in [
            "src/views/index.html",
            "src/views/a/index.html",
            "src/views/a/b/c/index.html",
            "src/views/index.css",
        ] {
            assert_eq!(doubled.matches(path), single.matches(path), "{path}");
        }
    }

    #[test]
    fn test_alternation() {
        let pattern = GlobPattern::new("src/images/**/*.{png,jpg,jpeg,gif,svg}").unwrap();
        assert!(pattern.matches("src/images/logo.svg"));
        assert!(pattern.matches("src/images/photos/cat.jpeg"));
        assert!(!pattern.matches("src/images/notes.txt"));
        assert_eq!(pattern.root().as_str(), "src/images");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = GlobPattern::new("src/{a,b").unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { ref pattern, .. } if pattern == "src/{a,b"));
    }

    #[test]
    fn test_walk_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();

        std::fs::create_dir_all(root.join("fonts/sub")).unwrap();
        std::fs::write(root.join("fonts/a.woff2"), b"a").unwrap();
        std::fs::write(root.join("fonts/sub/b.woff2"), b"b").unwrap();

        let pattern = GlobPattern::new(format!("{root}/fonts/**/*")).unwrap();
        let files = pattern.walk().unwrap();

        assert_eq!(files, vec![root.join("fonts/a.woff2"), root.join("fonts/sub/b.woff2")]);
        assert_eq!(pattern.relative(&files[1]).as_str(), "sub/b.woff2");
    }

    #[test]
    fn test_walk_missing_root() {
        let pattern = GlobPattern::new("does/not/exist/**/*").unwrap();
        assert!(pattern.walk().unwrap().is_empty());
    }
}
