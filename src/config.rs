//! Pipeline configuration.
//!
//! Read from `tsumugi.toml` when present. Every field has a default, so an
//! empty file (or no file) describes the classic layout:
//!
//! ```toml
//! clean = ["dist", "dist/css/app.css*", "dist/js/app*.js*"]
//!
//! [scripts]
//! sources = ["src/js/*.js", "src/js/main.js"]
//! bundle = "dist/js/app.js"
//! minified = "dist/js/app.min.js"
//! minifier = ["esbuild", "--minify"]
//!
//! [[watch]]
//! pattern = "src/scss/**/*.scss"
//! tasks = ["styles"]
//! ```

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::{ConfigError, ConfigFileError};
use crate::glob::GlobPattern;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "tsumugi.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where content-addressed transformation results are kept.
    pub cache: Utf8PathBuf,
    /// Paths and patterns deleted by the `clean` task.
    pub clean: Vec<String>,
    pub scripts: ScriptsConfig,
    pub styles: StylesConfig,
    pub views: ViewsConfig,
    pub images: ImagesConfig,
    pub fonts: FontsConfig,
    pub server: ServerConfig,
    pub watch: Vec<WatchConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: ".cache".into(),
            clean: vec![
                "dist".into(),
                "dist/css/app.css*".into(),
                "dist/js/app*.js*".into(),
            ],
            scripts: ScriptsConfig::default(),
            styles: StylesConfig::default(),
            views: ViewsConfig::default(),
            images: ImagesConfig::default(),
            fonts: FontsConfig::default(),
            server: ServerConfig::default(),
            watch: vec![
                WatchConfig::new("src/scss/**/*.scss", ["styles"]),
                WatchConfig::new("src/js/main.js", ["minifyScripts"]),
                WatchConfig::new("src/views/**/**/*.html", ["views"]),
                WatchConfig::new("src/images/**/*.{png,jpg,jpeg,gif,svg}", ["images"]),
                WatchConfig::new("src/fonts/**/*", ["fonts"]),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Concatenated in pattern order; a file matched by several patterns is
    /// placed at its last match.
    pub sources: Vec<String>,
    pub bundle: Utf8PathBuf,
    pub minified: Utf8PathBuf,
    /// Program and leading arguments; the bundle path is appended and the
    /// minified code is read from stdout.
    pub minifier: Vec<String>,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: vec!["src/js/*.js".into(), "src/js/main.js".into()],
            bundle: "dist/js/app.js".into(),
            minified: "dist/js/app.min.js".into(),
            minifier: vec!["esbuild".into(), "--minify".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    pub entry: String,
    pub out_dir: Utf8PathBuf,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: "src/scss/app.scss".into(),
            out_dir: "dist/css".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewsConfig {
    /// Pages rendered to HTML.
    pub sources: String,
    /// Template root, used to resolve `extends` and `include`.
    pub root: Utf8PathBuf,
    pub out_dir: Utf8PathBuf,
}

impl Default for ViewsConfig {
    fn default() -> Self {
        Self {
            sources: "src/views/*.html".into(),
            root: "src/views".into(),
            out_dir: "dist".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    pub sources: String,
    pub out_dir: Utf8PathBuf,
    /// Quality used when re-encoding JPEG files.
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sources: "src/images/**/*.{png,jpg,jpeg,gif,svg}".into(),
            out_dir: "dist/images".into(),
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontsConfig {
    pub sources: String,
    pub out_dir: Utf8PathBuf,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            sources: "src/fonts/**/*".into(),
            out_dir: "dist/fonts".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub base_dir: Utf8PathBuf,
    pub port: u16,
    /// Port of the live-reload websocket.
    pub reload_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_dir: "dist".into(),
            port: 8080,
            reload_port: 35729,
        }
    }
}

/// One watch binding: a pattern and the tasks it triggers, in order.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    pub pattern: String,
    pub tasks: Vec<String>,
}

impl WatchConfig {
    pub fn new<const N: usize>(pattern: &str, tasks: [&str; N]) -> Self {
        Self {
            pattern: pattern.into(),
            tasks: tasks.into_iter().map(Into::into).collect(),
        }
    }
}

impl Config {
    /// Loads `path`, or [`CONFIG_FILE`] if it exists, or the defaults.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, ConfigFileError> {
        let path = match path {
            Some(path) => path,
            None if Utf8Path::new(CONFIG_FILE).is_file() => Utf8Path::new(CONFIG_FILE),
            None => {
                tracing::debug!("no {CONFIG_FILE}, using defaults");
                return Ok(Self::default());
            }
        };

        let text =
            fs::read_to_string(path).map_err(|e| ConfigFileError::Read(path.to_owned(), e))?;
        let config = Self::parse(&text).map_err(|e| match e {
            ParseError::Toml(e) => ConfigFileError::Parse(path.to_owned(), e),
            ParseError::Config(e) => ConfigFileError::Config(e),
        })?;

        tracing::info!("loaded configuration from {path}");
        Ok(config)
    }

    fn parse(text: &str) -> Result<Self, ParseError> {
        let config: Config = toml::from_str(text).map_err(ParseError::Toml)?;
        config.validate().map_err(ParseError::Config)?;
        Ok(config)
    }

    /// Compiles every pattern once and checks the minifier command.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let patterns = self
            .scripts
            .sources
            .iter()
            .chain([
                &self.styles.entry,
                &self.views.sources,
                &self.images.sources,
                &self.fonts.sources,
            ])
            .chain(self.watch.iter().map(|w| &w.pattern));

        for pattern in patterns {
            GlobPattern::new(pattern)?;
        }

        if self.scripts.minifier.is_empty() {
            return Err(ConfigError::Setting(
                "scripts.minifier".into(),
                "the minifier command is empty".into(),
            ));
        }

        Ok(())
    }
}

enum ParseError {
    Toml(toml::de::Error),
    Config(ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::parse("").unwrap_or_else(|_| panic!("empty config rejected"));

        assert_eq!(config.cache, ".cache");
        assert_eq!(config.styles.entry, "src/scss/app.scss");
        assert_eq!(config.watch.len(), 5);
        assert_eq!(
            config.watch[1],
            WatchConfig::new("src/js/main.js", ["minifyScripts"])
        );
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_override_section() {
        let text = r#"
            clean = ["public"]

            [images]
            jpeg_quality = 70

            [[watch]]
            pattern = "assets/**/*.scss"
            tasks = ["styles", "views"]
        "#;

        let config = Config::parse(text).unwrap_or_else(|_| panic!("config rejected"));

        assert_eq!(config.clean, vec!["public".to_string()]);
        assert_eq!(config.images.jpeg_quality, 70);
        assert_eq!(config.images.out_dir, "dist/images");
        assert_eq!(
            config.watch,
            vec![WatchConfig::new("assets/**/*.scss", ["styles", "views"])]
        );
    }

    #[test]
    fn test_path_fields() {
        let text = r#"
            cache = "tmp/cache"

            [styles]
            out_dir = "public/css"

            [server]
            base_dir = "public"
        "#;

        let config = Config::parse(text).unwrap_or_else(|_| panic!("config rejected"));

        assert_eq!(config.cache, "tmp/cache");
        assert_eq!(config.styles.out_dir, "public/css");
        assert_eq!(config.server.base_dir, "public");
    }

    #[test]
    fn test_unknown_field() {
        assert!(matches!(
            Config::parse("[styles]\nentri = \"x.scss\""),
            Err(ParseError::Toml(_))
        ));
    }

    #[test]
    fn test_bad_pattern() {
        assert!(matches!(
            Config::parse("[fonts]\nsources = \"src/{fonts\""),
            Err(ParseError::Config(ConfigError::Pattern { .. }))
        ));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("tsumugi.toml")).unwrap();
        fs::write(&path, "[server]\nport = 3000\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.server.port, 3000);

        let missing = dir.path().join("missing.toml");
        let missing = Utf8PathBuf::try_from(missing).unwrap();
        assert!(matches!(
            Config::load(Some(missing.as_path())),
            Err(ConfigFileError::Read(..))
        ));
    }
}
