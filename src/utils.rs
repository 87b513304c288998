use std::fmt::Display;
use std::fs;
use std::sync::LazyLock;
use std::time::Instant;

use camino::Utf8Path;
use console::Style;
use indicatif::ProgressStyle;

use crate::error::AssetError;

const ANSI_BLUE: Style = Style::new().blue();

static STYLE_TASK: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed}] {msg}")
        .expect("Error setting progress bar template")
});

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let f = format!("(+{}ms)", s.elapsed().as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Spinner shown next to a running task.
pub(crate) fn get_style_task() -> ProgressStyle {
    STYLE_TASK.clone()
}

/// Writes an artifact, creating its parent directories.
pub(crate) fn write_output(path: &Utf8Path, data: impl AsRef<[u8]>) -> Result<(), AssetError> {
    if let Some(dir) = path.parent()
        && !dir.as_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(AssetError::fs(dir))?;
    }

    fs::write(path, data).map_err(AssetError::fs(path))
}

/// Copies a file, creating the parent directories of the target.
pub(crate) fn copy_output(from: &Utf8Path, to: &Utf8Path) -> Result<(), AssetError> {
    if let Some(dir) = to.parent()
        && !dir.as_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(AssetError::fs(dir))?;
    }

    fs::copy(from, to).map_err(AssetError::fs(from))?;
    Ok(())
}
