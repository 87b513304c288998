use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::config::StylesConfig;
use crate::error::AssetError;
use crate::glob::GlobPattern;

/// Compiles every matched SCSS entry point to `<out_dir>/<stem>.css`.
///
/// Partials (files starting with `_`) are only ever imported, never compiled
/// on their own.
pub fn compile(config: &StylesConfig) -> Result<Vec<Utf8PathBuf>, AssetError> {
    let entries: Vec<_> = GlobPattern::new(&config.entry)?
        .walk()?
        .into_iter()
        .filter(|path| !is_partial(path))
        .collect();

    entries
        .into_par_iter()
        .map(|path| {
            let css = grass::from_path(&path, &grass::Options::default())
                .map_err(|e| AssetError::transform("sass", &path, e))?;

            let stem = path.file_stem().unwrap_or("style");
            let out = config.out_dir.join(format!("{stem}.css"));
            crate::utils::write_output(&out, css)?;

            tracing::debug!(from = %path, to = %out, "compiled stylesheet");
            Ok(out)
        })
        .collect()
}

fn is_partial(path: &Utf8Path) -> bool {
    path.file_name().is_some_and(|name| name.starts_with('_'))
}
