//! Per-group build tasks. A group is one named output file plus the ordered
//! input patterns whose matches get transformed and concatenated into it.

use std::fs;
use std::sync::Arc;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::TaskError;
use crate::io;
use crate::transform::{Transform, apply_chain};

/// Black-box whole-bundle minifier supplied by the surrounding toolchain.
pub type MinifyFn = Arc<dyn Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync>;

/// Minification settings for script groups. Styles carry none; their
/// optimization happens inside the compile chain.
#[derive(Clone)]
pub(crate) struct MinifyOpts {
    pub minifier: Option<MinifyFn>,
    /// Keep the unminified bundle under the output name and write the
    /// minified bytes next to it with a `.min` suffix before the extension.
    pub keep_unminified: bool,
}

/// Expand input patterns into an ordered list of source paths.
///
/// Pattern order is preserved; matches within one pattern come back in the
/// glob crate's sorted enumeration order, which keeps concatenation stable
/// and reproducible for a given directory state.
pub(crate) fn expand_patterns(patterns: &[String]) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut paths = Vec::new();

    for pattern in patterns {
        for entry in glob::glob(pattern)? {
            paths.push(Utf8PathBuf::try_from(entry?)?);
        }
    }

    Ok(paths)
}

/// One runnable build unit: everything needed to produce a single bundled
/// output file.
pub(crate) struct GroupJob {
    pub output: String,
    pub patterns: Vec<String>,
    pub destination: Utf8PathBuf,
    pub chain: Arc<Vec<Transform>>,
    pub minify: Option<MinifyOpts>,
}

impl GroupJob {
    pub fn run(&self) -> Result<(), TaskError> {
        let s = Instant::now();
        let paths = expand_patterns(&self.patterns)?;

        let parts = paths
            .par_iter()
            .map(|path| {
                let bytes = fs::read(path)?;
                apply_chain(&self.chain, path, bytes)
            })
            .collect::<Result<Vec<_>, TaskError>>()?;

        // Source order, no separator.
        let concat: Vec<u8> = parts.concat();

        let target = self.destination.join(&self.output);
        io::ensure_parent(&target)?;

        match &self.minify {
            Some(opts) => self.write_minified(opts, &target, concat)?,
            None => fs::write(&target, &concat)?,
        }

        tracing::debug!(
            "built '{}' from {} files {}",
            self.output,
            paths.len(),
            io::as_overhead(s),
        );

        Ok(())
    }

    fn write_minified(
        &self,
        opts: &MinifyOpts,
        target: &Utf8Path,
        concat: Vec<u8>,
    ) -> Result<(), TaskError> {
        let Some(minifier) = &opts.minifier else {
            // Minify requested but no minifier registered; the bundle goes
            // out as-is.
            fs::write(target, &concat)?;
            return Ok(());
        };

        let minified = match minifier(&concat) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("minifier failed on '{}', writing unminified: {}", target, e);
                concat.clone()
            }
        };

        if opts.keep_unminified {
            fs::write(target, &concat)?;
            fs::write(min_sibling(target), &minified)?;
        } else {
            fs::write(target, &minified)?;
        }

        Ok(())
    }
}

/// `app.js` -> `app.min.js`, next to the original.
fn min_sibling(path: &Utf8Path) -> Utf8PathBuf {
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => path.with_file_name(format!("{stem}.min.{ext}")),
        _ => path.with_file_name(format!("{}.min", path.file_name().unwrap_or_default())),
    }
}
