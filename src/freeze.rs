//! The freeze stage renames finished build outputs to embed a content
//! fingerprint and records every rename in a manifest, so that a server can
//! translate stable asset names into their cache-busted counterparts.
//!
//! Freezing is a stream of [`FileRecord`]s: each materialized record is
//! renamed in place (`app.js` becomes `<hex digest>-app.js` in the same
//! directory) and its old and new base names are added to the in-memory
//! [`Manifest`]. When the stream is exhausted, the manifest is serialized as
//! a single JSON object and replaces whatever file was previously at the
//! manifest path. Records without materialized contents pass through
//! untouched and never show up in the manifest.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::error::FreezeError;
use crate::hash::Hash32;

/// One asset flowing through a build task.
///
/// `contents` is `None` for records that aren't materialized in memory,
/// such as directories. Those are passed along unmodified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: Utf8PathBuf,
    pub contents: Option<Vec<u8>>,
}

impl FileRecord {
    pub fn new(path: impl Into<Utf8PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents: Some(contents),
        }
    }

    pub fn unmaterialized(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
        }
    }
}

/// Mapping from original base filename to fingerprinted base filename.
///
/// Keys are directory-independent: two frozen files with the same base name
/// in different subdirectories share a key, and the later one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Manifest(BTreeMap<String, String>);

impl Manifest {
    pub fn get(&self, basename: &str) -> Option<&str> {
        self.0.get(basename).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Accumulates fingerprint renames for one freeze run.
///
/// The accumulator is local to a single invocation of the freeze task; it is
/// rebuilt from scratch on every run and never merged with a manifest
/// already on disk.
pub struct Freezer {
    manifest_path: Option<Utf8PathBuf>,
    manifest: Manifest,
}

impl Freezer {
    pub fn new(manifest_path: Option<Utf8PathBuf>) -> Self {
        Self {
            manifest_path,
            manifest: Manifest::default(),
        }
    }

    /// Rename a record to embed its content fingerprint and record the
    /// mapping. Unmaterialized records are returned as-is.
    pub fn process(&mut self, mut record: FileRecord) -> FileRecord {
        let Some(contents) = record.contents.as_deref() else {
            return record;
        };

        let checksum = Hash32::hash(contents).to_hex();
        let basename = record
            .path
            .file_name()
            .unwrap_or(record.path.as_str())
            .to_owned();

        let frozen = format!("{checksum}-{basename}");
        self.manifest.0.insert(basename, frozen.clone());

        record.path = match record.path.parent() {
            Some(dir) => dir.join(frozen),
            None => Utf8PathBuf::from(frozen),
        };

        record
    }

    /// Finish the run: persist the manifest if a path was configured and
    /// hand the accumulated mapping back. The file at the manifest path is
    /// replaced wholesale.
    pub fn finish(self) -> Result<Manifest, FreezeError> {
        if let Some(path) = &self.manifest_path {
            write_manifest(path, &self.manifest)?;
        }

        Ok(self.manifest)
    }
}

/// The production freeze operation: glob the configured target patterns,
/// run every materialized match through a fresh [`Freezer`], write the
/// renamed copies into the destination directory, and persist the manifest.
///
/// Matches that aren't regular files pass through the freezer unmaterialized
/// and produce no output. Targets that match nothing yield an empty
/// manifest rather than an error.
pub(crate) struct FreezeJob {
    pub patterns: Vec<String>,
    pub destination: Utf8PathBuf,
    pub manifest_path: Utf8PathBuf,
}

impl FreezeJob {
    pub fn run(&self) -> Result<(), crate::error::TaskError> {
        let mut freezer = Freezer::new(Some(self.manifest_path.clone()));

        for path in crate::group::expand_patterns(&self.patterns)? {
            let record = if path.is_file() {
                let contents = std::fs::read(&path)?;
                FileRecord::new(path, contents)
            } else {
                FileRecord::unmaterialized(path)
            };

            let record = freezer.process(record);
            let Some(contents) = &record.contents else {
                continue;
            };

            let frozen = self
                .destination
                .join(record.path.file_name().unwrap_or(record.path.as_str()));
            crate::io::ensure_parent(&frozen)?;
            std::fs::write(&frozen, contents)?;
        }

        freezer.finish()?;
        Ok(())
    }
}

fn write_manifest(path: &Utf8Path, manifest: &Manifest) -> Result<(), FreezeError> {
    let json = serde_json::to_vec(manifest)?;

    crate::io::replace_file(path, &json)
        .map_err(|e| FreezeError::ManifestWrite(path.to_string(), e))?;

    tracing::info!("wrote manifest with {} entries to {}", manifest.len(), path);
    Ok(())
}
