//! Temporary manifest files for merge tests.
//!
//! # Examples
//!
//! ```
//! use manifest_merge_test_helpers::manifest::{TempManifest, android_manifest};
//!
//! let manifest = TempManifest::new(&android_manifest("com.app", ""))?;
//! assert!(manifest.contents()?.contains("<application>"));
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;

/// File name used for every temporary manifest.
pub const MANIFEST_FILE_NAME: &str = "AndroidManifest.xml";

/// Builds an indented Android manifest for `package` whose `<application>`
/// element contains `declarations`, one per line.
#[must_use]
pub fn android_manifest(package: &str, declarations: &str) -> String {
    let body: String = declarations
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("        {line}\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <manifest xmlns:android=\"http://schemas.android.com/apk/res/android\" \
         package=\"{package}\">\n    <application>\n{body}    </application>\n</manifest>\n"
    )
}

/// A manifest written into its own temporary directory.
///
/// The directory and everything in it is deleted when the value is dropped.
#[derive(Debug)]
pub struct TempManifest {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl TempManifest {
    /// Writes `contents` to a fresh temporary manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created, or the
    /// temporary path is not valid UTF-8.
    pub fn new(contents: &str) -> Result<Self> {
        let dir = tempfile::tempdir().context("create temp dir")?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|non_utf8| anyhow!("temp dir is not valid UTF-8: {}", non_utf8.display()))?;
        let manifest = Self {
            path: root.join(MANIFEST_FILE_NAME),
            _dir: dir,
        };
        manifest.write(contents)?;
        Ok(manifest)
    }

    /// Path of the manifest file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the manifest back as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn contents(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).with_context(|| format!("read {}", self.path))
    }

    /// Replaces the manifest contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, contents: &str) -> Result<()> {
        std::fs::write(&self.path, contents).with_context(|| format!("write {}", self.path))
    }

    /// Last modification time of the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn modified(&self) -> Result<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|metadata| metadata.modified())
            .with_context(|| format!("stat {}", self.path))
    }

    /// Names of every entry in the manifest's directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn directory_entries(&self) -> Result<Vec<String>> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("manifest path has no parent"))?;
        let mut names = std::fs::read_dir(parent)
            .with_context(|| format!("list {parent}"))?
            .map(|entry| {
                entry
                    .map(|found| found.file_name().to_string_lossy().into_owned())
                    .with_context(|| format!("read entry in {parent}"))
            })
            .collect::<Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }
}
