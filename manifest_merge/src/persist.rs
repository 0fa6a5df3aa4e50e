//! Reading and conditionally rewriting the descriptor on disk.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Permissions;
use cap_std::fs_utf8::{Dir, OpenOptions};
use std::io::{ErrorKind, Write};

use crate::document::Document;
use crate::error::{ManifestError, ManifestResult};

/// Reads and parses the descriptor at `path`.
///
/// A symbolic link is followed to its final target. The file handle is
/// released before parsing starts, so it is closed on every exit path.
///
/// # Errors
///
/// Returns [`ManifestError::Persistence`] when the file cannot be read and
/// [`ManifestError::Malformed`] when it is not well-formed XML.
pub fn load(path: &Utf8Path) -> ManifestResult<Document> {
    let target = resolve(path)?;
    let (dir, file_name) = open_parent(&target)?;
    let bytes = dir
        .read(file_name)
        .map_err(|err| ManifestError::persistence(&target, err))?;
    Document::parse(&bytes)
}

/// Writes `document` to `path` when `changed` is set.
///
/// Nothing is touched when `changed` is false. Otherwise the document is
/// written to a temporary sibling, flushed, and renamed over the target, so
/// readers only ever observe the old or the new file. The temporary file
/// takes the target's permissions, and a symbolic link is followed so the
/// link survives and its target is the file replaced. Returns whether a
/// write happened.
///
/// # Errors
///
/// Returns [`ManifestError::Persistence`] when any filesystem step fails;
/// the temporary file is removed on a best-effort basis.
pub fn save(path: &Utf8Path, document: &Document, changed: bool) -> ManifestResult<bool> {
    if !changed {
        tracing::debug!(path = %path, "manifest unchanged; skipping write");
        return Ok(false);
    }

    let target = resolve(path)?;
    let (dir, file_name) = open_parent(&target)?;
    let permissions = existing_permissions(&dir, file_name)
        .map_err(|err| ManifestError::persistence(&target, err))?;
    let temp_name = format!(".{file_name}.{}.tmp", std::process::id());
    let outcome = write_synced(&dir, &temp_name, &document.to_bytes(), permissions)
        .and_then(|()| dir.rename(&temp_name, &dir, file_name));
    if let Err(err) = outcome {
        if let Err(cleanup_err) = dir.remove_file(&temp_name) {
            tracing::debug!(
                path = %target,
                error = %cleanup_err,
                "could not remove temporary manifest"
            );
        }
        return Err(ManifestError::persistence(&target, err));
    }

    tracing::info!(path = %target, "rewrote manifest");
    Ok(true)
}

/// Permissions of the file being replaced; `None` when it does not exist
/// yet.
fn existing_permissions(dir: &Dir, file_name: &str) -> std::io::Result<Option<Permissions>> {
    match dir.metadata(file_name) {
        Ok(metadata) => Ok(Some(metadata.permissions())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn write_synced(
    dir: &Dir,
    name: &str,
    bytes: &[u8],
    permissions: Option<Permissions>,
) -> std::io::Result<()> {
    let mut file = dir.open_with(
        name,
        OpenOptions::new().write(true).create(true).truncate(true),
    )?;
    file.write_all(bytes)?;
    if let Some(mode) = permissions {
        file.set_permissions(mode)?;
    }
    file.sync_all()
}

/// Follows `path` to its final target when it is a symbolic link.
///
/// The capability-scoped [`Dir`] refuses links that leave the parent
/// directory, and renaming over a link would replace the link rather than
/// the file it names.
fn resolve(path: &Utf8Path) -> ManifestResult<Utf8PathBuf> {
    let is_link = path
        .symlink_metadata()
        .is_ok_and(|metadata| metadata.file_type().is_symlink());
    if !is_link {
        return Ok(path.to_owned());
    }
    let target = path
        .canonicalize_utf8()
        .map_err(|err| ManifestError::persistence(path, err))?;
    tracing::debug!(path = %path, target = %target, "following manifest symlink");
    Ok(target)
}

fn open_parent(path: &Utf8Path) -> ManifestResult<(Dir, &str)> {
    let file_name = path.file_name().ok_or_else(|| {
        ManifestError::persistence(
            path,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "manifest path does not name a file",
            ),
        )
    })?;
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| ManifestError::persistence(parent, err))?;
    Ok((dir, file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const MANIFEST: &str =
        "<manifest package=\"com.app\"><application><!-- keep --></application></manifest>\n";

    struct Workspace {
        _tempdir: TempDir,
        manifest: Utf8PathBuf,
    }

    fn temp_leftovers(manifest: &Utf8Path) -> usize {
        let parent = manifest.parent().expect("manifest has a parent");
        std::fs::read_dir(parent)
            .expect("list temp dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[fixture]
    fn workspace() -> Workspace {
        let tempdir = tempfile::tempdir().expect("create temp dir");
        let root = Utf8PathBuf::from_path_buf(tempdir.path().to_path_buf())
            .expect("tempdir path is UTF-8");
        let manifest = root.join("AndroidManifest.xml");
        std::fs::write(&manifest, MANIFEST).expect("write manifest");
        Workspace {
            _tempdir: tempdir,
            manifest,
        }
    }

    #[rstest]
    fn unchanged_documents_are_not_written(workspace: Workspace) {
        let before = std::fs::metadata(&workspace.manifest)
            .and_then(|meta| meta.modified())
            .expect("read mtime");
        let mut document = load(&workspace.manifest).expect("load");
        document.root_mut().set_attribute("package", "com.other");

        let written = save(&workspace.manifest, &document, false).expect("save");

        assert!(!written);
        let after = std::fs::metadata(&workspace.manifest)
            .and_then(|meta| meta.modified())
            .expect("read mtime");
        assert_eq!(before, after);
        assert_eq!(
            std::fs::read_to_string(&workspace.manifest).expect("read back"),
            MANIFEST
        );
    }

    #[rstest]
    fn changed_documents_replace_the_file(workspace: Workspace) {
        let mut document = load(&workspace.manifest).expect("load");
        document.root_mut().set_attribute("package", "com.other");

        assert!(save(&workspace.manifest, &document, true).expect("save"));

        let contents = std::fs::read_to_string(&workspace.manifest).expect("read back");
        assert_eq!(
            contents,
            "<manifest package=\"com.other\"><application><!-- keep --></application></manifest>\n"
        );
        assert_eq!(
            temp_leftovers(&workspace.manifest),
            0,
            "temporary file should be renamed away"
        );
    }

    #[rstest]
    fn missing_files_are_persistence_errors(workspace: Workspace) {
        let missing = workspace.manifest.with_file_name("Missing.xml");

        let err = load(&missing).expect_err("file does not exist");

        assert!(
            matches!(err, ManifestError::Persistence { ref path, .. } if *path == missing),
            "unexpected error: {err}"
        );
    }

    #[rstest]
    fn malformed_files_are_reported_as_such(workspace: Workspace) {
        std::fs::write(&workspace.manifest, "<manifest><application></manifest>")
            .expect("write broken manifest");

        let err = load(&workspace.manifest).expect_err("manifest is malformed");

        assert!(matches!(err, ManifestError::Malformed { .. }), "unexpected error: {err}");
    }

    #[rstest]
    fn write_failures_are_persistence_errors(workspace: Workspace) {
        let document = load(&workspace.manifest).expect("load");
        let target = workspace
            .manifest
            .with_file_name("no-such-dir")
            .join("AndroidManifest.xml");

        let err = save(&target, &document, true).expect_err("parent does not exist");

        assert!(matches!(err, ManifestError::Persistence { .. }), "unexpected error: {err}");
    }

    #[rstest]
    fn failed_renames_remove_the_temporary_file(workspace: Workspace) {
        let document = load(&workspace.manifest).expect("load");
        let occupied = workspace.manifest.with_file_name("occupied");
        std::fs::create_dir(&occupied).expect("create directory");
        std::fs::write(occupied.join("keep.txt"), "keep").expect("fill directory");

        let err = save(&occupied, &document, true).expect_err("cannot rename over a directory");

        assert!(
            matches!(err, ManifestError::Persistence { ref path, .. } if *path == occupied),
            "unexpected error: {err}"
        );
        assert_eq!(temp_leftovers(&workspace.manifest), 0);
        assert!(occupied.join("keep.txt").is_file());
    }

    #[cfg(unix)]
    #[rstest]
    fn rewrites_keep_the_file_mode(workspace: Workspace) {
        use std::os::unix::fs::PermissionsExt;

        std::fs::set_permissions(&workspace.manifest, std::fs::Permissions::from_mode(0o600))
            .expect("restrict manifest");
        let mut document = load(&workspace.manifest).expect("load");
        document.root_mut().set_attribute("package", "com.other");

        assert!(save(&workspace.manifest, &document, true).expect("save"));

        let mode = std::fs::metadata(&workspace.manifest)
            .expect("stat manifest")
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[rstest]
    fn symlinked_manifests_update_their_target(workspace: Workspace) {
        let root = workspace.manifest.parent().expect("manifest has a parent");
        let app = root.join("app");
        std::fs::create_dir(&app).expect("create app dir");
        let link = app.join("AndroidManifest.xml");
        std::os::unix::fs::symlink(&workspace.manifest, &link).expect("create symlink");

        let mut document = load(&link).expect("load through symlink");
        document.root_mut().set_attribute("package", "com.linked");
        assert!(save(&link, &document, true).expect("save through symlink"));

        let link_metadata = std::fs::symlink_metadata(&link).expect("stat link");
        assert!(link_metadata.file_type().is_symlink(), "link must stay a link");
        let contents = std::fs::read_to_string(&workspace.manifest).expect("read target");
        assert!(contents.contains("package=\"com.linked\""));
        assert_eq!(temp_leftovers(&workspace.manifest), 0);
    }
}
