//! Shared helpers for `manifest_merge` integration tests.

use manifest_merge::{ExistingComponent, ManifestMerger, RootNamespace};
use test_helpers::manifest::TempManifest;

/// Namespace used by every fixture manifest.
pub(crate) const PACKAGE: &str = "com.app";

/// Creates a merger for the fixture with the default Android vocabulary.
pub(crate) fn merger_for(manifest: &TempManifest) -> ManifestMerger {
    ManifestMerger::new(manifest.path(), RootNamespace::new(PACKAGE))
}

/// Re-reads the manifest and returns its provider declarations.
pub(crate) fn providers(manifest: &TempManifest) -> Vec<ExistingComponent> {
    merger_for(manifest)
        .parse()
        .expect("parse manifest")
        .components()
        .to_vec()
}
