//! The merge pipeline: parse, extract, plan, mutate, persist.
//!
//! Each call owns its document from load to save; nothing is shared between
//! calls. Callers must serialize concurrent merges against the same file
//! themselves, since the read-modify-write cycle is not locked.

use camino::{Utf8Path, Utf8PathBuf};

use crate::component::{DeclaredComponent, ExistingComponent, RootNamespace};
use crate::config::MergeSettings;
use crate::document::Document;
use crate::error::ManifestResult;
use crate::extract::{extract_existing, find_container};
use crate::mutate::{MergeReport, apply_plan};
use crate::persist;
use crate::plan::{MergePlan, plan};

/// Root attribute naming the application package.
const PACKAGE_ATTRIBUTE: &str = "package";

/// Read-only view of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSnapshot {
    package: Option<String>,
    components: Vec<ExistingComponent>,
}

impl ManifestSnapshot {
    /// The root element's `package` attribute, if present.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// Declarations of the target kind, in document order.
    #[must_use]
    pub fn components(&self) -> &[ExistingComponent] {
        &self.components
    }
}

/// Result of merging a desired set into a manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    plan: MergePlan,
    report: MergeReport,
    written: bool,
}

impl MergeOutcome {
    /// The computed plan.
    #[must_use]
    pub const fn plan(&self) -> &MergePlan {
        &self.plan
    }

    /// What applying the plan changed in the tree.
    #[must_use]
    pub const fn report(&self) -> &MergeReport {
        &self.report
    }

    /// Whether the file on disk was rewritten.
    #[must_use]
    pub const fn written(&self) -> bool {
        self.written
    }
}

/// Reads a snapshot of an already parsed document.
///
/// # Errors
///
/// Returns [`crate::ManifestError::Structural`] or
/// [`crate::ManifestError::MissingAttribute`] when the container or its
/// declarations are invalid.
pub fn snapshot(
    document: &Document,
    settings: &MergeSettings,
) -> ManifestResult<ManifestSnapshot> {
    let container = find_container(document.root(), settings)?;
    Ok(ManifestSnapshot {
        package: document
            .root()
            .attribute(PACKAGE_ATTRIBUTE)
            .map(str::to_owned),
        components: extract_existing(container, settings)?,
    })
}

/// Runs extract, plan and mutate against an in-memory document.
///
/// The conflict policy from `settings` is applied before the tree is
/// touched, so a rejected merge leaves `document` unmodified.
///
/// # Errors
///
/// Propagates settings validation, structural, extraction and conflict
/// errors.
pub fn merge_document(
    document: &mut Document,
    desired: &[DeclaredComponent],
    namespace: &RootNamespace,
    settings: &MergeSettings,
) -> ManifestResult<(MergePlan, MergeReport)> {
    settings.validate()?;
    let existing = extract_existing(find_container(document.root(), settings)?, settings)?;
    tracing::debug!(
        existing = existing.len(),
        desired = desired.len(),
        namespace = %namespace,
        "extracted existing declarations"
    );

    let merge_plan = plan(&existing, desired, namespace);
    merge_plan.check_conflicts(settings.conflict_policy)?;
    let report = apply_plan(document, settings, namespace, &merge_plan)?;
    Ok((merge_plan, report))
}

/// Merges generated declarations into one manifest file.
///
/// # Examples
///
/// ```no_run
/// use manifest_merge::{DeclaredComponent, ManifestMerger, RootNamespace};
///
/// let merger = ManifestMerger::new("app/AndroidManifest.xml", RootNamespace::new("com.app"));
/// let outcome = merger
///     .change()
///     .add_if_not_exists(DeclaredComponent::new(".NoteProvider", "com.app.notes", false))
///     .commit()?;
/// assert!(outcome.plan().conflicts().is_empty());
/// # Ok::<(), manifest_merge::ManifestError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManifestMerger {
    path: Utf8PathBuf,
    namespace: RootNamespace,
    settings: MergeSettings,
}

impl ManifestMerger {
    /// Creates a merger for `path` using the default Android vocabulary.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, namespace: RootNamespace) -> Self {
        Self {
            path: path.into(),
            namespace,
            settings: MergeSettings::default(),
        }
    }

    /// Replaces the merge settings.
    #[must_use]
    pub fn with_settings(mut self, settings: MergeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Path of the manifest being merged.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Namespace used to resolve relative names.
    #[must_use]
    pub const fn namespace(&self) -> &RootNamespace {
        &self.namespace
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &MergeSettings {
        &self.settings
    }

    /// Reads the manifest without changing it.
    ///
    /// # Errors
    ///
    /// Returns any load, parse, structural or extraction error.
    pub fn parse(&self) -> ManifestResult<ManifestSnapshot> {
        let document = persist::load(&self.path)?;
        snapshot(&document, &self.settings)
    }

    /// Reconciles the manifest with `desired` and rewrites it if anything
    /// changed.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; the file is left untouched
    /// unless the final write itself fails part way, in which case the
    /// original file is still in place.
    pub fn merge(&self, desired: &[DeclaredComponent]) -> ManifestResult<MergeOutcome> {
        let mut document = persist::load(&self.path)?;
        let (merge_plan, report) =
            merge_document(&mut document, desired, &self.namespace, &self.settings)?;
        let written = persist::save(&self.path, &document, report.changed())?;
        Ok(MergeOutcome {
            plan: merge_plan,
            report,
            written,
        })
    }

    /// Starts collecting the desired set for a merge.
    #[must_use]
    pub const fn change(&self) -> ChangeSet<'_> {
        ChangeSet {
            merger: self,
            desired: Vec::new(),
        }
    }
}

/// Builder collecting desired declarations before a single commit.
#[derive(Debug)]
#[must_use = "a change set does nothing until it is committed"]
pub struct ChangeSet<'a> {
    merger: &'a ManifestMerger,
    desired: Vec<DeclaredComponent>,
}

impl ChangeSet<'_> {
    /// Requests `component`; it is only written if no satisfying declaration
    /// exists. Generated declarations not requested before
    /// [`ChangeSet::commit`] are removed.
    pub fn add_if_not_exists(mut self, component: DeclaredComponent) -> Self {
        self.desired.push(component);
        self
    }

    /// Declarations requested so far.
    #[must_use]
    pub fn desired(&self) -> &[DeclaredComponent] {
        &self.desired
    }

    /// Runs the merge with the collected desired set.
    ///
    /// # Errors
    ///
    /// See [`ManifestMerger::merge`].
    pub fn commit(self) -> ManifestResult<MergeOutcome> {
        self.merger.merge(&self.desired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConflictPolicy;
    use crate::error::ManifestError;
    use rstest::rstest;

    const MANIFEST: &str = r#"<manifest package="com.app"><application><provider android:name=".Mine" android:authorities="mine" android:exported="true"/></application></manifest>"#;

    fn document() -> Document {
        Document::parse(MANIFEST.as_bytes()).expect("parse test manifest")
    }

    #[rstest]
    fn snapshot_exposes_package_and_components() {
        let snapshot = snapshot(&document(), &MergeSettings::default()).expect("snapshot");

        assert_eq!(snapshot.package(), Some("com.app"));
        assert_eq!(
            snapshot.components(),
            &[ExistingComponent::hand_authored(DeclaredComponent::new(
                ".Mine", "mine", true
            ))]
        );
    }

    #[rstest]
    fn fail_policy_leaves_the_document_untouched() {
        let settings = MergeSettings {
            conflict_policy: ConflictPolicy::Fail,
            ..MergeSettings::default()
        };
        let mut working = document();

        let err = merge_document(
            &mut working,
            &[DeclaredComponent::new("com.app.Mine", "mine", false)],
            &RootNamespace::new("com.app"),
            &settings,
        )
        .expect_err("conflict should abort");

        assert!(matches!(err, ManifestError::Conflict { .. }));
        assert_eq!(working, document());
    }

    #[rstest]
    fn warn_policy_adds_alongside_the_hand_authored_entry() {
        let mut working = document();

        let (merge_plan, report) = merge_document(
            &mut working,
            &[DeclaredComponent::new("com.app.Mine", "mine", false)],
            &RootNamespace::new("com.app"),
            &MergeSettings::default(),
        )
        .expect("merge");

        assert_eq!(merge_plan.conflicts().len(), 1);
        assert_eq!(report.added().len(), 1);
        assert!(report.removed().is_empty());
        let snapshot = snapshot(&working, &MergeSettings::default()).expect("snapshot");
        assert_eq!(snapshot.components().len(), 2);
    }

    #[rstest]
    fn invalid_settings_are_rejected_before_mutation() {
        let settings = MergeSettings {
            marker_attribute: "generated".to_owned(),
            ..MergeSettings::default()
        };
        let mut working = document();

        let err = merge_document(
            &mut working,
            &[DeclaredComponent::new(".New", "new", false)],
            &RootNamespace::new("com.app"),
            &settings,
        )
        .expect_err("settings are invalid");

        assert!(matches!(err, ManifestError::Config(_)));
        assert_eq!(working, document());
    }
}
