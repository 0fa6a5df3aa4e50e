//! Build-time merging of generated component declarations into an
//! application manifest.
//!
//! Given a manifest such as an Android `AndroidManifest.xml` and the set of
//! declarations a code generator wants present, the engine adds the missing
//! ones, removes generated ones that are no longer wanted, and leaves
//! hand-authored declarations alone. Declarations written by the engine are
//! tagged with a namespaced marker attribute; anything without a true marker
//! is treated as user-owned. The file is rewritten, atomically, only when
//! something changed.
//!
//! The pipeline is linear: [`persist::load`] parses the file into an owned
//! [`Document`], [`extract::extract_existing`] reads the declarations,
//! [`plan::plan`] reconciles them against the desired set,
//! [`mutate::apply_plan`] edits the tree, and [`persist::save`] writes it
//! back. [`ManifestMerger`] wires the stages together.

pub mod component;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod identity;
pub mod merger;
pub mod mutate;
pub mod persist;
pub mod plan;

pub use component::{DeclaredComponent, ExistingComponent, Ownership, RootNamespace};
pub use config::{ConflictPolicy, MergeSettings};
pub use document::{Document, Element, Node};
pub use error::{ManifestError, ManifestResult};
pub use merger::{ChangeSet, ManifestMerger, ManifestSnapshot, MergeOutcome, merge_document};
pub use mutate::MergeReport;
pub use plan::{Conflict, MergePlan};
