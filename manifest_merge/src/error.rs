//! Error types for `manifest_merge`.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Result alias used throughout the merge pipeline.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors surfaced by the manifest merge pipeline.
///
/// None of these are retried internally; a failure at any stage stops the
/// whole merge so a partially reconciled descriptor is never written.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManifestError {
    /// The input is not well-formed XML.
    #[error("manifest is not well-formed XML: {message}")]
    Malformed {
        /// Parser diagnostic, including the byte offset where available.
        message: String,
    },

    /// The container element is missing or appears more than once.
    #[error("expected exactly one <{container}> element under the manifest root, found {found}")]
    Structural {
        /// Name of the container element that was searched for.
        container: String,
        /// Number of matching direct children of the root.
        found: usize,
    },

    /// An existing declaration lacks one of its identity attributes.
    #[error("<{element}> #{position} is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Element kind of the offending declaration.
        element: String,
        /// Name of the absent attribute.
        attribute: String,
        /// Zero-based position among the container's matching children.
        position: usize,
    },

    /// A desired declaration collides with a hand-authored one.
    #[error(
        "generated component '{name}' ({routing_key}) collides with a hand-authored declaration \
         that differs in its exported flag"
    )]
    Conflict {
        /// Qualified name as supplied by the caller.
        name: String,
        /// Routing key shared by both declarations.
        routing_key: String,
    },

    /// Reading or writing the descriptor failed.
    #[error("I/O error at {path}: {source}")]
    Persistence {
        /// Path of the descriptor (or its temporary sibling).
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Merge settings could not be loaded or failed validation.
    #[error("invalid merge settings: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl ManifestError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(Box::new(figment::Error::from(message.into())))
    }
}
