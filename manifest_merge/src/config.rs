//! Merge settings: the element and attribute vocabulary of the descriptor.
//!
//! Settings are layered with `figment`: built-in defaults describing an
//! Android manifest, optionally overridden by a TOML file. Callers that
//! already own a [`Figment`] can extract settings from it directly.

use camino::Utf8Path;
use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::{ManifestError, ManifestResult};

/// How the planner treats a desired component that shares its identity with
/// a hand-authored declaration but differs in its exported flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Log a warning and add the generated declaration anyway.
    #[default]
    Warn,
    /// Abort the merge before the tree is touched.
    Fail,
}

/// Names used to locate and write declarations in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeSettings {
    /// Element that must appear exactly once under the root.
    pub container_element: String,
    /// Element kind of the declarations being merged.
    pub component_element: String,
    /// Attribute carrying the (possibly relative) qualified name.
    pub name_attribute: String,
    /// Attribute carrying the routing key.
    pub routing_key_attribute: String,
    /// Attribute carrying the exported flag.
    pub exported_attribute: String,
    /// Prefixed attribute marking declarations written by this engine.
    pub marker_attribute: String,
    /// Namespace URI bound to the marker attribute's prefix.
    pub marker_namespace_uri: String,
    /// Treatment of collisions with hand-authored declarations.
    pub conflict_policy: ConflictPolicy,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            container_element: "application".to_owned(),
            component_element: "provider".to_owned(),
            name_attribute: "android:name".to_owned(),
            routing_key_attribute: "android:authorities".to_owned(),
            exported_attribute: "android:exported".to_owned(),
            marker_attribute: "droitateddb:generated".to_owned(),
            marker_namespace_uri: "http://droitateddb.org".to_owned(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl MergeSettings {
    /// Loads settings from the defaults and an optional TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Config`] when the file cannot be read or
    /// parsed, or when the resulting settings fail validation.
    pub fn load(path: Option<&Utf8Path>) -> ManifestResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = path {
            let data = std::fs::read_to_string(file).map_err(|err| {
                ManifestError::config(format!("failed to read settings file '{file}': {err}"))
            })?;
            figment = figment.merge(Toml::string(&data));
        }
        Self::from_figment(&figment)
    }

    /// Extracts and validates settings from an existing figment.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Config`] when extraction or validation fails.
    pub fn from_figment(figment: &Figment) -> ManifestResult<Self> {
        let settings: Self = figment.extract().map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every name is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Config`] naming the first offending key.
    pub fn validate(&self) -> ManifestResult<()> {
        let required = [
            ("container_element", &self.container_element),
            ("component_element", &self.component_element),
            ("name_attribute", &self.name_attribute),
            ("routing_key_attribute", &self.routing_key_attribute),
            ("exported_attribute", &self.exported_attribute),
            ("marker_namespace_uri", &self.marker_namespace_uri),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ManifestError::config(format!("'{key}' must not be empty")));
        }
        if self.marker_prefix().is_none() {
            return Err(ManifestError::config(format!(
                "'marker_attribute' must be of the form 'prefix:name', got '{}'",
                self.marker_attribute
            )));
        }
        Ok(())
    }

    /// Namespace prefix of the marker attribute, if it has a usable one.
    #[must_use]
    pub fn marker_prefix(&self) -> Option<&str> {
        let (prefix, local) = self.marker_attribute.split_once(':')?;
        let is_usable = !prefix.is_empty() && !local.is_empty() && prefix != "xmlns";
        is_usable.then_some(prefix)
    }

    /// Root attribute declaring the marker namespace, e.g. `xmlns:droitateddb`.
    #[must_use]
    pub fn marker_namespace_attribute(&self) -> Option<String> {
        self.marker_prefix().map(|prefix| format!("xmlns:{prefix}"))
    }
}
