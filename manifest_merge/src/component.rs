//! Value records for declared components.

use std::borrow::Cow;
use std::fmt;

/// Separator that marks a qualified name as relative to the root namespace.
pub const RELATIVE_NAME_PREFIX: char = '.';

/// A component declaration: qualified name, routing key and exported flag.
///
/// Records are compared purely by value. Two records describe the same
/// component when their routing keys and normalized names match; see
/// [`crate::identity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredComponent {
    qualified_name: String,
    routing_key: String,
    exported: bool,
}

impl DeclaredComponent {
    /// Creates a declaration.
    #[must_use]
    pub fn new(
        qualified_name: impl Into<String>,
        routing_key: impl Into<String>,
        exported: bool,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            routing_key: routing_key.into(),
            exported,
        }
    }

    /// Name as spelled in the descriptor or by the generator.
    #[must_use]
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Routing key, e.g. a content provider authority.
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Whether the component is visible to other applications.
    #[must_use]
    pub const fn exported(&self) -> bool {
        self.exported
    }
}

impl fmt::Display for DeclaredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, exported={})",
            self.qualified_name, self.routing_key, self.exported
        )
    }
}

/// Who owns a declaration found in the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Written by this engine and carrying a true generation marker.
    Generated,
    /// Anything else. Never removed by a merge.
    HandAuthored,
}

impl Ownership {
    /// Returns `true` for engine-owned declarations.
    #[must_use]
    pub const fn is_generated(self) -> bool {
        matches!(self, Self::Generated)
    }
}

/// A declaration extracted from the descriptor, tagged with its ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingComponent {
    component: DeclaredComponent,
    ownership: Ownership,
}

impl ExistingComponent {
    /// Tags a declaration with its ownership.
    #[must_use]
    pub const fn new(component: DeclaredComponent, ownership: Ownership) -> Self {
        Self {
            component,
            ownership,
        }
    }

    /// Shorthand for an engine-owned declaration.
    #[must_use]
    pub const fn generated(component: DeclaredComponent) -> Self {
        Self::new(component, Ownership::Generated)
    }

    /// Shorthand for a user-owned declaration.
    #[must_use]
    pub const fn hand_authored(component: DeclaredComponent) -> Self {
        Self::new(component, Ownership::HandAuthored)
    }

    /// The declaration itself.
    #[must_use]
    pub const fn component(&self) -> &DeclaredComponent {
        &self.component
    }

    /// Ownership recorded at extraction time.
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }
}

/// Package used to resolve relative component names for comparison.
///
/// The namespace never changes what is written to disk: names keep the
/// spelling they were declared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNamespace(String);

impl RootNamespace {
    /// Wraps a package name such as `com.example.app`.
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self(namespace.into())
    }

    /// The namespace as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolves `name` to its absolute form.
    ///
    /// # Examples
    ///
    /// ```
    /// use manifest_merge::RootNamespace;
    ///
    /// let namespace = RootNamespace::new("com.example");
    /// assert_eq!(namespace.normalize(".Foo"), "com.example.Foo");
    /// assert_eq!(namespace.normalize("org.other.Bar"), "org.other.Bar");
    /// ```
    #[must_use]
    pub fn normalize<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if name.starts_with(RELATIVE_NAME_PREFIX) {
            Cow::Owned(format!("{}{name}", self.0))
        } else {
            Cow::Borrowed(name)
        }
    }
}

impl fmt::Display for RootNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
