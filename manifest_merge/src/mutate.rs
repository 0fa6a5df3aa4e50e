//! In-place application of a merge plan to the document tree.

use crate::component::{DeclaredComponent, RootNamespace};
use crate::config::MergeSettings;
use crate::document::{Document, Element, Node};
use crate::error::{ManifestError, ManifestResult};
use crate::extract::{find_container_mut, is_generated, parse_bool};
use crate::identity::names_are_equal;
use crate::plan::MergePlan;

const fn bool_attr(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// What applying a plan actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    added: Vec<DeclaredComponent>,
    removed: Vec<DeclaredComponent>,
    unmatched: Vec<DeclaredComponent>,
}

impl MergeReport {
    /// Declarations written to the tree.
    #[must_use]
    pub fn added(&self) -> &[DeclaredComponent] {
        &self.added
    }

    /// Planned removals that deleted an element.
    #[must_use]
    pub fn removed(&self) -> &[DeclaredComponent] {
        &self.removed
    }

    /// Planned removals that found no generated element to delete.
    #[must_use]
    pub fn unmatched(&self) -> &[DeclaredComponent] {
        &self.unmatched
    }

    /// Returns `true` when the tree was modified.
    #[must_use]
    pub const fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Applies every addition, then every removal, of `plan`.
///
/// A removal that finds nothing to delete is logged and listed in
/// [`MergeReport::unmatched`]; this happens when `plan` was computed from a
/// different snapshot of the document.
///
/// # Errors
///
/// Returns [`ManifestError::Structural`] when the container cannot be
/// located, or [`ManifestError::Config`] when the marker attribute has no
/// usable prefix.
pub fn apply_plan(
    document: &mut Document,
    settings: &MergeSettings,
    namespace: &RootNamespace,
    plan: &MergePlan,
) -> ManifestResult<MergeReport> {
    let mut report = MergeReport::default();
    for component in plan.to_add() {
        if apply_add(document, settings, component)? {
            report.added.push(component.clone());
        }
    }
    for component in plan.to_remove() {
        if apply_remove(document, settings, namespace, component)? {
            report.removed.push(component.clone());
        } else {
            tracing::warn!(
                component = %component,
                "planned removal matched no generated declaration"
            );
            report.unmatched.push(component.clone());
        }
    }
    Ok(report)
}

/// Appends a generated declaration as the last element of the container and
/// declares the marker namespace on the root if needed.
///
/// The new element reuses the indentation of the container's last element,
/// or nests one level inside the closing tag when there is none, so indented
/// manifests stay indented. Always returns `true`.
///
/// # Errors
///
/// Returns [`ManifestError::Structural`] when the container cannot be
/// located, or [`ManifestError::Config`] when the marker attribute has no
/// usable prefix.
pub fn apply_add(
    document: &mut Document,
    settings: &MergeSettings,
    component: &DeclaredComponent,
) -> ManifestResult<bool> {
    let namespace_attribute = settings.marker_namespace_attribute().ok_or_else(|| {
        ManifestError::config(format!(
            "marker attribute '{}' has no namespace prefix",
            settings.marker_attribute
        ))
    })?;
    let element = Element::new(&settings.component_element)
        .with_attribute(&settings.name_attribute, component.qualified_name())
        .with_attribute(&settings.routing_key_attribute, component.routing_key())
        .with_attribute(&settings.exported_attribute, bool_attr(component.exported()))
        .with_attribute(&settings.marker_attribute, bool_attr(true));

    let root = document.root_mut();
    append_indented(find_container_mut(root, settings)?, element);
    if root.attribute(&namespace_attribute).is_none() {
        root.set_attribute(namespace_attribute, &settings.marker_namespace_uri);
    }
    tracing::debug!(component = %component, "added generated declaration");
    Ok(true)
}

/// Removes the first generated declaration matching `component`.
///
/// A child matches when it is of the target kind, carries a true marker,
/// and agrees with `component` on routing key and normalized name. Among
/// matches, one that also agrees on the exported flag is preferred; ties go
/// to document order. At most one element is removed per call.
///
/// # Errors
///
/// Returns [`ManifestError::Structural`] when the container cannot be
/// located.
pub fn apply_remove(
    document: &mut Document,
    settings: &MergeSettings,
    namespace: &RootNamespace,
    component: &DeclaredComponent,
) -> ManifestResult<bool> {
    let container = find_container_mut(document.root_mut(), settings)?;
    let Some(index) = removal_index(container, settings, namespace, component) else {
        return Ok(false);
    };
    let children = container.children_mut();
    children.remove(index);
    if let Some(previous) = index.checked_sub(1) {
        if children.get(previous).is_some_and(Node::is_whitespace) {
            children.remove(previous);
        }
    }
    tracing::debug!(component = %component, "removed generated declaration");
    Ok(true)
}

fn removal_index(
    container: &Element,
    settings: &MergeSettings,
    namespace: &RootNamespace,
    component: &DeclaredComponent,
) -> Option<usize> {
    let candidates: Vec<(usize, bool)> = container
        .children()
        .iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let element = node.as_element()?;
            let is_match = element.name() == settings.component_element
                && is_generated(element, settings)
                && element.attribute(&settings.routing_key_attribute)
                    == Some(component.routing_key())
                && element
                    .attribute(&settings.name_attribute)
                    .is_some_and(|name| {
                        names_are_equal(name, component.qualified_name(), namespace)
                    });
            let is_exact = element
                .attribute(&settings.exported_attribute)
                .is_some_and(parse_bool)
                == component.exported();
            is_match.then_some((index, is_exact))
        })
        .collect();
    candidates
        .iter()
        .find(|(_, is_exact)| *is_exact)
        .or_else(|| candidates.first())
        .map(|(index, _)| *index)
}

fn append_indented(container: &mut Element, element: Element) {
    let children = container.children_mut();
    let closing = match children.last() {
        Some(Node::Text(raw)) if raw.chars().all(char::is_whitespace) => Some(raw.clone()),
        _ => None,
    };
    let indentation =
        sibling_indentation(children).or_else(|| closing.as_deref().and_then(nested_indentation));
    let insert_at = if closing.is_some() {
        children.len().saturating_sub(1)
    } else {
        children.len()
    };
    match indentation {
        Some(whitespace) => {
            children.splice(
                insert_at..insert_at,
                [Node::Text(whitespace), Node::Element(element)],
            );
        }
        None => children.insert(insert_at, Node::Element(element)),
    }
}

/// Whitespace in front of the last child element.
fn sibling_indentation(children: &[Node]) -> Option<String> {
    let last = children
        .iter()
        .rposition(|node| matches!(node, Node::Element(_)))?;
    match children.get(last.checked_sub(1)?)? {
        Node::Text(raw) if raw.chars().all(char::is_whitespace) => Some(raw.clone()),
        _ => None,
    }
}

/// Indentation for the first child of an element-free container.
///
/// The container sits directly under the root, so the indentation of its
/// closing tag is exactly one level.
fn nested_indentation(closing: &str) -> Option<String> {
    let (_, level) = closing.rsplit_once('\n')?;
    Some(format!("{closing}{level}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ExistingComponent;
    use crate::extract::{extract_existing, find_container};
    use rstest::{fixture, rstest};

    const INDENTED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.app">
    <application android:label="demo">
        <activity android:name=".Main"/>
    </application>
</manifest>
"#;

    #[fixture]
    fn settings() -> MergeSettings {
        MergeSettings::default()
    }

    #[fixture]
    fn namespace() -> RootNamespace {
        RootNamespace::new("com.app")
    }

    fn parse(xml: &str) -> Document {
        Document::parse(xml.as_bytes()).expect("parse test manifest")
    }

    fn render(document: &Document) -> String {
        String::from_utf8(document.to_bytes()).expect("serialized manifest is UTF-8")
    }

    #[rstest]
    fn add_appends_marked_element_and_declares_namespace(settings: MergeSettings) {
        let mut document = parse(INDENTED);
        let component = DeclaredComponent::new(".B", "auth2", true);

        assert!(apply_add(&mut document, &settings, &component).expect("add"));

        let container = find_container(document.root(), &settings).expect("container");
        let last = container.child_elements().last().expect("a child element");
        assert_eq!(last.name(), "provider");
        assert_eq!(last.attribute("android:name"), Some(".B"));
        assert_eq!(last.attribute("android:authorities"), Some("auth2"));
        assert_eq!(last.attribute("android:exported"), Some("true"));
        assert_eq!(last.attribute("droitateddb:generated"), Some("true"));
        assert_eq!(
            document.root().attribute("xmlns:droitateddb"),
            Some("http://droitateddb.org")
        );
        assert!(
            render(&document).contains(
                "<activity android:name=\".Main\"/>\n        <provider android:name=\".B\""
            ),
            "new element should reuse sibling indentation:\n{}",
            render(&document)
        );
    }

    #[rstest]
    fn namespace_declaration_is_added_once(settings: MergeSettings) {
        let mut document = parse(INDENTED);
        for name in [".A", ".B"] {
            apply_add(&mut document, &settings, &DeclaredComponent::new(name, name, false))
                .expect("add");
        }

        let declarations = document
            .root()
            .attributes()
            .iter()
            .filter(|attribute| attribute.name() == "xmlns:droitateddb")
            .count();
        assert_eq!(declarations, 1);
    }

    #[rstest]
    fn existing_namespace_declaration_is_left_unchanged(settings: MergeSettings) {
        let mut document = parse(
            r#"<manifest xmlns:droitateddb="urn:custom"><application/></manifest>"#,
        );
        apply_add(&mut document, &settings, &DeclaredComponent::new(".A", "a", false))
            .expect("add");

        assert_eq!(document.root().attribute("xmlns:droitateddb"), Some("urn:custom"));
        assert_eq!(
            render(&document),
            "<manifest xmlns:droitateddb=\"urn:custom\"><application><provider \
             android:name=\".A\" android:authorities=\"a\" android:exported=\"false\" \
             droitateddb:generated=\"true\"/></application></manifest>"
        );
    }

    #[rstest]
    fn remove_only_touches_generated_elements(settings: MergeSettings, namespace: RootNamespace) {
        let mut document = parse(
            r#"<manifest><application>
    <provider android:name=".A" android:authorities="auth"/>
    <provider android:name=".A" android:authorities="auth" droitateddb:generated="false"/>
</application></manifest>"#,
        );
        let before = render(&document);

        let removed = apply_remove(
            &mut document,
            &settings,
            &namespace,
            &DeclaredComponent::new(".A", "auth", false),
        )
        .expect("remove");

        assert!(!removed);
        assert_eq!(render(&document), before);
    }

    #[rstest]
    fn remove_matches_normalized_names_and_drops_indentation(
        settings: MergeSettings,
        namespace: RootNamespace,
    ) {
        let mut document = parse(
            r#"<manifest><application>
    <provider android:name=".Keep" android:authorities="keep"/>
    <provider android:name="com.app.C" android:authorities="auth3" droitateddb:generated="true"/>
</application></manifest>"#,
        );

        let removed = apply_remove(
            &mut document,
            &settings,
            &namespace,
            &DeclaredComponent::new(".C", "auth3", false),
        )
        .expect("remove");

        assert!(removed);
        assert_eq!(
            render(&document),
            "<manifest><application>\n    <provider android:name=\".Keep\" \
             android:authorities=\"keep\"/>\n</application></manifest>"
        );
    }

    #[rstest]
    fn remove_deletes_one_element_per_call(settings: MergeSettings, namespace: RootNamespace) {
        let mut document = parse(
            r#"<manifest><application>
    <provider android:name=".A" android:authorities="auth" droitateddb:generated="true"/>
    <provider android:name=".A" android:authorities="auth" droitateddb:generated="true"/>
</application></manifest>"#,
        );
        let target = DeclaredComponent::new(".A", "auth", false);

        assert!(apply_remove(&mut document, &settings, &namespace, &target).expect("first"));
        let container = find_container(document.root(), &settings).expect("container");
        assert_eq!(extract_existing(container, &settings).expect("extract").len(), 1);

        assert!(apply_remove(&mut document, &settings, &namespace, &target).expect("second"));
        assert!(!apply_remove(&mut document, &settings, &namespace, &target).expect("third"));
    }

    #[rstest]
    fn remove_prefers_the_element_with_the_same_exported_flag(
        settings: MergeSettings,
        namespace: RootNamespace,
    ) {
        let mut document = parse(
            r#"<manifest><application><provider android:name=".A" android:authorities="auth" android:exported="true" droitateddb:generated="true"/><provider android:name=".A" android:authorities="auth" android:exported="false" droitateddb:generated="true"/></application></manifest>"#,
        );

        apply_remove(
            &mut document,
            &settings,
            &namespace,
            &DeclaredComponent::new(".A", "auth", false),
        )
        .expect("remove");

        let container = find_container(document.root(), &settings).expect("container");
        let remaining = extract_existing(container, &settings).expect("extract");
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|entry| entry.component().exported()));
    }

    #[rstest]
    fn first_child_of_an_empty_container_is_indented_one_level(settings: MergeSettings) {
        let mut document = parse(
            "<manifest>\n    <application>\n    </application>\n</manifest>\n",
        );

        apply_add(&mut document, &settings, &DeclaredComponent::new(".A", "a", false))
            .expect("add");

        assert_eq!(
            render(&document),
            "<manifest xmlns:droitateddb=\"http://droitateddb.org\">\n    <application>\n        \
             <provider android:name=\".A\" android:authorities=\"a\" \
             android:exported=\"false\" droitateddb:generated=\"true\"/>\n    \
             </application>\n</manifest>\n"
        );
    }

    #[rstest]
    fn stale_plans_report_unmatched_removals(settings: MergeSettings, namespace: RootNamespace) {
        let mut document = parse(INDENTED);
        let vanished = DeclaredComponent::new(".Gone", "gone", false);
        let stale = crate::plan::plan(
            &[ExistingComponent::generated(vanished.clone())],
            &[],
            &namespace,
        );
        let before = render(&document);

        let report = apply_plan(&mut document, &settings, &namespace, &stale).expect("apply");

        assert_eq!(report.unmatched(), std::slice::from_ref(&vanished));
        assert!(report.removed().is_empty());
        assert!(!report.changed());
        assert_eq!(render(&document), before);
    }
}
