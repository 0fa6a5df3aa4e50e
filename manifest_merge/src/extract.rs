//! Locating the container and reading existing declarations from it.

use crate::component::{DeclaredComponent, ExistingComponent, Ownership};
use crate::config::MergeSettings;
use crate::document::{Element, Node};
use crate::error::{ManifestError, ManifestResult};

/// Returns the single container element directly under `root`.
///
/// # Errors
///
/// Returns [`ManifestError::Structural`] when there is no container or more
/// than one; the engine never guesses which one was meant.
pub fn find_container<'a>(
    root: &'a Element,
    settings: &MergeSettings,
) -> ManifestResult<&'a Element> {
    let mut containers = root.child_elements_named(&settings.container_element);
    match (containers.next(), containers.next()) {
        (Some(container), None) => Ok(container),
        _ => Err(structural_error(root, settings)),
    }
}

/// Mutable counterpart of [`find_container`].
///
/// # Errors
///
/// Returns [`ManifestError::Structural`] under the same conditions.
pub fn find_container_mut<'a>(
    root: &'a mut Element,
    settings: &MergeSettings,
) -> ManifestResult<&'a mut Element> {
    let found = root
        .child_elements_named(&settings.container_element)
        .count();
    if found != 1 {
        return Err(ManifestError::Structural {
            container: settings.container_element.clone(),
            found,
        });
    }
    root.children_mut()
        .iter_mut()
        .filter_map(Node::as_element_mut)
        .find(|child| child.name() == settings.container_element)
        .ok_or_else(|| ManifestError::Structural {
            container: settings.container_element.clone(),
            found: 0,
        })
}

fn structural_error(root: &Element, settings: &MergeSettings) -> ManifestError {
    ManifestError::Structural {
        container: settings.container_element.clone(),
        found: root
            .child_elements_named(&settings.container_element)
            .count(),
    }
}

/// Reads every declaration of the target kind directly under `container`,
/// in document order.
///
/// # Errors
///
/// Returns [`ManifestError::MissingAttribute`] when a declaration lacks its
/// name or routing key.
pub fn extract_existing(
    container: &Element,
    settings: &MergeSettings,
) -> ManifestResult<Vec<ExistingComponent>> {
    container
        .child_elements_named(&settings.component_element)
        .enumerate()
        .map(|(position, element)| {
            let name = required_attribute(element, &settings.name_attribute, position)?;
            let routing_key =
                required_attribute(element, &settings.routing_key_attribute, position)?;
            let exported = element
                .attribute(&settings.exported_attribute)
                .is_some_and(parse_bool);
            let ownership = if is_generated(element, settings) {
                Ownership::Generated
            } else {
                Ownership::HandAuthored
            };
            Ok(ExistingComponent::new(
                DeclaredComponent::new(name, routing_key, exported),
                ownership,
            ))
        })
        .collect()
}

fn required_attribute<'a>(
    element: &'a Element,
    attribute: &str,
    position: usize,
) -> ManifestResult<&'a str> {
    element
        .attribute(attribute)
        .ok_or_else(|| ManifestError::MissingAttribute {
            element: element.name().to_owned(),
            attribute: attribute.to_owned(),
            position,
        })
}

/// Returns `true` when the element carries a generation marker set to true.
///
/// Unmarked elements and markers that do not read as `true` count as
/// hand-authored.
#[must_use]
pub fn is_generated(element: &Element, settings: &MergeSettings) -> bool {
    element
        .attribute(&settings.marker_attribute)
        .is_some_and(parse_bool)
}

/// Reads a boolean attribute: `true` in any letter case, anything else false.
#[must_use]
pub fn parse_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}
