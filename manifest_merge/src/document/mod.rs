//! Owned XML tree for manifest documents.
//!
//! The tree keeps everything needed to write an untouched document back out
//! the way it was read: prolog nodes, attribute order, comments and raw
//! (still escaped) character data. Only attribute values are unescaped, as
//! those are what the merge engine compares.

mod parse;
mod xml_writer;

use crate::error::ManifestResult;

/// A parsed manifest document.
///
/// The document exclusively owns its root element and every descendant node;
/// pipeline stages borrow it for the duration of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    has_bom: bool,
    prolog: Vec<Node>,
    root: Element,
    epilog: Vec<Node>,
}

impl Document {
    /// Parses a document from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ManifestError::Malformed`] when the bytes are not
    /// UTF-8, are not well-formed XML, or do not contain exactly one root
    /// element.
    pub fn parse(bytes: &[u8]) -> ManifestResult<Self> {
        parse::parse_document(bytes)
    }

    /// Serializes the document back to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        xml_writer::write_document(self).into_bytes()
    }

    /// Returns the document element.
    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }

    /// Returns the document element for mutation.
    pub const fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A nested element.
    Element(Element),
    /// Character data, kept escaped exactly as it appeared in the source.
    Text(String),
    /// Content of a `<![CDATA[...]]>` section.
    CData(String),
    /// Content of a `<!--...-->` comment.
    Comment(String),
    /// Content of a `<?...?>` processing instruction.
    ProcessingInstruction(String),
    /// Content of the `<?xml ...?>` declaration.
    Declaration(String),
    /// Content of a `<!DOCTYPE ...>` declaration.
    DocType(String),
}

impl Node {
    /// Returns the element when this node is one.
    #[must_use]
    pub const fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Returns the element for mutation when this node is one.
    pub const fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Returns `true` for text nodes holding only whitespace.
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Self::Text(text) if text.chars().all(char::is_whitespace))
    }
}

/// A single attribute, with its value unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    value: String,
}

impl Attribute {
    /// Qualified attribute name, including any namespace prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unescaped attribute value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style variant of [`Element::set_attribute`].
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Qualified element name, including any namespace prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute value by qualified name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(Attribute::value)
    }

    /// Sets an attribute, replacing the value in place when it already
    /// exists so that attribute order is stable.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let key = name.into();
        let text = value.into();
        match self.attributes.iter_mut().find(|attribute| attribute.name == key) {
            Some(existing) => existing.value = text,
            None => self.attributes.push(Attribute {
                name: key,
                value: text,
            }),
        }
    }

    /// Child nodes in document order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Child nodes for in-place mutation.
    pub const fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Direct child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Direct child elements with the given qualified name.
    pub fn child_elements_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Element> {
        self.child_elements().filter(move |child| child.name == name)
    }
}
