//! Event-driven construction of the document tree.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Attribute, Document, Element, Node};
use crate::error::{ManifestError, ManifestResult};

const UTF8_BOM: &str = "\u{feff}";

/// Where the reader currently is relative to the root element.
enum Phase {
    Prolog,
    InRoot,
    Epilog,
}

pub(super) fn parse_document(bytes: &[u8]) -> ManifestResult<Document> {
    let source = std::str::from_utf8(bytes)
        .map_err(|err| ManifestError::malformed(format!("input is not valid UTF-8: {err}")))?;
    let (has_bom, body) = match source.strip_prefix(UTF8_BOM) {
        Some(stripped) => (true, stripped),
        None => (false, source),
    };

    let mut reader = Reader::from_str(body);
    let mut builder = TreeBuilder::default();
    loop {
        let event = reader.read_event().map_err(|err| {
            ManifestError::malformed(format!("{err} (at byte {})", reader.buffer_position()))
        })?;
        match event {
            Event::Start(start) => builder.open(element_from_start(&start)?)?,
            Event::Empty(start) => builder.leaf(element_from_start(&start)?)?,
            Event::End(_) => builder.close()?,
            Event::Text(text) => builder.text(utf8(&text)?)?,
            Event::CData(data) => builder.node(Node::CData(utf8(&data)?))?,
            Event::Comment(comment) => builder.node(Node::Comment(utf8(&comment)?))?,
            Event::PI(instruction) => {
                builder.node(Node::ProcessingInstruction(utf8(&instruction)?))?;
            }
            Event::Decl(declaration) => builder.node(Node::Declaration(utf8(&declaration)?))?,
            Event::DocType(doctype) => builder.node(Node::DocType(utf8(&doctype)?))?,
            Event::Eof => break,
        }
    }
    builder.finish(has_bom)
}

fn element_from_start(start: &BytesStart<'_>) -> ManifestResult<Element> {
    let mut element = Element::new(utf8(start.name().as_ref())?);
    for entry in start.attributes() {
        let attribute = entry.map_err(|err| ManifestError::malformed(err.to_string()))?;
        let value = attribute
            .unescape_value()
            .map_err(|err| ManifestError::malformed(err.to_string()))?;
        element.attributes.push(Attribute {
            name: utf8(attribute.key.as_ref())?,
            value: value.into_owned(),
        });
    }
    Ok(element)
}

fn utf8(bytes: &[u8]) -> ManifestResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|err| ManifestError::malformed(format!("invalid UTF-8 in markup: {err}")))
}

struct TreeBuilder {
    phase: Phase,
    prolog: Vec<Node>,
    open: Vec<Element>,
    root: Option<Element>,
    epilog: Vec<Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            phase: Phase::Prolog,
            prolog: Vec::new(),
            open: Vec::new(),
            root: None,
            epilog: Vec::new(),
        }
    }
}

impl TreeBuilder {
    fn open(&mut self, element: Element) -> ManifestResult<()> {
        if matches!(self.phase, Phase::Epilog) {
            return Err(second_root(&element));
        }
        self.phase = Phase::InRoot;
        self.open.push(element);
        Ok(())
    }

    fn leaf(&mut self, element: Element) -> ManifestResult<()> {
        match self.phase {
            Phase::Epilog => Err(second_root(&element)),
            Phase::Prolog => {
                self.root = Some(element);
                self.phase = Phase::Epilog;
                Ok(())
            }
            Phase::InRoot => self.node(Node::Element(element)),
        }
    }

    fn close(&mut self) -> ManifestResult<()> {
        let element = self
            .open
            .pop()
            .ok_or_else(|| ManifestError::malformed("closing tag without a matching start tag"))?;
        match self.open.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => {
                self.root = Some(element);
                self.phase = Phase::Epilog;
            }
        }
        Ok(())
    }

    fn text(&mut self, text: String) -> ManifestResult<()> {
        if !matches!(self.phase, Phase::InRoot) && !text.chars().all(char::is_whitespace) {
            return Err(ManifestError::malformed(
                "character data is not allowed outside the root element",
            ));
        }
        self.node(Node::Text(text))
    }

    fn node(&mut self, node: Node) -> ManifestResult<()> {
        match self.phase {
            Phase::Prolog => self.prolog.push(node),
            Phase::Epilog => self.epilog.push(node),
            Phase::InRoot => {
                let parent = self.open.last_mut().ok_or_else(|| {
                    ManifestError::malformed("content found outside any element")
                })?;
                parent.children.push(node);
            }
        }
        Ok(())
    }

    fn finish(self, has_bom: bool) -> ManifestResult<Document> {
        if let Some(unclosed) = self.open.last() {
            return Err(ManifestError::malformed(format!(
                "unexpected end of input: <{}> is never closed",
                unclosed.name
            )));
        }
        let root = self
            .root
            .ok_or_else(|| ManifestError::malformed("document has no root element"))?;
        Ok(Document {
            has_bom,
            prolog: self.prolog,
            root,
            epilog: self.epilog,
        })
    }
}

fn second_root(element: &Element) -> ManifestError {
    ManifestError::malformed(format!(
        "<{}> appears after the root element has been closed",
        element.name
    ))
}
