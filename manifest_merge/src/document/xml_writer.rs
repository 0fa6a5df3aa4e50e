//! XML serialization for the document tree.

use super::{Document, Element, Node};

const UTF8_BOM: char = '\u{feff}';

pub(super) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}

pub(super) fn write_document(document: &Document) -> String {
    let mut writer = XmlWriter::new();
    if document.has_bom {
        writer.buffer.push(UTF8_BOM);
    }
    for node in &document.prolog {
        writer.node(node);
    }
    writer.element(&document.root);
    for node in &document.epilog {
        writer.node(node);
    }
    writer.finish()
}

struct XmlWriter {
    buffer: String,
}

impl XmlWriter {
    const fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Element(element) => self.element(element),
            Node::Text(raw) => self.buffer.push_str(raw),
            Node::CData(raw) => self.wrapped("<![CDATA[", raw, "]]>"),
            Node::Comment(raw) => self.wrapped("<!--", raw, "-->"),
            Node::ProcessingInstruction(raw) | Node::Declaration(raw) => {
                self.wrapped("<?", raw, "?>");
            }
            Node::DocType(raw) => {
                let separator = if raw.starts_with(char::is_whitespace) { "" } else { " " };
                self.buffer.push_str("<!DOCTYPE");
                self.wrapped(separator, raw, ">");
            }
        }
    }

    fn element(&mut self, element: &Element) {
        self.buffer.push('<');
        self.buffer.push_str(&element.name);
        for attribute in &element.attributes {
            self.buffer.push(' ');
            self.buffer.push_str(&attribute.name);
            self.buffer.push_str("=\"");
            self.buffer.push_str(&escape_xml(&attribute.value));
            self.buffer.push('"');
        }
        if element.children.is_empty() {
            self.buffer.push_str("/>");
            return;
        }
        self.buffer.push('>');
        for child in &element.children {
            self.node(child);
        }
        self.wrapped("</", &element.name, ">");
    }

    fn wrapped(&mut self, open: &str, raw: &str, close: &str) {
        self.buffer.push_str(open);
        self.buffer.push_str(raw);
        self.buffer.push_str(close);
    }

    fn finish(self) -> String {
        self.buffer
    }
}
