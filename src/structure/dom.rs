/*!
 * Minimal owned XML document model.
 *
 * Reference documents are parsed once into this tree and serialized back
 * out after text grafting. Parsing is event-based via quick-xml; the tree
 * keeps tag names, attribute order and text nodes exactly as read so that
 * untouched markup survives a round trip intact.
 */

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use crate::errors::StructureError;

/// A child of an XML element: either a nested element or a text node
#[derive(Debug, Clone, PartialEq)]
pub enum XmlChild {
    /// Nested element
    Element(XmlNode),
    /// Text content (unescaped)
    Text(String),
}

/// An XML element with its attributes and ordered children
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    /// Tag name
    pub tag: String,
    /// Attributes in document order
    pub attrs: Vec<(String, String)>,
    /// Ordered children (elements and text runs)
    pub children: Vec<XmlChild>,
}

impl XmlNode {
    /// Create an element with no attributes or children
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over direct element children
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter_map(|c| match c {
            XmlChild::Element(node) => Some(node),
            XmlChild::Text(_) => None,
        })
    }

    /// Whether this element has any element children at all
    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Concatenated text of this node and all descendants,
    /// whitespace-normalized (runs of whitespace collapse to one space).
    pub fn flattened_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        normalize_whitespace(&out)
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlChild::Text(text) => out.push_str(text),
                XmlChild::Element(node) => node.collect_text(out),
            }
        }
    }
}

/// A parsed XML document: the root element plus whether a declaration
/// was present in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    /// Root element
    pub root: XmlNode,
    /// Whether the source carried an XML declaration
    pub has_decl: bool,
}

impl XmlDocument {
    /// Parse a document from a string
    pub fn parse(content: &str) -> Result<Self, StructureError> {
        let mut reader = Reader::from_str(content);

        let mut has_decl = false;
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| StructureError::MalformedDocument(e.to_string()))?;

            match event {
                Event::Decl(_) => has_decl = true,
                Event::Start(ref e) => {
                    stack.push(read_element(e)?);
                }
                Event::Empty(ref e) => {
                    let node = read_element(e)?;
                    attach(&mut stack, &mut root, XmlChild::Element(node))?;
                }
                Event::Text(ref e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| StructureError::MalformedDocument(e.to_string()))?;
                    if !text.is_empty() {
                        attach(&mut stack, &mut root, XmlChild::Text(text.into_owned()))?;
                    }
                }
                Event::CData(ref e) => {
                    let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                    attach(&mut stack, &mut root, XmlChild::Text(text))?;
                }
                Event::End(_) => {
                    let node = stack.pop().ok_or_else(|| {
                        StructureError::MalformedDocument("unbalanced end tag".to_string())
                    })?;
                    attach(&mut stack, &mut root, XmlChild::Element(node))?;
                }
                Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }

            buf.clear();
        }

        if !stack.is_empty() {
            return Err(StructureError::MalformedDocument(
                "unclosed element at end of document".to_string(),
            ));
        }

        let root = root.ok_or_else(|| {
            StructureError::MalformedDocument("document has no root element".to_string())
        })?;

        Ok(Self { root, has_decl })
    }

    /// Serialize the document back to a string
    pub fn serialize(&self) -> Result<String, StructureError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        if self.has_decl {
            writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
                .map_err(|e| StructureError::SerializeError(e.to_string()))?;
        }

        write_node(&mut writer, &self.root)?;

        let bytes = writer.into_inner().into_inner();
        String::from_utf8(bytes).map_err(|e| StructureError::SerializeError(e.to_string()))
    }
}

fn read_element(e: &BytesStart) -> Result<XmlNode, StructureError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attrs = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|e| StructureError::MalformedDocument(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| StructureError::MalformedDocument(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }

    Ok(XmlNode {
        tag,
        attrs,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    child: XmlChild,
) -> Result<(), StructureError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(child);
        return Ok(());
    }

    match child {
        XmlChild::Element(node) => {
            if root.is_some() {
                return Err(StructureError::MalformedDocument(
                    "multiple root elements".to_string(),
                ));
            }
            *root = Some(node);
            Ok(())
        }
        // Whitespace between the declaration and the root element
        XmlChild::Text(text) if text.trim().is_empty() => Ok(()),
        XmlChild::Text(_) => Err(StructureError::MalformedDocument(
            "text outside root element".to_string(),
        )),
    }
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &XmlNode) -> Result<(), StructureError> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (key, value) in &node.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| StructureError::SerializeError(e.to_string()))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| StructureError::SerializeError(e.to_string()))?;

    for child in &node.children {
        match child {
            XmlChild::Text(text) => {
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(|e| StructureError::SerializeError(e.to_string()))?;
            }
            XmlChild::Element(nested) => write_node(writer, nested)?,
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new(node.tag.as_str())))
        .map_err(|e| StructureError::SerializeError(e.to_string()))?;

    Ok(())
}

/// Collapse runs of whitespace to single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simpleDocument_shouldBuildTree() {
        let doc = XmlDocument::parse("<root><p>Hello</p></root>").unwrap();
        assert_eq!(doc.root.tag, "root");
        assert_eq!(doc.root.children.len(), 1);
    }

    #[test]
    fn test_parse_attributes_shouldPreserveOrder() {
        let doc = XmlDocument::parse(r#"<p class="a" id="x" lang="es">t</p>"#).unwrap();
        assert_eq!(
            doc.root.attrs,
            vec![
                ("class".to_string(), "a".to_string()),
                ("id".to_string(), "x".to_string()),
                ("lang".to_string(), "es".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_malformed_shouldError() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("no xml here").is_err());
    }

    #[test]
    fn test_serialize_roundTrip_shouldPreserveMarkup() {
        let source = r#"<doc><p id="p1">This is <span class="hl">important</span> text.</p></doc>"#;
        let doc = XmlDocument::parse(source).unwrap();
        let out = doc.serialize().unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn test_serialize_declaration_shouldBeReEmitted() {
        let source = r#"<?xml version="1.0" encoding="UTF-8"?><doc><p>x</p></doc>"#;
        let doc = XmlDocument::parse(source).unwrap();
        assert!(doc.has_decl);
        assert!(doc.serialize().unwrap().starts_with("<?xml"));
    }

    #[test]
    fn test_flattenedText_shouldJoinNestedRuns() {
        let doc =
            XmlDocument::parse("<p>This is <span>important</span>   text.</p>").unwrap();
        assert_eq!(doc.root.flattened_text(), "This is important text.");
    }

    #[test]
    fn test_parse_entities_shouldUnescape() {
        let doc = XmlDocument::parse("<p>a &amp; b</p>").unwrap();
        assert_eq!(doc.root.flattened_text(), "a & b");

        // And escape again on write
        assert_eq!(doc.serialize().unwrap(), "<p>a &amp; b</p>");
    }

    #[test]
    fn test_attr_lookup_shouldFindValue() {
        let doc = XmlDocument::parse(r#"<p id="p7">t</p>"#).unwrap();
        assert_eq!(doc.root.attr("id"), Some("p7"));
        assert_eq!(doc.root.attr("class"), None);
    }
}
