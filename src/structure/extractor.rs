/*!
 * Structural unit extraction from reference documents.
 *
 * Walks a parsed reference document depth-first and yields the minimal
 * set of text-bearing units: a node is extracted when it is a known
 * block-level text container, or a block-level leaf (only inline element
 * children) whose text clears a minimum length. Traversal never descends
 * into an extracted node looking for further units, so no unit is a
 * strict ancestor of another. Unit ids are deterministic: an explicit
 * id attribute when present, otherwise a path built from tag names and
 * same-tag sibling ordinals.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;

use super::dom::{XmlDocument, XmlNode};
use super::markup::MarkupTree;

/// Tags treated as block-level text containers
const BLOCK_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "td",
    "th",
    "blockquote",
    "caption",
    "figcaption",
    "dt",
    "dd",
    "pre",
];

/// Tags treated as inline formatting (allowed inside a unit)
const INLINE_TAGS: &[&str] = &[
    "span", "em", "strong", "i", "b", "u", "a", "sub", "sup", "small", "mark", "abbr", "q", "br",
];

/// Minimum flattened text length for a non-block leaf to qualify
const MIN_LEAF_TEXT_LEN: usize = 12;

/// Category of a structural unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// h1-h6 headings
    Heading,
    /// Regular paragraphs
    Paragraph,
    /// List items
    ListItem,
    /// Table cells
    TableCell,
    /// Anything else that qualified for extraction
    Other,
}

impl UnitKind {
    fn for_tag(tag: &str) -> Self {
        match tag {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => UnitKind::Heading,
            "p" | "blockquote" => UnitKind::Paragraph,
            "li" | "dt" | "dd" => UnitKind::ListItem,
            "td" | "th" => UnitKind::TableCell,
            _ => UnitKind::Other,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Heading => write!(f, "heading"),
            UnitKind::Paragraph => write!(f, "paragraph"),
            UnitKind::ListItem => write!(f, "list_item"),
            UnitKind::TableCell => write!(f, "table_cell"),
            UnitKind::Other => write!(f, "other"),
        }
    }
}

/// A minimal text-bearing node of a reference document: the atomic
/// target of translation insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralUnit {
    /// Stable identifier (explicit id attribute, else a deterministic path)
    pub id: String,
    /// Position of the unit in document order (0-based)
    pub ordinal: usize,
    /// Unit category
    pub kind: UnitKind,
    /// Flattened, whitespace-normalized text
    pub plain_text: String,
    /// Captured internal markup
    pub markup_tree: MarkupTree,
    /// Child-index path to the node within the document tree
    pub node_path: Vec<usize>,
}

/// A reference document with its parsed tree and extracted units
#[derive(Debug, Clone)]
pub struct ReferenceDocument {
    /// Source file path
    pub path: PathBuf,
    /// File name without extension
    pub filename: String,
    /// Author declared in the document, if any
    pub author: Option<String>,
    /// Parsed tree (owned exclusively by this document)
    pub document: XmlDocument,
    /// Extracted units in document order
    pub units: Vec<StructuralUnit>,
}

impl ReferenceDocument {
    /// Load and extract a reference document from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference document: {}", path.display()))?;

        let mut doc = Self::from_str(&content)
            .with_context(|| format!("Failed to parse reference document: {}", path.display()))?;

        doc.path = path.to_path_buf();
        doc.filename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "Extracted {} units from {}",
            doc.units.len(),
            path.display()
        );

        Ok(doc)
    }

    /// Parse a reference document from a string
    pub fn from_str(content: &str) -> Result<Self> {
        let document = XmlDocument::parse(content)?;
        let units = StructureExtractor::new().extract(&document);
        let author = find_author(&document.root);

        Ok(Self {
            path: PathBuf::new(),
            filename: String::new(),
            author,
            document,
            units,
        })
    }

    /// Concatenated text of all units (used for document-level matching)
    pub fn full_text(&self) -> String {
        self.units
            .iter()
            .map(|u| u.plain_text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Look up a unit by id
    pub fn unit(&self, id: &str) -> Option<&StructuralUnit> {
        self.units.iter().find(|u| u.id == id)
    }
}

/// Extracts structural units from parsed reference documents
pub struct StructureExtractor {
    block_tags: HashSet<&'static str>,
    inline_tags: HashSet<&'static str>,
}

impl StructureExtractor {
    /// Create an extractor with the default tag sets
    pub fn new() -> Self {
        Self {
            block_tags: BLOCK_TAGS.iter().copied().collect(),
            inline_tags: INLINE_TAGS.iter().copied().collect(),
        }
    }

    /// Extract the minimal set of text-bearing structural units
    pub fn extract(&self, document: &XmlDocument) -> Vec<StructuralUnit> {
        let mut units = Vec::new();
        let mut seen_ids = HashSet::new();
        self.walk(
            &document.root,
            &mut Vec::new(),
            &mut Vec::new(),
            &mut units,
            &mut seen_ids,
        );
        units
    }

    fn walk(
        &self,
        node: &XmlNode,
        path_segments: &mut Vec<String>,
        node_path: &mut Vec<usize>,
        units: &mut Vec<StructuralUnit>,
        seen_ids: &mut HashSet<String>,
    ) {
        if self.is_extractable(node) {
            let plain_text = node.flattened_text();
            if !plain_text.is_empty() {
                let id = self.stable_id(node, path_segments, seen_ids);
                units.push(StructuralUnit {
                    id,
                    ordinal: units.len(),
                    kind: UnitKind::for_tag(&node.tag),
                    plain_text,
                    markup_tree: MarkupTree::from_node(node),
                    node_path: node_path.clone(),
                });
            }
            // Never descend into an extracted node: the whole-document
            // root failure mode would otherwise duplicate its children.
            return;
        }

        let mut sibling_counts: std::collections::HashMap<&str, usize> =
            std::collections::HashMap::new();

        for (child_index, child) in node.children.iter().enumerate() {
            let super::dom::XmlChild::Element(element) = child else {
                continue;
            };

            let ordinal = sibling_counts.entry(element.tag.as_str()).or_insert(0);
            *ordinal += 1;

            path_segments.push(segment_for(element, *ordinal));
            node_path.push(child_index);
            self.walk(element, path_segments, node_path, units, seen_ids);
            node_path.pop();
            path_segments.pop();
        }
    }

    fn is_extractable(&self, node: &XmlNode) -> bool {
        if self.block_tags.contains(node.tag.as_str()) {
            return true;
        }

        // Block-level leaf: only inline element children, enough text
        let only_inline_children = node
            .child_elements()
            .all(|c| self.inline_tags.contains(c.tag.as_str()));

        only_inline_children
            && node.has_element_children()
            && node.flattened_text().chars().count() >= MIN_LEAF_TEXT_LEN
    }

    fn stable_id(
        &self,
        node: &XmlNode,
        path_segments: &[String],
        seen_ids: &mut HashSet<String>,
    ) -> String {
        let mut id = match node.attr("id") {
            Some(explicit) if !explicit.is_empty() => explicit.to_string(),
            _ => path_segments.join("/"),
        };

        // Duplicate explicit ids in malformed documents get an ordinal
        // suffix so the id stays usable as a key.
        if seen_ids.contains(&id) {
            let mut n = 2;
            while seen_ids.contains(&format!("{}~{}", id, n)) {
                n += 1;
            }
            id = format!("{}~{}", id, n);
        }

        seen_ids.insert(id.clone());
        id
    }
}

impl Default for StructureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Path segment for a node: tag plus 1-based ordinal among same-tag
/// siblings, with a distinguishing class attribute when present.
fn segment_for(node: &XmlNode, ordinal: usize) -> String {
    match node.attr("class") {
        Some(class) if !class.is_empty() => format!("{}[{}].{}", node.tag, ordinal, class),
        _ => format!("{}[{}]", node.tag, ordinal),
    }
}

/// Pull the author from a conventional meta element, if declared
fn find_author(root: &XmlNode) -> Option<String> {
    for child in root.child_elements() {
        if child.tag == "author" {
            let text = child.flattened_text();
            if !text.is_empty() {
                return Some(text);
            }
        }
        if let Some(found) = find_author(child) {
            return Some(found);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(xml: &str) -> Vec<StructuralUnit> {
        let doc = XmlDocument::parse(xml).unwrap();
        StructureExtractor::new().extract(&doc)
    }

    #[test]
    fn test_extract_paragraphs_shouldYieldOnePerBlock() {
        let units = extract("<body><p>First paragraph.</p><p>Second paragraph.</p></body>");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].plain_text, "First paragraph.");
        assert_eq!(units[1].plain_text, "Second paragraph.");
        assert_eq!(units[0].kind, UnitKind::Paragraph);
    }

    #[test]
    fn test_extract_nestedDivs_shouldNotOverlap() {
        let units = extract(
            "<body><div><div><p>Inner one.</p></div><p>Inner two.</p></div></body>",
        );

        assert_eq!(units.len(), 2);
        // No unit's node path is a prefix of another's
        for a in &units {
            for b in &units {
                if a.id != b.id {
                    assert!(!b.node_path.starts_with(&a.node_path));
                }
            }
        }
    }

    #[test]
    fn test_extract_extractedNode_shouldNotYieldDescendants() {
        // li contains a span; only the li is a unit
        let units = extract("<ul><li>Item with <span>formatting</span> inside</li></ul>");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::ListItem);
        assert_eq!(units[0].plain_text, "Item with formatting inside");
    }

    #[test]
    fn test_extract_explicitId_shouldBePreferred() {
        let units = extract(r#"<body><p id="p1">O my God!</p><p>No id here, sir.</p></body>"#);
        assert_eq!(units[0].id, "p1");
        assert_eq!(units[1].id, "p[2]");
    }

    #[test]
    fn test_extract_fallbackIds_shouldEncodePathAndOrdinal() {
        let units = extract(
            r#"<body><div class="content"><p>One is here.</p><p>Two is here.</p></div></body>"#,
        );
        assert_eq!(units[0].id, "div[1].content/p[1]");
        assert_eq!(units[1].id, "div[1].content/p[2]");
    }

    #[test]
    fn test_extract_isDeterministic() {
        let xml = r#"<body><div><p>Alpha beta gamma.</p></div><p>Delta epsilon.</p><ul><li>Zeta eta theta.</li></ul></body>"#;
        let first = extract(xml);
        let second = extract(xml);
        assert_eq!(first, second);
    }

    #[test]
    fn test_extract_inlineLeaf_shouldQualifyByLength() {
        // div is not a block tag, but it is a leaf with inline children
        let units = extract("<body><div>Long enough text with <b>bold</b> words</div></body>");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Other);

        // Too-short leaf does not qualify
        let units = extract("<body><div>Tiny <b>b</b></div></body>");
        assert!(units.is_empty());
    }

    #[test]
    fn test_extract_markupTree_shouldCaptureInlineRuns() {
        let units =
            extract(r#"<body><p>This is <span class="hl">important</span> text.</p></body>"#);
        assert_eq!(units.len(), 1);
        assert!(units[0].markup_tree.has_tagged_runs());
        assert_eq!(units[0].markup_tree.flatten(), units[0].plain_text);
    }

    #[test]
    fn test_extract_duplicateExplicitIds_shouldBeDisambiguated() {
        let units = extract(r#"<body><p id="x">First one here.</p><p id="x">Second one here.</p></body>"#);
        assert_eq!(units[0].id, "x");
        assert_eq!(units[1].id, "x~2");
    }

    #[test]
    fn test_referenceDocument_fullText_shouldJoinUnits() {
        let doc = ReferenceDocument::from_str(
            "<body><p>One two.</p><p>Three four.</p></body>",
        )
        .unwrap();
        assert_eq!(doc.full_text(), "One two. Three four.");
    }

    #[test]
    fn test_findAuthor_shouldReadAuthorElement() {
        let doc = ReferenceDocument::from_str(
            "<doc><meta><author>Bahá'u'lláh</author></meta><p>Some text here.</p></doc>",
        )
        .unwrap();
        assert_eq!(doc.author.as_deref(), Some("Bahá'u'lláh"));
    }
}
