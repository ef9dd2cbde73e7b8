/*!
 * Markup tree model for structural units.
 *
 * A unit's internal markup is captured as an arena of immutable runs
 * addressed by index: plain-text runs and tagged runs (inline formatting
 * elements carrying their own attributes and nested runs). The writer
 * produces a brand-new tree rather than mutating shared nodes, so a
 * reference document can be read by matching while a grafting job builds
 * replacement trees for it.
 */

use serde::{Deserialize, Serialize};
use std::ops::Range;

use super::dom::{XmlChild, XmlNode};

/// Index of a run within its arena
pub type RunId = usize;

/// One run in a unit's markup tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Run {
    /// Plain text between formatting regions
    Text(String),
    /// An inline formatting region (e.g. `<span class="hl">`)
    Tagged {
        /// Tag name of the inline element
        tag: String,
        /// Attributes in document order
        attrs: Vec<(String, String)>,
        /// Child runs, in order
        children: Vec<RunId>,
    },
}

/// Arena of runs plus the ordered list of top-level run ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupTree {
    runs: Vec<Run>,
    roots: Vec<RunId>,
}

impl MarkupTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self {
            runs: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Create a tree holding a single plain-text run
    pub fn from_text(text: &str) -> Self {
        let mut tree = Self::new();
        if !text.is_empty() {
            let id = tree.push(Run::Text(text.to_string()));
            tree.roots.push(id);
        }
        tree
    }

    /// Capture the children of an element as a markup tree.
    ///
    /// Whitespace inside text runs is collapsed the same way as
    /// `flattened_text`, keeping run offsets consistent with unit text.
    pub fn from_node(node: &XmlNode) -> Self {
        let mut tree = Self::new();
        let mut roots = Vec::new();
        for child in &node.children {
            if let Some(id) = tree.add_child(child) {
                roots.push(id);
            }
        }
        tree.roots = roots;
        tree.normalize_edges();
        tree
    }

    fn add_child(&mut self, child: &XmlChild) -> Option<RunId> {
        match child {
            XmlChild::Text(text) => {
                let collapsed = collapse_whitespace(text);
                if collapsed.is_empty() {
                    None
                } else {
                    Some(self.push(Run::Text(collapsed)))
                }
            }
            XmlChild::Element(node) => {
                let mut children = Vec::new();
                for nested in &node.children {
                    if let Some(id) = self.add_child(nested) {
                        children.push(id);
                    }
                }
                Some(self.push(Run::Tagged {
                    tag: node.tag.clone(),
                    attrs: node.attrs.clone(),
                    children,
                }))
            }
        }
    }

    /// Trim leading whitespace off the first text run and trailing
    /// whitespace off the last, so flatten() matches normalized unit text.
    fn normalize_edges(&mut self) {
        if let Some(&first) = self.roots.first() {
            if let Run::Text(text) = &mut self.runs[first] {
                *text = text.trim_start().to_string();
            }
        }
        if let Some(&last) = self.roots.last() {
            if let Run::Text(text) = &mut self.runs[last] {
                *text = text.trim_end().to_string();
            }
        }
        self.roots.retain(|&id| match &self.runs[id] {
            Run::Text(text) => !text.is_empty(),
            Run::Tagged { .. } => true,
        });
    }

    /// Append a run to the arena, returning its id
    pub fn push(&mut self, run: Run) -> RunId {
        self.runs.push(run);
        self.runs.len() - 1
    }

    /// Append a run as a new top-level root
    pub fn push_root(&mut self, run: Run) -> RunId {
        let id = self.push(run);
        self.roots.push(id);
        id
    }

    /// Top-level run ids in order
    pub fn roots(&self) -> &[RunId] {
        &self.roots
    }

    /// Look up a run by id
    pub fn run(&self, id: RunId) -> &Run {
        &self.runs[id]
    }

    /// Whether the tree contains any tagged (inline formatting) run
    pub fn has_tagged_runs(&self) -> bool {
        self.runs
            .iter()
            .any(|run| matches!(run, Run::Tagged { .. }))
    }

    /// Number of top-level tagged runs
    pub fn tagged_root_count(&self) -> usize {
        self.roots
            .iter()
            .filter(|&&id| matches!(self.runs[id], Run::Tagged { .. }))
            .count()
    }

    /// Concatenated text of all runs
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        for &id in &self.roots {
            self.flatten_run(id, &mut out);
        }
        out
    }

    fn flatten_run(&self, id: RunId, out: &mut String) {
        match &self.runs[id] {
            Run::Text(text) => out.push_str(text),
            Run::Tagged { children, .. } => {
                for &child in children {
                    self.flatten_run(child, out);
                }
            }
        }
    }

    /// Char-offset span of each top-level run within the flattened text
    pub fn root_spans(&self) -> Vec<(RunId, Range<usize>)> {
        let mut spans = Vec::with_capacity(self.roots.len());
        let mut offset = 0usize;
        for &id in &self.roots {
            let mut piece = String::new();
            self.flatten_run(id, &mut piece);
            let len = piece.chars().count();
            spans.push((id, offset..offset + len));
            offset += len;
        }
        spans
    }

    /// Rebuild DOM children from this tree (for grafting back into the
    /// reference document)
    pub fn to_children(&self) -> Vec<XmlChild> {
        self.roots.iter().map(|&id| self.run_to_child(id)).collect()
    }

    fn run_to_child(&self, id: RunId) -> XmlChild {
        match &self.runs[id] {
            Run::Text(text) => XmlChild::Text(text.clone()),
            Run::Tagged {
                tag,
                attrs,
                children,
            } => XmlChild::Element(XmlNode {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: children.iter().map(|&c| self.run_to_child(c)).collect(),
            }),
        }
    }
}

impl Default for MarkupTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse internal whitespace runs to single spaces without trimming
/// the ends (edge trimming is handled per-tree so offsets stay aligned).
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::dom::XmlDocument;

    fn tree_for(xml: &str) -> MarkupTree {
        let doc = XmlDocument::parse(xml).unwrap();
        MarkupTree::from_node(&doc.root)
    }

    #[test]
    fn test_fromNode_plainParagraph_shouldHaveSingleTextRun() {
        let tree = tree_for("<p>Hello world</p>");
        assert_eq!(tree.roots().len(), 1);
        assert!(!tree.has_tagged_runs());
        assert_eq!(tree.flatten(), "Hello world");
    }

    #[test]
    fn test_fromNode_inlineSpan_shouldCaptureTagAndAttrs() {
        let tree = tree_for(r#"<p>This is <span class="hl">important</span> text.</p>"#);

        assert_eq!(tree.roots().len(), 3);
        assert!(tree.has_tagged_runs());
        assert_eq!(tree.flatten(), "This is important text.");

        match tree.run(tree.roots()[1]) {
            Run::Tagged { tag, attrs, .. } => {
                assert_eq!(tag, "span");
                assert_eq!(attrs, &vec![("class".to_string(), "hl".to_string())]);
            }
            Run::Text(_) => panic!("expected tagged run"),
        }
    }

    #[test]
    fn test_rootSpans_shouldCoverFlattenedText() {
        let tree = tree_for(r#"<p>This is <span class="hl">important</span> text.</p>"#);
        let spans = tree.root_spans();

        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].1, 0..8); // "This is "
        assert_eq!(spans[1].1, 8..17); // "important"
        assert_eq!(spans[2].1, 17..23); // " text."
    }

    #[test]
    fn test_fromNode_nestedInline_shouldPreserveNesting() {
        let tree = tree_for("<p><em>one <strong>two</strong></em> three</p>");
        assert_eq!(tree.flatten(), "one two three");

        match tree.run(tree.roots()[0]) {
            Run::Tagged { tag, children, .. } => {
                assert_eq!(tag, "em");
                assert_eq!(children.len(), 2);
            }
            Run::Text(_) => panic!("expected tagged run"),
        }
    }

    #[test]
    fn test_toChildren_roundTrip_shouldRebuildMarkup() {
        let doc =
            XmlDocument::parse(r#"<p>This is <span class="hl">important</span> text.</p>"#)
                .unwrap();
        let tree = MarkupTree::from_node(&doc.root);

        let rebuilt = XmlNode {
            tag: "p".to_string(),
            attrs: Vec::new(),
            children: tree.to_children(),
        };
        assert_eq!(
            rebuilt.flattened_text(),
            "This is important text."
        );
    }

    #[test]
    fn test_fromText_empty_shouldHaveNoRoots() {
        let tree = MarkupTree::from_text("");
        assert!(tree.roots().is_empty());
        assert_eq!(tree.flatten(), "");
    }

    #[test]
    fn test_serde_roundTrip_shouldBeIdentical() {
        let tree = tree_for(r#"<p>a <b>c</b> d</p>"#);
        let json = serde_json::to_string(&tree).unwrap();
        let back: MarkupTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
