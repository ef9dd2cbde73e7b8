/*!
 * Structure-preserving text grafting.
 *
 * Rewrites a structural unit's markup tree so it carries translated text
 * while keeping every inline-formatting region. A run covering a single
 * word takes the next unconsumed token of the translation (first-token
 * heuristic); a run covering several words maps token-proportionally;
 * when the original has no token boundaries at all the run's relative
 * character offsets are mapped instead. Runs that cannot be placed are
 * appended, unconsumed, at the end of the unit and flagged rather than
 * silently dropped.
 *
 * `write` is a pure function: same unit and same text always produce the
 * same tree, and the input tree is never mutated.
 */

use std::collections::HashMap;
use std::ops::Range;

use super::dom::{XmlChild, XmlDocument, XmlNode};
use super::extractor::StructuralUnit;
use super::markup::{MarkupTree, Run, RunId};
use crate::errors::StructureError;

/// Result of rewriting one unit
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The replacement tree; flattens to the translated text (plus any
    /// unconsumed runs appended at the end)
    pub tree: MarkupTree,
    /// Number of formatting runs that could not be mapped and were
    /// appended unconsumed
    pub ambiguous_runs: usize,
}

impl WriteOutcome {
    /// Whether every formatting run was relocated cleanly
    pub fn is_clean(&self) -> bool {
        self.ambiguous_runs == 0
    }
}

/// Rewrites structural units with translated text
pub struct StructureWriter;

impl StructureWriter {
    /// Build the replacement markup tree for a unit.
    ///
    /// If the unit has no inline-formatting runs the translated text is
    /// substituted directly; otherwise each tagged run is relocated to
    /// the structurally-analogous span of the translation.
    pub fn write(unit: &StructuralUnit, translated: &str) -> WriteOutcome {
        let source = &unit.markup_tree;

        if !source.has_tagged_runs() {
            return WriteOutcome {
                tree: MarkupTree::from_text(translated),
                ambiguous_runs: 0,
            };
        }

        let original = source.flatten();
        let orig_tokens = token_char_spans(&original);
        let trans_tokens = token_byte_spans(translated);

        // Nothing to anchor runs to: keep the text, append all runs.
        if trans_tokens.is_empty() {
            let mut tree = MarkupTree::from_text(translated);
            let appended = append_unconsumed(source, tagged_roots(source), &mut tree);
            return WriteOutcome {
                tree,
                ambiguous_runs: appended,
            };
        }

        let mapped = if orig_tokens.len() <= 1 {
            Self::map_runs_by_chars(source, &original, translated)
        } else {
            Self::map_runs_by_tokens(source, &orig_tokens, &trans_tokens)
        };

        Self::assemble(source, translated, mapped)
    }

    /// Token-mode mapping. Translation tokens are consumed left to right:
    /// a single-word run takes the next free token, a multi-word run maps
    /// proportionally (shifted forward past consumed tokens).
    fn map_runs_by_tokens(
        source: &MarkupTree,
        orig_tokens: &[Range<usize>],
        trans_tokens: &[Range<usize>],
    ) -> Vec<(RunId, Option<Range<usize>>)> {
        let n = orig_tokens.len();
        let m = trans_tokens.len();

        let mut out = Vec::new();
        let mut next_free = 0usize;

        for (id, span) in source.root_spans() {
            if !matches!(source.run(id), Run::Tagged { .. }) {
                continue;
            }

            let Some((ti, tj)) = covered_tokens(&span, orig_tokens) else {
                out.push((id, None));
                continue;
            };

            let (i, j) = if tj - ti == 1 {
                // Single word: first-token heuristic
                (next_free, next_free + 1)
            } else {
                let i = ((ti as f64) * (m as f64) / (n as f64)).round() as usize;
                let j = ((tj as f64) * (m as f64) / (n as f64)).round() as usize;
                let i = i.max(next_free);
                (i, j.clamp(i + 1, m.max(i + 1)))
            };

            if i >= m || j > m {
                out.push((id, None));
                continue;
            }

            next_free = j;
            out.push((id, Some(trans_tokens[i].start..trans_tokens[j - 1].end)));
        }

        out
    }

    /// Character-proportional mapping for originals with no token
    /// boundaries (e.g. unsegmented scripts).
    fn map_runs_by_chars(
        source: &MarkupTree,
        original: &str,
        translated: &str,
    ) -> Vec<(RunId, Option<Range<usize>>)> {
        let orig_len = original.chars().count();
        let trans_offsets: Vec<usize> = translated
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(translated.len()))
            .collect();
        let trans_len = trans_offsets.len().saturating_sub(1);

        let mut out = Vec::new();
        let mut prev_end = 0usize;

        for (id, span) in source.root_spans() {
            if !matches!(source.run(id), Run::Tagged { .. }) {
                continue;
            }

            if orig_len == 0 || trans_len == 0 {
                out.push((id, None));
                continue;
            }

            let start =
                ((span.start as f64) * (trans_len as f64) / (orig_len as f64)).round() as usize;
            let end = ((span.end as f64) * (trans_len as f64) / (orig_len as f64)).round() as usize;

            let start = start.max(prev_end).min(trans_len.saturating_sub(1));
            let end = end.clamp(start + 1, trans_len);

            if start < prev_end {
                out.push((id, None));
                continue;
            }
            prev_end = end;

            out.push((id, Some(trans_offsets[start]..trans_offsets[end])));
        }

        out
    }

    fn assemble(
        source: &MarkupTree,
        translated: &str,
        mapped: Vec<(RunId, Option<Range<usize>>)>,
    ) -> WriteOutcome {
        let mut tree = MarkupTree::new();
        let mut cursor = 0usize;
        let mut unmapped = Vec::new();

        for (id, range) in mapped {
            let Some(range) = range else {
                unmapped.push(id);
                continue;
            };

            if range.start > cursor {
                tree.push_root(Run::Text(translated[cursor..range.start].to_string()));
            }

            if let Run::Tagged { tag, attrs, .. } = source.run(id) {
                let text_id = tree.push(Run::Text(translated[range.clone()].to_string()));
                tree.push_root(Run::Tagged {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                    children: vec![text_id],
                });
            }

            cursor = range.end;
        }

        if cursor < translated.len() {
            tree.push_root(Run::Text(translated[cursor..].to_string()));
        }

        let ambiguous_runs = append_unconsumed(source, unmapped, &mut tree);

        WriteOutcome {
            tree,
            ambiguous_runs,
        }
    }

    /// Graft replacement texts into a reference document, producing a new
    /// document. The input document is left untouched.
    pub fn graft(
        document: &XmlDocument,
        units: &[StructuralUnit],
        translations: &HashMap<String, String>,
    ) -> Result<(XmlDocument, usize), StructureError> {
        let mut out = document.clone();
        let mut total_ambiguous = 0;

        for unit in units {
            let Some(text) = translations.get(&unit.id) else {
                continue;
            };

            let outcome = Self::write(unit, text);
            total_ambiguous += outcome.ambiguous_runs;

            let node = node_at_path_mut(&mut out.root, &unit.node_path)
                .ok_or_else(|| StructureError::UnknownUnit(unit.id.clone()))?;
            node.children = outcome.tree.to_children();
        }

        Ok((out, total_ambiguous))
    }
}

/// Resolve a child-index path to a mutable node
fn node_at_path_mut<'a>(root: &'a mut XmlNode, path: &[usize]) -> Option<&'a mut XmlNode> {
    let mut current = root;
    for &index in path {
        match current.children.get_mut(index)? {
            XmlChild::Element(node) => current = node,
            XmlChild::Text(_) => return None,
        }
    }
    Some(current)
}

/// Tagged root run ids of a tree, in order
fn tagged_roots(tree: &MarkupTree) -> Vec<RunId> {
    tree.roots()
        .iter()
        .copied()
        .filter(|&id| matches!(tree.run(id), Run::Tagged { .. }))
        .collect()
}

/// Deep-copy unconsumed runs to the end of the new tree; returns count
fn append_unconsumed(source: &MarkupTree, ids: Vec<RunId>, tree: &mut MarkupTree) -> usize {
    let count = ids.len();
    for id in ids {
        let run = copy_run(source, id, tree);
        tree.push_root(run);
    }
    count
}

fn copy_run(source: &MarkupTree, id: RunId, tree: &mut MarkupTree) -> Run {
    match source.run(id) {
        Run::Text(text) => Run::Text(text.clone()),
        Run::Tagged {
            tag,
            attrs,
            children,
        } => {
            let mut new_children = Vec::with_capacity(children.len());
            for &child in children {
                let copied = copy_run(source, child, tree);
                new_children.push(tree.push(copied));
            }
            Run::Tagged {
                tag: tag.clone(),
                attrs: attrs.clone(),
                children: new_children,
            }
        }
    }
}

/// char-offset spans of whitespace-separated tokens
fn token_char_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = None;
    let mut index = 0usize;

    for ch in text.chars() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push(s..index);
            }
        } else if start.is_none() {
            start = Some(index);
        }
        index += 1;
    }
    if let Some(s) = start {
        spans.push(s..index);
    }
    spans
}

/// byte-offset spans of whitespace-separated tokens
fn token_byte_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = None;

    for (offset, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push(s..offset);
            }
        } else if start.is_none() {
            start = Some(offset);
        }
    }
    if let Some(s) = start {
        spans.push(s..text.len());
    }
    spans
}

/// Tokens of the original overlapped by a run's char span, as [i, j)
fn covered_tokens(span: &Range<usize>, tokens: &[Range<usize>]) -> Option<(usize, usize)> {
    let mut first = None;
    let mut last = None;

    for (index, token) in tokens.iter().enumerate() {
        if token.end > span.start && token.start < span.end {
            if first.is_none() {
                first = Some(index);
            }
            last = Some(index);
        }
    }

    match (first, last) {
        (Some(i), Some(j)) => Some((i, j + 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::dom::XmlDocument;
    use crate::structure::extractor::StructureExtractor;

    fn unit_for(xml: &str) -> StructuralUnit {
        let doc = XmlDocument::parse(xml).unwrap();
        let wrapped = XmlDocument {
            root: XmlNode {
                tag: "body".to_string(),
                attrs: Vec::new(),
                children: vec![XmlChild::Element(doc.root)],
            },
            has_decl: false,
        };
        StructureExtractor::new()
            .extract(&wrapped)
            .into_iter()
            .next()
            .expect("no unit extracted")
    }

    fn tagged_text(tree: &MarkupTree, root_index: usize) -> String {
        match tree.run(tree.roots()[root_index]) {
            Run::Tagged { children, .. } => match tree.run(children[0]) {
                Run::Text(text) => text.clone(),
                Run::Tagged { .. } => panic!("expected text child"),
            },
            Run::Text(_) => panic!("expected tagged run"),
        }
    }

    #[test]
    fn test_write_plainUnit_shouldSubstituteDirectly() {
        let unit = unit_for("<p>O my God! Grant that I may serve Thy Cause.</p>");
        let outcome = StructureWriter::write(&unit, "Oh Dios! Concédeme servir a Tu Causa.");

        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.flatten(), "Oh Dios! Concédeme servir a Tu Causa.");
        assert!(!outcome.tree.has_tagged_runs());
    }

    #[test]
    fn test_write_singleWordSpan_shouldWrapFirstToken() {
        // A span covering one word lands on the first token of the
        // translation
        let unit = unit_for(r#"<p>This is <span class="hl">important</span> text.</p>"#);
        let outcome = StructureWriter::write(&unit, "Esto es vital realmente");

        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.flatten(), "Esto es vital realmente");
        assert_eq!(tagged_text(&outcome.tree, 0), "Esto");

        match outcome.tree.run(outcome.tree.roots()[0]) {
            Run::Tagged { tag, attrs, .. } => {
                assert_eq!(tag, "span");
                assert_eq!(attrs, &vec![("class".to_string(), "hl".to_string())]);
            }
            Run::Text(_) => panic!("expected tagged run first"),
        }
    }

    #[test]
    fn test_write_multiWordSpan_shouldMapProportionally() {
        // em covers tokens 3..6 of 7
        let unit = unit_for("<p>Now I pray: <em>grant me strength</em> today</p>");
        let outcome = StructureWriter::write(&unit, "Ahora rezo: dame fuerza hoy");

        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.flatten(), "Ahora rezo: dame fuerza hoy");

        // tokens 3..6 of n=7 -> rounds to tokens 2..4 of m=5
        let tagged: Vec<String> = outcome
            .tree
            .roots()
            .iter()
            .enumerate()
            .filter(|&(_, &id)| matches!(outcome.tree.run(id), Run::Tagged { .. }))
            .map(|(index, _)| tagged_text(&outcome.tree, index))
            .collect();
        assert_eq!(tagged, vec!["dame fuerza".to_string()]);
    }

    #[test]
    fn test_write_twoSingleWordSpans_shouldConsumeTokensInOrder() {
        let unit = unit_for("<p><b>Alpha</b> <i>beta</i> gamma delta epsilon zeta</p>");
        let outcome = StructureWriter::write(&unit, "uno dos tres");

        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.flatten(), "uno dos tres");
        assert_eq!(tagged_text(&outcome.tree, 0), "uno");
        assert_eq!(tagged_text(&outcome.tree, 2), "dos");
    }

    #[test]
    fn test_write_isIdempotent() {
        let unit = unit_for(r#"<p>This is <span class="hl">important</span> text.</p>"#);
        let first = StructureWriter::write(&unit, "Esto es vital realmente");
        let second = StructureWriter::write(&unit, "Esto es vital realmente");
        assert_eq!(first.tree, second.tree);
    }

    #[test]
    fn test_write_moreRunsThanTokens_shouldFlagUnconsumed() {
        let unit = unit_for("<p><b>Alpha</b> <i>beta</i> gamma delta epsilon zeta</p>");
        let outcome = StructureWriter::write(&unit, "uno");

        // One token serves the first run; the second is appended,
        // unconsumed, rather than lost.
        assert_eq!(outcome.ambiguous_runs, 1);
        assert_eq!(tagged_text(&outcome.tree, 0), "uno");
        assert!(outcome.tree.flatten().contains("beta"));
    }

    #[test]
    fn test_write_emptyTranslation_shouldAppendAllRuns() {
        let unit = unit_for("<p>Hi <b>there</b> friend</p>");
        let outcome = StructureWriter::write(&unit, "");

        assert_eq!(outcome.ambiguous_runs, 1);
        assert_eq!(outcome.tree.flatten(), "there");
    }

    #[test]
    fn test_write_unsegmentedOriginal_shouldMapCharProportionally() {
        // No whitespace anywhere in the original text
        let unit = unit_for("<p>早上好<b>世界</b>再见</p>");
        let outcome = StructureWriter::write(&unit, "good morning world bye");

        assert!(outcome.is_clean());
        assert_eq!(outcome.tree.flatten(), "good morning world bye");
        assert!(outcome.tree.has_tagged_runs());
    }

    #[test]
    fn test_graft_shouldReplaceOnlyTargetedUnits() {
        let source = r#"<doc><p id="p1">This is <span class="hl">important</span> text.</p><p id="p2">Leave me alone.</p></doc>"#;
        let doc = XmlDocument::parse(source).unwrap();
        let units = StructureExtractor::new().extract(&doc);

        let mut translations = HashMap::new();
        translations.insert("p1".to_string(), "Esto es vital realmente".to_string());

        let (grafted, ambiguous) = StructureWriter::graft(&doc, &units, &translations).unwrap();
        assert_eq!(ambiguous, 0);

        let out = grafted.serialize().unwrap();
        assert!(out.contains(r#"<span class="hl">Esto</span>"#));
        assert!(out.contains("Leave me alone."));
        // Input document untouched
        assert_eq!(doc.serialize().unwrap(), source);
    }

    #[test]
    fn test_graft_unknownPath_shouldKeepUntargetedDocumentIntact() {
        let doc = XmlDocument::parse("<doc><p id=\"p1\">Some text here.</p></doc>").unwrap();
        let units = StructureExtractor::new().extract(&doc);

        let (grafted, _) =
            StructureWriter::graft(&doc, &units, &HashMap::new()).unwrap();
        assert_eq!(grafted, doc);
    }
}
