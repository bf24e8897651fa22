//! Marker queries: annotate the regions of an entry matched by queries
//!
//! A marker pairs a query with an attribute. When the query holds for an
//! entry, every region matched by one of its positive `text` tests is wrapped
//! in a mark element carrying the attribute. Overlapping markers are layered:
//! the content is cut at every region boundary and each piece carries the
//! attributes of all markers covering it.

use crate::compiler::{CompiledQuery, compile_query};
use crate::error::CorpusError;
use crate::query::{Expr, Field};
use crate::vm::EntryView;
use std::ops::Range;

/// A query whose matches are marked with `attribute="value"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerQuery {
    pub query: String,
    pub attribute: String,
    pub value: String,
}

impl MarkerQuery {
    pub fn new(
        query: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }
}

/// A marker with its query compiled and its attribute checked
#[derive(Debug, Clone)]
pub struct CompiledMarker {
    query: CompiledQuery,
    attribute: String,
    value: String,
}

/// Compile every marker up front, so a bad marker fails before any reading
pub fn compile_markers(markers: &[MarkerQuery]) -> Result<Vec<CompiledMarker>, CorpusError> {
    markers
        .iter()
        .map(|marker| {
            if !is_xml_name(&marker.attribute) {
                return Err(CorpusError::InvalidMarker(marker.attribute.clone()));
            }
            Ok(CompiledMarker {
                query: compile_query(&marker.query)?,
                attribute: marker.attribute.clone(),
                value: marker.value.clone(),
            })
        })
        .collect()
}

/// The regions one marker covers, merged and sorted
struct Layer<'m> {
    attribute: &'m str,
    value: &'m str,
    spans: Vec<Range<usize>>,
}

/// Render `content` with every marker applied in order
///
/// Returns the content unchanged when no marker contributes a region.
pub fn mark_content(
    name: &str,
    content: &str,
    markers: &[CompiledMarker],
    element: &str,
) -> Result<String, CorpusError> {
    if !is_xml_name(element) {
        return Err(CorpusError::InvalidMarker(element.to_string()));
    }

    let mut layers = Vec::new();
    for marker in markers {
        let mut entry = EntryView::with_content(name, content);
        if !marker.query.vm().execute(&mut entry)? {
            continue;
        }

        let mut spans = Vec::new();
        collect_spans(marker.query.expr(), name, content, &mut spans);
        let spans = merge_spans(spans);
        if !spans.is_empty() {
            layers.push(Layer {
                attribute: &marker.attribute,
                value: &marker.value,
                spans,
            });
        }
    }

    if layers.is_empty() {
        return Ok(content.to_string());
    }
    Ok(render(content, &layers, element))
}

/// Match regions of the positive `text` tests of a holding expression
///
/// Only disjuncts that hold for the entry contribute regions.
fn collect_spans(expr: &Expr, name: &str, content: &str, spans: &mut Vec<Range<usize>>) {
    match expr {
        Expr::Test(Field::Text, condition) => spans.extend(condition.spans(content)),
        Expr::And(items) => {
            for item in items {
                collect_spans(item, name, content, spans);
            }
        }
        Expr::Or(items) => {
            for item in items.iter().filter(|item| holds(item, name, content)) {
                collect_spans(item, name, content, spans);
            }
        }
        // Negated tests and name tests mark nothing
        Expr::Not(_) | Expr::Test(Field::Name, _) | Expr::Const(_) => {}
    }
}

fn holds(expr: &Expr, name: &str, content: &str) -> bool {
    match expr {
        Expr::Const(value) => *value,
        Expr::Test(Field::Name, condition) => condition.is_match(name),
        Expr::Test(Field::Text, condition) => condition.is_match(content),
        Expr::Not(inner) => !holds(inner, name, content),
        Expr::And(items) => items.iter().all(|item| holds(item, name, content)),
        Expr::Or(items) => items.iter().any(|item| holds(item, name, content)),
    }
}

/// Sort spans and merge the ones that overlap or touch
fn merge_spans(mut spans: Vec<Range<usize>>) -> Vec<Range<usize>> {
    spans.sort_by_key(|span| (span.start, span.end));
    let mut merged: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    for span in spans {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}

fn render(content: &str, layers: &[Layer<'_>], element: &str) -> String {
    let mut bounds = vec![0, content.len()];
    for layer in layers {
        for span in &layer.spans {
            bounds.push(span.start);
            bounds.push(span.end);
        }
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut out = String::with_capacity(content.len() + 32 * bounds.len());
    // Per-layer position in its span list
    let mut cursors = vec![0usize; layers.len()];
    let mut attributes: Vec<(&str, &str)> = Vec::new();

    for piece in bounds.windows(2) {
        let (start, end) = (piece[0], piece[1]);
        // Spans come from matches of valid UTF-8 needles, so bounds are char boundaries
        let text = &content[start..end];

        attributes.clear();
        for (layer, cursor) in layers.iter().zip(cursors.iter_mut()) {
            while *cursor < layer.spans.len() && layer.spans[*cursor].end <= start {
                *cursor += 1;
            }
            let covered = layer
                .spans
                .get(*cursor)
                .is_some_and(|span| span.start <= start);
            if covered {
                add_attribute(&mut attributes, layer.attribute, layer.value);
            }
        }

        if attributes.is_empty() {
            out.push_str(text);
            continue;
        }

        out.push('<');
        out.push_str(element);
        for (attribute, value) in &attributes {
            out.push(' ');
            out.push_str(attribute);
            out.push_str("=\"");
            push_escaped(&mut out, value);
            out.push('"');
        }
        out.push('>');
        out.push_str(text);
        out.push_str("</");
        out.push_str(element);
        out.push('>');
    }

    out
}

/// A later marker with the same attribute overrides the value in place
fn add_attribute<'m>(attributes: &mut Vec<(&'m str, &'m str)>, name: &'m str, value: &'m str) {
    match attributes.iter_mut().find(|(existing, _)| *existing == name) {
        Some(slot) => slot.1 = value,
        None => attributes.push((name, value)),
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Whether `name` is usable as an XML element or attribute name
pub(crate) fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}
