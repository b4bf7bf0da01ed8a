//! Sketch overlay index: which topics cover which sentence. No RSX, no signals.

use std::collections::BTreeMap;

use shared_types::Span;

/// Sentence index → quoted topic labels, in span processing order.
///
/// Sentences no span covers have no entry. Identical labels from repeated
/// spans are kept as separate entries.
pub type SketchIndex = BTreeMap<usize, Vec<String>>;

/// Display token for a topic label.
pub fn quote_topic(topic: &str) -> String {
    format!("'{topic}'")
}

/// Build the per-sentence topic index for `document`.
///
/// Each span contributes its label once to every sentence it covers. Positions
/// outside the document are skipped, and a span with `start > end` contributes
/// nothing.
pub fn build_sketch_index(document: &[String], spans: &[Span]) -> SketchIndex {
    let mut index = SketchIndex::new();
    let Some(last) = document.len().checked_sub(1) else {
        return index;
    };

    for span in spans {
        let Some((lo, hi)) = clamp_span(span, last) else {
            continue;
        };
        let label = quote_topic(&span.topic);
        for i in lo..=hi {
            index.entry(i).or_default().push(label.clone());
        }
    }

    index
}

fn clamp_span(span: &Span, last: usize) -> Option<(usize, usize)> {
    if span.start > span.end || span.end < 0 {
        return None;
    }
    let lo = usize::try_from(span.start.max(0)).ok()?;
    let hi = usize::try_from(span.end).map_or(last, |end| end.min(last));
    (lo <= hi).then_some((lo, hi))
}
