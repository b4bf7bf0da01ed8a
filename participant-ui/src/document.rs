use std::cell::RefCell;
use std::rc::Rc;

use dioxus::prelude::*;
use shared_types::{DocumentUpdate, Span};

use crate::sketch::{build_sketch_index, SketchIndex};

pub const NO_DOCUMENT_TEXT: &str = "No document yet.";

/// Document and sketch as last pushed by the backend.
///
/// Equality is reference identity: two snapshots are equal only when they
/// share the same document and sketch allocations. A new update always gets
/// new allocations, so the view recomputes once per update and never on a
/// plain re-render.
#[derive(Debug, Clone, Default)]
pub struct DocumentSnapshot {
    pub document: Rc<[String]>,
    pub sketch: Rc<[Span]>,
}

impl DocumentSnapshot {
    pub fn new(document: Vec<String>, sketch: Vec<Span>) -> Self {
        Self {
            document: document.into(),
            sketch: sketch.into(),
        }
    }

    pub fn same_inputs(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.document, &other.document) && Rc::ptr_eq(&self.sketch, &other.sketch)
    }
}

impl PartialEq for DocumentSnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.same_inputs(other)
    }
}

impl From<DocumentUpdate> for DocumentSnapshot {
    fn from(update: DocumentUpdate) -> Self {
        Self::new(update.document, update.sketch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRow {
    pub index: &'static str,
    pub sentence: &'static str,
    pub topics: &'static str,
}

pub const HEADER_ROW: HeaderRow = HeaderRow {
    index: "#",
    sentence: "Sentence",
    topics: "Sketch Topics",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceRow {
    pub index: usize,
    pub text: String,
    /// Quoted topic labels joined with `", "`; empty when uncovered.
    pub topics: String,
}

impl SentenceRow {
    pub fn index_label(&self) -> String {
        format!("[{}]", self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DocumentRender {
    /// Nothing to show yet; rendered as a message, never as an empty table.
    #[default]
    NoDocument,
    Table {
        header: HeaderRow,
        rows: Vec<SentenceRow>,
    },
}

pub fn render_document(document: &[String], index: &SketchIndex) -> DocumentRender {
    if document.is_empty() {
        return DocumentRender::NoDocument;
    }

    let rows = document
        .iter()
        .enumerate()
        .map(|(i, sentence)| SentenceRow {
            index: i,
            text: sentence.clone(),
            topics: index.get(&i).map(|t| t.join(", ")).unwrap_or_default(),
        })
        .collect();

    DocumentRender::Table {
        header: HEADER_ROW,
        rows,
    }
}

/// Holds the last render and recomputes only when the inputs change.
#[derive(Debug, Default)]
pub struct DocumentRenderCache {
    inputs: Option<DocumentSnapshot>,
    output: Rc<DocumentRender>,
    recomputes: u64,
}

impl DocumentRenderCache {
    pub fn refresh(&mut self, snapshot: &DocumentSnapshot) -> Rc<DocumentRender> {
        let stale = self
            .inputs
            .as_ref()
            .map_or(true, |inputs| !inputs.same_inputs(snapshot));

        if stale {
            let index = build_sketch_index(&snapshot.document, &snapshot.sketch);
            self.output = Rc::new(render_document(&snapshot.document, &index));
            self.inputs = Some(snapshot.clone());
            self.recomputes += 1;
        }

        self.output.clone()
    }

    /// Number of times the index and rows have been rebuilt.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }
}

#[component]
pub fn DocumentView(snapshot: DocumentSnapshot) -> Element {
    let cache = use_hook(|| Rc::new(RefCell::new(DocumentRenderCache::default())));
    let render = cache.borrow_mut().refresh(&snapshot);

    rsx! {
        div {
            style: "padding: 32px; margin: 32px; width: 100%;",
            match render.as_ref() {
                DocumentRender::NoDocument => rsx! { "{NO_DOCUMENT_TEXT}" },
                DocumentRender::Table { header, rows } => rsx! {
                    div {
                        style: "font-size: x-large;",
                        table {
                            id: "simple-board",
                            tbody {
                                tr {
                                    id: "row00",
                                    td { style: "padding: 8px; font-weight: 700;", "{header.index}" }
                                    td { style: "padding: 8px; font-weight: 700;", "{header.sentence}" }
                                    td { style: "padding: 8px; padding-left: 32px; font-weight: 700;", "{header.topics}" }
                                }
                                for row in rows.iter() {
                                    tr {
                                        key: "{row.index}",
                                        id: "row{row.index}",
                                        td {
                                            style: "padding: 8px; word-wrap: break-word; width: 0.1%;",
                                            {row.index_label()}
                                        }
                                        td {
                                            style: "padding: 8px; word-wrap: break-word; width: 15%;",
                                            "{row.text}"
                                        }
                                        td {
                                            style: "padding: 8px; padding-left: 32px; word-wrap: break-word; width: 15%; font-style: italic;",
                                            "{row.topics}"
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
            }
        }
    }
}
