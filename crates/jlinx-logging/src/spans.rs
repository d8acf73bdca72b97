//! Span helpers so every line logged while working on a document is
//! attributable to it.

use tracing::Span;

/// Span covering work on one document
pub fn document_span(doc_type: &str, doc_id: &str) -> Span {
    tracing::info_span!("document", doc_type = %doc_type, doc_id = %doc_id)
}

/// Span covering the replay of one document
pub fn replay_span(doc_type: &str, doc_id: &str) -> Span {
    tracing::debug_span!("replay", doc_type = %doc_type, doc_id = %doc_id)
}
