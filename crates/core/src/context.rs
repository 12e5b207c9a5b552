use crate::models::DocumentMatches;
use std::fmt::Write;

/// Joins every match into `"<document>, page <n>: <snippet>\n"` lines,
/// documents in the given order and pages in matcher order.
pub fn assemble_context(documents: &[DocumentMatches]) -> String {
    let mut context = String::new();
    for document in documents {
        for found in &document.matches {
            // Writing into a String cannot fail.
            let _ = writeln!(
                context,
                "{}, page {}: {}",
                document.document, found.page, found.snippet
            );
        }
    }
    context
}
